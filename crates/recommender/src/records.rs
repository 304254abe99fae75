//! Published recommendation records.

use std::collections::BTreeMap;

use model::{SpaceId, StoreVersion, ZoneId};
use serde::{Deserialize, Serialize};

/// A free space with its computed score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSpace {
    pub space: SpaceId,
    pub score: f64,
}

/// Ranked free spaces for a single zone, tagged with the store version the
/// ranking was computed against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub subject: ZoneId,
    pub entries: Vec<ScoredSpace>,
    pub source_version: StoreVersion,
}

impl RecommendationRecord {
    /// Ranks scored spaces: score descending, ties broken by space id
    /// ascending so equal-scored output is deterministic.
    pub fn ranked(subject: ZoneId, mut entries: Vec<ScoredSpace>, source_version: StoreVersion) -> Self {
        entries.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.space.cmp(&b.space))
        });
        Self {
            subject,
            entries,
            source_version,
        }
    }

    /// An empty record for a zone with no computed recommendations.
    pub fn empty(subject: ZoneId, source_version: StoreVersion) -> Self {
        Self {
            subject,
            entries: Vec::new(),
            source_version,
        }
    }

    /// Returns at most `limit` top-ranked entries.
    pub fn top(&self, limit: usize) -> &[ScoredSpace] {
        &self.entries[..self.entries.len().min(limit)]
    }
}

/// The complete published output of one recompute: one record per known zone.
///
/// Sets are immutable once published; refreshes build a new set and swap it
/// in whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendationSet {
    records: BTreeMap<ZoneId, RecommendationRecord>,
    version: StoreVersion,
}

impl RecommendationSet {
    /// Builds a set from per-zone records, all computed at `version`.
    pub fn new(records: BTreeMap<ZoneId, RecommendationRecord>, version: StoreVersion) -> Self {
        Self { records, version }
    }

    /// The store version this set was computed against.
    pub fn version(&self) -> StoreVersion {
        self.version
    }

    /// The record for a zone, if one was computed.
    pub fn record(&self, zone: &ZoneId) -> Option<&RecommendationRecord> {
        self.records.get(zone)
    }

    /// Zones covered by this set.
    pub fn zones(&self) -> impl Iterator<Item = &ZoneId> {
        self.records.keys()
    }

    /// The zone whose record currently lists `space`, if any.
    pub fn zone_listing(&self, space: &SpaceId) -> Option<&ZoneId> {
        self.records.values().find_map(|record| {
            record
                .entries
                .iter()
                .any(|entry| &entry.space == space)
                .then_some(&record.subject)
        })
    }

    /// Number of zones covered.
    pub fn zone_count(&self) -> usize {
        self.records.len()
    }

    /// Returns a copy of this set with one zone's record replaced and the
    /// set version advanced to the record's source version.
    pub fn with_record(&self, record: RecommendationRecord) -> Self {
        let mut records = self.records.clone();
        let version = self.version.max(record.source_version);
        records.insert(record.subject.clone(), record);
        Self { records, version }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(id: &str, score: f64) -> ScoredSpace {
        ScoredSpace {
            space: SpaceId::new(id),
            score,
        }
    }

    #[test]
    fn ranked_orders_by_score_then_id() {
        let record = RecommendationRecord::ranked(
            ZoneId::new("Z-A"),
            vec![scored("S-3", 0.5), scored("S-1", 0.5), scored("S-2", 0.9)],
            StoreVersion::new(7),
        );
        let ids: Vec<&str> = record.entries.iter().map(|e| e.space.as_str()).collect();
        assert_eq!(ids, vec!["S-2", "S-1", "S-3"]);
    }

    #[test]
    fn top_clamps_to_available_entries() {
        let record = RecommendationRecord::ranked(
            ZoneId::new("Z-A"),
            vec![scored("S-1", 1.0)],
            StoreVersion::new(1),
        );
        assert_eq!(record.top(5).len(), 1);
        assert_eq!(record.top(0).len(), 0);
    }

    #[test]
    fn zone_listing_finds_the_zone_holding_a_space() {
        let set = RecommendationSet::default()
            .with_record(RecommendationRecord::ranked(
                ZoneId::new("Z-A"),
                vec![scored("S-1", 1.0)],
                StoreVersion::new(1),
            ))
            .with_record(RecommendationRecord::ranked(
                ZoneId::new("Z-B"),
                vec![scored("S-2", 1.0)],
                StoreVersion::new(2),
            ));
        assert_eq!(
            set.zone_listing(&SpaceId::new("S-2")),
            Some(&ZoneId::new("Z-B"))
        );
        assert_eq!(set.zone_listing(&SpaceId::new("S-9")), None);
    }

    #[test]
    fn with_record_advances_set_version() {
        let set = RecommendationSet::default();
        let updated = set.with_record(RecommendationRecord::empty(
            ZoneId::new("Z-A"),
            StoreVersion::new(3),
        ));
        assert_eq!(updated.version(), StoreVersion::new(3));
        assert_eq!(updated.zone_count(), 1);
        // Original set untouched.
        assert_eq!(set.zone_count(), 0);
    }
}
