//! Pluggable scoring of free parking spaces.

use chrono::{DateTime, Duration, Utc};
use model::ParkingSpace;

/// Citation statistics for one parking space, aggregated from the store.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpaceStats {
    /// Total citations issued at this space.
    pub citation_count: u64,
    /// When the most recent citation was issued, if any.
    pub last_citation: Option<DateTime<Utc>>,
}

impl SpaceStats {
    /// Records one citation issued at `issued_at`.
    pub fn record_citation(&mut self, issued_at: DateTime<Utc>) {
        self.citation_count += 1;
        if self.last_citation.is_none_or(|last| issued_at > last) {
            self.last_citation = Some(issued_at);
        }
    }
}

/// Assigns a score to a free space. Higher scores rank earlier.
pub trait ScoringStrategy: Send + Sync {
    /// Strategy name, for logs and the admin surface.
    fn name(&self) -> &'static str;

    /// Scores one free space given its citation statistics at `as_of`.
    fn score(&self, space: &ParkingSpace, stats: &SpaceStats, as_of: DateTime<Utc>) -> f64;
}

/// Prefers spaces with fewer citations on record: of the free spaces in a
/// zone, the one ticketed least often wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct CitationAvoidance;

impl ScoringStrategy for CitationAvoidance {
    fn name(&self) -> &'static str {
        "citation-avoidance"
    }

    fn score(&self, _space: &ParkingSpace, stats: &SpaceStats, _as_of: DateTime<Utc>) -> f64 {
        1.0 / (1.0 + stats.citation_count as f64)
    }
}

/// Penalizes recent citations harder than old ones.
///
/// Citations outside the window stop counting; within the window each one
/// contributes a penalty that decays linearly with age.
#[derive(Debug, Clone, Copy)]
pub struct RecencyWeighted {
    window: Duration,
}

impl RecencyWeighted {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }
}

impl Default for RecencyWeighted {
    fn default() -> Self {
        Self::new(Duration::days(30))
    }
}

impl ScoringStrategy for RecencyWeighted {
    fn name(&self) -> &'static str {
        "recency-weighted"
    }

    fn score(&self, _space: &ParkingSpace, stats: &SpaceStats, as_of: DateTime<Utc>) -> f64 {
        let recency = match stats.last_citation {
            None => 0.0,
            Some(last) => {
                let age = as_of.signed_duration_since(last);
                if age >= self.window {
                    0.0
                } else {
                    let fraction = 1.0
                        - age.num_seconds().max(0) as f64 / self.window.num_seconds() as f64;
                    fraction.clamp(0.0, 1.0)
                }
            }
        };
        let base = 1.0 / (1.0 + stats.citation_count as f64);
        // A fully recent citation halves the base score.
        base * (1.0 - 0.5 * recency)
    }
}
