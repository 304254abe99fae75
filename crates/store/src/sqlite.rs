use std::str::FromStr;

use async_trait::async_trait;
use model::{Entity, EntityKey, EventMessage, Mutation, Seq, StoreVersion};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::{
    Result, StoreError,
    store::{ApplyOutcome, EntityFilter, Store, Versioned},
};

/// SQLite-backed store implementation.
///
/// The embedded engine is a single-writer database, so the pool is capped at
/// one connection; `apply` and `query` each run in one transaction, which
/// gives atomic apply and snapshot-consistent reads.
///
/// Layout: an `entities` table keyed by (kind, id) with denormalized filter
/// columns, an `applied_messages` idempotence set, and a one-row `watermark`.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (and creates if missing) a store at the given SQLite URL and
    /// initializes the schema.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(StoreError::Storage)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Opens a fresh in-memory store, mainly for tests.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entities (
                kind    TEXT NOT NULL,
                id      TEXT NOT NULL,
                zone    TEXT,
                vehicle TEXT,
                active  INTEGER NOT NULL DEFAULT 0,
                seq     INTEGER NOT NULL,
                live    INTEGER NOT NULL,
                body    TEXT,
                PRIMARY KEY (kind, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS applied_messages (
                message_id TEXT PRIMARY KEY,
                version    INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS watermark (
                id      INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("INSERT OR IGNORE INTO watermark (id, version) VALUES (1, 0)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn row_to_entity(row: &SqliteRow) -> Result<Entity> {
        let body: String = row.try_get("body")?;
        serde_json::from_str(&body)
            .map_err(|e| StoreError::Corrupt(format!("undecodable entity body: {e}")))
    }
}

#[async_trait]
impl Store for SqliteStore {
    #[tracing::instrument(skip(self, event), fields(message_id = %event.message_id, key = %event.key()))]
    async fn apply(&self, event: &EventMessage) -> Result<ApplyOutcome> {
        let mut tx = self.pool.begin().await?;

        let already: Option<i64> =
            sqlx::query_scalar("SELECT version FROM applied_messages WHERE message_id = ?")
                .bind(event.message_id.to_string())
                .fetch_optional(&mut *tx)
                .await?;
        if let Some(at) = already {
            return Ok(ApplyOutcome::Duplicate(StoreVersion::new(at)));
        }

        let key = event.key();
        let existing_seq: Option<i64> =
            sqlx::query_scalar("SELECT seq FROM entities WHERE kind = ? AND id = ?")
                .bind(key.kind().as_str())
                .bind(key.id_string())
                .fetch_optional(&mut *tx)
                .await?;

        sqlx::query("UPDATE watermark SET version = version + 1 WHERE id = 1")
            .execute(&mut *tx)
            .await?;
        let version: i64 = sqlx::query_scalar("SELECT version FROM watermark WHERE id = 1")
            .fetch_one(&mut *tx)
            .await?;
        let version = StoreVersion::new(version);

        sqlx::query("INSERT INTO applied_messages (message_id, version) VALUES (?, ?)")
            .bind(event.message_id.to_string())
            .bind(version.as_i64())
            .execute(&mut *tx)
            .await?;

        if let Some(seq) = existing_seq
            && Seq::new(seq) >= event.seq
        {
            tx.commit().await?;
            metrics::counter!("store_apply_superseded_total").increment(1);
            return Ok(ApplyOutcome::Superseded(version));
        }

        let (live, zone, vehicle, active, body) = match &event.mutation {
            Mutation::Upsert(entity) => (
                true,
                entity.zone().map(|z| z.as_str().to_string()),
                entity.vehicle().map(|v| v.as_str().to_string()),
                entity.is_active(),
                Some(serde_json::to_string(entity)?),
            ),
            Mutation::Tombstone(_) => (false, None, None, false, None),
        };

        sqlx::query(
            r#"
            INSERT INTO entities (kind, id, zone, vehicle, active, seq, live, body)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (kind, id) DO UPDATE SET
                zone = excluded.zone,
                vehicle = excluded.vehicle,
                active = excluded.active,
                seq = excluded.seq,
                live = excluded.live,
                body = excluded.body
            "#,
        )
        .bind(key.kind().as_str())
        .bind(key.id_string())
        .bind(zone)
        .bind(vehicle)
        .bind(active)
        .bind(event.seq.as_i64())
        .bind(live)
        .bind(body)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        metrics::counter!("store_apply_total").increment(1);
        Ok(ApplyOutcome::Applied(version))
    }

    async fn get(&self, key: &EntityKey) -> Result<Option<Entity>> {
        let row = sqlx::query("SELECT body FROM entities WHERE kind = ? AND id = ? AND live = 1")
            .bind(key.kind().as_str())
            .bind(key.id_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_entity(&row)?)),
            None => Ok(None),
        }
    }

    async fn query(&self, filter: &EntityFilter) -> Result<Versioned<Vec<Entity>>> {
        // Watermark and rows are read in one transaction so the snapshot is
        // consistent with the version it reports.
        let mut tx = self.pool.begin().await?;

        let version: i64 = sqlx::query_scalar("SELECT version FROM watermark WHERE id = 1")
            .fetch_one(&mut *tx)
            .await?;

        let mut sql = String::from("SELECT body FROM entities WHERE live = 1");
        if filter.kind.is_some() {
            sql.push_str(" AND kind = ?");
        }
        if filter.zone.is_some() {
            sql.push_str(" AND zone = ?");
        }
        if filter.vehicle.is_some() {
            sql.push_str(" AND vehicle = ?");
        }
        if filter.active_only {
            sql.push_str(" AND active = 1");
        }
        sql.push_str(" ORDER BY kind ASC, id ASC");

        let mut query = sqlx::query(&sql);
        if let Some(kind) = filter.kind {
            query = query.bind(kind.as_str());
        }
        if let Some(ref zone) = filter.zone {
            query = query.bind(zone.as_str());
        }
        if let Some(ref vehicle) = filter.vehicle {
            query = query.bind(vehicle.as_str());
        }

        let rows = query.fetch_all(&mut *tx).await?;
        tx.commit().await?;

        let entities = rows
            .iter()
            .map(Self::row_to_entity)
            .collect::<Result<Vec<_>>>()?;

        Ok(Versioned::new(StoreVersion::new(version), entities))
    }

    async fn current_version(&self) -> Result<StoreVersion> {
        let version: i64 = sqlx::query_scalar("SELECT version FROM watermark WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(StoreVersion::new(version))
    }
}
