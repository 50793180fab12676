use crate::types::{Result, ScoutError, SeenRecord};
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_EXPIRY_DAYS: i64 = 30;

/// Largest expiry window accepted, roughly a century.
pub const MAX_EXPIRY_DAYS: i64 = 36_500;

/// Cross-run ledger of processed repositories with a rolling expiry window.
///
/// Everything is loaded at open and held in memory for the run. Lookups and
/// `mark_seen` never touch the database; `commit` writes the prune and every
/// newly marked identifier in one transaction. Dropping the store without
/// committing leaves the file as it was.
pub struct SeenStore {
    pool: SqlitePool,
    read_only: bool,
    expiry: Duration,
    records: HashMap<String, DateTime<Utc>>,
    pending: HashMap<String, DateTime<Utc>>,
    pruned: Vec<String>,
}

impl SeenStore {
    /// Open (creating if needed) the SQLite file at `path`.
    pub async fn open(path: impl AsRef<Path>, expiry_days: i64) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self::load(pool, expiry_days, false).await?;
        info!(
            "Opened seen-store {} with {} records",
            path.as_ref().display(),
            store.records.len()
        );
        Ok(store)
    }

    /// Open `path` for lookups only. Nothing is created on disk: a missing
    /// file or table reads as an empty ledger, and `commit` is refused.
    pub async fn open_read_only(path: impl AsRef<Path>, expiry_days: i64) -> Result<Self> {
        let path = path.as_ref();
        let pool = if path.exists() {
            let options = SqliteConnectOptions::new().filename(path).read_only(true);
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await?
        } else {
            debug!("Seen-store {} does not exist yet, starting empty", path.display());
            Self::memory_pool().await?
        };

        let store = Self::load(pool, expiry_days, true).await?;
        info!(
            "Opened seen-store {} read-only with {} records",
            path.display(),
            store.records.len()
        );
        Ok(store)
    }

    /// A private in-memory database, for tests and throwaway runs.
    pub async fn open_in_memory(expiry_days: i64) -> Result<Self> {
        let pool = Self::memory_pool().await?;
        Self::load(pool, expiry_days, false).await
    }

    async fn memory_pool() -> Result<SqlitePool> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<std::time::Duration>)
            .max_lifetime(None::<std::time::Duration>)
            .connect("sqlite::memory:")
            .await?;
        Ok(pool)
    }

    async fn load(pool: SqlitePool, expiry_days: i64, read_only: bool) -> Result<Self> {
        if expiry_days <= 0 || expiry_days > MAX_EXPIRY_DAYS {
            return Err(ScoutError::Config(format!(
                "seen-store expiry must be between 1 and {} days, got {}",
                MAX_EXPIRY_DAYS, expiry_days
            )));
        }
        let expiry = Duration::try_days(expiry_days).ok_or_else(|| {
            ScoutError::Config(format!("seen-store expiry of {} days is out of range", expiry_days))
        })?;

        let has_table = if read_only {
            sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'seen_repos'")
                .fetch_optional(&pool)
                .await?
                .is_some()
        } else {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS seen_repos (
                    full_name TEXT PRIMARY KEY NOT NULL,
                    first_seen TEXT NOT NULL
                )
                "#,
            )
            .execute(&pool)
            .await?;
            true
        };

        let rows = if has_table {
            sqlx::query("SELECT full_name, first_seen FROM seen_repos")
                .fetch_all(&pool)
                .await?
        } else {
            Vec::new()
        };

        let mut records = HashMap::with_capacity(rows.len());
        for row in rows {
            let full_name: String = row.try_get("full_name")?;
            let first_seen: DateTime<Utc> = row.try_get("first_seen")?;
            records.insert(full_name, first_seen);
        }

        Ok(Self {
            pool,
            read_only,
            expiry,
            records,
            pending: HashMap::new(),
            pruned: Vec::new(),
        })
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.expiry).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Drop every record older than the expiry window. Returns how many went.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = self.cutoff(now);
        let stale: Vec<String> = self
            .records
            .iter()
            .filter(|(_, first_seen)| **first_seen < cutoff)
            .map(|(name, _)| name.clone())
            .collect();

        for name in &stale {
            self.records.remove(name);
            self.pending.remove(name);
        }

        if !stale.is_empty() {
            debug!("Pruned {} expired seen records", stale.len());
        }
        let count = stale.len();
        self.pruned.extend(stale);
        count
    }

    pub fn is_seen(&self, full_name: &str) -> bool {
        self.is_seen_at(full_name, Utc::now())
    }

    /// True iff a record exists whose first observation is inside the window ending at `now`.
    pub fn is_seen_at(&self, full_name: &str, now: DateTime<Utc>) -> bool {
        self.records
            .get(full_name)
            .is_some_and(|first_seen| *first_seen >= self.cutoff(now))
    }

    /// Record the first observation of `full_name`. An existing record keeps its timestamp.
    pub fn mark_seen(&mut self, full_name: &str, timestamp: DateTime<Utc>) {
        if self.records.contains_key(full_name) {
            return;
        }
        self.records.insert(full_name.to_string(), timestamp);
        self.pending.insert(full_name.to_string(), timestamp);
    }

    /// Identifiers marked during this run and not yet committed.
    pub fn pending(&self) -> Vec<SeenRecord> {
        let mut pending: Vec<SeenRecord> = self
            .pending
            .iter()
            .map(|(full_name, first_seen)| SeenRecord {
                full_name: full_name.clone(),
                first_seen: *first_seen,
            })
            .collect();
        pending.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        pending
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Persist the prune and all pending records atomically.
    pub async fn commit(&mut self) -> Result<usize> {
        if self.read_only {
            return Err(ScoutError::Config("seen-store was opened read-only".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        for name in &self.pruned {
            sqlx::query("DELETE FROM seen_repos WHERE full_name = ?")
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }

        for (name, first_seen) in &self.pending {
            sqlx::query(
                r#"
                INSERT INTO seen_repos (full_name, first_seen)
                VALUES (?, ?)
                ON CONFLICT(full_name) DO UPDATE SET first_seen = excluded.first_seen
                "#,
            )
            .bind(name)
            .bind(first_seen)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let written = self.pending.len();
        info!(
            "Committed seen-store: {} new, {} pruned",
            written,
            self.pruned.len()
        );
        self.pending.clear();
        self.pruned.clear();
        Ok(written)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
