// Resolution caches: in-memory and SQLite-backed page cache

use crate::resolver::Resolution;
use eyre::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// Storage for resolution results, keyed by raw identifier
///
/// Entries belong to the current publish cycle. `put` never replaces an entry
/// already present in the cycle; `begin_cycle` discards every entry.
pub trait ResolutionCache {
    fn get(&self, raw_id: &str) -> Result<Option<Resolution>>;

    /// Store `resolution` unless `raw_id` already has an entry.
    /// Returns true if the entry was inserted.
    fn put(&mut self, raw_id: &str, resolution: &Resolution) -> Result<bool>;

    fn begin_cycle(&mut self) -> Result<()>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Cache that lives for one process
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<String, Resolution>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResolutionCache for MemoryCache {
    fn get(&self, raw_id: &str) -> Result<Option<Resolution>> {
        Ok(self.entries.get(raw_id).cloned())
    }

    fn put(&mut self, raw_id: &str, resolution: &Resolution) -> Result<bool> {
        if self.entries.contains_key(raw_id) {
            return Ok(false);
        }
        self.entries.insert(raw_id.to_string(), resolution.clone());
        Ok(true)
    }

    fn begin_cycle(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.len())
    }
}

const CYCLE_KEY: &str = "current_cycle";

/// Page cache persisted in SQLite so published pages survive across runs
pub struct PageCache {
    db: Connection,
    cycle: String,
}

impl PageCache {
    /// Open or create the page cache database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Connection::open(path.as_ref()).context("Failed to open page cache database")?;
        Self::from_connection(db)
    }

    /// Page cache backed by a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory page cache")?;
        Self::from_connection(db)
    }

    fn from_connection(db: Connection) -> Result<Self> {
        Self::create_schema(&db)?;

        let stored: Option<String> = db
            .query_row(
                "SELECT value FROM publish_metadata WHERE key = ?1",
                [CYCLE_KEY],
                |row| row.get(0),
            )
            .optional()?;

        let cycle = match stored {
            Some(cycle) => cycle,
            None => {
                let cycle = Uuid::now_v7().to_string();
                db.execute(
                    "INSERT INTO publish_metadata (key, value) VALUES (?1, ?2)",
                    rusqlite::params![CYCLE_KEY, &cycle],
                )?;
                cycle
            }
        };

        debug!(cycle = %cycle, "Opened page cache");
        Ok(Self { db, cycle })
    }

    fn create_schema(db: &Connection) -> Result<()> {
        debug!("Creating page cache schema");

        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pages (
                cycle TEXT NOT NULL,
                raw_id TEXT NOT NULL,
                result_json TEXT NOT NULL,
                resolved_at INTEGER NOT NULL,
                PRIMARY KEY (cycle, raw_id)
            );

            CREATE TABLE IF NOT EXISTS publish_metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .context("Failed to create page cache schema")?;

        Ok(())
    }

    /// Identifier of the current publish cycle
    pub fn cycle(&self) -> &str {
        &self.cycle
    }

    /// When `raw_id` was resolved in the current cycle (milliseconds since epoch)
    pub fn resolved_at(&self, raw_id: &str) -> Result<Option<i64>> {
        let resolved_at = self
            .db
            .query_row(
                "SELECT resolved_at FROM pages WHERE cycle = ?1 AND raw_id = ?2",
                rusqlite::params![&self.cycle, raw_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(resolved_at)
    }
}

impl ResolutionCache for PageCache {
    fn get(&self, raw_id: &str) -> Result<Option<Resolution>> {
        let json: Option<String> = self
            .db
            .query_row(
                "SELECT result_json FROM pages WHERE cycle = ?1 AND raw_id = ?2",
                rusqlite::params![&self.cycle, raw_id],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => {
                let resolution: Resolution =
                    serde_json::from_str(&json).context("Failed to deserialize cached page")?;
                Ok(Some(resolution))
            }
            None => Ok(None),
        }
    }

    fn put(&mut self, raw_id: &str, resolution: &Resolution) -> Result<bool> {
        let json = serde_json::to_string(resolution).context("Failed to serialize page")?;
        let inserted = self.db.execute(
            "INSERT OR IGNORE INTO pages (cycle, raw_id, result_json, resolved_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![&self.cycle, raw_id, json, crate::now_ms()],
        )?;
        Ok(inserted > 0)
    }

    fn begin_cycle(&mut self) -> Result<()> {
        let cycle = Uuid::now_v7().to_string();

        let tx = self.db.transaction()?;
        tx.execute("DELETE FROM pages", [])?;
        tx.execute(
            "INSERT OR REPLACE INTO publish_metadata (key, value) VALUES (?1, ?2)",
            rusqlite::params![CYCLE_KEY, &cycle],
        )?;
        tx.commit()?;

        info!(previous = %self.cycle, cycle = %cycle, "Started new publish cycle");
        self.cycle = cycle;
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self.db.query_row(
            "SELECT COUNT(*) FROM pages WHERE cycle = ?1",
            [&self.cycle],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
