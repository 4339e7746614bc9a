// On-disk data directory: page cache, favorites, and collection snapshot

use crate::announce::{Announcer, SystemClock};
use crate::cache::PageCache;
use crate::config::Config;
use crate::favorites::{FavoritesStore, FileStorage};
use crate::jsonl;
use crate::source::{HttpRecordStore, RecordStore, SnapshotRecordStore};
use eyre::{Context, Result, eyre};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CURRENT_VERSION: u32 = 1;

const PAGES_DB: &str = "pages.db";
const FAVORITES_FILE: &str = "favorites.json";
const SNAPSHOT_FILE: &str = "posts.jsonl";

/// The `.postshelf` directory holding everything persisted between runs
pub struct Store {
    base_path: PathBuf,
}

impl Store {
    /// Open or create a store at the given path
    ///
    /// The store will be created in a `.postshelf` subdirectory of the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().join(".postshelf");

        // Create directory if it doesn't exist
        fs::create_dir_all(&base_path).context("Failed to create store directory")?;

        let store = Self { base_path };
        store.create_gitignore()?;
        store.check_version()?;

        debug!(path = ?store.base_path, "Opened store");
        Ok(store)
    }

    /// Get the base path of this store
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn pages_path(&self) -> PathBuf {
        self.base_path.join(PAGES_DB)
    }

    pub fn favorites_path(&self) -> PathBuf {
        self.base_path.join(FAVORITES_FILE)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.base_path.join(SNAPSHOT_FILE)
    }

    /// Only the favorites and the snapshot are worth committing
    fn create_gitignore(&self) -> Result<()> {
        let gitignore_path = self.base_path.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(
                gitignore_path,
                "pages.db\npages.db-shm\npages.db-wal\n*.tmp\n*.lock\n",
            )?;
        }
        Ok(())
    }

    /// Write the version file, refusing stores from a newer layout
    fn check_version(&self) -> Result<()> {
        let version_path = self.base_path.join(".version");
        if !version_path.exists() {
            fs::write(version_path, CURRENT_VERSION.to_string())?;
            return Ok(());
        }

        let content = fs::read_to_string(&version_path)?;
        let version: u32 = content
            .trim()
            .parse()
            .with_context(|| format!("Invalid store version: {:?}", content.trim()))?;
        if version > CURRENT_VERSION {
            return Err(eyre!(
                "Store version {} is newer than supported version {}",
                version,
                CURRENT_VERSION
            ));
        }
        Ok(())
    }

    pub fn page_cache(&self) -> Result<PageCache> {
        PageCache::open(self.pages_path())
    }

    pub fn favorites(&self, config: &Config) -> FavoritesStore<FileStorage> {
        let announcer = Announcer::new(Arc::new(SystemClock), config.announcement_delay());
        FavoritesStore::load_with(FileStorage::new(self.favorites_path()), announcer)
    }

    /// Record source selected by the configuration
    pub fn record_store(&self, config: &Config) -> Result<Box<dyn RecordStore>> {
        if config.offline {
            debug!(path = ?self.snapshot_path(), "Using local snapshot");
            Ok(Box::new(SnapshotRecordStore::new(self.snapshot_path())))
        } else {
            debug!(url = %config.api_url, "Using remote API");
            Ok(Box::new(HttpRecordStore::new(config.api_url.as_str())?))
        }
    }

    /// Fetch the full collection from `source` and save it as the local snapshot
    pub fn write_snapshot<S: RecordStore + ?Sized>(&self, source: &S) -> Result<usize> {
        let records = source
            .fetch_collection()
            .context("Failed to fetch posts for snapshot")?;
        jsonl::write_jsonl(&self.snapshot_path(), &records)?;

        info!(count = records.len(), "Snapshot updated");
        Ok(records.len())
    }
}
