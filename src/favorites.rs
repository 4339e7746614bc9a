// Persisted favorites with change announcements

use crate::announce::Announcer;
use crate::jsonl;
use crate::record::RecordId;
use crate::validate::parse_record_id;
use eyre::{Context, Result, eyre};
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// Set of favorited post ids
///
/// Persisted as a JSON object mapping stringified ids to `true`. Removal
/// deletes the key; a `false` entry is never produced. Revisions are drawn
/// from a process-wide counter on creation and on every mutation, so two sets
/// share a revision only when one is an unmodified clone of the other.
#[derive(Debug, Clone)]
pub struct FavoritesSet {
    ids: BTreeSet<RecordId>,
    revision: u64,
}

impl PartialEq for FavoritesSet {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids
    }
}

impl Eq for FavoritesSet {}

impl Default for FavoritesSet {
    fn default() -> Self {
        Self {
            ids: BTreeSet::new(),
            revision: next_revision(),
        }
    }
}

impl FavoritesSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.ids.contains(&id)
    }

    pub fn insert(&mut self, id: RecordId) -> bool {
        let inserted = self.ids.insert(id);
        if inserted {
            self.revision = next_revision();
        }
        inserted
    }

    pub fn remove(&mut self, id: RecordId) -> bool {
        let removed = self.ids.remove(&id);
        if removed {
            self.revision = next_revision();
        }
        removed
    }

    /// Flip membership of `id`; returns true if it is now a favorite
    pub fn toggle(&mut self, id: RecordId) -> bool {
        if self.remove(id) {
            false
        } else {
            self.insert(id)
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.ids.iter().copied()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn to_json(&self) -> Result<String> {
        let map: Map<String, Value> = self
            .ids
            .iter()
            .map(|id| (id.to_string(), Value::Bool(true)))
            .collect();
        serde_json::to_string(&Value::Object(map)).context("Failed to serialize favorites")
    }

    /// Parse the persisted form
    ///
    /// Fails only if the text is not a JSON object. Entries whose key is not a
    /// valid id or whose value is not `true` are dropped.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).context("Favorites are not valid JSON")?;
        let Value::Object(map) = value else {
            return Err(eyre!("Favorites must be a JSON object"));
        };

        let mut set = Self::new();
        for (key, flag) in map {
            match (parse_record_id(&key), flag) {
                (Some(id), Value::Bool(true)) => {
                    set.ids.insert(id);
                }
                (_, flag) => {
                    warn!(key = %key, value = %flag, "Dropping invalid favorites entry");
                }
            }
        }
        Ok(set)
    }
}

/// Durable home of the serialized favorites set
pub trait FavoritesStorage {
    /// Stored text, or `None` if nothing was stored yet
    fn read(&self) -> Result<Option<String>>;

    /// Replace the stored text in one operation
    fn write(&self, contents: &str) -> Result<()>;
}

/// Favorites kept in a single JSON file
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FavoritesStorage for FileStorage {
    fn read(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path).context("Failed to read favorites file")?;
        Ok(Some(contents))
    }

    fn write(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create favorites directory")?;
        }

        jsonl::replace_file(&self.path, |writer| {
            writer.write_all(contents.as_bytes())?;
            Ok(())
        })
        .context("Failed to write favorites file")
    }
}

/// In-process storage that can be told to fail
#[derive(Debug, Default)]
pub struct MemoryStorage {
    contents: RefCell<Option<String>>,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        let storage = Self::new();
        *storage.contents.borrow_mut() = Some(contents.into());
        storage
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.borrow().clone()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }
}

impl FavoritesStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>> {
        if self.fail_reads.get() {
            return Err(eyre!("storage unavailable"));
        }
        Ok(self.contents.borrow().clone())
    }

    fn write(&self, contents: &str) -> Result<()> {
        if self.fail_writes.get() {
            return Err(eyre!("storage unavailable"));
        }
        *self.contents.borrow_mut() = Some(contents.to_string());
        Ok(())
    }
}

/// Favorites set, its durable copy, and the announcement of the last change
pub struct FavoritesStore<S> {
    set: FavoritesSet,
    storage: S,
    announcer: Announcer,
}

impl<S: FavoritesStorage> FavoritesStore<S> {
    /// Load the persisted set with the default two-second announcements
    pub fn load(storage: S) -> Self {
        Self::load_with(storage, Announcer::default())
    }

    /// Load the persisted set once. A missing, unreadable or corrupt value
    /// yields an empty set; this never fails.
    pub fn load_with(storage: S, announcer: Announcer) -> Self {
        let set = match storage.read() {
            Ok(Some(json)) => FavoritesSet::from_json(&json).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to parse stored favorites, starting empty");
                FavoritesSet::new()
            }),
            Ok(None) => FavoritesSet::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read stored favorites, starting empty");
                FavoritesSet::new()
            }
        };

        info!(count = set.len(), "Loaded favorites");
        Self {
            set,
            storage,
            announcer,
        }
    }

    /// Flip `id` and announce the change using `label`
    ///
    /// The durable copy is rewritten synchronously; a failed write is logged
    /// and the in-memory set stays authoritative for the session. Returns true
    /// if `id` is now a favorite.
    pub fn toggle(&mut self, id: RecordId, label: &str) -> bool {
        let now_favorite = self.set.toggle(id);

        if let Err(e) = self.save() {
            warn!(id = %id, error = %e, "Failed to persist favorites");
        }

        let message = if now_favorite {
            format!("Added {} to favorites", label)
        } else {
            format!("Removed {} from favorites", label)
        };
        self.announcer.announce(message);

        debug!(id = %id, now_favorite, count = self.set.len(), "Toggled favorite");
        now_favorite
    }

    /// Write the whole set to storage in a single operation
    pub fn save(&self) -> Result<()> {
        let json = self.set.to_json()?;
        self.storage.write(&json)
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.set.contains(id)
    }

    pub fn count(&self) -> usize {
        self.set.len()
    }

    pub fn set(&self) -> &FavoritesSet {
        &self.set
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn announcement(&self) -> &str {
        self.announcer.message()
    }

    /// Fire the announcement clear if it is due
    pub fn poll_announcement(&mut self) -> bool {
        self.announcer.poll()
    }
}
