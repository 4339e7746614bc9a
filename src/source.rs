// Record sources: the remote posts API and local JSONL snapshots

use crate::jsonl;
use crate::record::{Record, RecordId};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Collection endpoint used when no configuration overrides it
pub const DEFAULT_API_URL: &str = "https://jsonplaceholder.typicode.com/posts";

/// Failure reported by a [`RecordStore`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Source of posts
///
/// `fetch_one` hands back the raw payload so callers can apply their own shape
/// checks before trusting it as a [`Record`].
pub trait RecordStore {
    fn fetch_collection(&self) -> Result<Vec<Record>, StoreError>;

    fn fetch_one(&self, id: RecordId) -> Result<Value, StoreError>;
}

impl<T: RecordStore + ?Sized> RecordStore for Box<T> {
    fn fetch_collection(&self) -> Result<Vec<Record>, StoreError> {
        (**self).fetch_collection()
    }

    fn fetch_one(&self, id: RecordId) -> Result<Value, StoreError> {
        (**self).fetch_one(id)
    }
}

/// Posts served as JSON over HTTP: `GET {base}` and `GET {base}/{id}`
pub struct HttpRecordStore {
    base_url: String,
    client: Client,
}

impl HttpRecordStore {
    pub fn new(base_url: impl Into<String>) -> eyre::Result<Self> {
        // No request timeout: a slow fetch either completes or errors.
        let client = Client::builder().timeout(None).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_json(&self, url: &str, what: &str) -> Result<Value, StoreError> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound);
        }
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                message: format!("Failed to fetch {}, status: {}", what, status.as_u16()),
            });
        }

        response.json::<Value>().map_err(|e| StoreError::Decode(e.to_string()))
    }
}

impl RecordStore for HttpRecordStore {
    fn fetch_collection(&self) -> Result<Vec<Record>, StoreError> {
        let payload = self.get_json(&self.base_url, "posts")?;
        let Value::Array(items) = payload else {
            return Err(StoreError::Decode("expected a JSON array of posts".to_string()));
        };

        let mut records = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<Record>(item) {
                Ok(record) => records.push(record),
                Err(e) => warn!(index, error = ?e, "Skipping malformed post in collection"),
            }
        }
        Ok(records)
    }

    fn fetch_one(&self, id: RecordId) -> Result<Value, StoreError> {
        let url = format!("{}/{}", self.base_url, id);
        self.get_json(&url, &format!("post {}", id))
    }
}

/// Posts read from a local JSONL snapshot (see [`jsonl::write_jsonl`])
pub struct SnapshotRecordStore {
    path: PathBuf,
}

impl SnapshotRecordStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<Record>, StoreError> {
        if !self.path.exists() {
            return Err(StoreError::Transport(format!(
                "snapshot {} does not exist",
                self.path.display()
            )));
        }
        jsonl::read_jsonl_latest(&self.path).map_err(|e| StoreError::Transport(format!("{:#}", e)))
    }
}

impl RecordStore for SnapshotRecordStore {
    fn fetch_collection(&self) -> Result<Vec<Record>, StoreError> {
        self.load()
    }

    fn fetch_one(&self, id: RecordId) -> Result<Value, StoreError> {
        let record = self
            .load()?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound)?;
        serde_json::to_value(record).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

/// Outcome of loading the browse collection
///
/// A failed fetch degrades to an empty collection with the failure kept for
/// the error banner.
#[derive(Debug, Clone, Default)]
pub struct CollectionLoad {
    pub records: Vec<Record>,
    pub error: Option<String>,
}

pub fn load_collection<S: RecordStore + ?Sized>(store: &S) -> CollectionLoad {
    match store.fetch_collection() {
        Ok(records) => CollectionLoad { records, error: None },
        Err(e) => {
            warn!(error = %e, "Failed to fetch posts, showing empty collection");
            let message = match e {
                StoreError::NotFound => "Failed to fetch posts, status: 404".to_string(),
                other => other.to_string(),
            };
            CollectionLoad {
                records: Vec::new(),
                error: Some(message),
            }
        }
    }
}
