// Raw identifier -> validated post or typed error

use crate::cache::{MemoryCache, ResolutionCache};
use crate::record::Record;
use crate::source::{RecordStore, StoreError};
use crate::validate::{is_valid_id, parse_record_id};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

/// Why a raw identifier did not resolve to a post
///
/// Variants are listed in the order the resolver checks them; the first
/// failing check decides the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionErrorKind {
    InvalidFormat,
    NotFound,
    ApiError { status: u16 },
    InvalidData,
    Exception,
}

impl ResolutionErrorKind {
    pub fn message(&self) -> String {
        match self {
            Self::InvalidFormat => "The ID must be a positive number.".to_string(),
            Self::NotFound => "The requested post could not be found.".to_string(),
            Self::ApiError { status } => format!("Error retrieving post: {}", status),
            Self::InvalidData => "The post data appears to be invalid or empty.".to_string(),
            Self::Exception => "An unexpected error occurred while retrieving the post.".to_string(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "Invalid Post ID",
            Self::NotFound => "Post Not Found",
            Self::ApiError { .. } => "Error Loading Post",
            Self::InvalidData => "Invalid Post Data",
            Self::Exception => "Unexpected Error",
        }
    }
}

impl fmt::Display for ResolutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat => write!(f, "INVALID_FORMAT"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::ApiError { status } => write!(f, "API_ERROR({})", status),
            Self::InvalidData => write!(f, "INVALID_DATA"),
            Self::Exception => write!(f, "EXCEPTION"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionError {
    pub kind: ResolutionErrorKind,
    pub message: String,
    pub requested_id: String,
}

impl ResolutionError {
    pub fn new(kind: ResolutionErrorKind, requested_id: &str) -> Self {
        Self {
            kind,
            message: kind.message(),
            requested_id: requested_id.to_string(),
        }
    }
}

/// Result of resolving one raw identifier; becomes the detail page's data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum Resolution {
    Resolved(Record),
    Failed(ResolutionError),
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    pub fn record(&self) -> Option<&Record> {
        match self {
            Resolution::Resolved(record) => Some(record),
            Resolution::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ResolutionError> {
        match self {
            Resolution::Resolved(_) => None,
            Resolution::Failed(error) => Some(error),
        }
    }
}

/// JSON truthiness of a payload field
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A payload is usable when it is non-empty and carries a truthy `id`
fn has_record_shape(payload: &Value) -> bool {
    match payload {
        Value::Object(map) => !map.is_empty() && map.get("id").is_some_and(is_truthy),
        _ => false,
    }
}

fn classify_store_error(error: &StoreError) -> ResolutionErrorKind {
    match error {
        StoreError::NotFound => ResolutionErrorKind::NotFound,
        StoreError::Status { status: 404, .. } => ResolutionErrorKind::NotFound,
        StoreError::Status { status, .. } => ResolutionErrorKind::ApiError { status: *status },
        StoreError::Transport(_) | StoreError::Decode(_) => ResolutionErrorKind::Exception,
    }
}

/// Resolves raw identifiers against a [`RecordStore`], caching every outcome
///
/// Successful and failed resolutions are both cached. Within a publish cycle
/// an entry is computed at most once; [`RecordResolver::begin_cycle`] starts
/// over.
pub struct RecordResolver<S, C = MemoryCache> {
    store: S,
    cache: C,
}

impl<S: RecordStore> RecordResolver<S, MemoryCache> {
    pub fn in_memory(store: S) -> Self {
        Self::new(store, MemoryCache::new())
    }
}

impl<S: RecordStore, C: ResolutionCache> RecordResolver<S, C> {
    pub fn new(store: S, cache: C) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    pub(crate) fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Cached resolution for `raw_id`, or compute, cache and return it
    pub fn resolve(&mut self, raw_id: &str) -> Resolution {
        if let Some(cached) = self.cached(raw_id) {
            debug!(raw_id, "Serving cached resolution");
            return cached;
        }

        let resolution = self.resolve_uncached(raw_id);
        if let Err(e) = self.cache.put(raw_id, &resolution) {
            warn!(raw_id, error = %e, "Failed to cache resolution");
        }
        resolution
    }

    /// Run the full pipeline without consulting or filling the cache
    pub fn resolve_uncached(&self, raw_id: &str) -> Resolution {
        if !is_valid_id(raw_id) {
            debug!(raw_id, "Rejected malformed identifier");
            return Resolution::Failed(ResolutionError::new(ResolutionErrorKind::InvalidFormat, raw_id));
        }
        // Well-formed but beyond u64: no post can carry this id
        let Some(id) = parse_record_id(raw_id) else {
            debug!(raw_id, "Identifier exceeds the id space");
            return Resolution::Failed(ResolutionError::new(ResolutionErrorKind::NotFound, raw_id));
        };

        let payload = match self.store.fetch_one(id) {
            Ok(payload) => payload,
            Err(e) => {
                let kind = classify_store_error(&e);
                warn!(raw_id, error = %e, %kind, "Failed to fetch post");
                return Resolution::Failed(ResolutionError::new(kind, raw_id));
            }
        };

        if !has_record_shape(&payload) {
            warn!(raw_id, "Post payload is empty or has no id");
            return Resolution::Failed(ResolutionError::new(ResolutionErrorKind::InvalidData, raw_id));
        }

        match serde_json::from_value::<Record>(payload) {
            Ok(record) => Resolution::Resolved(record),
            Err(e) => {
                warn!(raw_id, error = ?e, "Post payload does not decode");
                Resolution::Failed(ResolutionError::new(ResolutionErrorKind::InvalidData, raw_id))
            }
        }
    }

    /// Resolution already cached for `raw_id` in this cycle
    pub fn cached(&self, raw_id: &str) -> Option<Resolution> {
        match self.cache.get(raw_id) {
            Ok(cached) => cached,
            Err(e) => {
                warn!(raw_id, error = %e, "Failed to read resolution cache");
                None
            }
        }
    }

    /// Drop every cached entry; the next request for any id resolves afresh
    pub fn begin_cycle(&mut self) -> eyre::Result<()> {
        self.cache.begin_cycle()
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to count cached resolutions");
            0
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::record::RecordId;
    use proptest::prelude::*;
    use serde_json::json;
    use std::cell::Cell;
    use std::collections::HashMap;

    /// Store answering from a fixed table and counting single-record fetches
    #[derive(Default)]
    pub(crate) struct StubStore {
        pub(crate) collection: Vec<Record>,
        pub(crate) collection_error: Option<StoreError>,
        pub(crate) responses: HashMap<u64, Result<Value, StoreError>>,
        pub(crate) calls: Cell<usize>,
    }

    impl StubStore {
        pub(crate) fn with_posts(titles: &[(u64, &str)]) -> Self {
            let mut store = Self::default();
            for &(id, title) in titles {
                let record = Record {
                    id: RecordId::new(id).unwrap(),
                    title: title.to_string(),
                    body: format!("{} body", title),
                    owner_id: 1,
                };
                store
                    .responses
                    .insert(id, Ok(serde_json::to_value(&record).unwrap()));
                store.collection.push(record);
            }
            store
        }

        pub(crate) fn respond(mut self, id: u64, response: Result<Value, StoreError>) -> Self {
            self.responses.insert(id, response);
            self
        }
    }

    impl RecordStore for StubStore {
        fn fetch_collection(&self) -> Result<Vec<Record>, StoreError> {
            match &self.collection_error {
                Some(e) => Err(e.clone()),
                None => Ok(self.collection.clone()),
            }
        }

        fn fetch_one(&self, id: RecordId) -> Result<Value, StoreError> {
            self.calls.set(self.calls.get() + 1);
            self.responses
                .get(&id.get())
                .cloned()
                .unwrap_or(Err(StoreError::NotFound))
        }
    }

    fn kind_of(resolution: &Resolution) -> Option<ResolutionErrorKind> {
        resolution.error().map(|e| e.kind)
    }

    #[test]
    fn test_resolves_valid_post() {
        let mut resolver = RecordResolver::in_memory(StubStore::with_posts(&[(5, "Five")]));

        let resolution = resolver.resolve("5");
        assert_eq!(resolution.record().map(|r| r.title.as_str()), Some("Five"));
    }

    #[test]
    fn test_negative_id_is_invalid_format_without_fetch() {
        let mut resolver = RecordResolver::in_memory(StubStore::with_posts(&[(3, "Three")]));

        let resolution = resolver.resolve("-3");
        let error = resolution.error().unwrap();
        assert_eq!(error.kind, ResolutionErrorKind::InvalidFormat);
        assert_eq!(error.message, "The ID must be a positive number.");
        assert_eq!(error.requested_id, "-3");
        assert_eq!(resolver.store().calls.get(), 0);
    }

    #[test]
    fn test_overflowing_id_is_not_found_without_fetch() {
        let mut resolver = RecordResolver::in_memory(StubStore::with_posts(&[(1, "One")]));

        let resolution = resolver.resolve("99999999999999999999999");
        let error = resolution.error().unwrap();
        assert_eq!(error.kind, ResolutionErrorKind::NotFound);
        assert_eq!(error.requested_id, "99999999999999999999999");
        assert_eq!(resolver.store().calls.get(), 0);
    }

    #[test]
    fn test_not_found() {
        let mut resolver = RecordResolver::in_memory(StubStore::default());

        let resolution = resolver.resolve("42");
        let error = resolution.error().unwrap();
        assert_eq!(error.kind, ResolutionErrorKind::NotFound);
        assert_eq!(error.message, "The requested post could not be found.");
    }

    #[test]
    fn test_status_404_counts_as_not_found() {
        let store = StubStore::default().respond(
            7,
            Err(StoreError::Status {
                status: 404,
                message: "gone".to_string(),
            }),
        );
        let mut resolver = RecordResolver::in_memory(store);
        assert_eq!(kind_of(&resolver.resolve("7")), Some(ResolutionErrorKind::NotFound));
    }

    #[test]
    fn test_api_error_carries_status() {
        let store = StubStore::default().respond(
            7,
            Err(StoreError::Status {
                status: 503,
                message: "Failed to fetch post 7, status: 503".to_string(),
            }),
        );
        let mut resolver = RecordResolver::in_memory(store);

        let resolution = resolver.resolve("7");
        let error = resolution.error().unwrap();
        assert_eq!(error.kind, ResolutionErrorKind::ApiError { status: 503 });
        assert_eq!(error.message, "Error retrieving post: 503");
    }

    #[test]
    fn test_invalid_data_shapes() {
        let store = StubStore::default()
            .respond(1, Ok(json!({})))
            .respond(2, Ok(json!(null)))
            .respond(3, Ok(json!({"id": 0, "title": "zero"})))
            .respond(4, Ok(json!({"title": "no id"})))
            .respond(5, Ok(json!({"id": 5})))
            .respond(6, Ok(json!([1, 2])))
            .respond(7, Ok(json!({"id": "", "title": "t"})));
        let mut resolver = RecordResolver::in_memory(store);

        for raw in ["1", "2", "3", "4", "5", "6", "7"] {
            let resolution = resolver.resolve(raw);
            let error = resolution.error().unwrap();
            assert_eq!(error.kind, ResolutionErrorKind::InvalidData, "{raw}");
            assert_eq!(error.message, "The post data appears to be invalid or empty.");
        }
    }

    #[test]
    fn test_transport_failure_is_exception() {
        let store = StubStore::default()
            .respond(1, Err(StoreError::Transport("connection refused".to_string())))
            .respond(2, Err(StoreError::Decode("expected value".to_string())));
        let mut resolver = RecordResolver::in_memory(store);

        for raw in ["1", "2"] {
            let resolution = resolver.resolve(raw);
            let error = resolution.error().unwrap();
            assert_eq!(error.kind, ResolutionErrorKind::Exception);
            assert_eq!(
                error.message,
                "An unexpected error occurred while retrieving the post."
            );
        }
    }

    #[test]
    fn test_cached_result_not_replaced_within_cycle() {
        let mut resolver = RecordResolver::in_memory(StubStore::default());

        let first = resolver.resolve("9");
        assert_eq!(kind_of(&first), Some(ResolutionErrorKind::NotFound));

        // The post appears upstream, but the cached failure stands
        resolver.store.responses.insert(
            9,
            Ok(json!({"userId": 1, "id": 9, "title": "Nine", "body": ""})),
        );
        let second = resolver.resolve("9");
        assert_eq!(second, first);
        assert_eq!(resolver.store().calls.get(), 1);
        assert_eq!(resolver.cached_len(), 1);

        resolver.begin_cycle().unwrap();
        let third = resolver.resolve("9");
        assert!(third.is_resolved());
        assert_eq!(resolver.store().calls.get(), 2);
    }

    #[test]
    fn test_cache_keyed_by_raw_identifier() {
        let mut resolver = RecordResolver::in_memory(StubStore::with_posts(&[(7, "Seven")]));

        assert!(resolver.resolve("7").is_resolved());
        assert!(resolver.resolve("007").is_resolved());
        assert_eq!(resolver.store().calls.get(), 2);
        assert!(resolver.cached("7").is_some());
        assert!(resolver.cached("8").is_none());
    }

    #[test]
    fn test_resolution_serialization() {
        let resolution = Resolution::Failed(ResolutionError::new(
            ResolutionErrorKind::ApiError { status: 500 },
            "3",
        ));
        let json = serde_json::to_string(&resolution).unwrap();
        assert!(json.contains("\"status\":\"failed\""));
        assert!(json.contains("API_ERROR"));

        let back: Resolution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, resolution);
    }

    proptest! {
        #[test]
        fn prop_malformed_ids_never_reach_store(raw in "(-[0-9]{1,4}|[0-9]*[^0-9]+[0-9]*|0+)") {
            let mut resolver = RecordResolver::in_memory(StubStore::with_posts(&[(1, "One")]));
            let resolution = resolver.resolve(&raw);
            prop_assert_eq!(kind_of(&resolution), Some(ResolutionErrorKind::InvalidFormat));
            prop_assert_eq!(resolver.store().calls.get(), 0);
        }

        #[test]
        fn prop_non_404_status_is_api_error(status in 400u16..600) {
            prop_assume!(status != 404);
            let store = StubStore::default().respond(
                1,
                Err(StoreError::Status { status, message: String::new() }),
            );
            let mut resolver = RecordResolver::in_memory(store);
            prop_assert_eq!(
                kind_of(&resolver.resolve("1")),
                Some(ResolutionErrorKind::ApiError { status })
            );
        }
    }
}
