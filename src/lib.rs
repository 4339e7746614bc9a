// PostShelf - Browse, filter and favorite posts with validated detail pages

pub mod announce;
pub mod cache;
pub mod config;
pub mod favorites;
pub mod filter;
pub mod guard;
pub mod jsonl;
pub mod pregen;
pub mod record;
pub mod resolver;
pub mod site;
pub mod source;
pub mod store;
pub mod validate;
pub mod view;

// Re-export main types for convenience
pub use cache::{MemoryCache, PageCache, ResolutionCache};
pub use config::Config;
pub use favorites::{FavoritesSet, FavoritesStore};
pub use filter::{FilterState, ListView, filter_records};
pub use guard::{ClientError, ClientGuard};
pub use pregen::{Fallback, PathPregenerator, PregenPolicy, PregenSource};
pub use record::{Record, RecordId};
pub use resolver::{RecordResolver, Resolution, ResolutionError, ResolutionErrorKind};
pub use site::{DetailPage, PublishReport, Site};
pub use source::{RecordStore, StoreError};
pub use store::Store;
pub use validate::is_valid_id;

/// Current time in milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
