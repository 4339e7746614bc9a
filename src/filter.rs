// Visible subset of the browse collection

use crate::favorites::FavoritesSet;
use crate::record::Record;
use std::sync::Arc;
use tracing::trace;

/// Inputs of the browse view that the visitor controls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    /// Case-insensitive substring matched against titles
    pub query: String,
    /// Only show favorited posts
    pub favorites_only: bool,
}

impl FilterState {
    pub fn matches(&self, record: &Record, favorites: &FavoritesSet) -> bool {
        self.matches_title(record) && (!self.favorites_only || favorites.contains(record.id))
    }

    fn matches_title(&self, record: &Record) -> bool {
        self.query.is_empty() || record.title.to_lowercase().contains(&self.query.to_lowercase())
    }
}

/// Posts of `collection` visible under `state`, in collection order
pub fn filter_records(collection: &[Record], favorites: &FavoritesSet, state: &FilterState) -> Vec<Record> {
    collection
        .iter()
        .filter(|record| state.matches(record, favorites))
        .cloned()
        .collect()
}

/// Browse view state: the source collection, the filter, and the derived
/// visible posts
///
/// Every input change recomputes the visible set from the original collection
/// right away.
#[derive(Debug, Clone)]
pub struct ListView {
    collection: Arc<[Record]>,
    state: FilterState,
    favorites_revision: u64,
    visible: Vec<Record>,
}

impl ListView {
    pub fn new(collection: impl Into<Arc<[Record]>>, favorites: &FavoritesSet) -> Self {
        let mut view = Self {
            collection: collection.into(),
            state: FilterState::default(),
            favorites_revision: favorites.revision(),
            visible: Vec::new(),
        };
        view.recompute(favorites);
        view
    }

    pub fn collection(&self) -> &[Record] {
        &self.collection
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn visible(&self) -> &[Record] {
        &self.visible
    }

    pub fn query(&self) -> &str {
        &self.state.query
    }

    pub fn favorites_only(&self) -> bool {
        self.state.favorites_only
    }

    pub fn set_query(&mut self, query: impl Into<String>, favorites: &FavoritesSet) {
        self.state.query = query.into();
        self.recompute(favorites);
    }

    pub fn set_favorites_only(&mut self, favorites_only: bool, favorites: &FavoritesSet) {
        self.state.favorites_only = favorites_only;
        self.recompute(favorites);
    }

    pub fn toggle_favorites_only(&mut self, favorites: &FavoritesSet) -> bool {
        self.set_favorites_only(!self.state.favorites_only, favorites);
        self.state.favorites_only
    }

    pub fn set_collection(&mut self, collection: impl Into<Arc<[Record]>>, favorites: &FavoritesSet) {
        self.collection = collection.into();
        self.recompute(favorites);
    }

    /// Recompute if `favorites` changed since the last computation.
    /// Returns true if it recomputed.
    ///
    /// Revisions are unique per set, so syncing against a different
    /// [`FavoritesSet`] instance also recomputes.
    pub fn sync_favorites(&mut self, favorites: &FavoritesSet) -> bool {
        if favorites.revision() == self.favorites_revision {
            return false;
        }
        self.recompute(favorites);
        true
    }

    fn recompute(&mut self, favorites: &FavoritesSet) {
        self.visible = filter_records(&self.collection, favorites, &self.state);
        self.favorites_revision = favorites.revision();
        trace!(
            query = %self.state.query,
            favorites_only = self.state.favorites_only,
            visible = self.visible.len(),
            "Recomputed visible posts"
        );
    }
}
