// Choosing which detail pages to build at publish time

use crate::record::RecordId;
use crate::source::RecordStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

/// Number of pages pre-generated when no configuration overrides it
pub const DEFAULT_PREGEN_COUNT: u64 = 10;

/// Where pre-generated identifiers come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PregenSource {
    /// `1..=count`, without contacting the store
    #[default]
    Prefix,
    /// Ids of the fetched collection, in collection order, capped at `count`
    Collection,
}

/// What happens to identifiers that were not pre-generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    /// Resolve on first request and keep the result
    #[default]
    OnDemand,
    /// Answer with not-found without resolving
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PregenPolicy {
    pub count: u64,
    pub source: PregenSource,
    pub fallback: Fallback,
}

impl Default for PregenPolicy {
    fn default() -> Self {
        Self {
            count: DEFAULT_PREGEN_COUNT,
            source: PregenSource::default(),
            fallback: Fallback::default(),
        }
    }
}

/// Decides the ordered identifiers to pre-resolve
#[derive(Debug, Clone, Copy, Default)]
pub struct PathPregenerator {
    policy: PregenPolicy,
}

impl PathPregenerator {
    pub fn new(policy: PregenPolicy) -> Self {
        Self { policy }
    }

    pub fn fallback(&self) -> Fallback {
        self.policy.fallback
    }

    /// Identifiers to pre-generate
    ///
    /// Never fails: if the collection cannot be fetched the list is empty and
    /// every page becomes on-demand.
    pub fn paths<S: RecordStore + ?Sized>(&self, store: &S) -> Vec<RecordId> {
        let paths = match self.policy.source {
            PregenSource::Prefix => (1..=self.policy.count).filter_map(RecordId::new).collect(),
            PregenSource::Collection => match store.fetch_collection() {
                Ok(records) => {
                    let mut seen = HashSet::new();
                    records
                        .iter()
                        .map(|r| r.id)
                        .filter(|id| seen.insert(*id))
                        .take(self.policy.count as usize)
                        .collect()
                }
                Err(e) => {
                    warn!(error = %e, "Failed to fetch posts for pre-generation, skipping");
                    Vec::new()
                }
            },
        };

        info!(
            source = ?self.policy.source,
            count = paths.len(),
            "Selected pages to pre-generate"
        );
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::tests::StubStore;
    use crate::source::StoreError;

    fn ids(paths: &[RecordId]) -> Vec<u64> {
        paths.iter().map(|id| id.get()).collect()
    }

    #[test]
    fn test_prefix_paths() {
        let pregen = PathPregenerator::new(PregenPolicy {
            count: 3,
            ..PregenPolicy::default()
        });
        let store = StubStore::default();

        assert_eq!(ids(&pregen.paths(&store)), vec![1, 2, 3]);
        assert_eq!(store.calls.get(), 0);
    }

    #[test]
    fn test_zero_count_is_empty() {
        let pregen = PathPregenerator::new(PregenPolicy {
            count: 0,
            ..PregenPolicy::default()
        });
        assert!(pregen.paths(&StubStore::default()).is_empty());
    }

    #[test]
    fn test_collection_paths_are_capped_and_deduplicated() {
        let pregen = PathPregenerator::new(PregenPolicy {
            count: 3,
            source: PregenSource::Collection,
            fallback: Fallback::OnDemand,
        });
        let store = StubStore::with_posts(&[(8, "h"), (3, "c"), (8, "h"), (5, "e"), (9, "i")]);

        assert_eq!(ids(&pregen.paths(&store)), vec![8, 3, 5]);
    }

    #[test]
    fn test_collection_failure_yields_no_paths() {
        let pregen = PathPregenerator::new(PregenPolicy {
            count: 3,
            source: PregenSource::Collection,
            fallback: Fallback::OnDemand,
        });
        let store = StubStore {
            collection_error: Some(StoreError::Transport("offline".to_string())),
            ..StubStore::default()
        };

        assert!(pregen.paths(&store).is_empty());
    }

    #[test]
    fn test_policy_deserializes_partial_yaml() {
        let policy: PregenPolicy = serde_yaml::from_str("source: collection\nfallback: reject\n").unwrap();
        assert_eq!(policy.count, DEFAULT_PREGEN_COUNT);
        assert_eq!(policy.source, PregenSource::Collection);
        assert_eq!(policy.fallback, Fallback::Reject);
    }
}
