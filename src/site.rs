// Publishing and serving detail pages

use crate::cache::{MemoryCache, ResolutionCache};
use crate::guard::{ClientError, ClientGuard};
use crate::pregen::{Fallback, PathPregenerator};
use crate::record::{Record, RecordId};
use crate::resolver::{RecordResolver, Resolution, ResolutionError, ResolutionErrorKind};
use crate::source::RecordStore;
use crate::validate::{is_valid_id, parse_record_id};
use eyre::Result;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// What a detail page shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailPage {
    Post(Record),
    ResolutionFailed(ResolutionError),
    ClientRejected(ClientError),
}

/// Combine a resolution with the display-time check of the live identifier
///
/// A client error always wins, even over a resolved post.
pub fn detail_page(resolution: Resolution, guard: &ClientGuard, live_id: &str) -> DetailPage {
    match (guard.check(live_id), resolution) {
        (Err(client_error), Resolution::Resolved(record)) => {
            warn!(
                live_id,
                resolved_id = %record.id,
                error = %client_error,
                "Resolved post hidden by display-time check"
            );
            DetailPage::ClientRejected(client_error)
        }
        (Err(client_error), Resolution::Failed(_)) => DetailPage::ClientRejected(client_error),
        (Ok(_), Resolution::Resolved(record)) => DetailPage::Post(record),
        (Ok(_), Resolution::Failed(error)) => DetailPage::ResolutionFailed(error),
    }
}

/// Summary of one publish
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub paths: Vec<RecordId>,
    pub resolved: usize,
    pub failed: Vec<ResolutionError>,
}

/// Owns everything needed to publish and serve detail pages
pub struct Site<S, C = MemoryCache> {
    resolver: RecordResolver<S, C>,
    pregenerator: PathPregenerator,
    guard: ClientGuard,
    published: BTreeSet<RecordId>,
}

impl<S: RecordStore, C: ResolutionCache> Site<S, C> {
    pub fn new(resolver: RecordResolver<S, C>, pregenerator: PathPregenerator, guard: ClientGuard) -> Self {
        Self {
            resolver,
            pregenerator,
            guard,
            published: BTreeSet::new(),
        }
    }

    pub fn resolver(&self) -> &RecordResolver<S, C> {
        &self.resolver
    }

    /// Identifiers pre-generated by the last publish
    pub fn published(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.published.iter().copied()
    }

    /// Start a new cycle and pre-resolve the selected identifiers
    pub fn publish(&mut self) -> Result<PublishReport> {
        self.resolver.begin_cycle()?;

        let paths = self.pregenerator.paths(self.resolver.store());
        let mut report = PublishReport {
            paths: paths.clone(),
            ..PublishReport::default()
        };

        for id in &paths {
            match self.resolver.resolve(&id.to_string()) {
                Resolution::Resolved(_) => report.resolved += 1,
                Resolution::Failed(error) => report.failed.push(error),
            }
        }

        self.published = paths.into_iter().collect();
        info!(
            pages = report.paths.len(),
            resolved = report.resolved,
            failed = report.failed.len(),
            "Publish complete"
        );
        Ok(report)
    }

    /// Resolution for the route identifier, honoring the fallback policy
    pub fn resolve_route(&mut self, route_id: &str) -> Resolution {
        if self.pregenerator.fallback() == Fallback::Reject && !self.is_published(route_id) {
            if let Some(cached) = self.resolver.cached(route_id) {
                return cached;
            }
            let kind = if is_valid_id(route_id) {
                ResolutionErrorKind::NotFound
            } else {
                ResolutionErrorKind::InvalidFormat
            };
            return Resolution::Failed(ResolutionError::new(kind, route_id));
        }
        self.resolver.resolve(route_id)
    }

    /// Page shown for `route_id` while the live navigation context says `live_id`
    pub fn open_detail(&mut self, route_id: &str, live_id: &str) -> DetailPage {
        let resolution = self.resolve_route(route_id);
        detail_page(resolution, &self.guard, live_id)
    }

    fn is_published(&self, route_id: &str) -> bool {
        parse_record_id(route_id).is_some_and(|id| self.published.contains(&id))
    }
}
