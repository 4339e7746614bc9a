// Transient announcements with a cancellable deferred clear

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// How long an announcement stays up when no configuration overrides it
pub const DEFAULT_ANNOUNCEMENT_DELAY: Duration = Duration::from_secs(2);

/// Time source for scheduled clears
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to; clones share the same time
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    elapsed_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed_ms.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_millis(self.elapsed_ms.load(Ordering::SeqCst))
    }
}

/// A clear scheduled for a specific announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingClear {
    generation: u64,
    due: Instant,
}

/// Holds at most one announcement and at most one pending clear
///
/// Every [`Announcer::announce`] cancels the previous pending clear before
/// scheduling its own, so an older clear can never wipe a newer message.
pub struct Announcer {
    clock: Arc<dyn Clock>,
    delay: Duration,
    message: String,
    generation: u64,
    pending: Option<PendingClear>,
}

impl Announcer {
    pub fn new(clock: Arc<dyn Clock>, delay: Duration) -> Self {
        Self {
            clock,
            delay,
            message: String::new(),
            generation: 0,
            pending: None,
        }
    }

    pub fn announce(&mut self, message: impl Into<String>) {
        self.cancel_pending();
        self.generation += 1;
        self.message = message.into();
        self.pending = Some(PendingClear {
            generation: self.generation,
            due: self.clock.now() + self.delay,
        });
        debug!(generation = self.generation, message = %self.message, "Announcement scheduled");
    }

    /// Cancel the pending clear, leaving the current message up
    pub fn cancel_pending(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn has_pending_clear(&self) -> bool {
        self.pending.is_some()
    }

    /// Fire the pending clear if it is due. Returns true if it fired.
    pub fn poll(&mut self) -> bool {
        match self.pending {
            Some(pending) if self.clock.now() >= pending.due => {
                if pending.generation == self.generation {
                    self.message.clear();
                }
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    /// Current announcement, empty once its clear is due
    pub fn message(&self) -> &str {
        match self.pending {
            Some(pending) if self.clock.now() >= pending.due => "",
            _ => &self.message,
        }
    }
}

impl Default for Announcer {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), DEFAULT_ANNOUNCEMENT_DELAY)
    }
}

impl fmt::Debug for Announcer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Announcer")
            .field("delay", &self.delay)
            .field("message", &self.message)
            .field("generation", &self.generation)
            .field("pending", &self.pending)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn announcer() -> (Announcer, ManualClock) {
        let clock = ManualClock::new();
        let announcer = Announcer::new(Arc::new(clock.clone()), DEFAULT_ANNOUNCEMENT_DELAY);
        (announcer, clock)
    }

    #[test]
    fn test_message_clears_after_delay() {
        let (mut announcer, clock) = announcer();
        announcer.announce("Added Beta to favorites");

        clock.advance(Duration::from_millis(1999));
        assert_eq!(announcer.message(), "Added Beta to favorites");
        assert!(!announcer.poll());

        clock.advance(Duration::from_millis(1));
        assert_eq!(announcer.message(), "");
        assert!(announcer.poll());
        assert!(!announcer.has_pending_clear());
        assert_eq!(announcer.message(), "");
    }

    #[test]
    fn test_new_announcement_resets_timer() {
        let (mut announcer, clock) = announcer();
        announcer.announce("first");

        clock.advance(Duration::from_millis(1500));
        announcer.announce("second");

        // The first clear would have been due here
        clock.advance(Duration::from_millis(1000));
        assert_eq!(announcer.message(), "second");
        assert!(!announcer.poll());

        clock.advance(Duration::from_millis(1000));
        assert!(announcer.poll());
        assert_eq!(announcer.message(), "");
    }

    #[test]
    fn test_cancel_pending_keeps_message() {
        let (mut announcer, clock) = announcer();
        announcer.announce("sticky");
        assert!(announcer.cancel_pending());

        clock.advance(Duration::from_secs(10));
        assert!(!announcer.poll());
        assert_eq!(announcer.message(), "sticky");
    }

    #[test]
    fn test_starts_empty() {
        let (announcer, _clock) = announcer();
        assert_eq!(announcer.message(), "");
        assert!(!announcer.has_pending_clear());
    }
}
