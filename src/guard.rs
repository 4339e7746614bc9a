// Display-time re-validation of the live identifier

use crate::record::RecordId;
use crate::validate::{is_valid_id, parse_record_id};
use thiserror::Error;

/// Ceiling applied at display time when no configuration overrides it
pub const DEFAULT_ID_CEILING: u64 = 1000;

/// Rejection raised by [`ClientGuard`] for the identifier being displayed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("The ID must be a positive number.")]
    InvalidFormat { requested_id: String },

    #[error("The ID must be between 1 and {ceiling}.")]
    OutOfRange { requested_id: String, ceiling: u64 },
}

impl ClientError {
    pub fn requested_id(&self) -> &str {
        match self {
            ClientError::InvalidFormat { requested_id } => requested_id,
            ClientError::OutOfRange { requested_id, .. } => requested_id,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ClientError::InvalidFormat { .. } => "Invalid Post ID",
            ClientError::OutOfRange { .. } => "Post ID Out of Range",
        }
    }
}

/// Checks the identifier from the live navigation context
///
/// Runs every time a detail page is shown, independently of whatever the
/// resolver decided for the route. Unlike [`crate::validate::is_valid_id`]
/// it enforces an upper bound.
#[derive(Debug, Clone, Copy)]
pub struct ClientGuard {
    ceiling: u64,
}

impl ClientGuard {
    pub fn new(ceiling: u64) -> Self {
        Self { ceiling }
    }

    /// Validate `live_id` and enforce the ceiling
    ///
    /// A well-formed id too large for `u64` is out of range, never malformed.
    pub fn check(&self, live_id: &str) -> Result<RecordId, ClientError> {
        if !is_valid_id(live_id) {
            return Err(ClientError::InvalidFormat {
                requested_id: live_id.to_string(),
            });
        }

        match parse_record_id(live_id) {
            Some(id) if id.get() <= self.ceiling => Ok(id),
            _ => Err(ClientError::OutOfRange {
                requested_id: live_id.to_string(),
                ceiling: self.ceiling,
            }),
        }
    }
}

impl Default for ClientGuard {
    fn default() -> Self {
        Self::new(DEFAULT_ID_CEILING)
    }
}
