// Identifier validation shared by resolution and display

use crate::record::RecordId;

/// True iff `raw` is one or more ASCII digits parsing to a value >= 1
///
/// There is no upper bound here, not even `u64::MAX`; display-time range
/// checks live in [`crate::guard::ClientGuard`].
pub fn is_valid_id(raw: &str) -> bool {
    !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) && raw.bytes().any(|b| b != b'0')
}

/// Parse a valid identifier into a [`RecordId`]
///
/// Leading zeros are accepted. Returns `None` for invalid identifiers and for
/// valid ones too large for `u64`; use [`is_valid_id`] to tell them apart.
pub fn parse_record_id(raw: &str) -> Option<RecordId> {
    if !is_valid_id(raw) {
        return None;
    }
    raw.parse::<u64>().ok().and_then(RecordId::new)
}
