use thiserror::Error;

use crate::Timestamp;

#[derive(Debug, Error)]
pub enum HubError {
    /// Rejected construction parameters. Never retried.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The same point kept coming back; usually a circular feed upstream.
    #[error(
        "point at {timestamp} was resubmitted {count} times in a row; \
         check for circular chains or a misbehaving provider"
    )]
    DuplicateOverflow { timestamp: Timestamp, count: u32 },

    #[error("inconsistent state: {0}")]
    InconsistentState(String),

    #[error("no point with timestamp {0}")]
    NotFound(Timestamp),

    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("unknown node id {0}")]
    UnknownNode(usize),

    /// Append-only structures refuse anything not strictly after the last point.
    #[error("timestamp {timestamp} is not after the last timestamp {last}")]
    OutOfOrder { timestamp: Timestamp, last: Timestamp },

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl HubError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        HubError::Configuration(msg.into())
    }

    pub fn inconsistent(msg: impl Into<String>) -> Self {
        HubError::InconsistentState(msg.into())
    }
}

/// Shared check for window-length style parameters.
pub(crate) fn require_positive(name: &str, value: usize) -> Result<(), HubError> {
    if value == 0 {
        return Err(HubError::configuration(format!("{name} must be > 0")));
    }
    Ok(())
}
