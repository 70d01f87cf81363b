//! Error types for event streams.

use thiserror::Error;

/// Main error type for stream operations.
///
/// Removal and dispatch never fail; only operations that would grow the
/// state of a disposed stream are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("Event stream is disposed: {label}")]
    Disposed { label: String },
}

impl StreamError {
    pub(crate) fn disposed(label: Option<&str>) -> Self {
        StreamError::Disposed {
            label: label.unwrap_or("<unlabeled>").to_string(),
        }
    }
}

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;
