// error.rs - Error types for notification delivery.

use std::path::PathBuf;
use thiserror::Error;

/// Errors a notification sink can report.
///
/// These never escape the dispatcher; they exist so sinks can say *why*
/// delivery failed and the dispatcher can log it.
#[derive(Debug, Error)]
pub enum EventError {
    /// Writing to a file-backed sink failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The event could not be serialized.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A remote or external delivery channel rejected the event.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
}
