//! Error types for the feature codec.

use thiserror::Error;

/// Errors surfaced at the codec boundary.
///
/// Internal contract breaches (an out-of-range symbol, a broken interval
/// partition) are not represented here: they panic, since they can only be
/// caused by a bug in the model configuration.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Malformed input: wrong tensor rank, dtype, layout, shape or buffer size,
    /// or a snapshot record with missing or inconsistent fields.
    #[error("format error: {0}")]
    Format(String),

    /// A snapshot record or configuration that is not valid JSON, or does not
    /// match the expected schema.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The coded stream ended before the end-of-message symbol was decoded.
    #[error("truncated stream: {bits_past_end} bits read past the end after {symbols} symbols")]
    TruncatedStream { bits_past_end: u32, symbols: usize },

    /// An I/O error while reading or writing a snapshot.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        CodecError::Format(msg.into())
    }
}

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
