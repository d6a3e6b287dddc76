//! Error types for the client.

use blive_api::ApiError;
use blive_transport::TransportError;

/// Errors from a connect attempt. Surfaced to the caller as a boolean
/// failure plus a log line; kept structured for the log itself.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("DNS resolution failed: {0}")]
    Dns(std::io::Error),

    #[error("no chat hosts available")]
    NoHosts,

    #[error("frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A message factory failed to extract fields from a well-formed envelope.
///
/// Isolated to the single message it occurred on; never crosses the
/// dispatch boundary.
#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid field: {0}")]
    InvalidField(&'static str),
}
