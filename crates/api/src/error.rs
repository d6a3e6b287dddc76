//! Error type for collaborator HTTP calls.

/// Errors from the token, tracking-id and user-lookup endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("endpoint rejected request (code {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("missing field in response: {0}")]
    MissingField(&'static str),
}
