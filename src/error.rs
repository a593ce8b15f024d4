use thiserror::Error;

/// Errors surfaced by the rendering core.
///
/// Unknown pages and containers are not errors; services report them as `Ok(None)`.
#[derive(Debug, Error)]
pub enum InkError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid export scale {0}: must be a finite number greater than zero")]
    InvalidScale(f64),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl InkError {
    /// True for storage failures, which callers map to a server error.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, InkError::Io(_))
    }
}
