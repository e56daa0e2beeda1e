use thiserror::Error;

#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("invalid device limit mode: {0}")]
    InvalidDeviceLimitMode(i64),
    #[error("cache {operation} failed: {reason}")]
    Cache { operation: String, reason: String },
    #[error("settings error: {0}")]
    Settings(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PresenceError {
    pub fn cache(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Cache {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}
