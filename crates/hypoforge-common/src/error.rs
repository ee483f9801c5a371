use thiserror::Error;

#[derive(Debug, Error)]
pub enum HypoforgeError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Security error: {0}")]
    SecurityError(String),

    #[error("Upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HypoforgeError {
    /// True for failures worth another attempt (transport errors, 429 and 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            HypoforgeError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            HypoforgeError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, HypoforgeError>;
