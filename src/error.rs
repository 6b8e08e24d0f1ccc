use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no playable media found at {url}")]
    NoPlayableMedia { url: String },

    #[error("content restricted at {url}: {message}")]
    RestrictedContent { url: String, message: String },

    #[error("login failed at {url}: {message}")]
    Authentication { url: String, message: String },

    #[error("unsupported URL: {0}")]
    UnsupportedUrl(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("request failed for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("unexpected HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
