use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoothError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Capability error: {0}")]
    Capability(String),

    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BoothError>;
