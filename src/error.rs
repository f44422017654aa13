use thiserror::Error;

#[derive(Error, Debug)]
pub enum PerfWatchError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Metric source error: {0}")]
    Source(String),

    #[error("Baseline error: {0}")]
    Baseline(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PerfWatchError>;
