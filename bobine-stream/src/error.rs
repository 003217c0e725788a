use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Asset unavailable: {0}")]
    AssetUnavailable(String),

    #[error("Encoder spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Encoder failed: {0}")]
    EncoderFailed(String),

    #[error("Hardware encoder unavailable: {0}")]
    HardwareUnavailable(String),

    #[error("Unsupported subtitle format: {0}")]
    UnsupportedSubtitle(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Probe output malformed: {0}")]
    ProbeParse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StreamError>;
