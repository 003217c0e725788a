use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Notification delivery failed: {0}")]
    NotificationDelivery(String),

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::NotificationDelivery(format!("request timed out: {err}"))
        } else {
            Error::NotificationDelivery(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
