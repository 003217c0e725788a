use thiserror::Error;

#[derive(Error, Debug)]
pub enum DlnaError {
    #[error("Failed to bind discovery socket: {0}")]
    BindFailed(std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SOAP request invalid: {0}")]
    Soap(String),
}

pub type Result<T> = std::result::Result<T, DlnaError>;
