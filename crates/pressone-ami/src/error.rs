//! Manager interface errors

use pressone_core::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AmiError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("Login rejected: {0}")]
    LoginRejected(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection closed by peer")]
    Closed,

    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

impl From<AmiError> for AppError {
    fn from(err: AmiError) -> Self {
        match err {
            AmiError::Protocol(msg) => AppError::SwitchProtocol(msg),
            AmiError::InvalidHeader(msg) => AppError::InvalidInput(msg),
            other => AppError::SwitchUnavailable(other.to_string()),
        }
    }
}
