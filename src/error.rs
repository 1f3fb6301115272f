use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecallError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Dialog error: {0}")]
    Dialog(String),
}

impl From<dialoguer::Error> for RecallError {
    fn from(err: dialoguer::Error) -> Self {
        RecallError::Dialog(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RecallError>;
