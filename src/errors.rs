use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("VALIDATION: {0}")]
    Validation(String),
    #[error("DUPLICATE: {0}")]
    Duplicate(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("STORAGE: {0}")]
    Storage(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True for errors raised before anything was written.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Duplicate(_) | Self::NotFound(_))
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
