#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Index error: {0}")]
    Index(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
