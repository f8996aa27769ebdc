pub mod error;
pub mod models;
pub mod storage;

// Re-export commonly used types
pub use error::{ApiError, ApiResult};
pub use models::*;
pub use storage::{StubIndexUpdater, StubStorage};
