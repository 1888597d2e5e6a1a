mod app_error;
mod database_converter;
mod storage_error;

pub use app_error::{AppError, AppResult};
pub use database_converter::StorageErrorConverter;
pub use storage_error::StorageError;
