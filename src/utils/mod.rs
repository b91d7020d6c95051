//! Shared utilities

pub mod error;
pub mod logging;
pub mod validation;

pub use error::{AppError, AppResult, ErrorResponse, IntegrationError, ServiceError};
pub use logging::init_logging;
