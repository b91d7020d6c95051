//! Middleware components
//!
//! - Authentication (JWT bearer tokens)
//! - Request metadata for the audit trail

pub mod auth;
pub mod request_meta;

pub use auth::{auth_middleware, AuthUser, Claims};
pub use request_meta::RequestMeta;
