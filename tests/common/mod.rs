//! Common test utilities and helpers
//!
//! This module provides shared test infrastructure including:
//! - Test fixtures
//! - Mock external services
//! - Test database setup and API client

#![allow(dead_code)]

pub mod fixtures;
pub mod test_app;

pub use fixtures::*;
pub use mocks::*;
pub use test_app::*;
