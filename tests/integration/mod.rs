//! Integration tests for Campaign Hub
//!
//! These tests drive the API and services against a real SQLite database
//! with all middleware in place.

mod api_tests;
mod dispatcher_tests;
mod integration_client_tests;
mod scoping_tests;
