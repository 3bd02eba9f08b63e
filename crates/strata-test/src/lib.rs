//! # strata-test
//!
//! Integration tests for StrataDB.
//!
//! This crate contains:
//! - End-to-end engine tests
//! - Revisioning strategy coverage
//! - Shared fixtures and helpers

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Test utilities and helpers
pub mod utils;
