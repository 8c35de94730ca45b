//! Shared test utilities for casebundle integration tests.
//!
//! This module provides:
//! - `TestHarness` with a temporary SQLite database and blob store
//! - Builders and fixtures for input PDFs, signature images and options

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
