//! Shared test utilities for glrfill integration tests.
//!
//! This module provides:
//! - Builders for GLR templates, evidence PDFs and field mappings
//! - `TestHarness`: a pipeline wired to in-process fakes, plus a temp directory

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
