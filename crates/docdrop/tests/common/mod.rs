//! Shared test utilities for docdrop integration tests.
//!
//! - `TestHarness` gives every test its own four-directory layout
//! - `ConfigBuilder` builds configurations without JSON boilerplate

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
