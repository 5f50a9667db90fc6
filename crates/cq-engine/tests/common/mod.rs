//! Common test utilities for the chain engine
//!
//! Mock actions and conditions that write into a shared journal, so tests
//! can assert the exact order in which a graph was walked.

mod journal;
mod mocks;

pub use journal::*;
pub use mocks::*;
