//! Common test utilities and helpers
//!
//! This module provides shared functionality for all tests.

#![allow(dead_code)]


#[allow(unused_imports)]
pub use db::TestDb;
#[allow(unused_imports)]
pub use fixtures::*;
