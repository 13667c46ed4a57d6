// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    dead_code
)]

//! Common test utilities shared across test targets
//!
//! This module provides reusable builders for ParadeDB resources and an
//! in-memory object store that stands in for the Kubernetes API.
//!
//! # Usage
//!
//! Include this module in your test target:
//! ```rust,ignore
//! #[path = "../common/mod.rs"]
//! mod common;
//! use common::*;
//! ```

mod fake_client;

pub use fake_client::*;
pub use fixtures::*;
