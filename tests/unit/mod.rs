// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for the ParadeDB operator
//!
//! This module contains unit tests for:
//! - Resource generators and how their objects fit together
//! - Validation logic
//! - Status aggregation
//! - Whole reconciliation passes against an in-memory API

#[path = "../common/mod.rs"]
mod common;

mod resources;
mod status;
mod validation;
