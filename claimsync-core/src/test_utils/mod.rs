//! Test utilities and helpers for claimsync
//!
//! Session fixtures, a ready-wired simulated environment, and async helpers
//! shared by unit and integration tests.

pub mod async_helpers;
pub mod fixtures;

pub use async_helpers::*;
pub use fixtures::*;
