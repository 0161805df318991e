#![deny(unsafe_code)]

//! Shared test utilities for the connidx workspace.
//!
//! Provides reusable fixtures, config builders, and tracing helpers so that
//! individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! connidx-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod daemon;
pub mod library;
pub mod tracing_setup;
