//! Shared test utilities for the OneMoreGauge relay crates.
//!
//! # Modules
//!
//! - [`mod@must`] - Unwrap helpers with `#[track_caller]` panic locations
//! - [`wait`] - Polling helpers for threaded and async tests
//! - [`fixtures`] - Known telemetry snapshots
//! - [`prelude`] - Convenience re-exports
//!
//! ```toml
//! [dev-dependencies]
//! omg-test-helpers = { workspace = true }
//! ```

pub mod fixtures;
pub mod must;
pub mod prelude;
pub mod wait;

pub use must::*;
