//! Convenience re-exports for common test utilities.

pub use crate::fixtures::{in_pit_snapshot, reference_snapshot};
pub use crate::must::{must, must_some};
pub use crate::wait::wait_until;

#[cfg(feature = "async")]
pub use crate::wait::wait_until_async;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
