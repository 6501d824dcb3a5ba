//! Tracing/logging setup shared by every stock ledger binary and test harness.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use tracing::{init_with, LogFormat, UnknownLogFormat, DEFAULT_FILTER};
