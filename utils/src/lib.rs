//! Shared utilities for bftb binaries.

pub mod logging;

pub use logging::{init_logging, LogFormat};
