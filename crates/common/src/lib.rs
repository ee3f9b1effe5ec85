//! Uniquify Common Utilities
//!
//! Shared infrastructure for all Uniquify crates:
//! - Error types and result aliases
//! - Cooperative cancellation
//! - Wall-clock stamps, stopwatches and progress rate gating
//! - Tracing/logging initialization
//! - Configuration loading

pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use cancel::CancelToken;
pub use clock::*;
pub use config::*;
pub use error::*;
