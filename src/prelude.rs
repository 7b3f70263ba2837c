//! Re-exports common types for convenient usage.
//!
//! # Example
//! ```rust,no_run
//! use breakwater::prelude::*;
//! ```

pub use crate::{BreakerError, BreakerResult, CircuitBreaker, DefaultPolicy, State};
pub use tokio_util::sync::CancellationToken;
