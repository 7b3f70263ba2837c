//! # breakwater
//!
//! An async, timeout-aware, lock-efficient Circuit Breaker library for Rust
//! applications built on Tokio.
//!
//! ## What is a Circuit Breaker?
//!
//! The Circuit Breaker pattern helps prevent cascading failures in distributed systems
//! by temporarily disabling operations that are likely to fail. It operates in three states:
//!
//! - **Closed**: Normal operation. Calls pass through to the protected resource.
//! - **Open**: Calls are immediately rejected without attempting to reach the resource.
//! - **Half-Open**: After a cooldown period, test calls are permitted to check if the
//!   underlying resource has recovered.
//!
//! The breaker trips when the failure percentage over a sliding window of recent
//! outcomes reaches the configured threshold. A timer moves an open breaker to
//! half-open once the recover timeout elapses, and the first call after that
//! point does the same if the timer never ran. A half-open breaker admits at
//! most `half_open_limit` calls at a time; `half_open_limit` consecutive
//! successes close it again while `half_open_limit` failures re-open it.
//!
//! Calls must be made from within a Tokio runtime with its time driver enabled.
//! Outside of any runtime, `execute` fails with `InternalError::NoRuntime`.
//!
//! ## Basic Usage
//!
//! ```rust
//! use breakwater::{BreakerError, CircuitBreaker, DefaultPolicy};
//! use std::error::Error;
//! use std::fmt;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! struct ServiceError(String);
//!
//! impl fmt::Display for ServiceError {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         write!(f, "Service error: {}", self.0)
//!     }
//! }
//!
//! impl Error for ServiceError {}
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let breaker = CircuitBreaker::<DefaultPolicy, ServiceError>::new(
//!     Duration::from_secs(3),  // per-call timeout
//!     Duration::from_secs(30), // stay open this long before probing
//!     50.0,                    // trip at 50% failures
//!     3,                       // half-open trial limit
//! );
//!
//! let ctx = CancellationToken::new();
//! let result = breaker
//!     .execute(&ctx, 21u32, |_ctx, n| async move { Ok::<_, ServiceError>(n * 2) })
//!     .await;
//!
//! match result {
//!     Ok(value) => println!("Call succeeded: {}", value),
//!     Err(BreakerError::Open) => println!("Circuit is open, call was prevented"),
//!     Err(BreakerError::Timeout(after)) => println!("Call timed out after {:?}", after),
//!     Err(BreakerError::Operation(err)) => println!("Call failed: {}", err),
//!     Err(err) => println!("Other error: {}", err),
//! }
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod breaker;
mod config;
mod error;
mod hook;
mod metrics;
mod policy;
pub mod prelude;
mod recovery;
mod state;
mod window;

// Re-exports
pub use breaker::CircuitBreaker;
pub use config::{BreakerBuilder, BreakerConfig};
pub use error::{BreakerError, BreakerResult, InternalError};
pub use hook::HookRegistry;
pub use metrics::{MetricSink, NullMetricSink};
pub use policy::{BreakerPolicy, DefaultPolicy};
pub use state::State;
pub use window::{OutcomeWindow, WindowSnapshot, DEFAULT_WINDOW_SIZE};
