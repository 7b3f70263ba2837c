//! Metric sink seam for circuit breaker events.
//!
//! The library only reports events; turning them into exported metrics is left
//! to the sink implementation supplied by the application.

use std::time::Duration;

/// Trait for metrics sinks that can receive circuit breaker events.
///
/// Sinks are invoked after the breaker's internal lock has been released.
pub trait MetricSink: Send + Sync + 'static {
    /// Records a state transition event.
    fn record_state_transition(&self, from: &str, to: &str);

    /// Records the failure percentage that caused the circuit to open.
    fn record_error_rate(&self, rate: f64);

    /// Records a call that was admitted and ran to an outcome.
    fn record_call(&self, success: bool, duration: Duration);

    /// Records a call rejected because the circuit was open.
    fn record_rejection(&self);
}

/// A null metrics sink that discards all events.
pub struct NullMetricSink;

impl MetricSink for NullMetricSink {
    fn record_state_transition(&self, _from: &str, _to: &str) {}
    fn record_error_rate(&self, _rate: f64) {}
    fn record_call(&self, _success: bool, _duration: Duration) {}
    fn record_rejection(&self) {}
}
