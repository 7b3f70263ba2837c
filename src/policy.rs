//! Policy engine for circuit breaker trip and reset decisions.

use crate::state::State;
use crate::window::OutcomeWindow;

/// A policy that determines when to trip and reset a circuit breaker.
///
/// Both methods are evaluated under the store lock after every recorded
/// outcome, so they must be cheap and must not block.
pub trait BreakerPolicy: Send + Sync + 'static {
    /// Determines if the circuit should trip open.
    ///
    /// Only consulted while the circuit is closed or half-open.
    fn should_trip(&self, window: &OutcomeWindow, state: State) -> bool;

    /// Determines if a half-open circuit should close.
    fn should_reset(&self, window: &OutcomeWindow) -> bool;
}

/// Default policy based on a failure percentage and a half-open trial limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultPolicy {
    error_threshold: f64,
    half_open_limit: u32,
}

impl DefaultPolicy {
    /// Creates a new default policy.
    ///
    /// `error_threshold` is a percentage and is clamped to `0..=100`;
    /// `half_open_limit` is raised to at least one.
    pub fn new(error_threshold: f64, half_open_limit: u32) -> Self {
        let error_threshold = if error_threshold.is_nan() {
            100.0
        } else {
            error_threshold.clamp(0.0, 100.0)
        };

        Self {
            error_threshold,
            half_open_limit: half_open_limit.max(1),
        }
    }

    /// Failure percentage that trips the circuit.
    pub fn error_threshold(&self) -> f64 {
        self.error_threshold
    }

    /// Successes needed to close, or failures needed to re-open, while half-open.
    pub fn half_open_limit(&self) -> u32 {
        self.half_open_limit
    }
}

impl BreakerPolicy for DefaultPolicy {
    fn should_trip(&self, window: &OutcomeWindow, state: State) -> bool {
        // A window without failures never trips, even with a zero threshold
        if window.failures() > 0 && window.error_rate() >= self.error_threshold {
            return true;
        }

        // Evicted failures still count towards the half-open limit
        state == State::HalfOpen && window.failures_since_reset() >= u64::from(self.half_open_limit)
    }

    fn should_reset(&self, window: &OutcomeWindow) -> bool {
        window.consecutive_successes() >= u64::from(self.half_open_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_of(outcomes: &[bool]) -> OutcomeWindow {
        let mut window = OutcomeWindow::new(100);
        for &outcome in outcomes {
            window.record(outcome);
        }
        window
    }

    #[test]
    fn trips_when_threshold_reached() {
        let policy = DefaultPolicy::new(50.0, 3);

        assert!(!policy.should_trip(&window_of(&[true, true, false]), State::Closed));
        assert!(policy.should_trip(&window_of(&[true, false]), State::Closed));
    }

    #[test]
    fn single_failure_breaches_low_threshold() {
        let policy = DefaultPolicy::new(1.0, 3);
        assert!(policy.should_trip(&window_of(&[true, true, true, false]), State::Closed));
    }

    #[test]
    fn zero_threshold_needs_a_failure() {
        let policy = DefaultPolicy::new(0.0, 3);
        assert!(!policy.should_trip(&window_of(&[true]), State::Closed));
        assert!(policy.should_trip(&window_of(&[true, false]), State::Closed));
    }

    #[test]
    fn half_open_failure_limit() {
        let policy = DefaultPolicy::new(100.0, 2);
        let trials = window_of(&[true, false, true, false]);

        assert!(!policy.should_trip(&trials, State::Closed));
        assert!(policy.should_trip(&trials, State::HalfOpen));
        assert!(!policy.should_trip(&window_of(&[true, false]), State::HalfOpen));
    }

    #[test]
    fn half_open_failure_limit_survives_eviction() {
        let policy = DefaultPolicy::new(100.0, 3);
        let mut trials = OutcomeWindow::new(3);
        for success in [true, false, true, false, true] {
            trials.record(success);
            assert!(!policy.should_trip(&trials, State::HalfOpen));
        }

        trials.record(false);
        assert_eq!(trials.failures(), 2);
        assert!(policy.should_trip(&trials, State::HalfOpen));
    }

    #[test]
    fn resets_after_consecutive_successes() {
        let policy = DefaultPolicy::new(50.0, 3);

        assert!(!policy.should_reset(&window_of(&[true, true, false, true, true])));
        assert!(policy.should_reset(&window_of(&[false, true, true, true])));
    }

    #[test]
    fn configuration_is_normalised() {
        let policy = DefaultPolicy::new(250.0, 0);
        assert_eq!(policy.error_threshold(), 100.0);
        assert_eq!(policy.half_open_limit(), 1);
        assert_eq!(DefaultPolicy::new(-3.0, 2).error_threshold(), 0.0);
    }
}
