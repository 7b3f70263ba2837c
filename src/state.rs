//! Circuit breaker state machine implementation.

use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicU8, Ordering};

/// Represents the possible states of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Circuit is closed and operations are allowed.
    Closed = 0,

    /// Circuit is open and operations are rejected.
    Open = 1,

    /// Circuit is allowing trial operations to test recovery.
    HalfOpen = 2,
}

impl State {
    /// Short lowercase label, as used in logs and metric sinks.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half-open",
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<u8> for State {
    fn from(value: u8) -> Self {
        match value {
            0 => State::Closed,
            1 => State::Open,
            2 => State::HalfOpen,
            _ => State::Closed, // Default to closed for invalid values
        }
    }
}

/// A state change applied by the store, reported once the lock is released.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Transition {
    pub from: State,
    pub to: State,
    /// Failure percentage of the window that was just cleared.
    pub error_rate: f64,
}

/// Lock-free mirror of the current state.
///
/// Writers must hold the store lock; readers on the admission path only load.
#[derive(Debug)]
pub(crate) struct StateManager {
    state: AtomicU8,
}

impl StateManager {
    /// Creates a new state manager with the default closed state.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(State::Closed as u8),
        }
    }

    /// Gets the current state.
    pub fn current(&self) -> State {
        let value = self.state.load(Ordering::Acquire);
        State::from(value)
    }

    /// Attempts to transition from one state to another.
    /// Returns true if the transition succeeded.
    pub fn transition_from_to(&self, from: State, to: State) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        assert_eq!(StateManager::new().current(), State::Closed);
    }

    #[test]
    fn transition_requires_matching_origin() {
        let manager = StateManager::new();

        assert!(!manager.transition_from_to(State::HalfOpen, State::Closed));
        assert!(manager.transition_from_to(State::Closed, State::Open));
        assert_eq!(manager.current(), State::Open);
        assert!(!manager.transition_from_to(State::Closed, State::Open));
        assert!(manager.transition_from_to(State::Open, State::HalfOpen));
        assert_eq!(manager.current(), State::HalfOpen);
    }

    #[test]
    fn invalid_raw_value_reads_as_closed() {
        assert_eq!(State::from(7), State::Closed);
        assert_eq!(State::HalfOpen.to_string(), "half-open");
    }
}
