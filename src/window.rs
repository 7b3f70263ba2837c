//! Sliding observation window of recent call outcomes.

use smallvec::SmallVec;

/// Default number of outcomes retained by a window.
pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// A fixed-capacity ring of the most recent outcomes.
///
/// Once full, every new outcome evicts the oldest one. The window also keeps
/// the current streak of consecutive successes, which any failure resets, and
/// a count of every failure since the last reset that eviction never lowers.
#[derive(Debug, Clone)]
pub struct OutcomeWindow {
    outcomes: SmallVec<[bool; 64]>, // true = success
    head: usize,
    capacity: usize,
    failures: usize,
    failures_since_reset: u64,
    consecutive_successes: u64,
}

/// Point-in-time view of an [`OutcomeWindow`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSnapshot {
    /// Maximum number of outcomes retained.
    pub capacity: usize,
    /// Outcomes currently retained.
    pub len: usize,
    /// Failures among the retained outcomes.
    pub failures: usize,
    /// Current streak of consecutive successes.
    pub consecutive_successes: u64,
    /// Failure percentage (0-100) over the retained outcomes.
    pub error_rate: f64,
}

impl OutcomeWindow {
    /// Creates an empty window. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            outcomes: SmallVec::new(),
            head: 0,
            capacity,
            failures: 0,
            failures_since_reset: 0,
            consecutive_successes: 0,
        }
    }

    /// Records a single outcome, evicting the oldest one if the window is full.
    pub fn record(&mut self, success: bool) {
        if self.outcomes.len() < self.capacity {
            self.outcomes.push(success);
        } else {
            let evicted = std::mem::replace(&mut self.outcomes[self.head], success);
            if !evicted {
                self.failures -= 1;
            }
            self.head = (self.head + 1) % self.capacity;
        }

        if success {
            self.consecutive_successes += 1;
        } else {
            self.failures += 1;
            self.failures_since_reset += 1;
            self.consecutive_successes = 0;
        }
    }

    /// Number of outcomes currently retained.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if no outcome has been recorded since the last reset.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Maximum number of outcomes retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Failures among the retained outcomes.
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Failures recorded since the last reset, including evicted ones.
    pub fn failures_since_reset(&self) -> u64 {
        self.failures_since_reset
    }

    /// Successes among the retained outcomes.
    pub fn successes(&self) -> usize {
        self.outcomes.len() - self.failures
    }

    /// Current streak of consecutive successes.
    pub fn consecutive_successes(&self) -> u64 {
        self.consecutive_successes
    }

    /// Failure percentage in `0.0..=100.0`; an empty window reports zero.
    pub fn error_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }

        self.failures as f64 / self.outcomes.len() as f64 * 100.0
    }

    /// Forgets every retained outcome and the success streak.
    pub fn reset(&mut self) {
        self.outcomes.clear();
        self.head = 0;
        self.failures = 0;
        self.failures_since_reset = 0;
        self.consecutive_successes = 0;
    }

    /// Captures the window's current figures.
    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            capacity: self.capacity,
            len: self.len(),
            failures: self.failures,
            consecutive_successes: self.consecutive_successes,
            error_rate: self.error_rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_window_has_no_errors() {
        let window = OutcomeWindow::new(4);
        assert!(window.is_empty());
        assert_eq!(window.error_rate(), 0.0);
    }

    #[test]
    fn zero_capacity_is_raised() {
        let mut window = OutcomeWindow::new(0);
        window.record(false);
        window.record(true);
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.len(), 1);
        assert_eq!(window.failures(), 0);
    }

    #[test]
    fn eviction_drops_oldest_failure() {
        let mut window = OutcomeWindow::new(3);
        window.record(false);
        window.record(true);
        window.record(true);
        assert_eq!(window.failures(), 1);

        window.record(true);
        assert_eq!(window.failures(), 0);
        assert_eq!(window.len(), 3);
        assert_eq!(window.error_rate(), 0.0);
    }

    #[test]
    fn eviction_keeps_failures_since_reset() {
        let mut window = OutcomeWindow::new(2);
        for success in [false, true, false, true, false, true] {
            window.record(success);
        }

        assert_eq!(window.failures(), 1);
        assert_eq!(window.failures_since_reset(), 3);

        window.reset();
        assert_eq!(window.failures_since_reset(), 0);
    }

    #[test]
    fn failure_resets_success_streak() {
        let mut window = OutcomeWindow::new(10);
        window.record(true);
        window.record(true);
        assert_eq!(window.consecutive_successes(), 2);

        window.record(false);
        assert_eq!(window.consecutive_successes(), 0);

        window.record(true);
        assert_eq!(window.consecutive_successes(), 1);
        assert_eq!(window.error_rate(), 25.0);
    }

    #[test]
    fn reset_clears_everything() {
        let mut window = OutcomeWindow::new(2);
        window.record(false);
        window.record(true);
        window.record(false);
        window.reset();

        assert_eq!(
            window.snapshot(),
            WindowSnapshot {
                capacity: 2,
                len: 0,
                failures: 0,
                consecutive_successes: 0,
                error_rate: 0.0,
            }
        );
    }

    proptest! {
        #[test]
        fn rate_covers_only_retained_outcomes(
            capacity in 1usize..40,
            outcomes in proptest::collection::vec(any::<bool>(), 0..200),
        ) {
            let mut window = OutcomeWindow::new(capacity);
            for &outcome in &outcomes {
                window.record(outcome);
            }

            let retained = &outcomes[outcomes.len().saturating_sub(capacity)..];
            let expected_failures = retained.iter().filter(|ok| !**ok).count();

            prop_assert!(window.len() <= capacity);
            prop_assert_eq!(window.len(), retained.len());
            prop_assert_eq!(window.failures(), expected_failures);
            prop_assert_eq!(window.successes() + window.failures(), window.len());
            prop_assert_eq!(
                window.failures_since_reset(),
                outcomes.iter().filter(|ok| !**ok).count() as u64
            );
        }

        #[test]
        fn streak_matches_trailing_successes(
            outcomes in proptest::collection::vec(any::<bool>(), 0..100),
        ) {
            let mut window = OutcomeWindow::new(8);
            for &outcome in &outcomes {
                window.record(outcome);
            }

            let trailing = outcomes.iter().rev().take_while(|ok| **ok).count() as u64;
            prop_assert_eq!(window.consecutive_successes(), trailing);
        }
    }
}
