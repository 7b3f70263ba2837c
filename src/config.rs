//! Configuration for circuit breakers.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::breaker::CircuitBreaker;
use crate::hook::HookRegistry;
use crate::metrics::{MetricSink, NullMetricSink};
use crate::policy::{BreakerPolicy, DefaultPolicy};
use crate::window::DEFAULT_WINDOW_SIZE;

/// Immutable settings of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerConfig {
    /// Maximum duration allowed for one operation execution.
    pub timeout: Duration,
    /// How long the circuit stays open before probing.
    pub recover_timeout: Duration,
    /// Failure percentage (0-100) that trips the circuit.
    pub error_threshold: f64,
    /// Successes needed to close, or failures needed to re-open, while half-open.
    pub half_open_limit: u32,
    /// Number of recent outcomes the failure percentage is computed over.
    pub window_size: usize,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            recover_timeout: Duration::from_secs(30),
            error_threshold: 50.0,
            half_open_limit: 3,
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl BreakerConfig {
    /// Returns a copy with out-of-range values brought into range.
    ///
    /// The threshold is clamped to `0..=100`, the half-open limit is at least
    /// one and the window always fits a full half-open trial run.
    pub fn normalised(self) -> Self {
        let policy = DefaultPolicy::new(self.error_threshold, self.half_open_limit);
        let half_open_limit = policy.half_open_limit();

        Self {
            error_threshold: policy.error_threshold(),
            half_open_limit,
            window_size: self.window_size.max(half_open_limit as usize),
            ..self
        }
    }
}

/// Builder for creating circuit breakers with custom configurations.
pub struct BreakerBuilder<P, E>
where
    P: BreakerPolicy,
    E: std::error::Error + Send + 'static,
{
    config: BreakerConfig,
    policy: P,
    metric_sink: Arc<dyn MetricSink>,
    hook_registry: Arc<HookRegistry>,
    _error_type: PhantomData<E>,
}

impl<E> Default for BreakerBuilder<DefaultPolicy, E>
where
    E: std::error::Error + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> BreakerBuilder<DefaultPolicy, E>
where
    E: std::error::Error + Send + 'static,
{
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        let config = BreakerConfig::default();
        Self {
            policy: DefaultPolicy::new(config.error_threshold, config.half_open_limit),
            config,
            metric_sink: Arc::new(NullMetricSink),
            hook_registry: Arc::new(HookRegistry::new()),
            _error_type: PhantomData,
        }
    }

    /// Builds a circuit breaker with the default policy.
    pub fn build(self) -> CircuitBreaker<DefaultPolicy, E> {
        let config = self.config.normalised();
        let policy = DefaultPolicy::new(config.error_threshold, config.half_open_limit);

        CircuitBreaker::from_parts(policy, config, self.metric_sink, self.hook_registry)
    }
}

impl<P, E> BreakerBuilder<P, E>
where
    P: BreakerPolicy,
    E: std::error::Error + Send + 'static,
{
    /// Sets the maximum duration of a single operation execution.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets how long the circuit stays open before it starts probing.
    pub fn recover_timeout(mut self, duration: Duration) -> Self {
        self.config.recover_timeout = duration;
        self
    }

    /// Sets the failure percentage (0-100) that will trip the circuit.
    pub fn error_threshold(mut self, percentage: f64) -> Self {
        self.config.error_threshold = percentage;
        self
    }

    /// Sets the number of consecutive successes needed to close a half-open
    /// circuit, which is also the number of failures that re-open it.
    pub fn half_open_limit(mut self, limit: u32) -> Self {
        self.config.half_open_limit = limit;
        self
    }

    /// Sets how many recent outcomes the failure percentage is computed over.
    pub fn window_size(mut self, size: usize) -> Self {
        self.config.window_size = size;
        self
    }

    /// Replaces the whole configuration at once.
    pub fn config(mut self, config: BreakerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets a custom policy for the circuit breaker.
    ///
    /// A custom policy is only honoured by [`BreakerBuilder::build_with_policy`].
    pub fn policy<Q: BreakerPolicy>(self, policy: Q) -> BreakerBuilder<Q, E> {
        BreakerBuilder {
            config: self.config,
            policy,
            metric_sink: self.metric_sink,
            hook_registry: self.hook_registry,
            _error_type: PhantomData,
        }
    }

    /// Sets a metric sink for the circuit breaker.
    pub fn metric_sink<M: MetricSink>(mut self, sink: M) -> Self {
        self.metric_sink = Arc::new(sink);
        self
    }

    /// Sets a hook registry for the circuit breaker.
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hook_registry = Arc::new(hooks);
        self
    }

    /// Changes the error type for the builder.
    pub fn with_error_type<NewE: std::error::Error + Send + 'static>(
        self,
    ) -> BreakerBuilder<P, NewE> {
        BreakerBuilder {
            config: self.config,
            policy: self.policy,
            metric_sink: self.metric_sink,
            hook_registry: self.hook_registry,
            _error_type: PhantomData,
        }
    }

    /// Builds a new circuit breaker driven by the configured policy.
    ///
    /// The threshold setting is not consulted by the breaker itself; the policy
    /// owns the trip and reset decisions. The half-open limit still caps how
    /// many calls a half-open circuit admits at a time.
    pub fn build_with_policy(self) -> CircuitBreaker<P, E> {
        CircuitBreaker::from_parts(
            self.policy,
            self.config.normalised(),
            self.metric_sink,
            self.hook_registry,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BreakerConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.recover_timeout, Duration::from_secs(30));
        assert_eq!(config.error_threshold, 50.0);
        assert_eq!(config.half_open_limit, 3);
        assert_eq!(config.window_size, DEFAULT_WINDOW_SIZE);
    }

    #[test]
    fn normalised_clamps_values() {
        let config = BreakerConfig {
            error_threshold: 400.0,
            half_open_limit: 0,
            window_size: 0,
            ..BreakerConfig::default()
        }
        .normalised();

        assert_eq!(config.error_threshold, 100.0);
        assert_eq!(config.half_open_limit, 1);
        assert_eq!(config.window_size, 1);
    }

    #[test]
    fn window_fits_half_open_run() {
        let config = BreakerConfig {
            half_open_limit: 10,
            window_size: 4,
            ..BreakerConfig::default()
        }
        .normalised();

        assert_eq!(config.window_size, 10);
    }
}
