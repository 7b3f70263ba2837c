//! Core circuit breaker implementation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{BreakerBuilder, BreakerConfig};
use crate::error::{BreakerError, BreakerResult, InternalError};
use crate::hook::HookRegistry;
use crate::metrics::MetricSink;
use crate::policy::{BreakerPolicy, DefaultPolicy};
use crate::recovery;
use crate::state::{State, StateManager, Transition};
use crate::window::{OutcomeWindow, WindowSnapshot};

/// Mutable bookkeeping guarded by the store lock.
pub(crate) struct Store {
    pub window: OutcomeWindow,
    /// Bumped on every transition; identifies the current state period.
    pub generation: u64,
    pub last_transition: Instant,
    /// Pending recovery timer of the current open period, if one was spawned.
    pub recovery: Option<AbortHandle>,
    /// Calls admitted in the current half-open period that have not finished.
    pub half_open_in_flight: u32,
    pub total_outcomes: u64,
}

/// Result of the admission gate.
enum Admission<P>
where
    P: BreakerPolicy,
{
    Rejected,
    Admitted(Option<HalfOpenPermit<P>>),
}

/// Slot held by a call admitted while half-open.
///
/// Released on drop, so a call whose future is dropped mid-flight frees its
/// slot as well. A transition frees every slot of the period it ends.
struct HalfOpenPermit<P>
where
    P: BreakerPolicy,
{
    inner: Arc<BreakerInner<P>>,
    generation: u64,
}

impl<P> Drop for HalfOpenPermit<P>
where
    P: BreakerPolicy,
{
    fn drop(&mut self) {
        let mut store = self.inner.store.lock();
        if store.generation == self.generation {
            store.half_open_in_flight = store.half_open_in_flight.saturating_sub(1);
        }
    }
}

/// Inner state of the circuit breaker, shared between handles and the
/// recovery timer.
pub(crate) struct BreakerInner<P>
where
    P: BreakerPolicy,
{
    pub state_manager: StateManager,
    pub store: Mutex<Store>,
    pub policy: P,
    pub config: BreakerConfig,
    pub metric_sink: Arc<dyn MetricSink>,
    pub hooks: Arc<HookRegistry>,
}

impl<P> BreakerInner<P>
where
    P: BreakerPolicy,
{
    /// Moves the state machine to `to`, clearing the window.
    ///
    /// Must be called with the store lock held.
    pub(crate) fn transition(&self, store: &mut Store, to: State) -> Option<Transition> {
        let from = self.state_manager.current();
        if from == to || !self.state_manager.transition_from_to(from, to) {
            return None;
        }

        let error_rate = store.window.error_rate();
        store.window.reset();
        store.last_transition = Instant::now();
        store.generation += 1;
        store.half_open_in_flight = 0;

        Some(Transition {
            from,
            to,
            error_rate,
        })
    }

    /// Reports a state change to logs, hooks and the metric sink.
    ///
    /// Must be called after the store lock has been released.
    pub(crate) fn announce(&self, transition: Transition) {
        match transition.to {
            State::Open => tracing::warn!(
                from = %transition.from,
                error_rate = transition.error_rate,
                "circuit opened"
            ),
            State::HalfOpen => {
                tracing::info!(from = %transition.from, "circuit half-open, admitting trial calls")
            }
            State::Closed => tracing::info!(from = %transition.from, "circuit closed"),
        }

        self.hooks.execute_state_transition_hook(transition.to);
        self.metric_sink
            .record_state_transition(transition.from.as_str(), transition.to.as_str());
        if transition.to == State::Open {
            self.metric_sink.record_error_rate(transition.error_rate);
        }
    }

    /// Admission gate.
    ///
    /// An open circuit whose cooldown has elapsed is promoted to half-open here,
    /// whether or not its recovery timer ever ran. A half-open circuit admits at
    /// most `half_open_limit` calls at a time.
    fn admit(self: &Arc<Self>) -> Admission<P> {
        if self.state_manager.current() == State::Closed {
            return Admission::Admitted(None);
        }

        let (admission, transition) = {
            let mut store = self.store.lock();
            let mut transition = None;
            if self.state_manager.current() == State::Open
                && store.last_transition.elapsed() >= self.config.recover_timeout
            {
                recovery::cancel(&mut store);
                transition = self.transition(&mut store, State::HalfOpen);
            }

            let admission = match self.state_manager.current() {
                State::Closed => Admission::Admitted(None),
                State::Open => Admission::Rejected,
                State::HalfOpen if store.half_open_in_flight < self.config.half_open_limit => {
                    store.half_open_in_flight += 1;
                    Admission::Admitted(Some(HalfOpenPermit {
                        inner: Arc::clone(self),
                        generation: store.generation,
                    }))
                }
                State::HalfOpen => {
                    tracing::debug!(
                        in_flight = store.half_open_in_flight,
                        "half-open admission limit reached"
                    );
                    Admission::Rejected
                }
            };

            (admission, transition)
        };

        if let Some(transition) = transition {
            self.announce(transition);
        }

        admission
    }

    /// Feeds one outcome into the window and applies any resulting transition.
    fn record_outcome(self: &Arc<Self>, success: bool, elapsed: Duration) {
        let transition = {
            let mut store = self.store.lock();
            store.total_outcomes += 1;
            store.window.record(success);

            match self.state_manager.current() {
                // Late outcome of a call admitted before the circuit opened
                State::Open => None,
                State::HalfOpen if self.policy.should_reset(&store.window) => {
                    self.transition(&mut store, State::Closed)
                }
                state if self.policy.should_trip(&store.window, state) => {
                    let transition = self.transition(&mut store, State::Open);
                    if transition.is_some() {
                        recovery::schedule(self, &mut store);
                    }
                    transition
                }
                _ => None,
            }
        };

        self.metric_sink.record_call(success, elapsed);
        self.hooks.execute_outcome_hook(success);

        if let Some(transition) = transition {
            self.announce(transition);
        }
    }
}

impl<P> Drop for BreakerInner<P>
where
    P: BreakerPolicy,
{
    fn drop(&mut self) {
        if let Some(timer) = self.store.get_mut().recovery.take() {
            timer.abort();
        }
    }
}

/// A circuit breaker that wraps asynchronous operations to prevent cascading
/// failures.
///
/// Cloning is cheap; all clones share the same state.
pub struct CircuitBreaker<P, E>
where
    P: BreakerPolicy,
    E: std::error::Error + Send + 'static,
{
    inner: Arc<BreakerInner<P>>,
    _error_type: std::marker::PhantomData<fn() -> E>,
}

impl<E> CircuitBreaker<DefaultPolicy, E>
where
    E: std::error::Error + Send + 'static,
{
    /// Creates a closed circuit breaker with the default policy and window size.
    ///
    /// `error_threshold` is a failure percentage (0-100). `half_open_limit` is
    /// both the number of consecutive successes that close a half-open circuit
    /// and the number of failures that re-open it.
    pub fn new(
        timeout: Duration,
        recover_timeout: Duration,
        error_threshold: f64,
        half_open_limit: u32,
    ) -> Self {
        Self::builder()
            .timeout(timeout)
            .recover_timeout(recover_timeout)
            .error_threshold(error_threshold)
            .half_open_limit(half_open_limit)
            .build()
    }

    /// Creates a new builder for customizing a circuit breaker.
    pub fn builder() -> BreakerBuilder<DefaultPolicy, E> {
        BreakerBuilder::new()
    }
}

impl<P, E> CircuitBreaker<P, E>
where
    P: BreakerPolicy,
    E: std::error::Error + Send + 'static,
{
    pub(crate) fn from_parts(
        policy: P,
        config: BreakerConfig,
        metric_sink: Arc<dyn MetricSink>,
        hooks: Arc<HookRegistry>,
    ) -> Self {
        let inner = BreakerInner {
            state_manager: StateManager::new(),
            store: Mutex::new(Store {
                window: OutcomeWindow::new(config.window_size),
                generation: 0,
                last_transition: Instant::now(),
                recovery: None,
                half_open_in_flight: 0,
                total_outcomes: 0,
            }),
            policy,
            config,
            metric_sink,
            hooks,
        };

        Self {
            inner: Arc::new(inner),
            _error_type: std::marker::PhantomData,
        }
    }

    /// Gets the current state of the circuit breaker.
    pub fn current_state(&self) -> State {
        self.inner.state_manager.current()
    }

    /// Gets the failure percentage (0-100) of the current observation window.
    pub fn error_rate(&self) -> f64 {
        self.inner.store.lock().window.error_rate()
    }

    /// Gets a snapshot of the current observation window.
    pub fn stats(&self) -> WindowSnapshot {
        self.inner.store.lock().window.snapshot()
    }

    /// Total number of outcomes recorded over the breaker's lifetime.
    pub fn total_outcomes(&self) -> u64 {
        self.inner.store.lock().total_outcomes
    }

    /// Time elapsed since the last state transition.
    pub fn time_in_state(&self) -> Duration {
        self.inner.store.lock().last_transition.elapsed()
    }

    /// The immutable configuration of this breaker.
    pub fn config(&self) -> &BreakerConfig {
        &self.inner.config
    }

    /// Executes `operation` guarded by the circuit breaker.
    ///
    /// If the circuit is open, or half-open with `half_open_limit` calls
    /// already in flight, the call is rejected with [`BreakerError::Open`]
    /// and `operation` is never invoked. Otherwise the operation's future is
    /// spawned on the current tokio runtime and raced against the configured
    /// timeout and against cancellation of `ctx`. The operation receives a
    /// child token of `ctx` that is cancelled as soon as this call returns,
    /// so an abandoned operation can stop early.
    ///
    /// Timeouts, cancellations and operation errors are all counted as
    /// failures. Polled outside of a tokio runtime, the call fails with
    /// [`InternalError::NoRuntime`] without invoking `operation` or recording
    /// an outcome.
    pub async fn execute<Req, Resp, F, Fut>(
        &self,
        ctx: &CancellationToken,
        request: Req,
        operation: F,
    ) -> BreakerResult<Resp, E>
    where
        F: FnOnce(CancellationToken, Req) -> Fut,
        Fut: Future<Output = Result<Resp, E>> + Send + 'static,
        Resp: Send + 'static,
    {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!("no tokio runtime, call not attempted");
                return Err(BreakerError::Internal(InternalError::NoRuntime));
            }
        };

        // Held until the outcome is recorded
        let _permit = match self.inner.admit() {
            Admission::Admitted(permit) => permit,
            Admission::Rejected => {
                tracing::debug!("circuit open, call rejected");
                self.inner.metric_sink.record_rejection();
                self.inner.hooks.execute_rejected_hook();
                return Err(BreakerError::Open);
            }
        };

        let scope = ctx.child_token();
        let _scope_guard = scope.clone().drop_guard();
        let timeout = self.inner.config.timeout;

        let (tx, rx) = oneshot::channel();
        let future = operation(scope, request);
        runtime.spawn(async move {
            // The receiver is gone once the call timed out or was cancelled
            let _ = tx.send(future.await);
        });

        let start = Instant::now();
        let result = tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(BreakerError::Cancelled),
            _ = tokio::time::sleep(timeout) => Err(BreakerError::Timeout(timeout)),
            delivered = rx => match delivered {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => Err(BreakerError::Operation(e)),
                Err(_) => Err(BreakerError::Internal(InternalError::OperationAborted)),
            },
        };

        match &result {
            Err(BreakerError::Timeout(after)) => tracing::debug!(?after, "operation timed out"),
            Err(BreakerError::Cancelled) => tracing::debug!("operation cancelled by caller"),
            Err(BreakerError::Internal(e)) => tracing::warn!(error = %e, "operation aborted"),
            _ => {}
        }

        self.inner.record_outcome(result.is_ok(), start.elapsed());

        result
    }

    /// Forces the circuit breaker to the open state.
    ///
    /// A recovery timer is scheduled as for any other open transition.
    pub fn force_open(&self) -> bool {
        let transition = {
            let mut store = self.inner.store.lock();
            let transition = self.inner.transition(&mut store, State::Open);
            if transition.is_some() {
                recovery::schedule(&self.inner, &mut store);
            }
            transition
        };

        match transition {
            Some(transition) => {
                self.inner.announce(transition);
                true
            }
            None => false,
        }
    }

    /// Forces the circuit breaker to the closed state.
    ///
    /// Any pending recovery timer is cancelled.
    pub fn force_closed(&self) -> bool {
        let transition = {
            let mut store = self.inner.store.lock();
            let transition = self.inner.transition(&mut store, State::Closed);
            if transition.is_some() {
                recovery::cancel(&mut store);
            }
            transition
        };

        match transition {
            Some(transition) => {
                self.inner.announce(transition);
                true
            }
            None => false,
        }
    }

    /// Clears the current observation window without changing state.
    pub fn reset_stats(&self) {
        self.inner.store.lock().window.reset();
    }
}

// Allow cloning of circuit breakers - cheap because inner state is Arc'd
impl<P, E> Clone for CircuitBreaker<P, E>
where
    P: BreakerPolicy,
    E: std::error::Error + Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _error_type: std::marker::PhantomData,
        }
    }
}

impl<P, E> fmt::Debug for CircuitBreaker<P, E>
where
    P: BreakerPolicy,
    E: std::error::Error + Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.current_state())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
