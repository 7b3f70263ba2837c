//! One-shot recovery timer moving an open circuit to half-open.
//!
//! Every transition starts a new period, identified by the store's generation
//! counter. The timer spawned for an open period only applies the half-open
//! transition if the circuit is still open in that same period, so a forced
//! transition or a newer open period always wins.
//!
//! The timer is only the eager path. The admission gate promotes an open
//! circuit whose cooldown has elapsed on its own, which covers open periods
//! entered without a runtime and timers lost when their runtime shut down.

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::breaker::{BreakerInner, Store};
use crate::policy::BreakerPolicy;
use crate::state::State;

/// Schedules the recovery timer for the open period that just started.
///
/// Must be called with the store lock held, right after the transition to open.
pub(crate) fn schedule<P: BreakerPolicy>(inner: &Arc<BreakerInner<P>>, store: &mut Store) {
    if let Some(previous) = store.recovery.take() {
        tracing::trace!("superseding pending recovery timer");
        previous.abort();
    }

    let generation = store.generation;
    let delay = inner.config.recover_timeout;

    let handle = match Handle::try_current() {
        Ok(handle) => handle,
        Err(_) => {
            tracing::debug!(generation, "no tokio runtime, recovery deferred to admission");
            return;
        }
    };

    let breaker = Arc::downgrade(inner);
    let task = handle.spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(inner) = breaker.upgrade() {
            complete(&inner, generation);
        }
    });

    tracing::debug!(generation, ?delay, "recovery timer scheduled");
    store.recovery = Some(task.abort_handle());
}

/// Cancels the pending recovery timer, if any.
///
/// Must be called with the store lock held.
pub(crate) fn cancel(store: &mut Store) {
    if let Some(timer) = store.recovery.take() {
        tracing::trace!(generation = store.generation, "recovery timer cancelled");
        timer.abort();
    }
}

fn complete<P: BreakerPolicy>(inner: &BreakerInner<P>, generation: u64) {
    let transition = {
        let mut store = inner.store.lock();
        if store.generation != generation || inner.state_manager.current() != State::Open {
            tracing::trace!(generation, "recovery timer superseded");
            return;
        }

        store.recovery = None;
        inner.transition(&mut store, State::HalfOpen)
    };

    if let Some(transition) = transition {
        inner.announce(transition);
    }
}
