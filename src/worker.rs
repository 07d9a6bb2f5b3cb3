//! Background task lifecycle shared by both transports.
//!
//! A [`Lifecycle`] owns at most one worker task. The task receives a
//! [`CancellationToken`] acting as its stop flag and publishes its state on a
//! [`watch`] channel. Sockets live inside the task, so cancelling the token
//! and letting the task return is what closes them; the control side never
//! touches a socket directly.
//!
//! Every spawned worker gets a generation number. State writes carrying an
//! older generation are dropped, so a worker that is still winding down
//! cannot overwrite the state of the worker that replaced it.
//!
//! [`dispatch_line`] hands each received line to the blocking pool, so a slow
//! handler on one transport never holds up the other.

use std::{
    fmt,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use futures::FutureExt;
use log::{error, warn};
use tokio::{select, sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    command::{CommandProcessor, Source},
    panic::format_panic,
};

struct Worker {
    token: CancellationToken,
    handle: JoinHandle<()>,
    generation: u64,
}

/// State channel plus the generation allowed to write to it.
struct Shared<S> {
    state: watch::Sender<S>,
    generation: AtomicU64,
}

impl<S: PartialEq> Shared<S> {
    /// Publish `state` on behalf of `generation`, notifying subscribers only
    /// when the state changed. Stale generations are ignored.
    fn publish(&self, generation: u64, state: S) {
        self.state.send_if_modified(|current| {
            if self.generation.load(Ordering::Acquire) != generation || *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}

/// Start/stop bookkeeping for one background worker.
pub(crate) struct Lifecycle<S> {
    name: &'static str,
    idle: S,
    worker: Mutex<Option<Worker>>,
    shared: Arc<Shared<S>>,
}

impl<S> Lifecycle<S>
where
    S: Copy + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    /// Create an idle lifecycle. `name` prefixes log messages.
    pub(crate) fn new(name: &'static str, idle: S) -> Self {
        let (state, _) = watch::channel(idle);
        Self {
            name,
            idle,
            worker: Mutex::new(None),
            shared: Arc::new(Shared {
                state,
                generation: AtomicU64::new(0),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` while a worker task exists and has not finished.
    pub(crate) fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    pub(crate) fn state(&self) -> S { *self.shared.state.borrow() }

    pub(crate) fn subscribe(&self) -> watch::Receiver<S> { self.shared.state.subscribe() }

    /// Spawn the worker built by `prepare` unless one is already running.
    ///
    /// `prepare` runs while the lifecycle is locked, so concurrent calls can
    /// never spawn two workers. It receives the stop token and a publisher
    /// for state changes. Returns `Ok(false)` without calling `prepare` when
    /// a worker is already running. The state returns to idle when the
    /// worker finishes for any reason.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `prepare`; nothing is spawned then.
    pub(crate) fn start<F, Fut, E>(&self, prepare: F) -> Result<bool, E>
    where
        F: FnOnce(CancellationToken, StatePublisher<S>) -> Result<Fut, E>,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.lock();
        if slot
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
        {
            warn!("{} is already running.", self.name);
            return Ok(false);
        }

        let token = CancellationToken::new();
        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let publisher = StatePublisher {
            shared: Arc::clone(&self.shared),
            generation,
        };
        let task = prepare(token.clone(), publisher.clone())?;
        let name = self.name;
        let idle = self.idle;
        let handle = tokio::spawn(async move {
            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                let panic_msg = format_panic(panic);
                // Emit via both `log` and `tracing` for tests that capture either.
                error!("{name} worker panicked: panic={panic_msg}");
                tracing::error!(panic = %panic_msg, worker = name, "worker panicked");
            }
            publisher.publish(idle);
        });
        *slot = Some(Worker {
            token,
            handle,
            generation,
        });
        Ok(true)
    }

    /// Cancel the worker and wait up to `limit` for it to exit.
    ///
    /// Publishes `stopping` (when given) before cancelling and the idle state
    /// once the worker is gone, unless a newer worker was started in the
    /// meantime. A worker that overruns `limit` is aborted. Returns `false`
    /// if there was no worker to stop.
    pub(crate) async fn stop(&self, stopping: Option<S>, limit: Duration) -> bool {
        let Some(mut worker) = self.lock().take() else {
            return false;
        };
        if let Some(state) = stopping {
            self.shared.publish(worker.generation, state);
        }
        worker.token.cancel();
        match tokio::time::timeout(limit, &mut worker.handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("{} worker ended abnormally: error={e}", self.name),
            Err(_) => {
                warn!(
                    "{} did not stop within {limit:?}; aborting worker task",
                    self.name
                );
                worker.handle.abort();
            }
        }
        self.shared.publish(worker.generation, self.idle);
        true
    }
}

impl<S> Drop for Lifecycle<S> {
    fn drop(&mut self) {
        let worker = self
            .worker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(worker) = worker.take() {
            worker.token.cancel();
        }
    }
}

impl<S: fmt::Debug + Copy> fmt::Debug for Lifecycle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("name", &self.name)
            .field("state", &*self.shared.state.borrow())
            .finish_non_exhaustive()
    }
}

/// Handle a worker uses to publish its state.
pub(crate) struct StatePublisher<S> {
    shared: Arc<Shared<S>>,
    generation: u64,
}

impl<S> Clone for StatePublisher<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            generation: self.generation,
        }
    }
}

impl<S> fmt::Debug for StatePublisher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatePublisher")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl<S: PartialEq> StatePublisher<S> {
    /// Publish `state`, notifying subscribers only when it changed.
    ///
    /// Has no effect once a newer worker has been started.
    pub(crate) fn publish(&self, state: S) { self.shared.publish(self.generation, state); }
}

/// Run `processor` on `line` in the blocking pool and wait for it.
///
/// Handlers are plain functions that may block, so they never run on a
/// runtime thread the other transport depends on. Lines from one worker are
/// still handled one at a time, in order. Returns `false` if `shutdown`
/// fired first; the handler then finishes in the background.
pub(crate) async fn dispatch_line(
    processor: &Arc<CommandProcessor>,
    line: String,
    source: Source,
    shutdown: &CancellationToken,
) -> bool {
    let processor = Arc::clone(processor);
    let handled = tokio::task::spawn_blocking(move || processor.process(&line, source));
    select! {
        biased;

        () = shutdown.cancelled() => false,
        res = handled => {
            if let Err(e) = res {
                error!("command dispatch failed: source={source}, error={e}");
            }
            true
        }
    }
}

#[cfg(test)]
impl<S> Lifecycle<S> {
    /// Cancel the worker without taking it out of the slot, as if it had
    /// ended on its own.
    pub(crate) fn cancel_in_place(&self) {
        if let Some(worker) = self.worker.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            worker.token.cancel();
        }
    }
}
