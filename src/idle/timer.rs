//! Restartable idle countdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

use crate::lock;

/// Proof that a scheduled countdown ran to completion.
///
/// Only [`IdleTimer`] can produce one. Consumers that activate something on
/// expiry take `&Expiry`, so activation cannot be triggered from anywhere
/// else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    generation: u64,
    timeout: Duration,
}

impl Expiry {
    /// Generation of the countdown that produced this expiry.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Timeout the countdown was scheduled with.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[cfg(test)]
    pub(crate) fn for_test(generation: u64) -> Self {
        Self {
            generation,
            timeout: Duration::ZERO,
        }
    }
}

/// A pending countdown. Dropping it does not cancel it; use [`IdleTimer::cancel`].
#[derive(Debug)]
pub struct TimerHandle {
    generation: u64,
    deadline: Instant,
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

type ExpireHandler = dyn Fn(Expiry) + Send + Sync;

/// Restartable countdown firing [`Expiry`] notifications.
///
/// At most one countdown is pending at a time: every start cancels the
/// previous one first. Each countdown carries a generation number; a
/// countdown whose generation is no longer current never notifies.
pub struct IdleTimer {
    timeout: Duration,
    generation: Arc<AtomicU64>,
    pending: Option<TimerHandle>,
    handlers: Arc<Mutex<Vec<Arc<ExpireHandler>>>>,
}

impl IdleTimer {
    /// Create a stopped timer. Any timeout is accepted, including very small ones.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            generation: Arc::new(AtomicU64::new(0)),
            pending: None,
            handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Change the timeout. A countdown that is already pending keeps its deadline.
    pub fn set_timeout(&mut self, timeout: Duration) {
        if timeout != self.timeout {
            debug!("Idle timeout changed from {:?} to {:?}", self.timeout, timeout);
        }
        self.timeout = timeout;
    }

    /// Register a handler called once per expiration.
    pub fn on_expire(&self, handler: impl Fn(Expiry) + Send + Sync + 'static) {
        lock(&self.handlers).push(Arc::new(handler));
    }

    /// Cancel any pending countdown and schedule a new one.
    ///
    /// Must be called from within a tokio runtime. Returns the generation of
    /// the new countdown.
    pub fn start(&mut self) -> u64 {
        self.cancel();

        let generation = self.generation.load(Ordering::SeqCst);
        let timeout = self.timeout;
        let deadline = Instant::now() + timeout;

        let current = self.generation.clone();
        let handlers = self.handlers.clone();
        let task = tokio::spawn(async move {
            sleep_until(deadline).await;

            if current.load(Ordering::SeqCst) != generation {
                trace!("Countdown {} superseded before firing", generation);
                return;
            }

            let snapshot: Vec<Arc<ExpireHandler>> = lock(&handlers).clone();
            let expiry = Expiry { generation, timeout };
            debug!("Idle countdown {} expired after {:?}", generation, timeout);
            for handler in snapshot {
                handler(expiry);
            }
        });

        debug!("Scheduled idle countdown {} in {:?}", generation, timeout);
        self.pending = Some(TimerHandle {
            generation,
            deadline,
            task,
        });
        generation
    }

    /// Alias of [`IdleTimer::start`].
    pub fn restart(&mut self) -> u64 {
        self.start()
    }

    /// Cancel the pending countdown, if any, without scheduling another.
    pub fn cancel(&mut self) {
        // Bumping the generation first invalidates an expiry that already
        // fired but has not been consumed yet.
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.pending.take() {
            handle.task.abort();
            trace!("Cancelled idle countdown {}", handle.generation);
        }
    }

    /// Whether a countdown is scheduled and has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
    }

    /// The pending countdown, if any.
    pub fn pending(&self) -> Option<&TimerHandle> {
        self.pending.as_ref()
    }

    /// Whether `expiry` belongs to the most recent countdown and nothing has
    /// cancelled or restarted the timer since.
    pub fn is_current(&self, expiry: &Expiry) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| handle.generation == expiry.generation)
            && self.generation.load(Ordering::SeqCst) == expiry.generation
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
