//! Input host backed by the operating system idle counter.
//!
//! The OS only tells us how long ago the last input happened, not what kind
//! it was, so this host provides the [`InputKind::System`] category only.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{ActivityError, InputHost, InputKind, Listener, RawInput};
use crate::lock;

#[cfg(target_os = "linux")]
use super::linux as platform;
#[cfg(target_os = "macos")]
use super::macos as platform;
#[cfg(target_os = "windows")]
use super::windows as platform;

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
mod platform {
    use super::ActivityError;
    use std::time::Duration;

    pub(crate) const BACKEND: &str = "unsupported";

    pub(crate) fn probe() -> Result<(), ActivityError> {
        Err(ActivityError::HostUnavailable(
            "no idle counter on this platform".to_string(),
        ))
    }

    pub(crate) fn idle_time() -> Option<Duration> {
        None
    }
}

/// Slack allowed between the idle counter and wall-clock time before a poll
/// is treated as "input happened".
const COUNTER_TOLERANCE: Duration = Duration::from_millis(50);

/// Shared state between the host and its polling thread.
struct PollerState {
    /// Whether a polling thread should be running.
    active: AtomicBool,
    /// Bumped on every start/stop so an old thread can tell it was replaced.
    epoch: AtomicU64,
    listeners: Mutex<Vec<Listener>>,
}

/// Polls the OS idle counter on a background thread.
pub struct SystemIdleHost {
    poll_interval: Duration,
    query: fn() -> Option<Duration>,
    state: Arc<PollerState>,
}

impl SystemIdleHost {
    /// Create a host, verifying the platform idle counter can be read.
    pub fn new(poll_interval: Duration) -> Result<Self, ActivityError> {
        platform::probe()?;
        Ok(Self::with_query(poll_interval, platform::idle_time))
    }

    fn with_query(poll_interval: Duration, query: fn() -> Option<Duration>) -> Self {
        Self {
            poll_interval,
            query,
            state: Arc::new(PollerState {
                active: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    fn ensure_polling(&self) -> Result<(), ActivityError> {
        if self.state.active.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let epoch = self.state.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let state = self.state.clone();
        let query = self.query;
        let interval = self.poll_interval;

        info!("Starting {} idle counter poller every {:?}", platform::BACKEND, interval);

        thread::Builder::new()
            .name("idle-poller".to_string())
            .spawn(move || run_poller(state, epoch, query, interval))
            .map_err(|e| {
                self.state.active.store(false, Ordering::SeqCst);
                ActivityError::HostUnavailable(format!("failed to spawn poller thread: {e}"))
            })?;

        Ok(())
    }

    fn stop_polling(&self) {
        if self.state.active.swap(false, Ordering::SeqCst) {
            self.state.epoch.fetch_add(1, Ordering::SeqCst);
            debug!("Idle counter poller stopped");
        }
    }
}

impl InputHost for SystemIdleHost {
    fn name(&self) -> &'static str {
        platform::BACKEND
    }

    fn add_listener(&self, kind: InputKind, listener: &Listener) -> Result<(), ActivityError> {
        if kind != InputKind::System {
            return Err(ActivityError::Unsupported {
                host: self.name(),
                kind,
            });
        }

        {
            let mut listeners = lock(&self.state.listeners);
            if !listeners.iter().any(|l| l.same(listener)) {
                listeners.push(listener.clone());
            }
        }

        self.ensure_polling()
    }

    fn remove_listener(&self, kind: InputKind, listener: &Listener) {
        if kind != InputKind::System {
            return;
        }

        let now_empty = {
            let mut listeners = lock(&self.state.listeners);
            listeners.retain(|l| !l.same(listener));
            listeners.is_empty()
        };

        if now_empty {
            self.stop_polling();
        }
    }
}

impl Drop for SystemIdleHost {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

/// True when the idle counter grew by noticeably less than the wall-clock
/// time between two polls, meaning it was reset by input in between.
fn input_observed(previous: Duration, current: Duration, elapsed: Duration) -> bool {
    current + COUNTER_TOLERANCE < previous + elapsed
}

fn run_poller(
    state: Arc<PollerState>,
    epoch: u64,
    query: fn() -> Option<Duration>,
    interval: Duration,
) {
    let mut last: Option<(Duration, Instant)> = None;

    while state.epoch.load(Ordering::SeqCst) == epoch {
        thread::sleep(interval);
        if state.epoch.load(Ordering::SeqCst) != epoch {
            break;
        }

        let Some(idle) = query() else {
            warn!("Failed to query {} idle time", platform::BACKEND);
            continue;
        };
        let polled_at = Instant::now();

        if let Some((previous, previous_at)) = last {
            if input_observed(previous, idle, polled_at - previous_at) {
                let listeners: Vec<Listener> = lock(&state.listeners).clone();
                let input = RawInput::new(InputKind::System);
                for listener in &listeners {
                    listener.call(&input);
                }
            }
        }
        last = Some((idle, polled_at));
    }

    debug!("Idle poller thread exiting");
}
