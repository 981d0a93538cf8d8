//! Event loop tying the activity source, idle timer and overlay together.
//!
//! Every input, expiry and external request becomes a [`Command`] on one
//! queue, and the monitor task handles them one at a time. Deactivation and
//! timer restart for a given input therefore happen together, and an expiry
//! that was queued before a restart is recognised as stale and dropped.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::activity::{ActivityEvent, ActivitySource, InputHost};
use crate::idle::{Expiry, IdleTimer};
use crate::overlay::{ClockReading, Overlay, OverlayState};

#[derive(Debug)]
pub enum Command {
    Activity(ActivityEvent),
    Expired(Expiry),
    /// Manual reset requested by a consumer.
    ResetTimer,
    Dismiss,
    SetTimeout(Duration),
    Shutdown,
}

pub struct Monitor {
    overlay: Overlay,
    timer: IdleTimer,
    source: ActivitySource,
    tx: mpsc::UnboundedSender<Command>,
    rx: mpsc::UnboundedReceiver<Command>,
}

impl Monitor {
    pub fn new(timeout: Duration, overlay: Overlay) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let source = ActivitySource::new();
        let activity_tx = tx.clone();
        source.on_activity(move |event| {
            let _ = activity_tx.send(Command::Activity(event));
        });

        let timer = IdleTimer::new(timeout);
        let expiry_tx = tx.clone();
        timer.on_expire(move |expiry| {
            let _ = expiry_tx.send(Command::Expired(expiry));
        });

        Self {
            overlay,
            timer,
            source,
            tx,
            rx,
        }
    }

    /// Listen for activity on `host`. Returns the number of input categories
    /// it provides.
    pub fn attach_host(&mut self, host: Arc<dyn InputHost>) -> usize {
        self.overlay.add_input_host(host.clone());
        self.source.attach(host)
    }

    pub fn handle(&self) -> MonitorHandle {
        MonitorHandle {
            tx: self.tx.clone(),
            state: self.overlay.subscribe(),
            clock: self.overlay.subscribe_clock(),
        }
    }

    /// Run on a new task.
    pub fn spawn(self) -> (MonitorHandle, JoinHandle<()>) {
        let handle = self.handle();
        (handle, tokio::spawn(self.run()))
    }

    /// Start the idle countdown and process commands until shutdown.
    pub async fn run(mut self) {
        self.timer.start();
        info!(
            "Idle monitor running with {:?} timeout on {} input categories",
            self.timer.timeout(),
            self.source.registered_categories().len()
        );

        while let Some(command) = self.rx.recv().await {
            if !self.handle_command(command) {
                break;
            }
        }

        self.timer.cancel();
        self.overlay.deactivate();
        self.overlay.flush_snapshot().await;
        self.source.teardown();
        info!(
            "Idle monitor stopped after {} activations",
            self.overlay.activations()
        );
    }

    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Activity(_) => self.restart("activity"),
            Command::ResetTimer => self.restart("manual reset"),
            Command::Dismiss => self.restart("dismiss"),
            Command::Expired(expiry) => {
                if self.timer.is_current(&expiry) {
                    self.overlay.activate(&expiry);
                } else {
                    trace!("Dropping stale expiry {}", expiry.generation());
                }
            }
            Command::SetTimeout(timeout) => {
                info!("Idle timeout set to {:?}, applies from the next restart", timeout);
                self.timer.set_timeout(timeout);
            }
            Command::Shutdown => return false,
        }
        true
    }

    /// Deactivate and restart the countdown as one step.
    fn restart(&mut self, reason: &str) {
        self.timer.cancel();
        if self.overlay.deactivate() {
            debug!("Overlay dismissed by {}", reason);
        }
        self.timer.start();
    }
}

/// Cloneable handle to a running [`Monitor`].
#[derive(Clone)]
pub struct MonitorHandle {
    tx: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<OverlayState>,
    clock: watch::Receiver<Option<ClockReading>>,
}

impl MonitorHandle {
    pub fn state(&self) -> OverlayState {
        *self.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Receiver notified on every state change.
    pub fn watch_state(&self) -> watch::Receiver<OverlayState> {
        self.state.clone()
    }

    /// Receiver for clock panel refreshes; `None` while inactive.
    pub fn watch_clock(&self) -> watch::Receiver<Option<ClockReading>> {
        self.clock.clone()
    }

    pub fn reset_timer(&self) {
        self.send(Command::ResetTimer);
    }

    pub fn dismiss(&self) {
        self.send(Command::Dismiss);
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.send(Command::SetTimeout(timeout));
    }

    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            debug!("Idle monitor already stopped");
        }
    }
}
