//! Activity signal source.
//!
//! Raw input from one or more [`InputHost`]s (pointer, keyboard, scroll,
//! touch, click, or the OS idle counter) is collapsed into a single
//! [`ActivityEvent`] and handed to every registered handler. No filtering or
//! debouncing happens here.

mod bus;
mod system;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

pub use bus::InputBus;
pub use system::SystemIdleHost;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::lock;

/// Category of a raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    PointerMove,
    PointerDown,
    KeyPress,
    Scroll,
    Touch,
    Click,
    /// Input reported by the operating system idle counter; category unknown.
    System,
}

impl InputKind {
    /// Every category the source tries to subscribe to.
    pub const ALL: [InputKind; 7] = [
        InputKind::PointerMove,
        InputKind::PointerDown,
        InputKind::KeyPress,
        InputKind::Scroll,
        InputKind::Touch,
        InputKind::Click,
        InputKind::System,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PointerMove => "pointer-move",
            Self::PointerDown => "pointer-down",
            Self::KeyPress => "key-press",
            Self::Scroll => "scroll",
            Self::Touch => "touch",
            Self::Click => "click",
            Self::System => "system",
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single raw input as delivered by a host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawInput {
    pub kind: InputKind,
    /// Pointer position in surface pixels, when the input carries one.
    pub position: Option<(f64, f64)>,
    pub at: Instant,
}

impl RawInput {
    pub fn new(kind: InputKind) -> Self {
        Self {
            kind,
            position: None,
            at: Instant::now(),
        }
    }

    pub fn pointer_move(x: f64, y: f64) -> Self {
        Self {
            kind: InputKind::PointerMove,
            position: Some((x, y)),
            at: Instant::now(),
        }
    }
}

/// Normalized "the user is here" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityEvent {
    pub at: Instant,
}

type InputCallback = dyn Fn(&RawInput) + Send + Sync;

/// Callback registered with an [`InputHost`].
///
/// Identity is the allocation: the same `Listener` (or a clone of it) must be
/// passed to `remove_listener` that was passed to `add_listener`.
#[derive(Clone)]
pub struct Listener(Arc<InputCallback>);

impl Listener {
    pub fn new(callback: impl Fn(&RawInput) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    pub fn call(&self, input: &RawInput) {
        (self.0)(input);
    }

    pub fn same(&self, other: &Listener) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Arc::as_ptr(&self.0))
    }
}

/// Errors raised while registering with an input host.
#[derive(Error, Debug)]
pub enum ActivityError {
    #[error("{host} does not provide {kind} input")]
    Unsupported { host: &'static str, kind: InputKind },

    #[error("Input host unavailable: {0}")]
    HostUnavailable(String),
}

/// Something that produces raw input and lets listeners subscribe per category.
pub trait InputHost: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Subscribe `listener` to inputs of `kind`.
    fn add_listener(&self, kind: InputKind, listener: &Listener) -> Result<(), ActivityError>;

    /// Unsubscribe a listener previously added for `kind`. Unknown listeners are ignored.
    fn remove_listener(&self, kind: InputKind, listener: &Listener);
}

/// Handle returned by [`ActivitySource::on_activity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type ActivityHandler = dyn Fn(ActivityEvent) + Send + Sync;

#[derive(Default)]
struct Handlers {
    next_id: u64,
    entries: Vec<(HandlerId, Arc<ActivityHandler>)>,
}

struct Shared {
    torn_down: AtomicBool,
    handlers: Mutex<Handlers>,
}

impl Shared {
    fn dispatch(&self, input: &RawInput) {
        if self.torn_down.load(Ordering::SeqCst) {
            return;
        }

        // Snapshot so handlers may (un)register without deadlocking.
        let handlers: Vec<Arc<ActivityHandler>> = lock(&self.handlers)
            .entries
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        let event = ActivityEvent { at: input.at };
        for handler in handlers {
            handler(event);
        }
    }
}

/// Fans raw input from every attached host out to activity handlers.
pub struct ActivitySource {
    shared: Arc<Shared>,
    listener: Listener,
    hosts: Vec<Arc<dyn InputHost>>,
    registered: Vec<(usize, InputKind)>,
}

impl ActivitySource {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            torn_down: AtomicBool::new(false),
            handlers: Mutex::new(Handlers::default()),
        });

        let dispatch_to = shared.clone();
        let listener = Listener::new(move |input| dispatch_to.dispatch(input));

        Self {
            shared,
            listener,
            hosts: Vec::new(),
            registered: Vec::new(),
        }
    }

    /// Register a handler invoked once per qualifying raw input.
    pub fn on_activity(&self, handler: impl Fn(ActivityEvent) + Send + Sync + 'static) -> HandlerId {
        let mut handlers = lock(&self.shared.handlers);
        let id = HandlerId(handlers.next_id);
        handlers.next_id += 1;
        handlers.entries.push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn remove_handler(&self, id: HandlerId) -> bool {
        let mut handlers = lock(&self.shared.handlers);
        let before = handlers.entries.len();
        handlers.entries.retain(|(entry, _)| *entry != id);
        handlers.entries.len() != before
    }

    /// Subscribe to every category `host` provides.
    ///
    /// Categories the host rejects are skipped; partial coverage is fine.
    /// Returns the number of categories registered.
    pub fn attach(&mut self, host: Arc<dyn InputHost>) -> usize {
        if self.shared.torn_down.load(Ordering::SeqCst) {
            warn!("Activity source already torn down, not attaching {}", host.name());
            return 0;
        }

        let index = self.hosts.len();
        let mut count = 0;

        for kind in InputKind::ALL {
            match host.add_listener(kind, &self.listener) {
                Ok(()) => {
                    self.registered.push((index, kind));
                    count += 1;
                }
                Err(ActivityError::Unsupported { .. }) => {
                    debug!("{} does not provide {} input", host.name(), kind);
                }
                Err(e) => {
                    warn!("Failed to listen for {} input on {}: {}", kind, host.name(), e);
                }
            }
        }

        if count == 0 {
            warn!("{} provided no usable input categories", host.name());
        } else {
            info!("Listening for activity on {} ({} categories)", host.name(), count);
        }

        self.hosts.push(host);
        count
    }

    /// Categories registered so far, across all hosts.
    pub fn registered_categories(&self) -> Vec<InputKind> {
        self.registered.iter().map(|(_, kind)| *kind).collect()
    }

    /// Unregister from every host. No handler runs after this returns.
    pub fn teardown(&mut self) {
        if self.shared.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }

        for (index, kind) in self.registered.drain(..) {
            self.hosts[index].remove_listener(kind, &self.listener);
        }
        self.hosts.clear();
        lock(&self.shared.handlers).entries.clear();

        debug!("Activity source torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.shared.torn_down.load(Ordering::SeqCst)
    }
}

impl Default for ActivitySource {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ActivitySource {
    fn drop(&mut self) {
        self.teardown();
    }
}
