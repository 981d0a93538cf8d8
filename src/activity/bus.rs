//! In-process input host.

use std::sync::Mutex;
use tracing::trace;

use super::{ActivityError, InputHost, InputKind, Listener, RawInput};
use crate::lock;

/// Input host fed programmatically through [`InputBus::emit`].
///
/// The console reader and the tests drive the monitor through this.
pub struct InputBus {
    supported: Vec<InputKind>,
    listeners: Mutex<Vec<(InputKind, Listener)>>,
}

impl InputBus {
    /// A bus providing every input category.
    pub fn new() -> Self {
        Self::with_kinds(&InputKind::ALL)
    }

    /// A bus providing only `kinds`.
    pub fn with_kinds(kinds: &[InputKind]) -> Self {
        Self {
            supported: kinds.to_vec(),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Deliver `input` to every listener subscribed to its kind.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit(&self, input: RawInput) -> usize {
        let targets: Vec<Listener> = lock(&self.listeners)
            .iter()
            .filter(|(kind, _)| *kind == input.kind)
            .map(|(_, listener)| listener.clone())
            .collect();

        trace!("Emitting {} input to {} listener(s)", input.kind, targets.len());

        for listener in &targets {
            listener.call(&input);
        }
        targets.len()
    }

    /// Number of live (kind, listener) registrations.
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }
}

impl Default for InputBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InputHost for InputBus {
    fn name(&self) -> &'static str {
        "input-bus"
    }

    fn add_listener(&self, kind: InputKind, listener: &Listener) -> Result<(), ActivityError> {
        if !self.supported.contains(&kind) {
            return Err(ActivityError::Unsupported {
                host: self.name(),
                kind,
            });
        }

        let mut listeners = lock(&self.listeners);
        let duplicate = listeners
            .iter()
            .any(|(existing, l)| *existing == kind && l.same(listener));
        if !duplicate {
            listeners.push((kind, listener.clone()));
        }
        Ok(())
    }

    fn remove_listener(&self, kind: InputKind, listener: &Listener) {
        lock(&self.listeners).retain(|(existing, l)| !(*existing == kind && l.same(listener)));
    }
}
