//! Idle timeout scheduling.

mod timer;

pub use timer::{Expiry, IdleTimer, TimerHandle};

use std::time::Duration;

/// Timeout used when nothing else is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(60_000);
