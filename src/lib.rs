//! idlescreen - idle activity monitor with an ambient overlay.
//!
//! Watches user input, and after a configurable stretch of inactivity raises
//! an overlay showing a procedurally animated scene together with a clock
//! and a quote. Any further input dismisses the overlay and restarts the
//! countdown.

pub mod activity;
pub mod config;
pub mod console;
pub mod display;
pub mod idle;
pub mod monitor;
pub mod overlay;
pub mod prefs;
pub mod render;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use crate::monitor::{Monitor, MonitorHandle};
pub use crate::overlay::OverlayState;

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
