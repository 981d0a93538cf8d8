//! Display geometry used to size the overlay surface.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

use anyhow::Result;
use tracing::{debug, warn};

/// Information about a monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    pub is_primary: bool,
}

/// List the monitors attached to this machine.
pub fn list_monitors() -> Result<Vec<MonitorInfo>> {
    #[cfg(target_os = "linux")]
    return linux::list_monitors();
    #[cfg(target_os = "macos")]
    return macos::list_monitors();
    #[cfg(target_os = "windows")]
    return windows::list_monitors();
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    return Ok(Vec::new());
}

/// The primary monitor out of `monitors`, else the first one.
pub fn primary(monitors: &[MonitorInfo]) -> Option<&MonitorInfo> {
    monitors
        .iter()
        .find(|m| m.is_primary)
        .or_else(|| monitors.first())
}

/// Source of the overlay's pixel size, read at every activation.
pub trait Viewport: Send + Sync {
    fn size(&self) -> (u32, u32);
}

/// Viewport with a constant size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedViewport {
    pub width: u32,
    pub height: u32,
}

impl FixedViewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Viewport for FixedViewport {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Viewport following the primary monitor, falling back to a fixed size
/// when no display can be queried.
#[derive(Debug, Clone, Copy)]
pub struct DisplayViewport {
    fallback: FixedViewport,
}

impl DisplayViewport {
    pub fn new(fallback_width: u32, fallback_height: u32) -> Self {
        Self {
            fallback: FixedViewport::new(fallback_width, fallback_height),
        }
    }
}

impl Viewport for DisplayViewport {
    fn size(&self) -> (u32, u32) {
        match list_monitors() {
            Ok(monitors) => match primary(&monitors) {
                Some(m) if m.width > 0 && m.height > 0 => {
                    debug!("Viewport follows monitor {} ({}x{})", m.id, m.width, m.height);
                    (m.width, m.height)
                }
                _ => self.fallback.size(),
            },
            Err(e) => {
                warn!("Failed to query displays, using fallback size: {:#}", e);
                self.fallback.size()
            }
        }
    }
}
