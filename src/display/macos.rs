//! Monitor enumeration for macOS using CoreGraphics.

use anyhow::{anyhow, Result};
use core_graphics::display::CGDisplay;

use super::MonitorInfo;

pub(super) fn list_monitors() -> Result<Vec<MonitorInfo>> {
    let ids = CGDisplay::active_displays()
        .map_err(|e| anyhow!("Failed to list active displays: {:?}", e))?;

    Ok(ids
        .into_iter()
        .map(|id| {
            let display = CGDisplay::new(id);
            MonitorInfo {
                id,
                width: display.pixels_wide() as u32,
                height: display.pixels_high() as u32,
                is_primary: display.is_main(),
            }
        })
        .collect())
}
