//! Primary monitor size for Windows.

use anyhow::{bail, Result};
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

use super::MonitorInfo;

pub(super) fn list_monitors() -> Result<Vec<MonitorInfo>> {
    let (width, height) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
    if width <= 0 || height <= 0 {
        bail!("GetSystemMetrics reported no primary screen");
    }

    Ok(vec![MonitorInfo {
        id: 0,
        width: width as u32,
        height: height as u32,
        is_primary: true,
    }])
}
