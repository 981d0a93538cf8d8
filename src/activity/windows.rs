//! Windows idle counter via GetLastInputInfo.

use std::time::Duration;
use windows::Win32::System::SystemInformation::GetTickCount;
use windows::Win32::UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO};

use super::ActivityError;

pub(crate) const BACKEND: &str = "win32-last-input";

pub(crate) fn probe() -> Result<(), ActivityError> {
    idle_time()
        .map(|_| ())
        .ok_or_else(|| ActivityError::HostUnavailable("GetLastInputInfo failed".to_string()))
}

pub(crate) fn idle_time() -> Option<Duration> {
    let mut last_input = LASTINPUTINFO {
        cbSize: std::mem::size_of::<LASTINPUTINFO>() as u32,
        dwTime: 0,
    };

    // SAFETY: last_input is a properly sized LASTINPUTINFO owned by this frame.
    let ok = unsafe { GetLastInputInfo(&mut last_input).as_bool() };
    if !ok {
        return None;
    }

    // Tick count wraps after ~49 days; wrapping_sub keeps the difference right.
    let now = unsafe { GetTickCount() };
    Some(Duration::from_millis(now.wrapping_sub(last_input.dwTime) as u64))
}
