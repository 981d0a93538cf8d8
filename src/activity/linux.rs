//! Linux idle counter via the X11 XScreenSaver extension.

use std::time::Duration;
use x11rb::connection::Connection;
use x11rb::protocol::screensaver::ConnectionExt as ScreensaverConnectionExt;
use x11rb::rust_connection::RustConnection;

use super::ActivityError;

pub(crate) const BACKEND: &str = "x11-screensaver";

/// Check that an X display is reachable and exposes XScreenSaver.
pub(crate) fn probe() -> Result<(), ActivityError> {
    let (conn, screen_num) = RustConnection::connect(None).map_err(|e| {
        ActivityError::HostUnavailable(format!("failed to connect to X11 display (is DISPLAY set?): {e}"))
    })?;

    let screen = &conn.setup().roots[screen_num];
    conn.screensaver_query_info(screen.root)
        .map_err(|e| ActivityError::HostUnavailable(format!("XScreenSaver extension not available: {e}")))?
        .reply()
        .map_err(|e| ActivityError::HostUnavailable(format!("XScreenSaver query failed: {e}")))?;

    Ok(())
}

/// Time since the last user input seen by the X server.
pub(crate) fn idle_time() -> Option<Duration> {
    let (conn, screen_num) = RustConnection::connect(None).ok()?;
    let screen = &conn.setup().roots[screen_num];

    let reply = conn
        .screensaver_query_info(screen.root)
        .ok()?
        .reply()
        .ok()?;

    Some(Duration::from_millis(reply.ms_since_user_input as u64))
}
