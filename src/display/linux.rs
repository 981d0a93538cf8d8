//! Monitor enumeration for Linux using X11 RandR.

use anyhow::{Context, Result};
use x11rb::connection::Connection;
use x11rb::protocol::randr::ConnectionExt as RandrConnectionExt;
use x11rb::rust_connection::RustConnection;

use super::MonitorInfo;

pub(super) fn list_monitors() -> Result<Vec<MonitorInfo>> {
    let (conn, screen_num) =
        RustConnection::connect(None).context("Failed to connect to X11 display")?;

    let screen = &conn.setup().roots[screen_num];
    let resources = conn
        .randr_get_screen_resources_current(screen.root)?
        .reply()
        .context("Failed to get screen resources")?;

    let primary_output = conn
        .randr_get_output_primary(screen.root)?
        .reply()
        .ok()
        .map(|reply| reply.output);

    let mut monitors = Vec::new();
    for (idx, crtc) in resources.crtcs.iter().enumerate() {
        let Ok(info) = conn.randr_get_crtc_info(*crtc, 0)?.reply() else {
            continue;
        };
        if info.width == 0 || info.height == 0 {
            continue;
        }

        let is_primary = match primary_output {
            Some(primary) => info.outputs.first() == Some(&primary),
            None => idx == 0,
        };

        monitors.push(MonitorInfo {
            id: *crtc,
            width: info.width as u32,
            height: info.height as u32,
            is_primary,
        });
    }

    // No active CRTCs: report the root window.
    if monitors.is_empty() {
        monitors.push(MonitorInfo {
            id: 0,
            width: screen.width_in_pixels as u32,
            height: screen.height_in_pixels as u32,
            is_primary: true,
        });
    }

    Ok(monitors)
}
