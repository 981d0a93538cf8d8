//! Clock/quote panel refreshed once per second while the overlay is active.

use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

pub const TITLE: &str = "Idle Screen";
pub const HINT: &str = "Press any key or click to continue";

const REFRESH: Duration = Duration::from_secs(1);

/// What the panel shows at one refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockReading {
    /// 12-hour time, e.g. `03:07:09 PM`.
    pub time: String,
    /// e.g. `Sunday, October 18, 2026`.
    pub date: String,
    /// IANA zone name, e.g. `Europe/Berlin`, or the UTC offset
    /// (`UTC+02:00`) when the host does not report one.
    pub zone: String,
    pub quote: String,
    /// Refreshes since activation, starting at 0.
    pub tick: u64,
}

impl ClockReading {
    pub fn at<Tz>(now: &DateTime<Tz>, quote: &str, tick: u64) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        Self {
            time: now.format("%I:%M:%S %p").to_string(),
            date: now.format("%A, %B %-d, %Y").to_string(),
            zone: now.format("UTC%:z").to_string(),
            quote: quote.to_string(),
            tick,
        }
    }

    /// The panel as it reads top to bottom.
    pub fn panel_lines(&self) -> [String; 5] {
        [
            TITLE.to_string(),
            self.time.clone(),
            format!("{} ({})", self.date, self.zone),
            format!("\"{}\" - {}", self.quote, super::quotes::ATTRIBUTION),
            HINT.to_string(),
        ]
    }

    /// Replace the offset label with a zone name, if there is one.
    pub fn with_zone(mut self, zone: Option<&str>) -> Self {
        if let Some(zone) = zone {
            self.zone = zone.to_string();
        }
        self
    }
}

/// IANA name of the local time zone.
pub fn local_zone_name() -> Option<String> {
    match iana_time_zone::get_timezone() {
        Ok(name) => Some(name),
        Err(e) => {
            debug!("Local time zone name unavailable, showing UTC offset: {}", e);
            None
        }
    }
}

/// Publishes a [`ClockReading`] every second between `start` and `stop`.
pub struct ClockPanel {
    tx: Arc<watch::Sender<Option<ClockReading>>>,
    task: Option<JoinHandle<()>>,
}

impl ClockPanel {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            task: None,
        }
    }

    /// Start refreshing with `quote`. Restarts if already running.
    pub fn start(&mut self, quote: String) {
        self.stop();

        let tx = self.tx.clone();
        let zone = local_zone_name();
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval(REFRESH);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let mut tick = 0;
            loop {
                ticker.tick().await;
                let reading = ClockReading::at(&Local::now(), &quote, tick).with_zone(zone.as_deref());
                trace!("Clock refresh {}: {}", tick, reading.time);
                tx.send_replace(Some(reading));
                tick += 1;
            }
        }));
        debug!("Clock panel started");
    }

    /// Stop refreshing and clear the reading. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Clock panel stopped");
        }
        self.tx.send_replace(None);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ClockReading>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Option<ClockReading> {
        self.tx.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

impl Default for ClockPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ClockPanel {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};
    use tokio::time::advance;

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_reading_format() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 15, 7, 9).unwrap();
        let reading = ClockReading::at(&now, "quote", 3);

        assert_eq!(reading.time, "03:07:09 PM");
        assert_eq!(reading.date, "Sunday, October 18, 2026");
        assert_eq!(reading.zone, "UTC+00:00");
        assert_eq!(reading.tick, 3);
    }

    #[test]
    fn test_reading_zone_offset() {
        let zone = FixedOffset::west_opt(5 * 3600 + 30 * 60).unwrap();
        let now = zone.with_ymd_and_hms(2026, 1, 2, 0, 5, 0).unwrap();
        let reading = ClockReading::at(&now, "", 0);

        assert_eq!(reading.time, "12:05:00 AM");
        assert_eq!(reading.date, "Friday, January 2, 2026");
        assert_eq!(reading.zone, "UTC-05:30");
    }

    #[test]
    fn test_panel_lines() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();
        let lines = ClockReading::at(&now, "Ship it.", 0).panel_lines();

        assert_eq!(lines[0], TITLE);
        assert_eq!(lines[1], "09:00:00 AM");
        assert_eq!(lines[2], "Sunday, October 18, 2026 (UTC+00:00)");
        assert_eq!(lines[3], "\"Ship it.\" - Developer Wisdom");
        assert_eq!(lines[4], HINT);
    }

    #[test]
    fn test_zone_name_replaces_offset() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 15, 7, 9).unwrap();

        let named = ClockReading::at(&now, "", 0).with_zone(Some("Europe/Lisbon"));
        assert_eq!(named.zone, "Europe/Lisbon");

        let unnamed = ClockReading::at(&now, "", 0).with_zone(None);
        assert_eq!(unnamed.zone, "UTC+00:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_panel_shows_local_zone() {
        let mut panel = ClockPanel::new();
        panel.start(String::new());
        settle().await;

        let zone = panel.current().unwrap().zone;
        match iana_time_zone::get_timezone() {
            Ok(name) => assert_eq!(zone, name),
            Err(_) => assert!(zone.starts_with("UTC")),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_every_second_until_stopped() {
        let mut panel = ClockPanel::new();
        assert!(panel.current().is_none());

        panel.start("Stay curious.".to_string());
        settle().await;
        let first = panel.current().unwrap();
        assert_eq!(first.tick, 0);
        assert_eq!(first.quote, "Stay curious.");

        advance(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(panel.current().unwrap().tick, 1);

        panel.stop();
        panel.stop();
        assert!(panel.current().is_none());
        assert!(!panel.is_running());

        advance(Duration::from_secs(3)).await;
        settle().await;
        assert!(panel.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_resets_tick() {
        let mut panel = ClockPanel::new();
        let mut rx = panel.subscribe();
        panel.start("a".to_string());
        advance(Duration::from_secs(2)).await;
        settle().await;

        panel.start("b".to_string());
        settle().await;
        let reading = rx.borrow_and_update().clone().unwrap();
        assert_eq!(reading.tick, 0);
        assert_eq!(reading.quote, "b");
    }
}
