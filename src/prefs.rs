//! User preferences kept in a small key-value store.
//!
//! The daemon only consumes `screensaverTimeout`; the other fields are
//! carried so that a preferences file written by other tools round-trips.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Store key holding the serialized [`UserPreferences`].
pub const PREFERENCES_KEY: &str = "idlescreen-preferences";

#[derive(Error, Debug)]
pub enum PrefsError {
    #[error("Failed to access preferences file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode preferences: {0}")]
    Json(#[from] serde_json::Error),
}

/// Minimal key-value store for JSON values.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), PrefsError>;
    fn remove(&mut self, key: &str) -> Result<(), PrefsError>;
}

/// In-memory store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), PrefsError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PrefsError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store persisted as one JSON object on disk.
///
/// A missing file reads as empty. An unreadable or corrupt file is logged
/// and also reads as empty; it is overwritten on the next write.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = read_entries(&path);
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file from disk.
    pub fn reload(&mut self) {
        self.entries = read_entries(&self.path);
    }

    fn flush(&self) -> Result<(), PrefsError> {
        let io_err = |source| PrefsError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, content).map_err(io_err)?;
        debug!("Wrote preferences to {}", self.path.display());
        Ok(())
    }
}

fn read_entries(path: &Path) -> Map<String, Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Map::new(),
        Err(e) => {
            warn!("Failed to read preferences file {}: {}", path.display(), e);
            return Map::new();
        }
    };

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(entries)) => entries,
        Ok(_) => {
            warn!("Preferences file {} is not a JSON object, ignoring it", path.display());
            Map::new()
        }
        Err(e) => {
            warn!("Preferences file {} is corrupt, ignoring it: {}", path.display(), e);
            Map::new()
        }
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), PrefsError> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), PrefsError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserPreferences {
    pub theme: Theme,
    /// Milliseconds.
    pub screensaver_timeout: u64,
    /// 0-100.
    pub mouse_sensitivity: u8,
    pub enable_wake_lock: bool,
    pub enable_keyboard_shortcuts: bool,
    /// Milliseconds.
    pub auto_save_interval: u64,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            screensaver_timeout: 60_000,
            mouse_sensitivity: 50,
            enable_wake_lock: false,
            enable_keyboard_shortcuts: true,
            auto_save_interval: 5_000,
        }
    }
}

impl UserPreferences {
    pub fn screensaver_timeout(&self) -> Duration {
        Duration::from_millis(self.screensaver_timeout)
    }
}

/// Stored preferences merged over the defaults.
pub fn load_preferences(store: &dyn PreferenceStore) -> UserPreferences {
    let Some(value) = store.get(PREFERENCES_KEY) else {
        return UserPreferences::default();
    };

    match serde_json::from_value(value) {
        Ok(prefs) => prefs,
        Err(e) => {
            warn!("Failed to decode stored preferences, using defaults: {}", e);
            UserPreferences::default()
        }
    }
}

pub fn save_preferences(
    store: &mut dyn PreferenceStore,
    prefs: &UserPreferences,
) -> Result<(), PrefsError> {
    store.set(PREFERENCES_KEY, serde_json::to_value(prefs)?)
}

/// Forget stored preferences; subsequent loads return the defaults.
pub fn reset_preferences(store: &mut dyn PreferenceStore) -> Result<(), PrefsError> {
    store.remove(PREFERENCES_KEY)
}

/// Timeout the user explicitly stored, if any.
pub fn stored_timeout(store: &dyn PreferenceStore) -> Option<Duration> {
    store
        .get(PREFERENCES_KEY)?
        .get("screensaverTimeout")?
        .as_u64()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

/// Re-read the preferences file every `interval` and report timeout changes.
///
/// `current` is the timeout in effect when the watch starts.
pub fn spawn_timeout_watch(
    path: PathBuf,
    interval: Duration,
    current: Option<Duration>,
    on_change: impl Fn(Duration) + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        let mut last = current;
        loop {
            ticker.tick().await;
            let store = JsonFileStore::open(&path);
            if let Some(timeout) = stored_timeout(&store) {
                if last != Some(timeout) {
                    info!("Preferences timeout changed to {:?}", timeout);
                    on_change(timeout);
                    last = Some(timeout);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_missing_preferences_are_defaults() {
        let store = MemoryStore::new();
        assert_eq!(load_preferences(&store), UserPreferences::default());
        assert_eq!(stored_timeout(&store), None);
    }

    #[test]
    fn test_stored_fields_merge_over_defaults() {
        let mut store = MemoryStore::new();
        store
            .set(PREFERENCES_KEY, json!({ "screensaverTimeout": 15000, "theme": "dark" }))
            .unwrap();

        let prefs = load_preferences(&store);
        assert_eq!(prefs.screensaver_timeout, 15_000);
        assert_eq!(prefs.theme, Theme::Dark);
        assert_eq!(prefs.mouse_sensitivity, 50);
        assert!(prefs.enable_keyboard_shortcuts);
        assert_eq!(stored_timeout(&store), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_undecodable_preferences_fall_back() {
        let mut store = MemoryStore::new();
        store
            .set(PREFERENCES_KEY, json!({ "screensaverTimeout": "soon" }))
            .unwrap();

        assert_eq!(load_preferences(&store), UserPreferences::default());
        assert_eq!(stored_timeout(&store), None);
    }

    #[test]
    fn test_file_store_round_trip_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("preferences.json");

        let mut store = JsonFileStore::open(&path);
        let prefs = UserPreferences {
            screensaver_timeout: 30_000,
            ..UserPreferences::default()
        };
        tokio_test::assert_ok!(save_preferences(&mut store, &prefs));

        let reopened = JsonFileStore::open(&path);
        assert_eq!(load_preferences(&reopened), prefs);
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[PREFERENCES_KEY]["screensaverTimeout"], json!(30000));

        let mut store = reopened;
        reset_preferences(&mut store).unwrap();
        assert_eq!(stored_timeout(&JsonFileStore::open(&path)), None);
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonFileStore::open(&path);
        assert_eq!(store.get(PREFERENCES_KEY), None);
        assert_eq!(load_preferences(&store), UserPreferences::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_reports_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let task = spawn_timeout_watch(path.clone(), Duration::from_secs(1), None, move |d| {
            sink.lock().unwrap().push(d)
        });

        let mut store = JsonFileStore::open(&path);
        store
            .set(PREFERENCES_KEY, json!({ "screensaverTimeout": 2000 }))
            .unwrap();

        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(1)).await;
            for _ in 0..5 {
                tokio::task::yield_now().await;
            }
        }
        task.abort();

        assert_eq!(*seen.lock().unwrap(), vec![Duration::from_secs(2)]);
    }
}
