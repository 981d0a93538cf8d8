//! Configuration loading from TOML files and environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::render::Color;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub idle: IdleConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub preferences: PreferencesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Idle timeout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleConfig {
    /// Inactivity before the overlay activates, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl IdleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Overlay rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Frames per second of the ambient animation.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    /// Surface size used when no display can be queried.
    #[serde(default = "default_fallback_width")]
    pub fallback_width: u32,
    #[serde(default = "default_fallback_height")]
    pub fallback_height: u32,
    /// Background colour as `#rrggbb`.
    #[serde(default = "default_background")]
    pub background: String,
    /// Directory for the last frame of each activation.
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
    /// Replacement quote pool.
    #[serde(default)]
    pub quotes: Option<Vec<String>>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            fallback_width: default_fallback_width(),
            fallback_height: default_fallback_height(),
            background: default_background(),
            snapshot_dir: None,
            quotes: None,
        }
    }
}

impl OverlayConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate.max(1) as f64)
    }

    pub fn background_color(&self) -> Option<Color> {
        Color::parse_hex(&self.background)
    }
}

/// Input source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Read console commands from stdin.
    #[serde(default = "default_true")]
    pub stdin: bool,
    /// Watch the operating system idle counter.
    #[serde(default = "default_true")]
    pub system: bool,
    /// Idle counter poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            stdin: true,
            system: true,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl InputConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Preferences store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferencesConfig {
    /// JSON file holding user preferences.
    #[serde(default = "default_preferences_path")]
    pub path: PathBuf,
    /// How often the file is re-read, in milliseconds.
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            path: default_preferences_path(),
            watch_interval_ms: default_watch_interval_ms(),
        }
    }
}

impl PreferencesConfig {
    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value functions
fn default_timeout_ms() -> u64 {
    60_000
}

fn default_frame_rate() -> u32 {
    60
}

fn default_fallback_width() -> u32 {
    1920
}

fn default_fallback_height() -> u32 {
    1080
}

fn default_background() -> String {
    "#0b0f14".to_string()
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_preferences_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("idlescreen").join("preferences.json"))
        .unwrap_or_else(|| PathBuf::from(".idlescreen/preferences.json"))
}

fn default_watch_interval_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            Self::from_file(path)?
        } else {
            let default_paths = [
                PathBuf::from("config/default.toml"),
                dirs::config_dir()
                    .map(|d| d.join("idlescreen/config.toml"))
                    .unwrap_or_default(),
            ];

            let mut loaded = None;
            for path in &default_paths {
                if path.is_file() {
                    loaded = Some(Self::from_file(path)?);
                    break;
                }
            }
            loaded.unwrap_or_default()
        };

        config.apply_env_overrides();

        config.preferences.path = expand_tilde(&config.preferences.path);
        if let Some(dir) = &config.overlay.snapshot_dir {
            config.overlay.snapshot_dir = Some(expand_tilde(dir));
        }

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("IDLESCREEN_TIMEOUT_MS") {
            if let Ok(v) = val.parse() {
                self.idle.timeout_ms = v;
            }
        }
        if let Ok(val) = std::env::var("IDLESCREEN_FRAME_RATE") {
            if let Ok(v) = val.parse() {
                self.overlay.frame_rate = v;
            }
        }
        if let Ok(val) = std::env::var("IDLESCREEN_SNAPSHOT_DIR") {
            self.overlay.snapshot_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("IDLESCREEN_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.idle.timeout_ms == 0 {
            anyhow::bail!("Idle timeout must be greater than 0");
        }
        if !(1..=240).contains(&self.overlay.frame_rate) {
            anyhow::bail!("Frame rate must be between 1 and 240");
        }
        if self.overlay.fallback_width == 0 || self.overlay.fallback_height == 0 {
            anyhow::bail!("Fallback surface size must be non-zero");
        }
        if self.overlay.background_color().is_none() {
            anyhow::bail!(
                "Background colour must look like #rrggbb, got {:?}",
                self.overlay.background
            );
        }
        if self.input.poll_interval_ms == 0 {
            anyhow::bail!("Idle counter poll interval must be greater than 0");
        }
        if self.preferences.watch_interval_ms == 0 {
            anyhow::bail!("Preferences watch interval must be greater than 0");
        }
        Ok(())
    }
}

/// Expand ~ to home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
