//! Configuration loaded from `config.toml`.
//!
//! | Purpose | Default | Override |
//! |---------|---------|----------|
//! | Config file | `dirs::config_dir()/taskminder/config.toml` | `TASKMINDER_CONFIG_DIR`, `--config` |
//! | Task data, log | `dirs::data_dir()/taskminder/` | `TASKMINDER_DATA_DIR`, `data_dir` key |

use crate::error::{Error, Result};
use crate::reminder::DEFAULT_WINDOW_MINUTES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where tasks, theme and notification permission are stored.
    pub data_dir: Option<PathBuf>,
    /// Reminder poll period.
    pub tick_interval_ms: u64,
    /// How far in the past a due time may be and still trigger a reminder.
    pub reminder_window_minutes: i64,
    pub audio_cue: bool,
    pub desktop_notifications: bool,
    /// Used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            tick_interval_ms: 1000,
            reminder_window_minutes: 30,
            audio_cue: true,
            desktop_notifications: true,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Missing file gives defaults; a broken one is reported on stderr and
    /// ignored. Runs before logging is set up, so it does not log.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::from_file(path).unwrap_or_else(|err| {
            eprintln!("warning: ignoring {}: {err}", path.display());
            Self::default()
        })
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn default_config_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir().join("taskminder.log")
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Out-of-range values fall back to the default window.
    pub fn reminder_window(&self) -> chrono::Duration {
        chrono::Duration::try_minutes(self.reminder_window_minutes.max(0)).unwrap_or_else(|| {
            log::warn!(
                "reminder_window_minutes = {} is out of range, using {DEFAULT_WINDOW_MINUTES}",
                self.reminder_window_minutes
            );
            chrono::Duration::minutes(DEFAULT_WINDOW_MINUTES)
        })
    }
}

fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("TASKMINDER_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .map(|d| d.join("taskminder"))
        .unwrap_or_else(|| PathBuf::from("/tmp/taskminder-config"))
}

fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("TASKMINDER_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|d| d.join("taskminder"))
        .unwrap_or_else(|| PathBuf::from("/tmp/taskminder-data"))
}
