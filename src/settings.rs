//! Application settings management
//!
//! Holds the active profile, the defaults snapshotted into new recordings
//! and the screen geometry used by capture and playback.

use crate::capture::CaptureSettings;
use crate::error::{Error, Result};
use crate::profile::DEFAULT_DELAY_MS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const SETTINGS_FILE: &str = "settings.toml";
pub const PROFILES_FILE: &str = "profiles.json";
pub const USERS_FILE: &str = "users.json";

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Profile selected on startup
    #[serde(default)]
    pub active_profile: Option<String>,

    /// Delay stamped onto captured actions (ms)
    #[serde(default = "default_delay_ms")]
    pub default_delay_ms: u32,

    /// Whether new recordings repeat
    #[serde(default)]
    pub repeat: bool,

    /// Whether new recordings fire on press (true) or release (false)
    #[serde(default = "default_trigger_on_press")]
    pub trigger_on_press: bool,

    #[serde(default = "default_screen_width")]
    pub screen_width: i32,

    #[serde(default = "default_screen_height")]
    pub screen_height: i32,

    /// Listen on this /dev/input device only
    #[serde(default)]
    pub input_device: Option<String>,
}

fn default_delay_ms() -> u32 {
    DEFAULT_DELAY_MS
}

fn default_trigger_on_press() -> bool {
    true
}

fn default_screen_width() -> i32 {
    1920
}

fn default_screen_height() -> i32 {
    1080
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            active_profile: None,
            default_delay_ms: DEFAULT_DELAY_MS,
            repeat: false,
            trigger_on_press: true,
            screen_width: default_screen_width(),
            screen_height: default_screen_height(),
            input_device: None,
        }
    }
}

impl AppSettings {
    /// `~/.config/ts4linux`
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("ts4linux"))
    }

    /// Load settings from `dir` (or use defaults)
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(SETTINGS_FILE);

        if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
            let settings: AppSettings = toml::from_str(&content)?;
            settings.validate()?;
            info!("Loaded settings from {:?}", path);
            Ok(settings)
        } else {
            info!("No settings file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Reject values the listener and virtual device cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.screen_width < 1 || self.screen_height < 1 {
            return Err(Error::InvalidScreenSize {
                width: self.screen_width,
                height: self.screen_height,
            });
        }
        Ok(())
    }

    /// Save settings into `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        self.validate()?;
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        let path = dir.join(SETTINGS_FILE);
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content).map_err(|e| Error::io(&path, e))?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Defaults snapshotted into a new recording
    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            delay_ms: self.default_delay_ms,
            repeat: self.repeat,
            trigger_on_press: self.trigger_on_press,
        }
    }
}
