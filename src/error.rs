//! Error types for ts4linux
//!
//! Library modules return [`Result`]; the binary and the evdev/uinput edges
//! wrap these in `anyhow` with context.
//! Error messages MUST NOT contain passwords or digests.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON document {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed settings file: {0}")]
    SettingsParse(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    SettingsWrite(#[from] toml::ser::Error),

    #[error("Invalid screen size {width}x{height}: both dimensions must be at least 1")]
    InvalidScreenSize { width: i32, height: i32 },

    #[error("No active profile")]
    NoActiveProfile,

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Macro not found: {0}")]
    MacroNotFound(String),

    #[error("Action index {index} out of range for macro '{macro_name}' ({len} actions)")]
    ActionIndex {
        macro_name: String,
        index: usize,
        len: usize,
    },

    #[error("Already recording macro '{0}'")]
    AlreadyRecording(String),

    #[error("Unknown mouse button: {0}")]
    UnknownButton(String),

    #[error("Unknown key identifier: {0}")]
    UnknownKey(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
