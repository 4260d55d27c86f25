//! Profile management for ts4linux
//!
//! Profiles own macros and the physical-button bindings that trigger them.
//! The whole collection lives in a single JSON document that is rewritten
//! on every mutation.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Default inter-action delay for new macros and for documents that omit it
pub const DEFAULT_DELAY_MS: u32 = 10;

fn default_delay_ms() -> u32 {
    DEFAULT_DELAY_MS
}

fn default_trigger_on_press() -> bool {
    true
}

/// Physical mouse buttons that can be recorded, replayed and bound to macros
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
}

impl MouseButton {
    pub const ALL: [MouseButton; 5] = [
        MouseButton::Left,
        MouseButton::Right,
        MouseButton::Middle,
        MouseButton::Back,
        MouseButton::Forward,
    ];

    /// Button id as stored in `button_assignments`
    pub fn as_str(self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
            MouseButton::Back => "back",
            MouseButton::Forward => "forward",
        }
    }

    /// Linux input code (BTN_LEFT, BTN_RIGHT, BTN_MIDDLE, BTN_SIDE, BTN_EXTRA)
    pub fn code(self) -> u16 {
        match self {
            MouseButton::Left => 0x110,
            MouseButton::Right => 0x111,
            MouseButton::Middle => 0x112,
            MouseButton::Back => 0x113,
            MouseButton::Forward => 0x114,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.code() == code)
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for MouseButton {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|b| b.as_str() == lower)
            .ok_or_else(|| Error::UnknownButton(s.to_string()))
    }
}

/// A single primitive input event to replay.
///
/// `delay_ms` is the pause before the *next* action runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Move {
        x: i32,
        y: i32,
        #[serde(default, alias = "delay")]
        delay_ms: u32,
    },
    Click {
        button: MouseButton,
        x: i32,
        y: i32,
        #[serde(default, alias = "delay")]
        delay_ms: u32,
    },
    KeyPress {
        #[serde(alias = "button")]
        key: String,
        #[serde(default, alias = "delay")]
        delay_ms: u32,
    },
    KeyRelease {
        #[serde(alias = "button")]
        key: String,
        #[serde(default, alias = "delay")]
        delay_ms: u32,
    },
    Scroll {
        scroll_amount: i32,
        #[serde(default, alias = "delay")]
        delay_ms: u32,
    },
}

impl Action {
    pub fn delay_ms(&self) -> u32 {
        match self {
            Action::Move { delay_ms, .. }
            | Action::Click { delay_ms, .. }
            | Action::KeyPress { delay_ms, .. }
            | Action::KeyRelease { delay_ms, .. }
            | Action::Scroll { delay_ms, .. } => *delay_ms,
        }
    }

    pub fn set_delay_ms(&mut self, value: u32) {
        match self {
            Action::Move { delay_ms, .. }
            | Action::Click { delay_ms, .. }
            | Action::KeyPress { delay_ms, .. }
            | Action::KeyRelease { delay_ms, .. }
            | Action::Scroll { delay_ms, .. } => *delay_ms = value,
        }
    }

    /// Kind tag as written in the profile document
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Move { .. } => "move",
            Action::Click { .. } => "click",
            Action::KeyPress { .. } => "key_press",
            Action::KeyRelease { .. } => "key_release",
            Action::Scroll { .. } => "scroll",
        }
    }

    /// One-line description for listings
    pub fn to_display_string(&self) -> String {
        match self {
            Action::Move { x, y, delay_ms } => format!("→ move x={} y={} ⏱{}ms", x, y, delay_ms),
            Action::Click { button, x, y, delay_ms } => {
                format!("🖱 click {} x={} y={} ⏱{}ms", button, x, y, delay_ms)
            }
            Action::KeyPress { key, delay_ms } => format!("↓ {} ⏱{}ms", key, delay_ms),
            Action::KeyRelease { key, delay_ms } => format!("↑ {} ⏱{}ms", key, delay_ms),
            Action::Scroll { scroll_amount, delay_ms } => {
                format!("⇕ scroll {:+} ⏱{}ms", scroll_amount, delay_ms)
            }
        }
    }
}

/// A named, ordered list of actions plus replay settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macro {
    /// Macro name (mirrors the key in the owning profile's map)
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub actions: Vec<Action>,

    /// Wrap to the first action instead of stopping after the last one
    #[serde(default)]
    pub repeat: bool,

    /// Fire on button press (true) or on release (false)
    #[serde(default = "default_trigger_on_press")]
    pub trigger_on_press: bool,

    /// Delay stamped onto newly captured actions
    #[serde(default = "default_delay_ms", alias = "delay")]
    pub delay_ms: u32,
}

impl Macro {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            repeat: false,
            trigger_on_press: true,
            delay_ms: DEFAULT_DELAY_MS,
        }
    }

    /// Multi-line listing of all actions
    pub fn to_display_text(&self) -> String {
        if self.actions.is_empty() {
            return "No actions recorded".to_string();
        }

        self.actions
            .iter()
            .enumerate()
            .map(|(i, a)| format!("{:>3}: {}", i, a.to_display_string()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn settings(&self) -> MacroSettings {
        MacroSettings {
            delay_ms: self.delay_ms,
            repeat: self.repeat,
            trigger_on_press: self.trigger_on_press,
        }
    }
}

/// Editable replay settings of a macro
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacroSettings {
    pub delay_ms: u32,
    pub repeat: bool,
    pub trigger_on_press: bool,
}

impl Default for MacroSettings {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY_MS,
            repeat: false,
            trigger_on_press: true,
        }
    }
}

/// A macro profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile name
    pub name: String,

    /// Macros by name
    #[serde(default)]
    pub macros: BTreeMap<String, Macro>,

    /// Physical button id -> macro name. Entries are not validated against
    /// `macros`; a binding to a missing macro is kept but inert.
    #[serde(default)]
    pub button_assignments: BTreeMap<String, String>,
}

impl Profile {
    /// Create a new empty profile with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            macros: BTreeMap::new(),
            button_assignments: BTreeMap::new(),
        }
    }

    /// Macro bound to a button, if the binding exists and still resolves
    pub fn resolve_button(&self, button: MouseButton) -> Option<&Macro> {
        self.button_assignments
            .get(button.as_str())
            .and_then(|name| self.macros.get(name))
    }

    fn macro_mut(&mut self, name: &str) -> Result<&mut Macro> {
        self.macros
            .get_mut(name)
            .ok_or_else(|| Error::MacroNotFound(name.to_string()))
    }
}

/// Profile repository backed by one JSON document
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
    profiles: Vec<Profile>,
}

impl ProfileStore {
    /// Load the collection; a missing document is an empty collection
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if !path.exists() {
            info!("No profile document at {:?}, starting empty", path);
            return Ok(Self {
                path,
                profiles: Vec::new(),
            });
        }

        let content = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        let profiles = parse_profiles(&content).map_err(|e| Error::json(&path, e))?;

        info!("Loaded {} profile(s) from {:?}", profiles.len(), path);
        Ok(Self { path, profiles })
    }

    /// Write the whole collection
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }

        let content = serde_json::to_string_pretty(&self.profiles)
            .map_err(|e| Error::json(&self.path, e))?;
        fs::write(&self.path, content).map_err(|e| Error::io(&self.path, e))?;

        info!("Saved {} profile(s) to {:?}", self.profiles.len(), self.path);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn profile(&self, index: usize) -> Option<&Profile> {
        self.profiles.get(index)
    }

    /// Index of the first profile with this name
    pub fn find(&self, name: &str) -> Option<usize> {
        self.profiles.iter().position(|p| p.name == name)
    }

    /// Append a new empty profile. Duplicate names are accepted; lookups
    /// resolve to the first match.
    pub fn create_profile(&mut self, name: &str) -> Result<usize> {
        if self.find(name).is_some() {
            warn!("Profile '{}' already exists, lookups will resolve to the first one", name);
        }

        self.profiles.push(Profile::new(name));
        info!("Created profile '{}'", name);
        self.save()?;
        Ok(self.profiles.len() - 1)
    }

    /// Remove the first profile with this name, returning its former index
    pub fn delete_profile(&mut self, name: &str) -> Result<Option<usize>> {
        let Some(index) = self.find(name) else {
            return Ok(None);
        };

        self.profiles.remove(index);
        info!("Deleted profile '{}'", name);
        self.save()?;
        Ok(Some(index))
    }

    /// Bind (`Some`) or unbind (`None`) a physical button
    pub fn assign_button(
        &mut self,
        profile: usize,
        button: MouseButton,
        macro_name: Option<&str>,
    ) -> Result<()> {
        let p = self.profile_mut(profile)?;

        match macro_name {
            Some(name) => {
                if !p.macros.contains_key(name) {
                    warn!("Binding {} to '{}', which is not a macro in '{}'", button, name, p.name);
                }
                p.button_assignments
                    .insert(button.as_str().to_string(), name.to_string());
                info!("Assigned '{}' to {} button in '{}'", name, button, p.name);
            }
            None => {
                p.button_assignments.remove(button.as_str());
                info!("Cleared {} button in '{}'", button, p.name);
            }
        }

        self.save()
    }

    /// Insert or replace a macro by name
    pub fn save_macro(&mut self, profile: usize, macro_data: Macro) -> Result<()> {
        let p = self.profile_mut(profile)?;
        info!(
            "Saving macro '{}' ({} actions) to '{}'",
            macro_data.name,
            macro_data.actions.len(),
            p.name
        );
        p.macros.insert(macro_data.name.clone(), macro_data);
        self.save()
    }

    /// Remove a macro. Button assignments that name it are left untouched.
    pub fn delete_macro(&mut self, profile: usize, name: &str) -> Result<bool> {
        let removed = self.profile_mut(profile)?.macros.remove(name).is_some();
        if removed {
            info!("Deleted macro '{}'", name);
            self.save()?;
        }
        Ok(removed)
    }

    /// Update delay, repeat and trigger edge of a macro
    pub fn edit_macro(&mut self, profile: usize, name: &str, settings: MacroSettings) -> Result<()> {
        let m = self.profile_mut(profile)?.macro_mut(name)?;
        m.delay_ms = settings.delay_ms;
        m.repeat = settings.repeat;
        m.trigger_on_press = settings.trigger_on_press;
        info!("Updated macro '{}': {:?}", name, settings);
        self.save()
    }

    /// Replace one action in place
    pub fn edit_action(&mut self, profile: usize, name: &str, index: usize, action: Action) -> Result<()> {
        let m = self.profile_mut(profile)?.macro_mut(name)?;
        let len = m.actions.len();
        let slot = m.actions.get_mut(index).ok_or_else(|| Error::ActionIndex {
            macro_name: name.to_string(),
            index,
            len,
        })?;

        *slot = action;
        info!("Edited action {} of macro '{}'", index, name);
        self.save()
    }

    /// Remove one action
    pub fn remove_action(&mut self, profile: usize, name: &str, index: usize) -> Result<Action> {
        let m = self.profile_mut(profile)?.macro_mut(name)?;
        if index >= m.actions.len() {
            return Err(Error::ActionIndex {
                macro_name: name.to_string(),
                index,
                len: m.actions.len(),
            });
        }

        let action = m.actions.remove(index);
        info!("Removed action {} from macro '{}'", index, name);
        self.save()?;
        Ok(action)
    }

    fn profile_mut(&mut self, index: usize) -> Result<&mut Profile> {
        self.profiles
            .get_mut(index)
            .ok_or_else(|| Error::ProfileNotFound(format!("#{}", index)))
    }
}

/// Parse a profile document, filling macro names from their map keys
pub fn parse_profiles(content: &str) -> serde_json::Result<Vec<Profile>> {
    let mut profiles: Vec<Profile> = serde_json::from_str(content)?;
    for profile in &mut profiles {
        for (key, m) in profile.macros.iter_mut() {
            if m.name.is_empty() {
                m.name = key.clone();
            }
        }
    }
    Ok(profiles)
}
