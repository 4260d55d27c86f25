//! Application session
//!
//! Owns everything the front end mutates: the profile repository, the
//! active-profile pointer, the recorder and the playback session. All of it
//! lives on the event thread, so none of it is locked.

use crate::capture::{CaptureSettings, ObservedEvent, Recorder};
use crate::device::OutputDevice;
use crate::error::{Error, Result};
use crate::playback::PlaybackSession;
use crate::profile::{Action, Macro, MacroSettings, MouseButton, Profile, ProfileStore};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info};

/// What a physical button event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonTrigger {
    /// No active profile, or nothing bound to the button
    Unassigned,
    /// Bound to a macro the profile no longer has
    MacroMissing(String),
    /// Bound, but the macro fires on the other edge
    EdgeIgnored,
    /// Bound macro has no actions
    NothingToPlay(String),
    Started(String),
}

pub struct Session {
    store: ProfileStore,
    active: Option<usize>,
    recorder: Recorder,
    playback: PlaybackSession,
    capture_defaults: CaptureSettings,
}

impl Session {
    pub fn new(store: ProfileStore, device: Rc<RefCell<dyn OutputDevice>>, capture_defaults: CaptureSettings) -> Self {
        Self {
            store,
            active: None,
            recorder: Recorder::new(),
            playback: PlaybackSession::new(device),
            capture_defaults,
        }
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn profiles(&self) -> &[Profile] {
        self.store.profiles()
    }

    pub fn active_profile(&self) -> Option<&Profile> {
        self.active.and_then(|i| self.store.profile(i))
    }

    pub fn set_capture_defaults(&mut self, settings: CaptureSettings) {
        self.capture_defaults = settings;
    }

    // ---- profiles ----

    /// Create a profile and make it active
    pub fn create_profile(&mut self, name: &str) -> Result<()> {
        let index = self.store.create_profile(name)?;
        self.active = Some(index);
        Ok(())
    }

    /// Activate the first profile with this name
    pub fn select_profile(&mut self, name: &str) -> bool {
        match self.store.find(name) {
            Some(index) => {
                self.active = Some(index);
                info!("Active profile: '{}'", name);
                true
            }
            None => false,
        }
    }

    /// Delete the first profile with this name
    pub fn delete_profile(&mut self, name: &str) -> Result<bool> {
        let Some(removed) = self.store.delete_profile(name)? else {
            return Ok(false);
        };

        self.active = match self.active {
            Some(a) if a == removed => {
                info!("Active profile '{}' removed", name);
                None
            }
            Some(a) if a > removed => Some(a - 1),
            other => other,
        };
        Ok(true)
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    fn require_active(&self) -> Result<usize> {
        self.active.ok_or(Error::NoActiveProfile)
    }

    // ---- recording ----

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Enter recording with the current capture defaults
    pub fn start_recording(&mut self, name: &str) -> Result<()> {
        self.require_active()?;
        self.recorder.start(name, self.capture_defaults)
    }

    /// Leave recording and save the macro into the active profile
    pub fn stop_recording(&mut self) -> Result<Option<String>> {
        if !self.recorder.is_recording() {
            return Ok(None);
        }
        // Keep recording if there is nowhere to save it
        let index = self.require_active()?;
        let Some(macro_data) = self.recorder.stop() else {
            return Ok(None);
        };
        let name = macro_data.name.clone();
        self.store.save_macro(index, macro_data)?;
        Ok(Some(name))
    }

    pub fn cancel_recording(&mut self) {
        self.recorder.cancel();
    }

    /// Drop up to `count` actions from the end of the current recording
    pub fn trim_recording(&mut self, count: usize) -> usize {
        let mut removed = 0;
        while removed < count {
            let len = self.recorder.action_count();
            if len == 0 || !self.recorder.remove_recording_action(len - 1) {
                break;
            }
            removed += 1;
        }
        removed
    }

    /// Route one observed event: to the recorder while recording, otherwise
    /// pointer buttons may trigger bound macros
    pub fn handle_input(&mut self, event: ObservedEvent) -> Option<ButtonTrigger> {
        if self.recorder.is_recording() {
            self.recorder.handle(&event);
            return None;
        }

        match event {
            ObservedEvent::PointerButton { button, pressed } => Some(self.on_button(button, pressed)),
            _ => None,
        }
    }

    // ---- playback ----

    pub fn playback(&self) -> &PlaybackSession {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut PlaybackSession {
        &mut self.playback
    }

    /// Play a macro of the active profile; false when there is nothing to play
    pub fn play_macro(&mut self, name: &str) -> bool {
        let Some(macro_data) = self.active_profile().and_then(|p| p.macros.get(name)).cloned() else {
            debug!("Nothing to play for '{}'", name);
            return false;
        };
        self.playback.play(macro_data)
    }

    /// Physical button transition outside of recording
    pub fn on_button(&mut self, button: MouseButton, pressed: bool) -> ButtonTrigger {
        let Some(profile) = self.active_profile() else {
            return ButtonTrigger::Unassigned;
        };
        let Some(name) = profile.button_assignments.get(button.as_str()) else {
            return ButtonTrigger::Unassigned;
        };
        let Some(macro_data) = profile.macros.get(name) else {
            debug!("{} is bound to missing macro '{}'", button, name);
            return ButtonTrigger::MacroMissing(name.clone());
        };
        if macro_data.trigger_on_press != pressed {
            return ButtonTrigger::EdgeIgnored;
        }

        let macro_data = macro_data.clone();
        let name = macro_data.name.clone();
        info!("{} button triggers '{}'", button, name);
        if self.playback.play(macro_data) {
            ButtonTrigger::Started(name)
        } else {
            ButtonTrigger::NothingToPlay(name)
        }
    }

    pub fn stop_playback(&mut self) {
        self.playback.stop();
    }

    // ---- editing (active profile) ----

    pub fn assign_button(&mut self, button: MouseButton, macro_name: Option<&str>) -> Result<()> {
        let index = self.require_active()?;
        self.store.assign_button(index, button, macro_name)
    }

    pub fn save_macro(&mut self, macro_data: Macro) -> Result<()> {
        let index = self.require_active()?;
        self.store.save_macro(index, macro_data)
    }

    pub fn delete_macro(&mut self, name: &str) -> Result<bool> {
        let index = self.require_active()?;
        self.store.delete_macro(index, name)
    }

    pub fn edit_macro(&mut self, name: &str, settings: MacroSettings) -> Result<()> {
        let index = self.require_active()?;
        self.store.edit_macro(index, name, settings)
    }

    pub fn edit_action(&mut self, name: &str, action_index: usize, action: Action) -> Result<()> {
        let index = self.require_active()?;
        self.store.edit_action(index, name, action_index, action)
    }

    pub fn remove_action(&mut self, name: &str, action_index: usize) -> Result<Action> {
        let index = self.require_active()?;
        self.store.remove_action(index, name, action_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceOp, DryRunDevice};
    use tempfile::TempDir;
    use tokio::task::LocalSet;

    fn session(dir: &TempDir) -> (Session, Rc<RefCell<DryRunDevice>>) {
        let store = ProfileStore::load(dir.path().join("profiles.json")).unwrap();
        let dev = Rc::new(RefCell::new(DryRunDevice::new()));
        let s = Session::new(store, dev.clone(), CaptureSettings::default());
        (s, dev)
    }

    #[test]
    fn test_create_profile_activates() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, _) = session(&dir);
        assert!(s.active_profile().is_none());

        s.create_profile("Work").unwrap();
        assert_eq!(s.active_profile().unwrap().name, "Work");
    }

    #[test]
    fn test_delete_profile_adjusts_active() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, _) = session(&dir);
        s.create_profile("A").unwrap();
        s.create_profile("B").unwrap();
        s.create_profile("C").unwrap();

        // Active is C; removing A shifts it down
        assert!(s.delete_profile("A").unwrap());
        assert_eq!(s.active_profile().unwrap().name, "C");

        assert!(s.delete_profile("C").unwrap());
        assert!(s.active_profile().is_none());

        assert!(!s.delete_profile("Missing").unwrap());
        assert!(s.select_profile("B"));
        assert!(!s.select_profile("C"));
    }

    #[test]
    fn test_recording_requires_active_profile() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, _) = session(&dir);
        assert!(matches!(s.start_recording("M"), Err(Error::NoActiveProfile)));
    }

    #[test]
    fn test_record_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, _) = session(&dir);
        s.create_profile("P").unwrap();
        s.set_capture_defaults(CaptureSettings { delay_ms: 20, repeat: false, trigger_on_press: true });

        s.start_recording("Typed").unwrap();
        assert!(s.is_recording());
        assert!(s.handle_input(ObservedEvent::Key { key: "KEY_H".into(), pressed: true }).is_none());
        s.handle_input(ObservedEvent::Key { key: "KEY_H".into(), pressed: false });
        assert_eq!(s.stop_recording().unwrap().as_deref(), Some("Typed"));

        let m = &s.active_profile().unwrap().macros["Typed"];
        assert_eq!(m.actions.len(), 2);
        assert!(m.actions.iter().all(|a| a.delay_ms() == 20));

        // Persisted
        let reloaded = ProfileStore::load(dir.path().join("profiles.json")).unwrap();
        assert_eq!(reloaded.profiles()[0].macros["Typed"], *m);
    }

    #[test]
    fn test_trim_and_cancel_recording() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, _) = session(&dir);
        s.create_profile("P").unwrap();

        s.start_recording("Trimmed").unwrap();
        s.handle_input(ObservedEvent::Scroll { amount: 1 });
        s.handle_input(ObservedEvent::Key { key: "KEY_LEFTCTRL".into(), pressed: true });
        s.handle_input(ObservedEvent::Key { key: "KEY_C".into(), pressed: true });
        assert_eq!(s.trim_recording(2), 2);
        assert_eq!(s.recorder().actions_list().len(), 1);
        assert_eq!(s.trim_recording(5), 1);
        assert_eq!(s.trim_recording(1), 0);
        s.stop_recording().unwrap();
        assert!(s.active_profile().unwrap().macros["Trimmed"].actions.is_empty());

        s.start_recording("Dropped").unwrap();
        s.handle_input(ObservedEvent::Scroll { amount: 1 });
        s.cancel_recording();
        assert!(!s.is_recording());
        assert_eq!(s.stop_recording().unwrap(), None);
        assert!(!s.active_profile().unwrap().macros.contains_key("Dropped"));
    }

    #[test]
    fn test_empty_recording_still_saved() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, _) = session(&dir);
        s.create_profile("P").unwrap();
        s.start_recording("Nothing").unwrap();
        s.stop_recording().unwrap();
        assert!(s.active_profile().unwrap().macros["Nothing"].actions.is_empty());
        assert_eq!(s.stop_recording().unwrap(), None);
    }

    #[test]
    fn test_play_without_profile_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, dev) = session(&dir);
        assert!(!s.play_macro("anything"));
        assert_eq!(s.on_button(MouseButton::Left, true), ButtonTrigger::Unassigned);
        assert!(dev.borrow().ops().is_empty());
    }

    #[test]
    fn test_assignment_survives_macro_delete() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, _) = session(&dir);
        s.create_profile("P").unwrap();
        let mut m = Macro::new("M1");
        m.actions.push(Action::Move { x: 1, y: 1, delay_ms: 0 });
        s.save_macro(m).unwrap();
        s.assign_button(MouseButton::Left, Some("M1")).unwrap();

        assert!(s.delete_macro("M1").unwrap());
        let p = s.active_profile().unwrap();
        assert_eq!(p.button_assignments["left"], "M1");
        assert!(p.resolve_button(MouseButton::Left).is_none());

        assert_eq!(
            s.on_button(MouseButton::Left, true),
            ButtonTrigger::MacroMissing("M1".into())
        );
        assert!(!s.play_macro("M1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_button_triggers_on_configured_edge() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, dev) = session(&dir);

        LocalSet::new()
            .run_until(async {
                s.create_profile("P").unwrap();
                let mut m = Macro::new("OnRelease");
                m.trigger_on_press = false;
                m.actions.push(Action::Scroll { scroll_amount: 1, delay_ms: 0 });
                s.save_macro(m).unwrap();
                s.assign_button(MouseButton::Back, Some("OnRelease")).unwrap();

                let pressed = ObservedEvent::PointerButton { button: MouseButton::Back, pressed: true };
                let released = ObservedEvent::PointerButton { button: MouseButton::Back, pressed: false };

                assert_eq!(s.handle_input(pressed), Some(ButtonTrigger::EdgeIgnored));
                assert_eq!(
                    s.handle_input(released),
                    Some(ButtonTrigger::Started("OnRelease".into()))
                );
                s.playback_mut().wait().await;

                assert_eq!(dev.borrow().ops(), &[DeviceOp::Scroll(1)]);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_buttons_recorded_not_triggered_while_recording() {
        let dir = tempfile::tempdir().unwrap();
        let (mut s, dev) = session(&dir);

        LocalSet::new()
            .run_until(async {
                s.create_profile("P").unwrap();
                let mut m = Macro::new("Bound");
                m.actions.push(Action::Scroll { scroll_amount: 1, delay_ms: 0 });
                s.save_macro(m).unwrap();
                s.assign_button(MouseButton::Left, Some("Bound")).unwrap();

                s.start_recording("Rec").unwrap();
                let ev = ObservedEvent::PointerButton { button: MouseButton::Left, pressed: true };
                assert!(s.handle_input(ev).is_none());
                s.stop_recording().unwrap();

                assert!(!s.playback().is_active());
                assert!(dev.borrow().ops().is_empty());
                assert_eq!(s.active_profile().unwrap().macros["Rec"].actions.len(), 1);
            })
            .await;
    }
}
