//! Macro recording
//!
//! While a capture session is active every observed input event becomes an
//! [`Action`] on the macro being recorded. Actions are stamped with the
//! delay configured when recording started, not with measured timing, so a
//! recording always replays at a constant pace.

use crate::error::{Error, Result};
use crate::profile::{Action, Macro, MacroSettings, MouseButton};
use tracing::{debug, info};

/// Primitive input event as delivered by an input source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    PointerMove { x: i32, y: i32 },
    PointerButton { button: MouseButton, pressed: bool },
    Key { key: String, pressed: bool },
    Scroll { amount: i32 },
}

/// Settings snapshotted into a macro when recording starts
pub type CaptureSettings = MacroSettings;

/// Capture session state machine: idle -> recording -> idle
#[derive(Debug, Default)]
pub struct Recorder {
    recording: Option<Macro>,
    /// Last observed pointer position; clicks are stamped with it
    pointer: (i32, i32),
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start recording a new macro with the given settings
    pub fn start(&mut self, name: &str, settings: CaptureSettings) -> Result<()> {
        if let Some(ref current) = self.recording {
            return Err(Error::AlreadyRecording(current.name.clone()));
        }

        let mut macro_data = Macro::new(name);
        macro_data.delay_ms = settings.delay_ms;
        macro_data.repeat = settings.repeat;
        macro_data.trigger_on_press = settings.trigger_on_press;

        info!(
            "Started recording macro '{}' (delay={}ms, repeat={}, on_press={})",
            name, settings.delay_ms, settings.repeat, settings.trigger_on_press
        );
        self.recording = Some(macro_data);
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Name of the macro being recorded
    pub fn recording_name(&self) -> Option<&str> {
        self.recording.as_ref().map(|m| m.name.as_str())
    }

    /// Leave recording and hand back the macro (possibly with zero actions)
    pub fn stop(&mut self) -> Option<Macro> {
        let macro_data = self.recording.take()?;
        info!(
            "Stopped recording macro '{}' with {} actions",
            macro_data.name,
            macro_data.actions.len()
        );
        Some(macro_data)
    }

    /// Discard the current recording
    pub fn cancel(&mut self) {
        if let Some(m) = self.recording.take() {
            info!("Recording of '{}' cancelled", m.name);
        }
    }

    pub fn handle(&mut self, event: &ObservedEvent) {
        match event {
            ObservedEvent::PointerMove { x, y } => self.on_pointer_move(*x, *y),
            ObservedEvent::PointerButton { button, pressed } => self.on_pointer_button(*button, *pressed),
            ObservedEvent::Key { key, pressed } => self.on_key(key, *pressed),
            ObservedEvent::Scroll { amount } => self.on_scroll(*amount),
        }
    }

    pub fn on_pointer_move(&mut self, x: i32, y: i32) {
        self.pointer = (x, y);
        self.push(|delay_ms| Action::Move { x, y, delay_ms });
    }

    /// Every transition is recorded as a click at the last pointer position
    pub fn on_pointer_button(&mut self, button: MouseButton, pressed: bool) {
        let (x, y) = self.pointer;
        debug!("Pointer button {} pressed={}", button, pressed);
        self.push(|delay_ms| Action::Click { button, x, y, delay_ms });
    }

    pub fn on_key(&mut self, key: &str, pressed: bool) {
        let key = key.to_string();
        self.push(|delay_ms| {
            if pressed {
                Action::KeyPress { key, delay_ms }
            } else {
                Action::KeyRelease { key, delay_ms }
            }
        });
    }

    pub fn on_scroll(&mut self, amount: i32) {
        self.push(|delay_ms| Action::Scroll { scroll_amount: amount, delay_ms });
    }

    /// Number of actions captured so far
    pub fn action_count(&self) -> usize {
        self.recording.as_ref().map_or(0, |m| m.actions.len())
    }

    /// Current recording as display strings
    pub fn actions_list(&self) -> Vec<String> {
        self.recording
            .as_ref()
            .map(|m| m.actions.iter().map(|a| a.to_display_string()).collect())
            .unwrap_or_default()
    }

    /// Drop one captured action from the current recording
    pub fn remove_recording_action(&mut self, index: usize) -> bool {
        if let Some(ref mut m) = self.recording {
            if index < m.actions.len() {
                m.actions.remove(index);
                info!("Removed action at index {}", index);
                return true;
            }
        }
        false
    }

    fn push(&mut self, build: impl FnOnce(u32) -> Action) {
        if let Some(ref mut m) = self.recording {
            let action = build(m.delay_ms);
            debug!("Captured {}", action.to_display_string());
            m.actions.push(action);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(delay_ms: u32) -> CaptureSettings {
        CaptureSettings { delay_ms, repeat: true, trigger_on_press: false }
    }

    #[test]
    fn test_recorder_creation() {
        let rec = Recorder::new();
        assert!(!rec.is_recording());
        assert!(rec.actions_list().is_empty());
        assert_eq!(rec.action_count(), 0);
    }

    #[test]
    fn test_idle_events_ignored() {
        let mut rec = Recorder::new();
        rec.on_key("KEY_A", true);
        rec.on_scroll(1);
        rec.start("M", settings(10)).unwrap();
        assert!(rec.stop().unwrap().actions.is_empty());
    }

    #[test]
    fn test_settings_snapshot() {
        let mut rec = Recorder::new();
        rec.start("Snap", settings(42)).unwrap();
        let m = rec.stop().unwrap();
        assert_eq!(m.name, "Snap");
        assert_eq!(m.delay_ms, 42);
        assert!(m.repeat);
        assert!(!m.trigger_on_press);
    }

    #[test]
    fn test_constant_delay_regardless_of_timing() {
        let mut rec = Recorder::new();
        rec.start("Timing", settings(33)).unwrap();

        rec.on_pointer_move(5, 6);
        std::thread::sleep(std::time::Duration::from_millis(20));
        rec.on_key("KEY_A", true);
        rec.on_key("KEY_A", false);
        std::thread::sleep(std::time::Duration::from_millis(5));
        rec.on_scroll(-1);

        let m = rec.stop().unwrap();
        assert_eq!(m.actions.len(), 4);
        assert!(m.actions.iter().all(|a| a.delay_ms() == 33));
    }

    #[test]
    fn test_click_uses_last_pointer_position() {
        let mut rec = Recorder::new();
        rec.start("Clicks", settings(10)).unwrap();

        rec.handle(&ObservedEvent::PointerMove { x: 100, y: 200 });
        rec.handle(&ObservedEvent::PointerButton { button: MouseButton::Right, pressed: true });
        rec.handle(&ObservedEvent::PointerButton { button: MouseButton::Right, pressed: false });

        let m = rec.stop().unwrap();
        assert_eq!(
            m.actions,
            vec![
                Action::Move { x: 100, y: 200, delay_ms: 10 },
                Action::Click { button: MouseButton::Right, x: 100, y: 200, delay_ms: 10 },
                Action::Click { button: MouseButton::Right, x: 100, y: 200, delay_ms: 10 },
            ]
        );
    }

    #[test]
    fn test_key_transitions() {
        let mut rec = Recorder::new();
        rec.start("Keys", settings(10)).unwrap();
        rec.handle(&ObservedEvent::Key { key: "KEY_Q".into(), pressed: true });
        rec.handle(&ObservedEvent::Key { key: "KEY_Q".into(), pressed: false });

        let m = rec.stop().unwrap();
        assert!(matches!(m.actions[0], Action::KeyPress { ref key, .. } if key == "KEY_Q"));
        assert!(matches!(m.actions[1], Action::KeyRelease { ref key, .. } if key == "KEY_Q"));
    }

    #[test]
    fn test_double_start_rejected() {
        let mut rec = Recorder::new();
        rec.start("First", settings(10)).unwrap();
        let err = rec.start("Second", settings(10)).unwrap_err();
        assert!(matches!(err, Error::AlreadyRecording(ref n) if n == "First"));
        assert_eq!(rec.recording_name(), Some("First"));
    }

    #[test]
    fn test_cancel_recording() {
        let mut rec = Recorder::new();
        rec.start("Will Cancel", settings(10)).unwrap();
        rec.on_key("KEY_A", true);
        rec.cancel();

        assert!(!rec.is_recording());
        assert!(rec.stop().is_none());
    }

    #[test]
    fn test_remove_recording_action() {
        let mut rec = Recorder::new();
        rec.start("Test", settings(10)).unwrap();
        rec.on_key("KEY_A", true);
        rec.on_key("KEY_S", true);
        rec.on_key("KEY_D", true);

        assert_eq!(rec.actions_list().len(), 3);
        assert!(rec.remove_recording_action(1));
        assert!(!rec.remove_recording_action(5));

        let list = rec.actions_list();
        assert_eq!(list.len(), 2);
        assert!(list[1].contains("KEY_D"));
    }
}
