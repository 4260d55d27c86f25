//! Macro playback engine
//!
//! [`Player`] is the replay state machine: each call to [`Player::step`]
//! executes exactly one action and reports how long to wait before the next
//! one. [`PlaybackSession`] drives it from the event thread with one-shot
//! timers, keeping a single pending step that is cancelled before anything
//! else is scheduled.

use crate::device::OutputDevice;
use crate::profile::{Action, Macro};
use anyhow::Result;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    /// Index of the next action to execute
    Stepping(usize),
}

/// Result of executing one action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Schedule the next step after this delay
    Continue(Duration),
    /// Session reached `Idle`; nothing more to schedule
    Finished,
}

/// Replay state machine for one macro at a time
#[derive(Debug)]
pub struct Player {
    macro_data: Option<Macro>,
    state: PlaybackState,
}

impl Player {
    pub fn new() -> Self {
        Self {
            macro_data: None,
            state: PlaybackState::Idle,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != PlaybackState::Idle
    }

    /// Name of the macro currently being replayed
    pub fn current_macro(&self) -> Option<&str> {
        match self.state {
            PlaybackState::Idle => None,
            PlaybackState::Stepping(_) => self.macro_data.as_ref().map(|m| m.name.as_str()),
        }
    }

    /// Begin replaying `macro_data`, replacing any current session.
    /// Returns false (and stays idle) for a macro with no actions.
    pub fn start(&mut self, macro_data: Macro) -> bool {
        if self.is_active() {
            info!("Replacing active playback session");
        }

        if macro_data.actions.is_empty() {
            warn!("Macro '{}' has no actions", macro_data.name);
            self.cancel();
            return false;
        }

        info!(
            "Playing macro '{}' ({} actions, repeat={})",
            macro_data.name,
            macro_data.actions.len(),
            macro_data.repeat
        );
        self.macro_data = Some(macro_data);
        self.state = PlaybackState::Stepping(0);
        true
    }

    pub fn cancel(&mut self) {
        self.state = PlaybackState::Idle;
        self.macro_data = None;
    }

    /// Execute the action at the current index and advance.
    ///
    /// A device error ends the session; nothing is retried.
    pub fn step(&mut self, device: &mut dyn OutputDevice) -> Result<StepOutcome> {
        let PlaybackState::Stepping(index) = self.state else {
            return Ok(StepOutcome::Finished);
        };
        let Some(macro_data) = self.macro_data.as_ref() else {
            self.state = PlaybackState::Idle;
            return Ok(StepOutcome::Finished);
        };
        let Some(action) = macro_data.actions.get(index) else {
            self.cancel();
            return Ok(StepOutcome::Finished);
        };

        debug!("Step {}: {}", index, action.to_display_string());
        if let Err(e) = execute_action(action, device) {
            self.cancel();
            return Err(e);
        }

        let delay = Duration::from_millis(u64::from(action.delay_ms()));
        let next = index + 1;

        if next < macro_data.actions.len() {
            self.state = PlaybackState::Stepping(next);
            Ok(StepOutcome::Continue(delay))
        } else if macro_data.repeat {
            self.state = PlaybackState::Stepping(0);
            Ok(StepOutcome::Continue(delay))
        } else {
            info!("Macro '{}' finished", macro_data.name);
            self.cancel();
            Ok(StepOutcome::Finished)
        }
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply one action to the output device
pub fn execute_action(action: &Action, device: &mut dyn OutputDevice) -> Result<()> {
    match action {
        Action::Move { x, y, .. } => device.move_to(*x, *y),
        Action::Click { button, x, y, .. } => {
            device.move_to(*x, *y)?;
            device.click(*button)
        }
        Action::KeyPress { key, .. } => device.press(key),
        Action::KeyRelease { key, .. } => device.release(key),
        Action::Scroll { scroll_amount, .. } => device.scroll(*scroll_amount),
    }
}

/// Timer-driven playback on the current thread.
///
/// Must be used from inside a `tokio::task::LocalSet`.
pub struct PlaybackSession {
    player: Rc<RefCell<Player>>,
    device: Rc<RefCell<dyn OutputDevice>>,
    pending: Option<JoinHandle<()>>,
}

impl PlaybackSession {
    pub fn new(device: Rc<RefCell<dyn OutputDevice>>) -> Self {
        Self {
            player: Rc::new(RefCell::new(Player::new())),
            device,
            pending: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.player.borrow().state()
    }

    pub fn is_active(&self) -> bool {
        self.player.borrow().is_active()
    }

    pub fn current_macro(&self) -> Option<String> {
        self.player.borrow().current_macro().map(str::to_string)
    }

    /// Start replaying, cancelling any pending step first
    pub fn play(&mut self, macro_data: Macro) -> bool {
        self.cancel_pending();

        if !self.player.borrow_mut().start(macro_data) {
            return false;
        }

        let player = Rc::clone(&self.player);
        let device = Rc::clone(&self.device);

        self.pending = Some(tokio::task::spawn_local(async move {
            loop {
                let outcome = {
                    let mut dev = device.borrow_mut();
                    player.borrow_mut().step(&mut *dev)
                };

                match outcome {
                    Ok(StepOutcome::Continue(delay)) => tokio::time::sleep(delay).await,
                    Ok(StepOutcome::Finished) => break,
                    Err(e) => {
                        warn!("Playback stopped: {e:#}");
                        break;
                    }
                }
            }
        }));
        true
    }

    /// Cancel the pending step and return to `Idle`
    pub fn stop(&mut self) {
        if self.is_active() {
            info!("Playback cancelled");
        }
        self.cancel_pending();
        self.player.borrow_mut().cancel();
    }

    /// Resolve once the current session ends (immediately when idle)
    pub async fn wait(&mut self) {
        if let Some(handle) = self.pending.as_mut() {
            let _ = handle.await;
        }
        self.pending = None;
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
