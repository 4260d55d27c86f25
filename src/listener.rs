//! Global input capture (evdev)
//!
//! Reads every pointer/keyboard device under /dev/input on a background
//! thread and forwards translated events to the event thread. Devices are
//! not grabbed, so input keeps reaching the desktop while we listen.

use crate::capture::ObservedEvent;
use crate::device::VIRTUAL_DEVICE_NAME;
use crate::keys;
use crate::profile::MouseButton;
use anyhow::{Context, Result};
use evdev::{Device, InputEvent, InputEventKind, RelativeAxisType};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Listen on this device only instead of every pointer/keyboard
    pub device: Option<String>,
    pub screen_width: i32,
    pub screen_height: i32,
}

/// Turns raw kernel events into [`ObservedEvent`]s.
///
/// Mice report relative motion, so the pointer position is an estimate
/// accumulated from REL_X/REL_Y, clamped to the screen and starting at
/// its centre.
#[derive(Debug)]
pub struct EventTranslator {
    width: i32,
    height: i32,
    x: i32,
    y: i32,
    moved: bool,
}

impl EventTranslator {
    /// Dimensions below 1 are treated as 1
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            x: width / 2,
            y: height / 2,
            moved: false,
        }
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Feed one kernel event; completed observations are pushed to `out`
    pub fn translate(&mut self, ev: &InputEvent, out: &mut Vec<ObservedEvent>) {
        match ev.kind() {
            InputEventKind::RelAxis(axis) => match axis {
                RelativeAxisType::REL_X => {
                    self.x = (self.x + ev.value()).clamp(0, self.width - 1);
                    self.moved = true;
                }
                RelativeAxisType::REL_Y => {
                    self.y = (self.y + ev.value()).clamp(0, self.height - 1);
                    self.moved = true;
                }
                RelativeAxisType::REL_WHEEL => {
                    out.push(ObservedEvent::Scroll { amount: ev.value() });
                }
                _ => {}
            },
            InputEventKind::Key(key) => {
                // 2 = autorepeat
                if ev.value() == 2 {
                    return;
                }
                let pressed = ev.value() == 1;
                let code = key.code();

                if let Some(button) = MouseButton::from_code(code) {
                    // Clicks must see the position from the same report
                    self.flush_move(out);
                    out.push(ObservedEvent::PointerButton { button, pressed });
                } else if keys::is_keyboard_code(code) {
                    out.push(ObservedEvent::Key {
                        key: keys::key_name(code),
                        pressed,
                    });
                } else {
                    debug!("Ignoring unsupported button {:#x}", code);
                }
            }
            InputEventKind::Synchronization(_) => self.flush_move(out),
            _ => {}
        }
    }

    fn flush_move(&mut self, out: &mut Vec<ObservedEvent>) {
        if self.moved {
            self.moved = false;
            out.push(ObservedEvent::PointerMove { x: self.x, y: self.y });
        }
    }
}

/// Background evdev reader
pub struct InputListener {
    stop: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
}

impl InputListener {
    /// Open the input devices and start forwarding events to `sender`
    pub fn start(config: ListenerConfig, sender: UnboundedSender<ObservedEvent>) -> Result<Self> {
        let devices = open_input_devices(&config)?;
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = stop.clone();
        let translator = EventTranslator::new(config.screen_width, config.screen_height);

        let join = thread::spawn(move || {
            if let Err(e) = run_listener_loop(stop_thread, devices, translator, sender) {
                warn!("input listener stopped: {e:#}");
            }
        });

        Ok(Self {
            stop,
            join: Some(join),
        })
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for InputListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_listener_loop(
    stop: Arc<AtomicBool>,
    mut devices: Vec<(Device, String)>,
    mut translator: EventTranslator,
    sender: UnboundedSender<ObservedEvent>,
) -> Result<()> {
    info!("Listening on {} input device(s)", devices.len());
    let mut observed = Vec::new();

    while !stop.load(Ordering::Relaxed) {
        let mut had_events = false;

        for (dev, name) in &mut devices {
            match dev.fetch_events() {
                Ok(events) => {
                    for ev in events {
                        had_events = true;
                        translator.translate(&ev, &mut observed);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    // No events on this device
                }
                Err(e) => {
                    warn!("Error reading from device {}: {}", name, e);
                }
            }
        }

        for ev in observed.drain(..) {
            if sender.send(ev).is_err() {
                info!("Event receiver closed, stopping listener");
                return Ok(());
            }
        }

        if !had_events {
            thread::sleep(Duration::from_millis(10));
        }
    }

    Ok(())
}

/// Devices worth listening to: anything with keys or pointer axes,
/// except our own playback device
fn open_input_devices(config: &ListenerConfig) -> Result<Vec<(Device, String)>> {
    let candidates: Vec<(PathBuf, Device)> = match config.device {
        Some(ref p) => {
            let dev = Device::open(p).with_context(|| format!("Failed to open input device: {p}"))?;
            vec![(PathBuf::from(p), dev)]
        }
        None => evdev::enumerate().collect(),
    };

    let mut devices = Vec::new();
    for (path, dev) in candidates {
        let name = dev.name().unwrap_or("?").to_string();

        if name == VIRTUAL_DEVICE_NAME {
            debug!("Skipping own virtual device {:?}", path);
            continue;
        }

        let has_keys = dev
            .supported_keys()
            .map(|k| k.iter().next().is_some())
            .unwrap_or(false);
        let has_pointer = dev
            .supported_relative_axes()
            .map(|r| r.contains(RelativeAxisType::REL_X) || r.contains(RelativeAxisType::REL_WHEEL))
            .unwrap_or(false);

        if !has_keys && !has_pointer {
            debug!("Skipping {:?} ({}): no keys or pointer axes", path, name);
            continue;
        }

        if let Err(e) = set_nonblocking(&dev) {
            warn!("Failed to set non-blocking on {:?}: {}", path, e);
            continue;
        }

        info!("Opened input device {:?} ({})", path, name);
        devices.push((dev, name));
    }

    if devices.is_empty() {
        anyhow::bail!("No readable input devices found (check permissions on /dev/input?)");
    }

    Ok(devices)
}

/// `fetch_events` must return WouldBlock instead of parking the poll loop
fn set_nonblocking(dev: &impl AsRawFd) -> Result<()> {
    let fd = dev.as_raw_fd();
    let check = |rc: libc::c_int, op: &str| -> Result<libc::c_int> {
        if rc < 0 {
            Err(std::io::Error::last_os_error()).with_context(|| format!("fcntl({op}) on fd {fd}"))
        } else {
            Ok(rc)
        }
    };

    // SAFETY: fd stays owned by `dev` for the duration of both calls
    let flags = check(unsafe { libc::fcntl(fd, libc::F_GETFL) }, "F_GETFL")?;
    if flags & libc::O_NONBLOCK == 0 {
        check(unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) }, "F_SETFL")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::EventType;

    fn rel(axis: RelativeAxisType, value: i32) -> InputEvent {
        InputEvent::new(EventType::RELATIVE, axis.0, value)
    }

    fn key(code: u16, value: i32) -> InputEvent {
        InputEvent::new(EventType::KEY, code, value)
    }

    fn syn() -> InputEvent {
        InputEvent::new(EventType::SYNCHRONIZATION, 0, 0)
    }

    fn feed(t: &mut EventTranslator, events: &[InputEvent]) -> Vec<ObservedEvent> {
        let mut out = Vec::new();
        for ev in events {
            t.translate(ev, &mut out);
        }
        out
    }

    #[test]
    fn test_motion_emitted_on_sync() {
        let mut t = EventTranslator::new(100, 100);
        let out = feed(&mut t, &[rel(RelativeAxisType::REL_X, 5), rel(RelativeAxisType::REL_Y, -3)]);
        assert!(out.is_empty());

        let out = feed(&mut t, &[syn()]);
        assert_eq!(out, vec![ObservedEvent::PointerMove { x: 55, y: 47 }]);

        // No motion, no move
        assert!(feed(&mut t, &[syn()]).is_empty());
    }

    #[test]
    fn test_position_clamped() {
        let mut t = EventTranslator::new(100, 50);
        feed(&mut t, &[rel(RelativeAxisType::REL_X, -500), rel(RelativeAxisType::REL_Y, 500), syn()]);
        assert_eq!(t.position(), (0, 49));
    }

    #[test]
    fn test_set_nonblocking() {
        let file = tempfile::tempfile().unwrap();
        set_nonblocking(&file).unwrap();
        let flags = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_GETFL) };
        assert_ne!(flags & libc::O_NONBLOCK, 0);
        // Already non-blocking is fine
        set_nonblocking(&file).unwrap();
    }

    #[test]
    fn test_degenerate_screen_does_not_panic() {
        let mut t = EventTranslator::new(0, -3);
        let out = feed(&mut t, &[rel(RelativeAxisType::REL_X, 7), rel(RelativeAxisType::REL_Y, 2), syn()]);
        assert_eq!(out, vec![ObservedEvent::PointerMove { x: 0, y: 0 }]);
    }

    #[test]
    fn test_button_flushes_pending_motion() {
        let mut t = EventTranslator::new(100, 100);
        let out = feed(&mut t, &[rel(RelativeAxisType::REL_X, 10), key(0x110, 1), syn()]);
        assert_eq!(
            out,
            vec![
                ObservedEvent::PointerMove { x: 60, y: 50 },
                ObservedEvent::PointerButton { button: MouseButton::Left, pressed: true },
            ]
        );
    }

    #[test]
    fn test_keys_and_wheel() {
        let mut t = EventTranslator::new(100, 100);
        let out = feed(
            &mut t,
            &[key(30, 1), key(30, 2), key(30, 0), rel(RelativeAxisType::REL_WHEEL, -1), key(0x115, 1)],
        );
        assert_eq!(
            out,
            vec![
                ObservedEvent::Key { key: "KEY_A".into(), pressed: true },
                ObservedEvent::Key { key: "KEY_A".into(), pressed: false },
                ObservedEvent::Scroll { amount: -1 },
            ]
        );
    }
}
