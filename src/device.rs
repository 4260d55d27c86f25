//! Output devices for macro playback
//!
//! The replay engine only talks to [`OutputDevice`]. [`VirtualOutput`]
//! injects events through a uinput virtual device; [`DryRunDevice`] records
//! and logs what would have been sent.

use crate::keys;
use crate::profile::MouseButton;
use anyhow::{Context, Result};
use evdev::{
    AbsInfo, AbsoluteAxisType, AttributeSet, EventType, InputEvent, Key, RelativeAxisType,
    UinputAbsSetup, uinput::VirtualDevice, uinput::VirtualDeviceBuilder,
};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Name of the playback device; the input listener skips it
pub const VIRTUAL_DEVICE_NAME: &str = "ts4linux virtual output";

/// Sink for replayed actions
pub trait OutputDevice {
    /// Move the pointer to an absolute screen position
    fn move_to(&mut self, x: i32, y: i32) -> Result<()>;
    /// Press and release a mouse button
    fn click(&mut self, button: MouseButton) -> Result<()>;
    fn press(&mut self, key: &str) -> Result<()>;
    fn release(&mut self, key: &str) -> Result<()>;
    /// Vertical wheel ticks; positive scrolls up
    fn scroll(&mut self, amount: i32) -> Result<()>;
}

/// A single operation issued to an output device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOp {
    MoveTo(i32, i32),
    Click(MouseButton),
    Press(String),
    Release(String),
    Scroll(i32),
}

/// Records operations instead of injecting them
#[derive(Debug, Default)]
pub struct DryRunDevice {
    ops: Vec<DeviceOp>,
}

impl DryRunDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[DeviceOp] {
        &self.ops
    }

    fn record(&mut self, op: DeviceOp) -> Result<()> {
        info!("[dry-run] {:?}", op);
        self.ops.push(op);
        Ok(())
    }
}

impl OutputDevice for DryRunDevice {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.record(DeviceOp::MoveTo(x, y))
    }

    fn click(&mut self, button: MouseButton) -> Result<()> {
        self.record(DeviceOp::Click(button))
    }

    fn press(&mut self, key: &str) -> Result<()> {
        self.record(DeviceOp::Press(key.to_string()))
    }

    fn release(&mut self, key: &str) -> Result<()> {
        self.record(DeviceOp::Release(key.to_string()))
    }

    fn scroll(&mut self, amount: i32) -> Result<()> {
        self.record(DeviceOp::Scroll(amount))
    }
}

/// uinput-backed pointer + keyboard
pub struct VirtualOutput {
    vdev: VirtualDevice,
    width: i32,
    height: i32,
}

impl VirtualOutput {
    /// Create the virtual device with absolute axes sized to the screen
    pub fn create(width: i32, height: i32) -> Result<Self> {
        if width < 1 || height < 1 {
            return Err(crate::error::Error::InvalidScreenSize { width, height }.into());
        }

        let mut keys = AttributeSet::<Key>::new();
        for code in keys::keyboard_key_codes() {
            keys.insert(Key::new(code));
        }
        for button in MouseButton::ALL {
            keys.insert(Key::new(button.code()));
        }

        let mut rel = AttributeSet::<RelativeAxisType>::new();
        rel.insert(RelativeAxisType::REL_WHEEL);

        let abs_x = UinputAbsSetup::new(AbsoluteAxisType::ABS_X, AbsInfo::new(0, 0, width - 1, 0, 0, 0));
        let abs_y = UinputAbsSetup::new(AbsoluteAxisType::ABS_Y, AbsInfo::new(0, 0, height - 1, 0, 0, 0));

        let vdev = VirtualDeviceBuilder::new()
            .context("Failed to create uinput builder")?
            .name(VIRTUAL_DEVICE_NAME)
            .with_keys(&keys)
            .context("Failed to set key capabilities")?
            .with_absolute_axis(&abs_x)
            .context("Failed to set ABS_X capability")?
            .with_absolute_axis(&abs_y)
            .context("Failed to set ABS_Y capability")?
            .with_relative_axes(&rel)
            .context("Failed to set wheel capability")?
            .build()
            .context("Failed to build uinput device")?;

        // Small delay for device to be recognized
        thread::sleep(Duration::from_millis(50));

        info!("Created virtual output device ({}x{})", width, height);
        Ok(Self { vdev, width, height })
    }

    fn emit(&mut self, events: &[InputEvent]) -> Result<()> {
        let mut batch = events.to_vec();
        batch.push(InputEvent::new(EventType::SYNCHRONIZATION, 0, 0));
        self.vdev.emit(&batch).context("Failed to emit input event")?;
        Ok(())
    }

    fn emit_key(&mut self, code: u16, value: i32) -> Result<()> {
        self.emit(&[InputEvent::new(EventType::KEY, code, value)])
    }
}

/// Identifier to a code the virtual device declares
fn resolve_key(key: &str) -> Result<u16> {
    keys::key_code(key)
        .filter(|code| keys::is_keyboard_code(*code))
        .ok_or_else(|| crate::error::Error::UnknownKey(key.to_string()).into())
}

impl OutputDevice for VirtualOutput {
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        let x = x.clamp(0, self.width - 1);
        let y = y.clamp(0, self.height - 1);
        debug!("move_to {},{}", x, y);
        self.emit(&[
            InputEvent::new(EventType::ABSOLUTE, AbsoluteAxisType::ABS_X.0, x),
            InputEvent::new(EventType::ABSOLUTE, AbsoluteAxisType::ABS_Y.0, y),
        ])
    }

    fn click(&mut self, button: MouseButton) -> Result<()> {
        debug!("click {}", button);
        self.emit_key(button.code(), 1)?;
        // Blocks the event thread for the hold time; capture and other
        // replay steps wait behind it
        thread::sleep(Duration::from_millis(10));
        self.emit_key(button.code(), 0)
    }

    fn press(&mut self, key: &str) -> Result<()> {
        let code = resolve_key(key)?;
        self.emit_key(code, 1)
    }

    fn release(&mut self, key: &str) -> Result<()> {
        let code = resolve_key(key)?;
        self.emit_key(code, 0)
    }

    fn scroll(&mut self, amount: i32) -> Result<()> {
        self.emit(&[InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_WHEEL.0, amount)])
    }
}
