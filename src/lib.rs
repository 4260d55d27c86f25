//! ts4linux - mouse and keyboard macros for Linux
//!
//! Records input into named macros grouped in profiles, binds macros to
//! physical mouse buttons and replays them through a uinput device.

pub mod capture;
pub mod credentials;
pub mod device;
pub mod error;
pub mod keys;
pub mod listener;
pub mod playback;
pub mod profile;
pub mod session;
pub mod settings;

pub use error::{Error, Result};
