#![deny(unsafe_op_in_unsafe_fn)]

pub mod error;
pub mod hotkey;
pub mod memory;
pub mod patch;
pub mod pattern;
pub mod scanner;
pub mod session;

#[cfg(windows)]
pub mod win;

pub use error::{Error, Result};
pub use hotkey::{Hotkey, HotkeySource};
pub use memory::{MemoryRegion, ProcessLocator, ProcessMemory, Protection};
pub use patch::{PatchSite, PatchState, TogglePatch};
pub use pattern::Pattern;
pub use scanner::ScanOptions;
pub use session::{Session, SessionConfig, SessionEvent};
