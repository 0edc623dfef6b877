//! Win32 implementations of [`ProcessLocator`](crate::memory::ProcessLocator) and
//! [`HotkeySource`](crate::hotkey::HotkeySource).

mod hotkey;
mod process;

pub use hotkey::RegisteredHotkey;
pub use process::{WinProcess, WinProcessLocator};
