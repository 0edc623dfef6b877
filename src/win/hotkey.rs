use windows::Win32::UI::{
    Input::KeyboardAndMouse::{RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS, MOD_NOREPEAT},
    WindowsAndMessaging::{PeekMessageW, MSG, PM_REMOVE, WM_HOTKEY},
};

use crate::hotkey::{Hotkey, HotkeySource};

/// A thread-wide hotkey registered with `RegisterHotKey`.
///
/// `WM_HOTKEY` is posted to the message queue of the registering thread, so
/// [`HotkeySource::poll`] and [`HotkeySource::set_active`] must be called from the same thread.
pub struct RegisteredHotkey {
    hotkey: Hotkey,
    id: i32,
    registered: bool,
}

impl RegisteredHotkey {
    pub fn new(hotkey: Hotkey, id: i32) -> Self {
        Self {
            hotkey,
            id,
            registered: false,
        }
    }

    fn register(&mut self) -> windows::core::Result<()> {
        let modifiers = HOT_KEY_MODIFIERS(self.hotkey.modifiers.0) | MOD_NOREPEAT;
        unsafe { RegisterHotKey(None, self.id, modifiers, self.hotkey.virtual_key)? };
        self.registered = true;
        log::debug!("Registered hotkey {}", self.hotkey);
        Ok(())
    }

    fn unregister(&mut self) {
        if std::mem::take(&mut self.registered) {
            if let Err(e) = unsafe { UnregisterHotKey(None, self.id) } {
                log::warn!("Failed to unregister hotkey {}: {e}", self.hotkey);
            }
            log::debug!("Unregistered hotkey {}", self.hotkey);
        }
    }
}

impl HotkeySource for RegisteredHotkey {
    fn poll(&mut self) -> bool {
        if !self.registered {
            return false;
        }

        let mut pressed = false;
        let mut msg = MSG::default();
        while unsafe { PeekMessageW(&mut msg, None, WM_HOTKEY, WM_HOTKEY, PM_REMOVE) }.as_bool() {
            pressed |= msg.wParam.0 == self.id as usize;
        }
        pressed
    }

    fn set_active(&mut self, active: bool) -> bool {
        match (active, self.registered) {
            (true, false) => {
                if let Err(e) = self.register() {
                    log::error!("Failed to register hotkey {}: {e}", self.hotkey);
                }
            }
            (false, true) => self.unregister(),
            _ => {}
        }
        self.registered == active
    }
}

impl Drop for RegisteredHotkey {
    fn drop(&mut self) {
        self.unregister()
    }
}
