//! Attach/detach lifecycle around a [`TogglePatch`].

use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use crate::{
    error::{Error, Result},
    hotkey::{Hotkey, HotkeySource},
    memory::{ProcessLocator, ProcessMemory},
    patch::{PatchSite, PatchState, TogglePatch},
    scanner::ScanOptions,
};

pub const DEFAULT_PROCESS_NAME: &str = "Palworld-Win64-Shipping.exe";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// How often [`Session::run`] checks for hotkey presses.
const HOTKEY_TICK: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub process_name: String,
    pub patch: TogglePatch,
    pub scan: ScanOptions,
    pub hotkey: Hotkey,
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            process_name: DEFAULT_PROCESS_NAME.to_owned(),
            patch: TogglePatch::build_on_water(),
            scan: ScanOptions::default(),
            hotkey: Hotkey::F9,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// A change in the session worth telling the user about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The game was found and the patch site located.
    Attached { address: u64, state: PatchState },
    /// The game exited; waiting for it to start again.
    Detached,
    Toggled(PatchState),
}

struct Attached<P> {
    process: P,
    site: PatchSite,
    state: PatchState,
}

pub struct Session<L: ProcessLocator> {
    locator: L,
    config: SessionConfig,
    attached: Option<Attached<L::Process>>,
    hotkey_ready: bool,
}

impl<L: ProcessLocator> Session<L> {
    pub fn new(locator: L, config: SessionConfig) -> Self {
        Self {
            locator,
            config,
            attached: None,
            hotkey_ready: true,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    /// The current state of the patch, if attached.
    pub fn state(&self) -> Option<PatchState> {
        self.attached.as_ref().map(|a| a.state)
    }

    pub fn status(&self) -> String {
        match &self.attached {
            None => "Waiting for the game to start...".to_owned(),
            Some(a) if self.hotkey_ready => format!(
                "Building on water: {} ({} to toggle)",
                a.state, self.config.hotkey
            ),
            Some(a) => format!(
                "Building on water: {} ({} is unavailable, it may be in use by another application)",
                a.state, self.config.hotkey
            ),
        }
    }

    /// Attaches to the game if it is running, or notices that it has exited.
    ///
    /// Fails with [`Error::PatchNotFound`] if the game is running but neither
    /// signature is present.
    pub fn poll(&mut self) -> Result<Option<SessionEvent>> {
        if let Some(attached) = &self.attached {
            if attached.process.is_alive() {
                return Ok(None);
            }
            return Ok(Some(self.detach()));
        }

        let Some(process) = self.locator.open(&self.config.process_name)? else {
            return Ok(None);
        };

        log::info!("Searching for the correct memory address...");
        let site = self
            .config
            .patch
            .locate(&process, &self.config.scan)?
            .ok_or(Error::PatchNotFound)?;
        let state = site.state(&process)?;
        let address = site.address();

        log::debug!("Patch site at {address:016x}, currently {state}");
        self.attached = Some(Attached {
            process,
            site,
            state,
        });
        Ok(Some(SessionEvent::Attached { address, state }))
    }

    /// Toggles the patch. Ignored while waiting for the game.
    pub fn on_hotkey(&mut self) -> Result<Option<SessionEvent>> {
        let Some(attached) = &mut self.attached else {
            log::debug!("Hotkey pressed while not attached");
            return Ok(None);
        };

        if !attached.process.is_alive() {
            return Ok(Some(self.detach()));
        }

        match attached.site.toggle(&attached.process) {
            Ok(state) => {
                attached.state = state;
                Ok(Some(SessionEvent::Toggled(state)))
            }
            Err(_) if !attached.process.is_alive() => Ok(Some(self.detach())),
            Err(e) => Err(e),
        }
    }

    fn detach(&mut self) -> SessionEvent {
        log::debug!("Game process exited");
        self.attached = None;
        SessionEvent::Detached
    }

    /// Polls for the game and dispatches hotkey presses until `shutdown` is set.
    ///
    /// `hotkeys` is only active while attached.
    pub fn run<H: HotkeySource>(&mut self, hotkeys: &mut H, shutdown: &AtomicBool) -> Result<()> {
        log::info!("{}", self.status());

        let mut last_poll: Option<Instant> = None;
        while !shutdown.load(Ordering::Relaxed) {
            if last_poll.map_or(true, |t| t.elapsed() >= self.config.poll_interval) {
                last_poll = Some(Instant::now());
                if let Some(event) = self.poll()? {
                    self.dispatch(event, hotkeys);
                }
            }

            if self.is_attached() && hotkeys.poll() {
                if let Some(event) = self.on_hotkey()? {
                    self.dispatch(event, hotkeys);
                }
            }

            thread::sleep(HOTKEY_TICK);
        }
        Ok(())
    }

    fn dispatch<H: HotkeySource>(&mut self, event: SessionEvent, hotkeys: &mut H) {
        match event {
            SessionEvent::Attached { .. } => self.hotkey_ready = hotkeys.set_active(true),
            SessionEvent::Detached => {
                hotkeys.set_active(false);
                self.hotkey_ready = true;
            }
            SessionEvent::Toggled(_) => {}
        }
        log::info!("{}", self.status());
    }
}
