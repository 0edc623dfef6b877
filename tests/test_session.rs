use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use build_on_water::{
    Error, HotkeySource, MemoryRegion, PatchState, ProcessLocator, ProcessMemory, Protection,
    Result, Session, SessionConfig, SessionEvent,
};

const BASE: u64 = 0x7ff6_0000_0000;
const SITE: u64 = BASE + 0x100;

struct FakeGame {
    image: RefCell<Vec<u8>>,
    alive: Cell<bool>,
    /// The game shuts down while the next write is in flight.
    exits_on_write: Cell<bool>,
}

impl FakeGame {
    fn with_code(code: &[u8]) -> Rc<Self> {
        let mut image = vec![0xCC; 0x200];
        image[0x100..0x100 + code.len()].copy_from_slice(code);
        Rc::new(Self {
            image: RefCell::new(image),
            alive: Cell::new(true),
            exits_on_write: Cell::new(false),
        })
    }

    fn unpatched() -> Rc<Self> {
        Self::with_code(&[0x74, 0x0E, 0x0F, 0xB6, 0x4E, 0x30])
    }

    fn site_bytes(&self) -> [u8; 2] {
        let image = self.image.borrow();
        [image[0x100], image[0x101]]
    }
}

struct FakeProcess(Rc<FakeGame>);

impl ProcessMemory for FakeProcess {
    fn regions(&self) -> Result<Vec<MemoryRegion>> {
        Ok(vec![MemoryRegion {
            base: BASE,
            size: self.0.image.borrow().len(),
            protection: Protection::from_win32(0x20),
        }])
    }

    fn read(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        let start = (address - BASE) as usize;
        buf.copy_from_slice(&self.0.image.borrow()[start..start + buf.len()]);
        Ok(())
    }

    fn write(&self, address: u64, bytes: &[u8]) -> Result<()> {
        if self.0.exits_on_write.get() {
            self.0.alive.set(false);
        }
        if !self.0.alive.get() {
            return Err(Error::Write {
                address,
                len: bytes.len(),
            });
        }
        let start = (address - BASE) as usize;
        self.0.image.borrow_mut()[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.0.alive.get()
    }
}

/// Hands out the currently running game, if any.
#[derive(Clone, Default)]
struct FakeLocator {
    running: Rc<RefCell<Option<Rc<FakeGame>>>>,
}

impl FakeLocator {
    fn start(&self, game: Rc<FakeGame>) {
        self.running.replace(Some(game));
    }

    fn exit(&self) {
        if let Some(game) = self.running.take() {
            game.alive.set(false);
        }
    }
}

impl ProcessLocator for FakeLocator {
    type Process = FakeProcess;

    fn open(&mut self, name: &str) -> Result<Option<FakeProcess>> {
        assert_eq!(name, "Palworld-Win64-Shipping.exe");
        Ok(self.running.borrow().clone().map(FakeProcess))
    }
}

fn session() -> (FakeLocator, Session<FakeLocator>) {
    let locator = FakeLocator::default();
    let session = Session::new(locator.clone(), SessionConfig::default());
    (locator, session)
}

#[test]
fn waits_for_game_then_attaches() {
    let (locator, mut session) = session();

    assert_eq!(session.poll().unwrap(), None);
    assert_eq!(session.status(), "Waiting for the game to start...");

    locator.start(FakeGame::unpatched());
    assert_eq!(
        session.poll().unwrap(),
        Some(SessionEvent::Attached {
            address: SITE,
            state: PatchState::Disabled
        })
    );
    assert_eq!(
        session.status(),
        "Building on water: DISABLED (F9 to toggle)"
    );

    // Still running, nothing to report
    assert_eq!(session.poll().unwrap(), None);
}

#[test]
fn hotkey_toggles_between_states() {
    let (locator, mut session) = session();
    let game = FakeGame::unpatched();
    locator.start(game.clone());
    session.poll().unwrap();

    assert_eq!(
        session.on_hotkey().unwrap(),
        Some(SessionEvent::Toggled(PatchState::Enabled))
    );
    assert_eq!(game.site_bytes(), [0xEB, 0x0E]);
    assert_eq!(session.status(), "Building on water: ENABLED (F9 to toggle)");

    assert_eq!(
        session.on_hotkey().unwrap(),
        Some(SessionEvent::Toggled(PatchState::Disabled))
    );
    assert_eq!(game.site_bytes(), [0x74, 0x0E]);
}

#[test]
fn hotkey_ignored_while_waiting() {
    let (_, mut session) = session();
    assert_eq!(session.on_hotkey().unwrap(), None);
    assert!(!session.is_attached());
}

#[test]
fn reattaches_after_game_restart() {
    let (locator, mut session) = session();
    locator.start(FakeGame::unpatched());
    session.poll().unwrap();
    session.on_hotkey().unwrap();

    locator.exit();
    assert_eq!(session.poll().unwrap(), Some(SessionEvent::Detached));
    assert_eq!(session.state(), None);
    assert_eq!(session.poll().unwrap(), None);

    let restarted = FakeGame::unpatched();
    locator.start(restarted.clone());
    assert_eq!(
        session.poll().unwrap(),
        Some(SessionEvent::Attached {
            address: SITE,
            state: PatchState::Disabled
        })
    );
    assert_eq!(restarted.site_bytes(), [0x74, 0x0E]);
}

#[test]
fn hotkey_after_exit_detaches() {
    let (locator, mut session) = session();
    locator.start(FakeGame::unpatched());
    session.poll().unwrap();

    locator.exit();
    assert_eq!(session.on_hotkey().unwrap(), Some(SessionEvent::Detached));
    assert_eq!(session.status(), "Waiting for the game to start...");
}

#[test]
fn attaches_to_already_patched_game() {
    let (locator, mut session) = session();
    let game = FakeGame::with_code(&[0xEB, 0x0E, 0x0F, 0xB6, 0x4E, 0x30]);
    locator.start(game.clone());

    assert_eq!(
        session.poll().unwrap(),
        Some(SessionEvent::Attached {
            address: SITE,
            state: PatchState::Enabled
        })
    );
    assert_eq!(
        session.on_hotkey().unwrap(),
        Some(SessionEvent::Toggled(PatchState::Disabled))
    );
    assert_eq!(game.site_bytes(), [0x74, 0x0E]);
}

#[test]
fn unsupported_game_version() {
    let (locator, mut session) = session();
    locator.start(FakeGame::with_code(&[0x75, 0x0E, 0x0F, 0xB6, 0x4E, 0x30]));

    assert!(matches!(session.poll(), Err(Error::PatchNotFound)));
    assert!(!session.is_attached());
}

#[derive(Clone, Copy)]
enum Step {
    Press,
    Idle,
    ExitGame,
}

/// Replays `steps` while attached, then raises `shutdown` once the script is exhausted
/// and nothing is left to do.
struct ScriptedHotkeys<'a> {
    steps: VecDeque<Step>,
    available: bool,
    activations: Vec<bool>,
    locator: FakeLocator,
    shutdown: &'a AtomicBool,
}

impl<'a> ScriptedHotkeys<'a> {
    fn new(steps: &[Step], locator: FakeLocator, shutdown: &'a AtomicBool) -> Self {
        Self {
            steps: steps.iter().copied().collect(),
            available: true,
            activations: Vec::new(),
            locator,
            shutdown,
        }
    }
}

impl HotkeySource for ScriptedHotkeys<'_> {
    fn poll(&mut self) -> bool {
        match self.steps.pop_front() {
            Some(Step::Press) => true,
            Some(Step::Idle) => false,
            Some(Step::ExitGame) => {
                self.locator.exit();
                false
            }
            None => {
                self.shutdown.store(true, Ordering::Relaxed);
                false
            }
        }
    }

    fn set_active(&mut self, active: bool) -> bool {
        self.activations.push(active);
        if !active && self.steps.is_empty() {
            self.shutdown.store(true, Ordering::Relaxed);
        }
        active && self.available
    }
}

fn fast_config() -> SessionConfig {
    SessionConfig {
        poll_interval: Duration::ZERO,
        ..Default::default()
    }
}

#[test]
fn run_dispatches_hotkeys_until_shutdown() {
    let locator = FakeLocator::default();
    let game = FakeGame::unpatched();
    locator.start(game.clone());

    let mut session = Session::new(locator.clone(), fast_config());
    let shutdown = AtomicBool::new(false);
    let mut hotkeys = ScriptedHotkeys::new(&[Step::Press, Step::Idle], locator, &shutdown);

    session.run(&mut hotkeys, &shutdown).unwrap();

    assert_eq!(hotkeys.activations, vec![true]);
    assert_eq!(session.state(), Some(PatchState::Enabled));
    assert_eq!(game.site_bytes(), [0xEB, 0x0E]);
}

#[test]
fn run_releases_hotkey_when_game_exits() {
    let locator = FakeLocator::default();
    let game = FakeGame::unpatched();
    locator.start(game.clone());

    let mut session = Session::new(locator.clone(), fast_config());
    let shutdown = AtomicBool::new(false);
    let mut hotkeys = ScriptedHotkeys::new(&[Step::Press, Step::ExitGame], locator, &shutdown);

    session.run(&mut hotkeys, &shutdown).unwrap();

    assert_eq!(hotkeys.activations, vec![true, false]);
    assert!(!session.is_attached());
    assert_eq!(session.status(), "Waiting for the game to start...");
    assert_eq!(game.site_bytes(), [0xEB, 0x0E]);
}

#[test]
fn run_reports_unavailable_hotkey() {
    let locator = FakeLocator::default();
    locator.start(FakeGame::unpatched());

    let mut session = Session::new(locator.clone(), fast_config());
    let shutdown = AtomicBool::new(false);
    let mut hotkeys = ScriptedHotkeys::new(&[], locator, &shutdown);
    hotkeys.available = false;

    session.run(&mut hotkeys, &shutdown).unwrap();

    assert_eq!(hotkeys.activations, vec![true]);
    assert_eq!(
        session.status(),
        "Building on water: DISABLED (F9 is unavailable, it may be in use by another application)"
    );
}

#[test]
fn failed_write_during_exit_detaches() {
    let (locator, mut session) = session();
    let game = FakeGame::unpatched();
    locator.start(game.clone());
    session.poll().unwrap();

    game.exits_on_write.set(true);
    assert_eq!(session.on_hotkey().unwrap(), Some(SessionEvent::Detached));
    assert!(!session.is_attached());
    assert_eq!(game.site_bytes(), [0x74, 0x0E]);
}
