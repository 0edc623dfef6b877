//! The two-byte code patch that lifts the build-on-water restriction.

use std::fmt;

use crate::{
    error::{Error, Result},
    memory::ProcessMemory,
    pattern::Pattern,
    scanner::{self, ScanOptions},
};

/// Whether the restriction is lifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchState {
    /// The game's original code: building on water is not allowed.
    Disabled,
    /// The conditional jump is replaced by an unconditional one.
    Enabled,
}

impl PatchState {
    pub fn toggled(self) -> Self {
        match self {
            Self::Disabled => Self::Enabled,
            Self::Enabled => Self::Disabled,
        }
    }
}

impl fmt::Display for PatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disabled => "DISABLED",
            Self::Enabled => "ENABLED",
        })
    }
}

/// Two signatures locating the same instruction in either state, and the bytes written
/// at its start to switch between them.
#[derive(Debug, Clone)]
pub struct TogglePatch {
    pub disabled_signature: Pattern,
    pub enabled_signature: Pattern,
    pub disabled_bytes: [u8; 2],
    pub enabled_bytes: [u8; 2],
}

impl TogglePatch {
    /// The build-on-water check in `Palworld-Win64-Shipping.exe`:
    ///
    /// ```text
    /// 74 0E          JE   +0x0E      ; disabled
    /// EB 0E          JMP  +0x0E      ; enabled
    /// 0F B6 4E 30    MOVZX ECX, byte ptr [RSI+0x30]
    /// ```
    pub fn build_on_water() -> Self {
        Self {
            disabled_signature: Pattern::parse("74 0E 0F B6 4E 30").expect("constant pattern"),
            enabled_signature: Pattern::parse("EB 0E 0F B6 4E 30").expect("constant pattern"),
            disabled_bytes: [0x74, 0x0E],
            enabled_bytes: [0xEB, 0x0E],
        }
    }

    pub fn bytes_for(&self, state: PatchState) -> [u8; 2] {
        match state {
            PatchState::Disabled => self.disabled_bytes,
            PatchState::Enabled => self.enabled_bytes,
        }
    }

    /// Finds the patch site in `memory`.
    ///
    /// The unpatched signature is tried first. If it is missing, the game may already have
    /// been patched by a previous run, so the patched signature is tried next.
    pub fn locate<M: ProcessMemory + ?Sized>(
        &self,
        memory: &M,
        options: &ScanOptions,
    ) -> Result<Option<PatchSite>> {
        for signature in [&self.disabled_signature, &self.enabled_signature] {
            if let Some(address) = scanner::scan_first(memory, signature, options)? {
                log::debug!("{signature} found at {address:016x}");
                return Ok(Some(PatchSite {
                    address,
                    patch: self.clone(),
                }));
            }
        }
        Ok(None)
    }
}

/// A located [`TogglePatch`].
#[derive(Debug, Clone)]
pub struct PatchSite {
    address: u64,
    patch: TogglePatch,
}

impl PatchSite {
    pub fn new(address: u64, patch: TogglePatch) -> Self {
        Self { address, patch }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    /// Reads the current state from memory.
    pub fn state<M: ProcessMemory + ?Sized>(&self, memory: &M) -> Result<PatchState> {
        let mut current = [0u8; 2];
        memory.read(self.address, &mut current)?;

        if current == self.patch.disabled_bytes {
            Ok(PatchState::Disabled)
        } else if current == self.patch.enabled_bytes {
            Ok(PatchState::Enabled)
        } else {
            Err(Error::UnexpectedBytes {
                address: self.address,
                found: current.to_vec(),
            })
        }
    }

    /// Writes the bytes for `state` and checks that they were applied.
    pub fn set<M: ProcessMemory + ?Sized>(&self, memory: &M, state: PatchState) -> Result<()> {
        memory.write(self.address, &self.patch.bytes_for(state))?;

        if self.state(memory)? != state {
            return Err(Error::VerifyFailed {
                address: self.address,
                expected: state,
            });
        }
        log::trace!("Patched {:016x} to {state}", self.address);
        Ok(())
    }

    /// Flips the state found in memory and returns the new one.
    pub fn toggle<M: ProcessMemory + ?Sized>(&self, memory: &M) -> Result<PatchState> {
        let new_state = self.state(memory)?.toggled();
        self.set(memory, new_state)?;
        Ok(new_state)
    }
}
