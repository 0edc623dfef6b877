use thiserror::Error;

use crate::patch::PatchState;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("failed to read {len} bytes at {address:016x}")]
    Read { address: u64, len: usize },

    #[error("failed to write {len} bytes at {address:016x}")]
    Write { address: u64, len: usize },

    #[error("unexpected bytes {found:02X?} at {address:016x}")]
    UnexpectedBytes { address: u64, found: Vec<u8> },

    #[error("patch readback at {address:016x} does not match {expected:?}")]
    VerifyFailed { address: u64, expected: PatchState },

    #[error("could not find the patch site; the game version is probably unsupported")]
    PatchNotFound,

    #[cfg(windows)]
    #[error(transparent)]
    Os(#[from] windows::core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
