use crate::error::Result;

/// Page protection of a committed memory region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Protection {
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
    /// Guard pages fault on first access and are never scanned.
    pub guard: bool,
}

impl Protection {
    /// Decodes Win32 `PAGE_*` protection flags.
    pub fn from_win32(flags: u32) -> Self {
        const READ: u32 = 0x02 | 0x04 | 0x08 | 0x20 | 0x40 | 0x80;
        const WRITE: u32 = 0x04 | 0x08 | 0x40 | 0x80;
        const EXECUTE: u32 = 0x10 | 0x20 | 0x40 | 0x80;
        const GUARD: u32 = 0x100;

        Self {
            readable: flags & READ != 0,
            writable: flags & WRITE != 0,
            executable: flags & EXECUTE != 0,
            guard: flags & GUARD != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub base: u64,
    pub size: usize,
    pub protection: Protection,
}

impl MemoryRegion {
    pub fn end(&self) -> u64 {
        self.base + self.size as u64
    }

    /// Whether a region of Win32 type `MEM_*` belongs to the process itself.
    ///
    /// Only loaded images and private allocations qualify. Mapped file views (a copy of the
    /// executable opened as data, shared sections) are skipped, since patching one leaves
    /// the running code untouched.
    pub fn is_process_owned_win32(mem_type: u32) -> bool {
        const MEM_PRIVATE: u32 = 0x20000;
        const MEM_IMAGE: u32 = 0x1000000;

        mem_type == MEM_PRIVATE || mem_type == MEM_IMAGE
    }
}

/// Access to the address space of another process.
pub trait ProcessMemory {
    /// Committed regions of the address space, in ascending address order.
    fn regions(&self) -> Result<Vec<MemoryRegion>>;

    /// Fills `buf` with the bytes at `address`. Partial reads are errors.
    fn read(&self, address: u64, buf: &mut [u8]) -> Result<()>;

    /// Writes `bytes` at `address`, regardless of the page protection.
    fn write(&self, address: u64, bytes: &[u8]) -> Result<()>;

    /// Returns false once the process has exited.
    fn is_alive(&self) -> bool;
}

/// Finds and opens processes by executable name.
pub trait ProcessLocator {
    type Process: ProcessMemory;

    /// Returns `Ok(None)` if no process with that name is running.
    fn open(&mut self, name: &str) -> Result<Option<Self::Process>>;
}
