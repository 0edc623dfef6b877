//! Linear signature scan over the committed memory of a process.

use memchr::memmem;

use crate::{
    error::Result,
    memory::{MemoryRegion, ProcessMemory},
    pattern::Pattern,
};

/// Which regions to include in a scan, and how much to read at a time.
///
/// Readable regions are always scanned. Writable and executable regions are only scanned
/// if the matching flag is set.
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub writable: bool,
    pub executable: bool,
    pub chunk_size: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            writable: true,
            executable: true,
            chunk_size: 1 << 20,
        }
    }
}

impl ScanOptions {
    fn includes(&self, region: &MemoryRegion) -> bool {
        let p = region.protection;
        p.readable
            && !p.guard
            && (self.writable || !p.writable)
            && (self.executable || !p.executable)
    }
}

/// Returns the address of every match of `pattern`, in ascending order.
///
/// Matches spanning two regions are not reported.
pub fn scan<M: ProcessMemory + ?Sized>(
    memory: &M,
    pattern: &Pattern,
    options: &ScanOptions,
) -> Result<Vec<u64>> {
    let (anchor_offset, anchor) = pattern.anchor();
    let finder = memmem::Finder::new(&anchor);

    // Consecutive chunks overlap so that a match straddling the boundary is fully
    // contained in the later one
    let chunk_size = options.chunk_size.max(pattern.len());
    let overlap = pattern.len() - 1;

    let mut regions = memory.regions()?;
    regions.retain(|r| options.includes(r));
    regions.sort_by_key(|r| r.base);
    log::debug!("Scanning {} regions for {pattern}", regions.len());

    let mut matches = Vec::new();
    let mut buf = vec![0u8; chunk_size];
    for region in regions {
        let mut offset = 0;
        while offset < region.size {
            let len = chunk_size.min(region.size - offset);
            let chunk_address = region.base + offset as u64;
            let chunk = &mut buf[..len];

            match memory.read(chunk_address, chunk) {
                Ok(()) => {
                    for hit in finder.find_iter(chunk) {
                        let Some(start) = hit.checked_sub(anchor_offset) else {
                            continue;
                        };
                        if pattern.matches(&chunk[start..]) {
                            matches.push(chunk_address + start as u64);
                        }
                    }
                }
                Err(e) => log::trace!("Skipping chunk at {chunk_address:016x}: {e}"),
            }

            if offset + len == region.size {
                break;
            }
            offset += len - overlap;
        }
    }

    log::debug!("Found {} matches for {pattern}", matches.len());
    Ok(matches)
}

/// Returns the lowest address matching `pattern`, if any.
pub fn scan_first<M: ProcessMemory + ?Sized>(
    memory: &M,
    pattern: &Pattern,
    options: &ScanOptions,
) -> Result<Option<u64>> {
    Ok(scan(memory, pattern, options)?
        .into_iter()
        .find(|&address| address != 0))
}
