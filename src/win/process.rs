use std::ffi::c_void;

use windows::Win32::{
    Foundation::{CloseHandle, HANDLE, STILL_ACTIVE},
    System::{
        Diagnostics::{
            Debug::{FlushInstructionCache, ReadProcessMemory, WriteProcessMemory},
            ToolHelp::{
                CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
                TH32CS_SNAPPROCESS,
            },
        },
        Memory::{
            VirtualProtectEx, VirtualQueryEx, MEMORY_BASIC_INFORMATION, MEM_COMMIT,
            PAGE_EXECUTE_READWRITE, PAGE_PROTECTION_FLAGS,
        },
        Threading::{
            GetExitCodeProcess, OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_OPERATION,
            PROCESS_VM_READ, PROCESS_VM_WRITE,
        },
    },
};

use crate::{
    error::{Error, Result},
    memory::{MemoryRegion, ProcessLocator, ProcessMemory, Protection},
};

/// Closes the wrapped handle on drop.
struct OwnedHandle(HANDLE);

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

/// An open handle to another process with read, write and query rights.
pub struct WinProcess {
    handle: OwnedHandle,
    pid: u32,
}

impl WinProcess {
    pub fn open(pid: u32) -> Result<Self> {
        let access =
            PROCESS_QUERY_INFORMATION | PROCESS_VM_READ | PROCESS_VM_WRITE | PROCESS_VM_OPERATION;
        let handle = unsafe { OpenProcess(access, false, pid)? };
        Ok(Self {
            handle: OwnedHandle(handle),
            pid,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl ProcessMemory for WinProcess {
    fn regions(&self) -> Result<Vec<MemoryRegion>> {
        let mut regions = Vec::new();
        let mut address = 0usize;
        let mut info = MEMORY_BASIC_INFORMATION::default();

        while unsafe {
            VirtualQueryEx(
                self.handle.0,
                Some(address as *const c_void),
                &mut info,
                size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        } != 0
        {
            let base = info.BaseAddress as usize;
            if info.State == MEM_COMMIT && MemoryRegion::is_process_owned_win32(info.Type.0) {
                regions.push(MemoryRegion {
                    base: base as u64,
                    size: info.RegionSize,
                    protection: Protection::from_win32(info.Protect.0),
                });
            }

            match base.checked_add(info.RegionSize) {
                Some(next) if next > address => address = next,
                _ => break,
            }
        }

        log::trace!("{} committed regions in process {}", regions.len(), self.pid);
        Ok(regions)
    }

    fn read(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        let mut bytes_read = 0;
        let ok = unsafe {
            ReadProcessMemory(
                self.handle.0,
                address as *const c_void,
                buf.as_mut_ptr() as *mut c_void,
                buf.len(),
                Some(&mut bytes_read),
            )
        }
        .is_ok();

        if !ok || bytes_read != buf.len() {
            return Err(Error::Read {
                address,
                len: buf.len(),
            });
        }
        Ok(())
    }

    fn write(&self, address: u64, bytes: &[u8]) -> Result<()> {
        let ptr = address as *const c_void;
        let mut old_protect = PAGE_PROTECTION_FLAGS::default();
        unsafe {
            VirtualProtectEx(
                self.handle.0,
                ptr,
                bytes.len(),
                PAGE_EXECUTE_READWRITE,
                &mut old_protect,
            )?
        };

        let mut written = 0;
        let write_result = unsafe {
            WriteProcessMemory(
                self.handle.0,
                ptr,
                bytes.as_ptr() as *const c_void,
                bytes.len(),
                Some(&mut written),
            )
        };

        let mut unused = PAGE_PROTECTION_FLAGS::default();
        unsafe {
            if let Err(e) = VirtualProtectEx(self.handle.0, ptr, bytes.len(), old_protect, &mut unused)
            {
                log::warn!("Failed to restore page protection at {address:016x}: {e}");
            }
            let _ = FlushInstructionCache(self.handle.0, Some(ptr), bytes.len());
        }

        if write_result.is_err() || written != bytes.len() {
            return Err(Error::Write {
                address,
                len: bytes.len(),
            });
        }
        Ok(())
    }

    fn is_alive(&self) -> bool {
        let mut exit_code = 0;
        unsafe { GetExitCodeProcess(self.handle.0, &mut exit_code) }.is_ok()
            && exit_code == STILL_ACTIVE.0 as u32
    }
}

/// Finds processes through a ToolHelp snapshot.
#[derive(Debug, Default)]
pub struct WinProcessLocator;

impl WinProcessLocator {
    /// Returns the PID of the first process whose executable name matches, ignoring case.
    pub fn find_pid(name: &str) -> Result<Option<u32>> {
        let snapshot = OwnedHandle(unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)? });

        let mut entry = PROCESSENTRY32W {
            dwSize: size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        let mut next = unsafe { Process32FirstW(snapshot.0, &mut entry) };
        while next.is_ok() {
            let len = entry
                .szExeFile
                .iter()
                .position(|&c| c == 0)
                .unwrap_or(entry.szExeFile.len());
            let exe_name = String::from_utf16_lossy(&entry.szExeFile[..len]);
            if exe_name.eq_ignore_ascii_case(name) {
                return Ok(Some(entry.th32ProcessID));
            }
            next = unsafe { Process32NextW(snapshot.0, &mut entry) };
        }
        Ok(None)
    }
}

impl ProcessLocator for WinProcessLocator {
    type Process = WinProcess;

    fn open(&mut self, name: &str) -> Result<Option<WinProcess>> {
        let Some(pid) = Self::find_pid(name)? else {
            return Ok(None);
        };

        // The process can be visible before it accepts handles, or may need elevation
        match WinProcess::open(pid) {
            Ok(process) => {
                log::debug!("Opened {name} (PID {pid})");
                Ok(Some(process))
            }
            Err(e) => {
                log::warn!("Found {name} (PID {pid}) but could not open it: {e}");
                Ok(None)
            }
        }
    }
}
