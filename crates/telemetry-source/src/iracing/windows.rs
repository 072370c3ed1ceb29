//! Win32 mapping of the simulator's memory-mapped file.
#![expect(unsafe_code, reason = "reading the simulator's shared memory needs Win32 FFI")]

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use std::ptr;
use std::time::Duration;

use tracing::{debug, trace};
use winapi::ctypes::c_void;
use winapi::um::handleapi::CloseHandle;
use winapi::um::memoryapi::{
    FILE_MAP_READ, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile, VirtualQuery,
};
use winapi::um::synchapi::{OpenEventW, WaitForSingleObject};
use winapi::um::winnt::{HANDLE, MEMORY_BASIC_INFORMATION, SYNCHRONIZE};

use super::irsdk::{MemoryOpener, MemoryView};

const MAP_NAME: &str = "Local\\IRSDKMemMapFileName";
const DATA_VALID_EVENT_NAME: &str = "Local\\IRSDKDataValidEvent";

const WAIT_OBJECT_0: u32 = 0;
const WAIT_TIMEOUT: u32 = 0x0000_0102;
const WAIT_FAILED: u32 = u32::MAX;

fn to_wide_null_terminated(value: &str) -> Vec<u16> {
    OsStr::new(value)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

fn close(handle: HANDLE) {
    if handle.is_null() {
        return;
    }
    // SAFETY: `handle` came from OpenFileMappingW/OpenEventW and is closed once.
    let closed = unsafe { CloseHandle(handle) };
    if closed == 0 {
        debug!("CloseHandle failed during IRSDK teardown");
    }
}

/// A read-only view of `Local\IRSDKMemMapFileName`.
struct SharedMemoryView {
    mapping: HANDLE,
    base: *const u8,
    size: usize,
    data_valid_event: HANDLE,
}

// SAFETY: the handles and the read-only view are process-global Win32 objects
// with no thread affinity; the view is only read through `copy_to`.
unsafe impl Send for SharedMemoryView {}

impl SharedMemoryView {
    fn open() -> Option<Self> {
        let map_name = to_wide_null_terminated(MAP_NAME);
        // SAFETY: `map_name` is a valid null-terminated UTF-16 string.
        let mapping = unsafe { OpenFileMappingW(FILE_MAP_READ, 0, map_name.as_ptr()) };
        if mapping.is_null() {
            return None;
        }

        // SAFETY: `mapping` is a live file-mapping handle opened for read.
        let base = unsafe { MapViewOfFile(mapping, FILE_MAP_READ, 0, 0, 0) }
            .cast::<u8>()
            .cast_const();
        if base.is_null() {
            close(mapping);
            return None;
        }

        let mut info = MEMORY_BASIC_INFORMATION {
            BaseAddress: ptr::null_mut(),
            AllocationBase: ptr::null_mut(),
            AllocationProtect: 0,
            RegionSize: 0,
            State: 0,
            Protect: 0,
            Type: 0,
        };
        // SAFETY: `base` is a mapped view and `info` is a writable struct of the
        // size passed.
        let queried = unsafe {
            VirtualQuery(
                base.cast::<c_void>(),
                &raw mut info,
                std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        };
        let size = if queried == 0 { 0 } else { info.RegionSize };

        let event_name = to_wide_null_terminated(DATA_VALID_EVENT_NAME);
        // SAFETY: `event_name` is a valid null-terminated UTF-16 string.
        let data_valid_event = unsafe { OpenEventW(SYNCHRONIZE, 0, event_name.as_ptr()) };
        if data_valid_event.is_null() {
            debug!("IRSDK data-valid event unavailable; pacing by tick rate");
        }

        debug!(size, "mapped IRSDK shared memory");
        Some(Self {
            mapping,
            base,
            size,
            data_valid_event,
        })
    }
}

impl MemoryView for SharedMemoryView {
    fn size(&self) -> usize {
        self.size
    }

    fn copy_to(&self, offset: usize, dst: &mut [u8]) -> bool {
        let in_bounds = offset
            .checked_add(dst.len())
            .is_some_and(|end| end <= self.size);
        if !in_bounds {
            return false;
        }
        let src = self.base.wrapping_add(offset);
        // SAFETY: `offset..offset + dst.len()` lies inside the mapped region
        // checked above, and `dst` is a distinct local buffer.
        unsafe { ptr::copy_nonoverlapping(src, dst.as_mut_ptr(), dst.len()) };
        true
    }

    fn wait_for_data(&self, timeout: Duration) {
        if self.data_valid_event.is_null() {
            std::thread::sleep(timeout);
            return;
        }
        let timeout_ms = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX).max(1);
        // SAFETY: waiting on an event handle obtained from OpenEventW.
        let status = unsafe { WaitForSingleObject(self.data_valid_event, timeout_ms) };
        match status {
            WAIT_OBJECT_0 | WAIT_TIMEOUT => {}
            WAIT_FAILED => {
                trace!("IRSDK data-valid wait failed");
                std::thread::sleep(timeout);
            }
            other => trace!(status = other, "unexpected IRSDK wait status"),
        }
    }
}

impl Drop for SharedMemoryView {
    fn drop(&mut self) {
        // SAFETY: `base` was returned by MapViewOfFile and is unmapped once.
        let unmapped = unsafe { UnmapViewOfFile(self.base.cast::<c_void>()) };
        if unmapped == 0 {
            debug!("UnmapViewOfFile failed during IRSDK teardown");
        }
        close(self.data_valid_event);
        close(self.mapping);
    }
}

/// Opens the live simulator mapping.
#[derive(Debug, Default)]
pub struct SharedMemoryOpener;

impl MemoryOpener for SharedMemoryOpener {
    fn open(&mut self) -> Option<Box<dyn MemoryView>> {
        SharedMemoryView::open().map(|view| Box::new(view) as Box<dyn MemoryView>)
    }
}
