//! Anonymous `mmap`-based page mapping.

use std::{ptr::NonNull, sync::OnceLock};

use crate::PageKind;

/// Maps at least `size` bytes of zero-filled, read-write pages of the given kind.
///
/// Returns the start of the mapping and its capacity, which is `size`
/// rounded up to the page size (one page for a zero `size`).
///
/// Large pages need hugepage support configured on the system
/// (see `/proc/sys/vm/nr_hugepages` and `nr_overcommit_hugepages`);
/// otherwise the call fails with the OS error.
pub fn map(size: usize, kind: PageKind) -> std::io::Result<(NonNull<u8>, usize)> {
    let page_size = kind.page_size();
    assert!(page_size.is_power_of_two());
    let capacity = size
        .max(1)
        .checked_next_multiple_of(page_size)
        .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::OutOfMemory))?;

    let mut flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
    if kind == PageKind::Large {
        flags |= libc::MAP_HUGETLB;
    }
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            capacity,
            libc::PROT_READ | libc::PROT_WRITE,
            flags,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(std::io::Error::last_os_error());
    }
    NonNull::new(ptr as *mut u8)
        .map(|ptr| (ptr, capacity))
        .ok_or_else(std::io::Error::last_os_error)
}

/// Unmaps pages returned by [`map`].
///
/// # Safety
///
/// `ptr` and `capacity` must be exactly what a previous [`map`] call returned,
/// the mapping must not have been released already, and no references into it
/// may outlive this call.
pub unsafe fn unmap(ptr: NonNull<u8>, capacity: usize, _kind: PageKind) -> std::io::Result<()> {
    let res = unsafe { libc::munmap(ptr.as_ptr() as *mut libc::c_void, capacity) };
    if res < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Returns the regular page size, cached after the first `sysconf` call.
/// Falls back to 4KB if the size cannot be queried.
pub fn get_page_size() -> usize {
    static SIZE: OnceLock<usize> = OnceLock::new();
    *SIZE.get_or_init(|| read_page_size().unwrap_or(4 * 1024))
}

/// Returns the large page size from `/proc/meminfo`, cached after the first read.
/// Falls back to 2MB if the size cannot be determined.
pub fn get_large_page_size() -> usize {
    static SIZE: OnceLock<usize> = OnceLock::new();
    *SIZE.get_or_init(|| read_large_page_size().unwrap_or(2 * 1024 * 1024))
}

fn read_page_size() -> std::io::Result<usize> {
    let res = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if res <= 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(res as usize)
}

/// Parses the `Hugepagesize:    2048 kB` line.
fn read_large_page_size() -> std::io::Result<usize> {
    let meminfo = std::fs::read_to_string("/proc/meminfo")?;
    meminfo
        .lines()
        .find_map(|line| line.strip_prefix("Hugepagesize:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<usize>().ok())
        .filter(|kb| *kb > 0)
        .map(|kb| kb * 1024)
        .ok_or_else(|| std::io::Error::other("failed to read Hugepagesize"))
}
