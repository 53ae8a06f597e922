//! Page mapping emulated on top of the global allocator, for platforms
//! without a native `mmap` path.

use std::{
    alloc::{Layout, alloc_zeroed, dealloc},
    ptr::NonNull,
};

use crate::PageKind;

/// Allocates at least `size` zero-filled bytes aligned to the page size of `kind`.
pub fn map(size: usize, kind: PageKind) -> std::io::Result<(NonNull<u8>, usize)> {
    let layout = page_layout(size.max(1), kind)?;
    let ptr = unsafe { alloc_zeroed(layout) };
    NonNull::new(ptr)
        .map(|ptr| (ptr, layout.size()))
        .ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::OutOfMemory, "failed to allocate pages")
        })
}

/// Releases memory returned by [`map`].
///
/// # Safety
///
/// `ptr`, `capacity` and `kind` must be exactly what a previous [`map`] call
/// produced, and the memory must not have been released already.
pub unsafe fn unmap(ptr: NonNull<u8>, capacity: usize, kind: PageKind) -> std::io::Result<()> {
    let layout = page_layout(capacity, kind)?;
    unsafe { dealloc(ptr.as_ptr(), layout) };
    Ok(())
}

pub fn get_page_size() -> usize {
    4 * 1024
}

pub fn get_large_page_size() -> usize {
    2 * 1024 * 1024
}

fn page_layout(size: usize, kind: PageKind) -> std::io::Result<Layout> {
    let page_size = kind.page_size();
    let capacity = size
        .checked_next_multiple_of(page_size)
        .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::OutOfMemory))?;
    Layout::from_size_align(capacity, page_size)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid layout"))
}
