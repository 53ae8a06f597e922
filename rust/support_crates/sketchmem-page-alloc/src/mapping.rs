use std::ptr::NonNull;

use crate::{PageKind, PagePolicy, mmap};

/// A block of mapped pages that must be released explicitly with [`Mapping::unmap`].
///
/// `Mapping` deliberately has no `Drop`: it is the raw currency handed to
/// owners (native allocators, page blocks) that decide when the pages go back
/// to the system.
#[derive(Debug)]
pub struct Mapping {
    ptr: NonNull<u8>,
    capacity: usize,
    kind: PageKind,
}

impl Mapping {
    /// Maps at least `size` zero-filled bytes according to `policy`.
    ///
    /// With [`PagePolicy::LargeWithFallback`], a failed large page mapping is
    /// logged and retried with regular pages.
    pub fn map(size: usize, policy: PagePolicy) -> std::io::Result<Mapping> {
        match policy {
            PagePolicy::Regular => Self::map_kind(size, PageKind::Regular),
            PagePolicy::LargeOnly => Self::map_kind(size, PageKind::Large),
            PagePolicy::LargeWithFallback => match Self::map_kind(size, PageKind::Large) {
                Ok(mapping) => Ok(mapping),
                Err(e) => {
                    log::warn!("large page mapping of {size} bytes failed ({e}), using regular pages");
                    Self::map_kind(size, PageKind::Regular)
                }
            },
        }
    }

    fn map_kind(size: usize, kind: PageKind) -> std::io::Result<Mapping> {
        let (ptr, capacity) = mmap::map(size, kind)?;
        debug_assert!((ptr.as_ptr() as usize).is_multiple_of(kind.page_size()));
        Ok(Mapping {
            ptr,
            capacity,
            kind,
        })
    }

    /// Reassembles a mapping from the parts returned by [`Mapping::into_raw_parts`].
    ///
    /// # Safety
    ///
    /// The parts must come from a single live mapping whose ownership is being
    /// handed back; no other `Mapping` may exist for the same pages.
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, capacity: usize, kind: PageKind) -> Mapping {
        Mapping {
            ptr,
            capacity,
            kind,
        }
    }

    /// Decomposes the mapping without releasing it.
    pub fn into_raw_parts(self) -> (NonNull<u8>, usize, PageKind) {
        (self.ptr, self.capacity, self.kind)
    }

    /// Start of the mapped pages.
    #[inline]
    pub fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Size of the mapping in bytes, a multiple of the page size.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn kind(&self) -> PageKind {
        self.kind
    }

    /// Returns the pages to the system.
    ///
    /// # Safety
    ///
    /// No pointer or reference derived from this mapping may be used afterwards.
    pub unsafe fn unmap(self) -> std::io::Result<()> {
        unsafe { mmap::unmap(self.ptr, self.capacity, self.kind) }
    }
}

// SAFETY: a mapping is a plain address range with no thread affinity.
unsafe impl Send for Mapping {}

// SAFETY: `Mapping` exposes no interior access of its own.
unsafe impl Sync for Mapping {}
