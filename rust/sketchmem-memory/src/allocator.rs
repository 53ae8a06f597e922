//! Native (off-heap) allocation.
//!
//! A [`NativeAllocator`] hands out raw, zero-filled blocks as
//! [`NativeAllocation`] values. Allocations have no destructor of their own:
//! the [`MemoryRegion`](crate::MemoryRegion) that receives one is responsible
//! for giving it back exactly once.

use std::{
    alloc::Layout,
    ptr::NonNull,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicU64, Ordering},
    },
};

use sketchmem_common::{Result, error::Error, verify_arg};
use sketchmem_page_alloc::{Mapping, PageKind, PagePolicy};

/// A raw off-heap block produced by a [`NativeAllocator`].
#[derive(Debug)]
pub struct NativeAllocation {
    ptr: NonNull<u8>,
    /// Requested size in bytes.
    size: usize,
    /// Bytes actually set aside by the allocator, `>= size`.
    reserved: usize,
    /// Allocator-private word, returned untouched on release.
    tag: usize,
}

impl NativeAllocation {
    /// Creates an allocation record.
    ///
    /// # Safety
    ///
    /// `ptr` must point to at least `reserved` writable, zero-initialized bytes
    /// exclusively owned by the caller, and `reserved >= size`.
    pub unsafe fn from_raw_parts(
        ptr: NonNull<u8>,
        size: usize,
        reserved: usize,
        tag: usize,
    ) -> NativeAllocation {
        debug_assert!(reserved >= size);
        NativeAllocation {
            ptr,
            size,
            reserved,
            tag,
        }
    }

    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn reserved(&self) -> usize {
        self.reserved
    }

    #[inline]
    pub fn tag(&self) -> usize {
        self.tag
    }
}

// SAFETY: the allocation is an exclusively owned address range.
unsafe impl Send for NativeAllocation {}

// SAFETY: `NativeAllocation` exposes no access to the memory it describes.
unsafe impl Sync for NativeAllocation {}

/// Source of off-heap memory for natively addressed regions.
pub trait NativeAllocator: Send + Sync {
    /// Allocates `size` zero-filled bytes.
    fn allocate(&self, size: usize) -> Result<NativeAllocation>;

    /// Returns an allocation to this allocator.
    ///
    /// # Safety
    ///
    /// `allocation` must have been produced by `self.allocate`, and no pointer
    /// into it may be used after this call.
    unsafe fn release(&self, allocation: NativeAllocation) -> Result<()>;
}

/// Returns the process-wide default allocator.
pub fn default_allocator() -> Arc<dyn NativeAllocator> {
    static DEFAULT: OnceLock<Arc<SystemAllocator>> = OnceLock::new();
    DEFAULT.get_or_init(|| Arc::new(SystemAllocator::new())).clone()
}

/// Allocates through the global Rust allocator with 64-byte alignment.
#[derive(Debug, Clone, Default)]
pub struct SystemAllocator {
    _private: (),
}

impl SystemAllocator {
    /// Alignment of every block.
    pub const ALIGNMENT: usize = 64;

    pub fn new() -> SystemAllocator {
        SystemAllocator { _private: () }
    }

    fn layout(size: usize) -> Result<Layout> {
        Layout::from_size_align(size, Self::ALIGNMENT)
            .map_err(|e| Error::invalid_arg("size", e.to_string()))
    }
}

impl NativeAllocator for SystemAllocator {
    fn allocate(&self, size: usize) -> Result<NativeAllocation> {
        verify_arg!(size, size != 0);
        let layout = Self::layout(size)?;
        let ptr = NonNull::new(unsafe { std::alloc::alloc_zeroed(layout) }).ok_or_else(|| {
            Error::allocation_failed(size, std::io::ErrorKind::OutOfMemory.into())
        })?;
        log::trace!("system allocate {size} bytes at {ptr:p}");
        Ok(unsafe { NativeAllocation::from_raw_parts(ptr, size, size, 0) })
    }

    unsafe fn release(&self, allocation: NativeAllocation) -> Result<()> {
        let layout = Self::layout(allocation.reserved)?;
        log::trace!(
            "system release {} bytes at {:p}",
            allocation.reserved,
            allocation.ptr
        );
        unsafe { std::alloc::dealloc(allocation.ptr.as_ptr(), layout) };
        Ok(())
    }
}

/// Allocates whole pages directly from the operating system.
///
/// Suited to large regions; every allocation is rounded up to the page size
/// selected by the policy.
#[derive(Debug, Clone, Default)]
pub struct PageAllocator {
    policy: PagePolicy,
}

impl PageAllocator {
    pub fn new(policy: PagePolicy) -> PageAllocator {
        PageAllocator { policy }
    }

    pub fn policy(&self) -> PagePolicy {
        self.policy
    }

    fn encode_kind(kind: PageKind) -> usize {
        match kind {
            PageKind::Regular => 0,
            PageKind::Large => 1,
        }
    }

    fn decode_kind(tag: usize) -> PageKind {
        if tag == 1 {
            PageKind::Large
        } else {
            PageKind::Regular
        }
    }
}

impl NativeAllocator for PageAllocator {
    fn allocate(&self, size: usize) -> Result<NativeAllocation> {
        verify_arg!(size, size != 0);
        let mapping =
            Mapping::map(size, self.policy).map_err(|e| Error::allocation_failed(size, e))?;
        let (ptr, capacity, kind) = mapping.into_raw_parts();
        log::trace!("page allocate {size} bytes ({capacity} mapped, {kind:?}) at {ptr:p}");
        Ok(unsafe { NativeAllocation::from_raw_parts(ptr, size, capacity, Self::encode_kind(kind)) })
    }

    unsafe fn release(&self, allocation: NativeAllocation) -> Result<()> {
        let kind = Self::decode_kind(allocation.tag);
        log::trace!(
            "page release {} bytes at {:p}",
            allocation.reserved,
            allocation.ptr
        );
        let mapping = unsafe { Mapping::from_raw_parts(allocation.ptr, allocation.reserved, kind) };
        unsafe { mapping.unmap() }.map_err(|e| Error::io("unmap native region", e))
    }
}

/// Wraps another allocator and counts its traffic.
///
/// Used to verify that every allocation is released exactly once, and as a
/// cheap leak gauge in debug tooling.
#[derive(Debug, Default)]
pub struct CountingAllocator<A = SystemAllocator> {
    inner: A,
    allocations: AtomicU64,
    releases: AtomicU64,
    live_bytes: AtomicU64,
}

impl<A: NativeAllocator> CountingAllocator<A> {
    pub fn new(inner: A) -> CountingAllocator<A> {
        CountingAllocator {
            inner,
            allocations: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            live_bytes: AtomicU64::new(0),
        }
    }

    /// Number of successful `allocate` calls.
    pub fn allocations(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }

    /// Number of `release` calls.
    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }

    /// Allocations not yet released.
    pub fn live_allocations(&self) -> u64 {
        self.allocations() - self.releases()
    }

    /// Requested bytes not yet released.
    pub fn live_bytes(&self) -> u64 {
        self.live_bytes.load(Ordering::Relaxed)
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

impl<A: NativeAllocator> NativeAllocator for CountingAllocator<A> {
    fn allocate(&self, size: usize) -> Result<NativeAllocation> {
        let allocation = self.inner.allocate(size)?;
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_add(size as u64, Ordering::Relaxed);
        Ok(allocation)
    }

    unsafe fn release(&self, allocation: NativeAllocation) -> Result<()> {
        self.releases.fetch_add(1, Ordering::Relaxed);
        self.live_bytes
            .fetch_sub(allocation.size as u64, Ordering::Relaxed);
        unsafe { self.inner.release(allocation) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_allocate_zeroed_and_aligned() {
        let alloc = SystemAllocator::new();
        let a = alloc.allocate(100).unwrap();
        assert_eq!(a.size(), 100);
        assert!((a.as_ptr().as_ptr() as usize).is_multiple_of(SystemAllocator::ALIGNMENT));
        let bytes = unsafe { std::slice::from_raw_parts(a.as_ptr().as_ptr(), a.size()) };
        assert!(bytes.iter().all(|&b| b == 0));
        unsafe { alloc.release(a).unwrap() };
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(SystemAllocator::new().allocate(0).unwrap_err().is_invalid_arg());
        assert!(PageAllocator::default().allocate(0).unwrap_err().is_invalid_arg());
    }

    #[test]
    fn test_page_allocate_reserves_pages() {
        let alloc = PageAllocator::new(PagePolicy::Regular);
        let a = alloc.allocate(64).unwrap();
        assert_eq!(a.size(), 64);
        assert_eq!(a.reserved(), PageKind::Regular.page_size());
        unsafe { alloc.release(a).unwrap() };
    }

    #[test]
    fn test_page_allocate_with_fallback() {
        let alloc = PageAllocator::new(PagePolicy::LargeWithFallback);
        let a = alloc.allocate(3 * 4096).unwrap();
        assert!(a.reserved() >= 3 * 4096);
        unsafe { alloc.release(a).unwrap() };
    }

    #[test]
    fn test_counting_allocator() {
        let alloc = CountingAllocator::new(SystemAllocator::new());
        let a = alloc.allocate(16).unwrap();
        let b = alloc.allocate(32).unwrap();
        assert_eq!(alloc.allocations(), 2);
        assert_eq!(alloc.live_bytes(), 48);
        unsafe { alloc.release(a).unwrap() };
        assert_eq!(alloc.releases(), 1);
        assert_eq!(alloc.live_allocations(), 1);
        assert_eq!(alloc.live_bytes(), 32);
        unsafe { alloc.release(b).unwrap() };
        assert_eq!(alloc.live_allocations(), 0);
        assert_eq!(alloc.live_bytes(), 0);
    }

    #[test]
    fn test_counting_allocator_ignores_failed_allocation() {
        let alloc = CountingAllocator::new(SystemAllocator::new());
        assert!(alloc.allocate(0).is_err());
        assert_eq!(alloc.allocations(), 0);
    }

    #[test]
    fn test_default_allocator_is_shared() {
        let a = default_allocator();
        let b = default_allocator();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
