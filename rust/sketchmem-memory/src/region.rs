//! `MemoryRegion`: a contiguous byte range addressed by byte offset,
//! regardless of whether the bytes live in a heap vector, a buffer, or
//! native off-heap memory.

use std::{
    ptr::NonNull,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use bytemuck::Pod;
use sketchmem_common::{Result, error::Error, verify_arg};

use crate::{
    Addressing, ByteBuffer, ResizeCallback,
    allocator::{NativeAllocation, NativeAllocator, default_allocator},
};

static LEAKED_REGIONS: AtomicU64 = AtomicU64::new(0);

/// Number of natively allocated regions that were dropped without `free`
/// since process start. Each one was released by the drop-time safety net.
pub fn leaked_region_count() -> u64 {
    LEAKED_REGIONS.load(Ordering::Relaxed)
}

/// A region of addressable memory with fixed-width get/put access.
///
/// # Lifecycle
///
/// Heap and buffer backed regions own their storage like any other value.
/// A natively allocated region must be released with [`MemoryRegion::free`]
/// by whichever component owns it last; dropping it unreleased is a leak
/// that is logged, counted ([`leaked_region_count`]) and then repaired.
///
/// `free` on any region sets the capacity to zero and clears the resize
/// callback, which disables further checked access.
///
/// # Concurrency
///
/// A region is not internally synchronized. Writes require `&mut self`; the
/// raw tiers in [`crate::access`] are `unsafe` and leave synchronization to
/// the caller.
pub struct MemoryRegion {
    backing: Backing,
    /// `None` once a natively allocated region has been freed.
    addressing: Option<Addressing>,
    capacity: usize,
    resize_callback: Option<Arc<dyn ResizeCallback>>,
}

enum Backing {
    Bytes(Vec<u8>),
    Longs(Vec<u64>),
    Buffer(ByteBuffer),
    Native {
        /// `None` once released.
        allocation: Option<NativeAllocation>,
        allocator: Arc<dyn NativeAllocator>,
    },
}

impl MemoryRegion {
    /// Wraps a byte vector; the capacity is its length.
    ///
    /// Fails with `InvalidArgument` if the vector is empty.
    pub fn from_heap_bytes(mut bytes: Vec<u8>) -> Result<MemoryRegion> {
        verify_arg!(bytes, !bytes.is_empty());
        let object = NonNull::new(bytes.as_mut_ptr()).expect("vector pointer is never null");
        let capacity = bytes.len();
        Ok(Self::new(
            Backing::Bytes(bytes),
            Addressing::heap(object, 0),
            capacity,
        ))
    }

    /// Wraps a vector of 64-bit words; the capacity is `8 * len` bytes.
    ///
    /// Fails with `InvalidArgument` if the vector is empty.
    pub fn from_heap_longs(mut longs: Vec<u64>) -> Result<MemoryRegion> {
        verify_arg!(longs, !longs.is_empty());
        let object =
            NonNull::new(longs.as_mut_ptr().cast::<u8>()).expect("vector pointer is never null");
        let capacity = std::mem::size_of_val(longs.as_slice());
        Ok(Self::new(
            Backing::Longs(longs),
            Addressing::heap(object, 0),
            capacity,
        ))
    }

    /// Takes ownership of a buffer and addresses its bytes: natively for a
    /// direct buffer, relative to its vector for an array-backed one.
    ///
    /// The region keeps the buffer alive until the region itself is dropped;
    /// `free` never releases buffer storage.
    pub fn from_buffer(mut buffer: ByteBuffer) -> MemoryRegion {
        let storage = buffer.storage_ptr();
        let addressing = if buffer.is_direct() {
            Addressing::native(storage)
        } else {
            Addressing::heap(storage, buffer.array_offset())
        };
        let capacity = buffer.len();
        Self::new(Backing::Buffer(buffer), addressing, capacity)
    }

    /// Allocates `capacity` zero-filled bytes off-heap from the default
    /// allocator. The caller owns the region and must [`free`](Self::free) it.
    pub fn allocate_native(capacity: usize) -> Result<MemoryRegion> {
        Self::allocate_native_in(capacity, default_allocator())
    }

    /// Allocates `capacity` zero-filled bytes off-heap from `allocator`.
    ///
    /// Fails with `InvalidArgument` for a zero capacity, or with the
    /// allocator's error.
    pub fn allocate_native_in(
        capacity: usize,
        allocator: Arc<dyn NativeAllocator>,
    ) -> Result<MemoryRegion> {
        verify_arg!(capacity, capacity != 0);
        let allocation = allocator.allocate(capacity)?;
        if allocation.size() < capacity {
            let size = allocation.size();
            unsafe { allocator.release(allocation)? };
            return Err(Error::invalid_arg(
                "allocator",
                format!("returned {size} bytes for a request of {capacity}"),
            ));
        }
        let addressing = Addressing::native(allocation.as_ptr());
        Ok(Self::new(
            Backing::Native {
                allocation: Some(allocation),
                allocator,
            },
            addressing,
            capacity,
        ))
    }

    fn new(backing: Backing, addressing: Addressing, capacity: usize) -> MemoryRegion {
        MemoryRegion {
            backing,
            addressing: Some(addressing),
            capacity,
            resize_callback: None,
        }
    }
}

impl MemoryRegion {
    /// Current addressable length in bytes; 0 after `free`.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` if the region is addressed by native address.
    #[inline]
    pub fn is_direct(&self) -> bool {
        self.addressing.is_some_and(|a| a.is_native())
    }

    /// Returns `true` if the bytes live inside a heap vector, either wrapped
    /// directly or through an array-backed buffer.
    pub fn has_array(&self) -> bool {
        match &self.backing {
            Backing::Bytes(_) | Backing::Longs(_) => true,
            Backing::Buffer(buffer) => buffer.has_array(),
            Backing::Native { .. } => false,
        }
    }

    /// Returns `true` if the region was built from a [`ByteBuffer`].
    #[inline]
    pub fn has_buffer(&self) -> bool {
        matches!(self.backing, Backing::Buffer(_))
    }

    /// The buffer this region was built from, if any.
    pub fn buffer(&self) -> Option<&ByteBuffer> {
        match &self.backing {
            Backing::Buffer(buffer) => Some(buffer),
            _ => None,
        }
    }

    /// The addressing mode, or `None` once a native allocation was freed.
    #[inline]
    pub fn addressing(&self) -> Option<Addressing> {
        self.addressing
    }

    /// Absolute address of the first byte, or 0 for heap addressing and for
    /// freed native regions.
    #[inline]
    pub fn native_base_address(&self) -> usize {
        self.addressing.map_or(0, |a| a.native_base_address())
    }

    /// Offset of the first byte within the heap object, or 0 for native
    /// addressing.
    #[inline]
    pub fn heap_base_offset(&self) -> usize {
        self.addressing.map_or(0, |a| a.heap_base_offset())
    }

    /// Returns `true` while the region holds a native allocation it must
    /// release. Buffer-backed direct regions never require `free`: the buffer
    /// owns their storage.
    #[inline]
    pub fn requires_free(&self) -> bool {
        matches!(
            self.backing,
            Backing::Native {
                allocation: Some(_),
                ..
            }
        )
    }

    /// Releases the region.
    ///
    /// A natively allocated region returns its memory to the allocator and
    /// stops being natively addressed. Every region, whatever its backing,
    /// drops to zero capacity and forgets its resize callback. Calling `free`
    /// again is a no-op.
    pub fn free(&mut self) {
        if let Backing::Native {
            allocation,
            allocator,
        } = &mut self.backing
        {
            if let Some(allocation) = allocation.take() {
                let ptr = allocation.as_ptr();
                if let Err(e) = unsafe { allocator.release(allocation) } {
                    log::warn!("failed to release native region at {ptr:p}: {e}");
                }
                self.addressing = None;
            }
        }
        self.capacity = 0;
        self.resize_callback = None;
    }

    pub fn resize_callback(&self) -> Option<Arc<dyn ResizeCallback>> {
        self.resize_callback.clone()
    }

    /// Stores a resize capability for the container that owns this region.
    /// The region never invokes it.
    pub fn set_resize_callback(&mut self, callback: Arc<dyn ResizeCallback>) {
        self.resize_callback = Some(callback);
    }
}

/// Checked tier.
impl MemoryRegion {
    /// Reads a `T` at `offset`.
    ///
    /// Fails with `OutOfBounds` unless `offset + size_of::<T>() <= capacity`.
    #[inline]
    pub fn get<T: Pod>(&self, offset: usize) -> Result<T> {
        let ptr = self.checked_ptr(offset, std::mem::size_of::<T>())?;
        Ok(unsafe { ptr.cast::<T>().read_unaligned() })
    }

    /// Writes a `T` at `offset`.
    ///
    /// Fails with `OutOfBounds` unless `offset + size_of::<T>() <= capacity`.
    #[inline]
    pub fn put<T: Pod>(&mut self, offset: usize, value: T) -> Result<()> {
        let ptr = self.checked_ptr(offset, std::mem::size_of::<T>())?;
        unsafe { ptr.cast::<T>().write_unaligned(value) };
        Ok(())
    }

    #[inline]
    pub fn get_u64(&self, offset: usize) -> Result<u64> {
        self.get::<u64>(offset)
    }

    #[inline]
    pub fn put_u64(&mut self, offset: usize, value: u64) -> Result<()> {
        self.put::<u64>(offset, value)
    }

    /// Copies `dst.len()` bytes starting at `offset` into `dst`.
    pub fn get_bytes(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let ptr = self.checked_ptr(offset, dst.len())?;
        unsafe { std::ptr::copy_nonoverlapping(ptr, dst.as_mut_ptr(), dst.len()) };
        Ok(())
    }

    /// Copies `src` into the region starting at `offset`.
    pub fn put_bytes(&mut self, offset: usize, src: &[u8]) -> Result<()> {
        let ptr = self.checked_ptr(offset, src.len())?;
        unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), ptr, src.len()) };
        Ok(())
    }

    /// Sets `len` bytes starting at `offset` to `value`.
    pub fn fill(&mut self, offset: usize, len: usize, value: u8) -> Result<()> {
        let ptr = self.checked_ptr(offset, len)?;
        unsafe { ptr.write_bytes(value, len) };
        Ok(())
    }

    /// Zeroes the whole region.
    pub fn clear(&mut self) {
        self.as_mut_slice().fill(0);
    }

    /// Copies `len` bytes from this region at `src_offset` into `dst` at
    /// `dst_offset`. Both ranges are checked before anything is copied.
    pub fn copy_to(
        &self,
        src_offset: usize,
        dst: &mut MemoryRegion,
        dst_offset: usize,
        len: usize,
    ) -> Result<()> {
        let src = self.checked_ptr(src_offset, len)?;
        let dst = dst.checked_ptr(dst_offset, len)?;
        unsafe { std::ptr::copy_nonoverlapping(src, dst, len) };
        Ok(())
    }

    /// The addressable bytes; empty after `free`.
    pub fn as_slice(&self) -> &[u8] {
        match self.addressing {
            Some(a) if self.capacity != 0 => unsafe {
                std::slice::from_raw_parts(a.resolve(0), self.capacity)
            },
            _ => &[],
        }
    }

    /// The addressable bytes; empty after `free`.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self.addressing {
            Some(a) if self.capacity != 0 => unsafe {
                std::slice::from_raw_parts_mut(a.resolve(0), self.capacity)
            },
            _ => &mut [],
        }
    }

    #[inline]
    fn checked_ptr(&self, offset: usize, width: usize) -> Result<*mut u8> {
        match (offset.checked_add(width), self.addressing) {
            (Some(end), Some(addressing)) if end <= self.capacity => Ok(addressing.resolve(offset)),
            _ => Err(Error::out_of_bounds(offset, width, self.capacity)),
        }
    }
}

/// Unchecked tier and raw address export.
impl MemoryRegion {
    /// Reads a `T` at `offset` without a bounds check.
    ///
    /// # Safety
    ///
    /// The region must not be freed, and `offset + size_of::<T>()` must not
    /// exceed the memory backing it.
    #[inline(always)]
    pub unsafe fn get_unchecked<T: Pod>(&self, offset: usize) -> T {
        unsafe {
            self.addressing
                .unwrap_unchecked()
                .resolve(offset)
                .cast::<T>()
                .read_unaligned()
        }
    }

    /// Writes a `T` at `offset` without a bounds check.
    ///
    /// # Safety
    ///
    /// Same as [`get_unchecked`](Self::get_unchecked).
    #[inline(always)]
    pub unsafe fn put_unchecked<T: Pod>(&mut self, offset: usize, value: T) {
        unsafe {
            self.addressing
                .unwrap_unchecked()
                .resolve(offset)
                .cast::<T>()
                .write_unaligned(value)
        }
    }

    /// # Safety
    ///
    /// See [`get_unchecked`](Self::get_unchecked).
    #[inline(always)]
    pub unsafe fn get_u64_unchecked(&self, offset: usize) -> u64 {
        unsafe { self.get_unchecked::<u64>(offset) }
    }

    /// # Safety
    ///
    /// See [`put_unchecked`](Self::put_unchecked).
    #[inline(always)]
    pub unsafe fn put_u64_unchecked(&mut self, offset: usize, value: u64) {
        unsafe { self.put_unchecked::<u64>(offset, value) }
    }

    /// Resolves `offset` into the `(object, address)` pair taken by
    /// [`crate::access::get_unchecked_raw`]. Advancing `address` by `n` moves
    /// the access `n` bytes forward. Returns `None` after a native `free`.
    ///
    /// The pair is valid only while the region is alive and not freed.
    #[inline]
    pub fn raw_parts(&self, offset: usize) -> Option<(*mut u8, usize)> {
        self.addressing.map(|a| a.raw_parts(offset))
    }

    /// Absolute address of `offset` for [`crate::access::get_direct_only`],
    /// or `None` unless the region is natively addressed.
    ///
    /// The address is valid only while the region is alive and not freed.
    #[inline]
    pub fn native_address(&self, offset: usize) -> Option<usize> {
        match self.addressing {
            Some(a @ Addressing::Native { .. }) => Some(a.native_base_address().wrapping_add(offset)),
            _ => None,
        }
    }
}

impl MemoryRegion {
    pub(crate) fn backing_name(&self) -> &'static str {
        match &self.backing {
            Backing::Bytes(_) => "heap bytes",
            Backing::Longs(_) => "heap longs",
            Backing::Buffer(buffer) if buffer.is_direct() => "direct buffer",
            Backing::Buffer(_) => "heap buffer",
            Backing::Native { .. } => "native",
        }
    }

    /// Bytes held by the backing storage, which may exceed the capacity
    /// (page rounding, alignment padding) or outlive it (after `free`).
    pub(crate) fn backing_bytes(&self) -> usize {
        match &self.backing {
            Backing::Bytes(bytes) => bytes.len(),
            Backing::Longs(longs) => std::mem::size_of_val(longs.as_slice()),
            Backing::Buffer(buffer) => buffer.len() + buffer.array_offset(),
            Backing::Native { allocation, .. } => allocation.as_ref().map_or(0, |a| a.reserved()),
        }
    }
}

impl Drop for MemoryRegion {
    fn drop(&mut self) {
        if self.requires_free() {
            LEAKED_REGIONS.fetch_add(1, Ordering::Relaxed);
            log::error!(
                "native memory region at {:#x} ({} bytes) dropped without free(), releasing it",
                self.native_base_address(),
                self.capacity
            );
            self.free();
        }
    }
}

// SAFETY: the region exclusively owns (or keeps alive) the memory it
// addresses; the raw pointers it stores have no thread affinity.
unsafe impl Send for MemoryRegion {}

// SAFETY: all mutation through the safe API requires `&mut self`.
unsafe impl Sync for MemoryRegion {}
