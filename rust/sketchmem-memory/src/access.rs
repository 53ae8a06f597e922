//! Region-free access tiers.
//!
//! Memory is read and written through four tiers, from safest to fastest:
//!
//! 1. **Checked** ([`MemoryRegion::get`], [`MemoryRegion::put`] and the
//!    `u64` forms): validate the access against the region's capacity and
//!    return `OutOfBounds` on failure.
//! 2. **Unchecked** ([`MemoryRegion::get_unchecked`],
//!    [`MemoryRegion::put_unchecked`]): same shape, no bounds check.
//! 3. **Unchecked raw** ([`get_unchecked_raw`], [`put_unchecked_raw`]): take
//!    an `(object, address)` pair resolved once by
//!    [`MemoryRegion::raw_parts`], so tight loops pay no field reads on the
//!    region at all.
//! 4. **Direct only** ([`get_direct_only`], [`put_direct_only`]): take just an
//!    absolute address from [`MemoryRegion::native_address`]; only meaningful
//!    for natively addressed regions.
//!
//! Tiers 2 to 4 perform no validation whatsoever. A misuse is undefined
//! behavior, not an error: that is the price of their speed.
//!
//! Values are stored in native byte order and need not be aligned.
//!
//! [`MemoryRegion::get`]: crate::MemoryRegion::get
//! [`MemoryRegion::put`]: crate::MemoryRegion::put
//! [`MemoryRegion::get_unchecked`]: crate::MemoryRegion::get_unchecked
//! [`MemoryRegion::put_unchecked`]: crate::MemoryRegion::put_unchecked
//! [`MemoryRegion::raw_parts`]: crate::MemoryRegion::raw_parts
//! [`MemoryRegion::native_address`]: crate::MemoryRegion::native_address

use bytemuck::Pod;

use crate::address::resolve_raw;

/// Reads a `T` at `address` relative to `object` (absolute if `object` is null).
///
/// # Safety
///
/// The pair must come from [`MemoryRegion::raw_parts`](crate::MemoryRegion::raw_parts)
/// of a live region, adjusted only by offsets that keep the whole `T` inside
/// the region, and the region must outlive the call.
#[inline(always)]
pub unsafe fn get_unchecked_raw<T: Pod>(object: *const u8, address: usize) -> T {
    unsafe {
        resolve_raw(object as *mut u8, address)
            .cast::<T>()
            .read_unaligned()
    }
}

/// Writes a `T` at `address` relative to `object` (absolute if `object` is null).
///
/// # Safety
///
/// Same as [`get_unchecked_raw`]; additionally no other reference to the
/// written bytes may be live.
#[inline(always)]
pub unsafe fn put_unchecked_raw<T: Pod>(object: *mut u8, address: usize, value: T) {
    unsafe {
        resolve_raw(object, address)
            .cast::<T>()
            .write_unaligned(value)
    }
}

/// # Safety
///
/// See [`get_unchecked_raw`].
#[inline(always)]
pub unsafe fn get_u64_unchecked_raw(object: *const u8, address: usize) -> u64 {
    unsafe { get_unchecked_raw::<u64>(object, address) }
}

/// # Safety
///
/// See [`put_unchecked_raw`].
#[inline(always)]
pub unsafe fn put_u64_unchecked_raw(object: *mut u8, address: usize, value: u64) {
    unsafe { put_unchecked_raw::<u64>(object, address, value) }
}

/// Reads a `T` at an absolute native address.
///
/// # Safety
///
/// `address` must come from
/// [`MemoryRegion::native_address`](crate::MemoryRegion::native_address) of a
/// live, natively addressed region, with the whole `T` inside the region.
#[inline(always)]
pub unsafe fn get_direct_only<T: Pod>(address: usize) -> T {
    unsafe {
        std::ptr::with_exposed_provenance::<T>(address).read_unaligned()
    }
}

/// Writes a `T` at an absolute native address.
///
/// # Safety
///
/// Same as [`get_direct_only`]; additionally no other reference to the
/// written bytes may be live.
#[inline(always)]
pub unsafe fn put_direct_only<T: Pod>(address: usize, value: T) {
    unsafe {
        std::ptr::with_exposed_provenance_mut::<T>(address).write_unaligned(value)
    }
}

/// # Safety
///
/// See [`get_direct_only`].
#[inline(always)]
pub unsafe fn get_u64_direct_only(address: usize) -> u64 {
    unsafe { get_direct_only::<u64>(address) }
}

/// # Safety
///
/// See [`put_direct_only`].
#[inline(always)]
pub unsafe fn put_u64_direct_only(address: usize, value: u64) {
    unsafe { put_direct_only::<u64>(address, value) }
}
