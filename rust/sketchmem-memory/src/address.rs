//! Effective address computation for memory regions.
//!
//! A region is addressed in exactly one of two ways: relative to a heap
//! object (a vector or an array-backed buffer owned by the region), or by an
//! absolute native address. [`Addressing`] encodes that choice as a tagged
//! variant, so the "one or the other, never both" rule holds by construction.
//! [`Addressing::from_raw_parts`] is the only way to build one from a loose
//! `(object, native_base_address, heap_base_offset)` triple, and it panics on
//! any mixed state.

use std::{num::NonZeroUsize, ptr::NonNull};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Bytes live inside a heap object; the first addressable byte is
    /// `offset` bytes past the start of the object's storage.
    Heap { object: NonNull<u8>, offset: usize },
    /// Bytes live off-heap, starting at `address`.
    Native { address: NonZeroUsize },
}

impl Addressing {
    /// Heap addressing relative to the storage start of `object`.
    #[inline]
    pub fn heap(object: NonNull<u8>, offset: usize) -> Addressing {
        Addressing::Heap { object, offset }
    }

    /// Native addressing starting at `ptr`.
    ///
    /// The pointer's provenance is exposed so that the integer address can be
    /// turned back into a usable pointer by the unchecked access tiers.
    #[inline]
    pub fn native(ptr: NonNull<u8>) -> Addressing {
        let address = ptr.as_ptr().expose_provenance();
        Addressing::Native {
            address: NonZeroUsize::new(address).expect("non-null pointer has non-zero address"),
        }
    }

    /// Builds an addressing mode from the legacy pair of base fields.
    ///
    /// Exactly one mode must be described: either a non-null `object` with a
    /// zero `native_base_address`, or a null `object` with a non-zero
    /// `native_base_address` and a zero `heap_base_offset`.
    ///
    /// # Panics
    ///
    /// Panics on any mixed or empty combination. Such a state is a bug in the
    /// code constructing the region; continuing would compute a wrong address.
    pub fn from_raw_parts(
        object: *mut u8,
        native_base_address: usize,
        heap_base_offset: usize,
    ) -> Addressing {
        match (NonNull::new(object), NonZeroUsize::new(native_base_address)) {
            (Some(object), None) => Addressing::Heap {
                object,
                offset: heap_base_offset,
            },
            (None, Some(address)) if heap_base_offset == 0 => Addressing::Native { address },
            _ => panic!(
                "addressing invariant violated: object={object:p}, \
                 native_base_address={native_base_address:#x}, heap_base_offset={heap_base_offset}"
            ),
        }
    }

    #[inline]
    pub fn is_native(&self) -> bool {
        matches!(self, Addressing::Native { .. })
    }

    /// The absolute base address, or 0 for heap addressing.
    #[inline]
    pub fn native_base_address(&self) -> usize {
        match *self {
            Addressing::Native { address } => address.get(),
            Addressing::Heap { .. } => 0,
        }
    }

    /// The offset of the first byte within the heap object, or 0 for native
    /// addressing.
    #[inline]
    pub fn heap_base_offset(&self) -> usize {
        match *self {
            Addressing::Heap { offset, .. } => offset,
            Addressing::Native { .. } => 0,
        }
    }

    /// Splits the addressing into the `(object, address)` pair consumed by
    /// [`crate::access::get_unchecked_raw`]: for heap addressing `object` is
    /// the storage start and `address` the byte offset within it; for native
    /// addressing `object` is null and `address` is absolute.
    #[inline]
    pub fn raw_parts(&self, offset: usize) -> (*mut u8, usize) {
        match *self {
            Addressing::Heap { object, offset: base } => (object.as_ptr(), base.wrapping_add(offset)),
            Addressing::Native { address } => (std::ptr::null_mut(), address.get().wrapping_add(offset)),
        }
    }

    /// Computes the effective pointer for `offset`:
    /// `native_base_address + heap_base_offset + offset` relative to the object.
    ///
    /// No bounds are checked; the pointer is only valid to dereference when the
    /// caller has established that the access lies within the region.
    #[inline]
    pub fn resolve(&self, offset: usize) -> *mut u8 {
        let (object, address) = self.raw_parts(offset);
        resolve_raw(object, address)
    }
}

/// Computes the effective pointer of an `(object, address)` pair.
///
/// A null `object` means `address` is absolute; otherwise `address` is a
/// byte offset from `object`.
#[inline(always)]
pub fn resolve_raw(object: *mut u8, address: usize) -> *mut u8 {
    if object.is_null() {
        std::ptr::with_exposed_provenance_mut(address)
    } else {
        object.wrapping_add(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_parts() {
        let mut storage = [0u8; 32];
        let object = NonNull::new(storage.as_mut_ptr()).unwrap();
        let a = Addressing::heap(object, 16);
        assert!(!a.is_native());
        assert_eq!(a.native_base_address(), 0);
        assert_eq!(a.heap_base_offset(), 16);
        assert_eq!(a.raw_parts(4), (storage.as_mut_ptr(), 20));
        assert_eq!(a.resolve(4), storage.as_mut_ptr().wrapping_add(20));
    }

    #[test]
    fn test_native_parts() {
        let mut storage = [0u64; 4];
        let ptr = NonNull::new(storage.as_mut_ptr() as *mut u8).unwrap();
        let a = Addressing::native(ptr);
        assert!(a.is_native());
        assert_eq!(a.heap_base_offset(), 0);
        assert_eq!(a.native_base_address(), ptr.as_ptr() as usize);
        let (object, address) = a.raw_parts(8);
        assert!(object.is_null());
        assert_eq!(address, ptr.as_ptr() as usize + 8);
        assert_eq!(a.resolve(8) as usize, ptr.as_ptr() as usize + 8);
    }

    #[test]
    fn test_from_raw_parts_valid() {
        let mut storage = [0u8; 8];
        let heap = Addressing::from_raw_parts(storage.as_mut_ptr(), 0, 3);
        assert_eq!(heap.heap_base_offset(), 3);

        let native = Addressing::from_raw_parts(std::ptr::null_mut(), 0x1000, 0);
        assert_eq!(native.native_base_address(), 0x1000);
    }

    #[test]
    #[should_panic(expected = "addressing invariant violated")]
    fn test_from_raw_parts_rejects_both() {
        let mut storage = [0u8; 8];
        Addressing::from_raw_parts(storage.as_mut_ptr(), 0x1000, 0);
    }

    #[test]
    #[should_panic(expected = "addressing invariant violated")]
    fn test_from_raw_parts_rejects_native_with_heap_offset() {
        Addressing::from_raw_parts(std::ptr::null_mut(), 0x1000, 16);
    }

    #[test]
    #[should_panic(expected = "addressing invariant violated")]
    fn test_from_raw_parts_rejects_neither() {
        Addressing::from_raw_parts(std::ptr::null_mut(), 0, 0);
    }
}
