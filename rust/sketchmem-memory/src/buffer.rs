//! `ByteBuffer`: a fixed-length byte buffer that is either array-backed (a
//! `Vec<u8>` on the Rust heap) or direct (mapped pages off the heap).
//!
//! A region built from a buffer takes the buffer with it, which keeps the
//! storage alive for as long as the region can address it. Direct storage is
//! released by the buffer's own drop, never by the region's `free`.

use std::ptr::NonNull;

use sketchmem_common::{Result, error::Error};
use sketchmem_page_alloc::{PageBlock, PagePolicy};

pub struct ByteBuffer {
    storage: Storage,
}

enum Storage {
    Array {
        vec: Vec<u8>,
        /// Offset of the first addressable byte within `vec`.
        offset: usize,
    },
    Direct(PageBlock),
}

impl ByteBuffer {
    /// Alignment of the first addressable byte of buffers created by
    /// [`ByteBuffer::allocate`].
    pub const ALIGNMENT: usize = 64;

    /// Creates a zero-filled, array-backed buffer of `len` bytes.
    ///
    /// The backing vector is over-allocated so that the first addressable byte
    /// is 64-byte aligned; [`ByteBuffer::array_offset`] reports how far into
    /// the vector that byte is.
    pub fn allocate(len: usize) -> ByteBuffer {
        let mut vec = Vec::<u8>::with_capacity(len + Self::ALIGNMENT);
        let p = vec.as_ptr() as usize;
        let offset = p.next_multiple_of(Self::ALIGNMENT) - p;
        vec.resize(offset + len, 0);
        debug_assert_eq!(vec.as_ptr() as usize, p);
        ByteBuffer {
            storage: Storage::Array { vec, offset },
        }
    }

    /// Wraps an existing vector; every byte of it is addressable.
    pub fn wrap(vec: Vec<u8>) -> ByteBuffer {
        ByteBuffer {
            storage: Storage::Array { vec, offset: 0 },
        }
    }

    /// Creates a zero-filled direct buffer of `len` bytes on regular pages.
    pub fn allocate_direct(len: usize) -> Result<ByteBuffer> {
        Self::allocate_direct_with(len, PagePolicy::Regular)
    }

    /// Creates a zero-filled direct buffer of `len` bytes using the given page
    /// policy.
    pub fn allocate_direct_with(len: usize, policy: PagePolicy) -> Result<ByteBuffer> {
        let block = PageBlock::allocate(len, policy).map_err(|e| Error::allocation_failed(len, e))?;
        Ok(ByteBuffer {
            storage: Storage::Direct(block),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Array { vec, offset } => vec.len() - offset,
            Storage::Direct(block) => block.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the bytes live off the Rust heap.
    #[inline]
    pub fn is_direct(&self) -> bool {
        matches!(self.storage, Storage::Direct(_))
    }

    /// Returns `true` if the bytes live inside a heap vector.
    #[inline]
    pub fn has_array(&self) -> bool {
        !self.is_direct()
    }

    /// Offset of the first addressable byte within the backing vector, or 0
    /// for a direct buffer.
    #[inline]
    pub fn array_offset(&self) -> usize {
        match &self.storage {
            Storage::Array { offset, .. } => *offset,
            Storage::Direct(_) => 0,
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match &self.storage {
            Storage::Array { vec, offset } => &vec[*offset..],
            Storage::Direct(block) => block.as_bytes(),
        }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.storage {
            Storage::Array { vec, offset } => &mut vec[*offset..],
            Storage::Direct(block) => block.as_bytes_mut(),
        }
    }

    /// Start of the backing storage: the vector's first element for an
    /// array-backed buffer (not adjusted by the array offset), or the first
    /// byte of the pages for a direct one.
    pub(crate) fn storage_ptr(&mut self) -> NonNull<u8> {
        match &mut self.storage {
            Storage::Array { vec, .. } => {
                NonNull::new(vec.as_mut_ptr()).expect("vector pointer is never null")
            }
            Storage::Direct(block) => block.as_non_null(),
        }
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(vec: Vec<u8>) -> ByteBuffer {
        ByteBuffer::wrap(vec)
    }
}

impl std::fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("len", &self.len())
            .field("direct", &self.is_direct())
            .field("array_offset", &self.array_offset())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_aligned_and_zeroed() {
        let buf = ByteBuffer::allocate(100);
        assert_eq!(buf.len(), 100);
        assert!(buf.has_array());
        assert!(!buf.is_direct());
        assert!(buf.array_offset() < ByteBuffer::ALIGNMENT);
        assert!((buf.as_slice().as_ptr() as usize).is_multiple_of(ByteBuffer::ALIGNMENT));
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_wrap() {
        let buf = ByteBuffer::wrap(vec![1, 2, 3]);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.array_offset(), 0);
        assert_eq!(buf.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn test_direct() {
        let mut buf = ByteBuffer::allocate_direct(256).unwrap();
        assert!(buf.is_direct());
        assert!(!buf.has_array());
        assert_eq!(buf.array_offset(), 0);
        assert_eq!(buf.len(), 256);
        buf.as_mut_slice()[255] = 7;
        assert_eq!(buf.as_slice()[255], 7);
    }

    #[test]
    fn test_storage_ptr_matches_slice() {
        let mut buf = ByteBuffer::allocate(32);
        let offset = buf.array_offset();
        let start = buf.storage_ptr().as_ptr() as usize;
        assert_eq!(start + offset, buf.as_slice().as_ptr() as usize);

        let mut direct = ByteBuffer::allocate_direct(32).unwrap();
        let start = direct.storage_ptr().as_ptr() as usize;
        assert_eq!(start, direct.as_slice().as_ptr() as usize);
    }

    #[test]
    fn test_empty() {
        assert!(ByteBuffer::allocate(0).is_empty());
        assert!(ByteBuffer::wrap(Vec::new()).is_empty());
        assert!(ByteBuffer::allocate_direct(0).unwrap().is_empty());
    }
}
