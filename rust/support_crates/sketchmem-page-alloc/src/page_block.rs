//! `PageBlock`: a fixed-length, zero-initialized byte block backed by mapped
//! pages and released on drop.
//!
//! Direct (natively backed) buffers use page blocks as their storage: the
//! memory lives outside the Rust heap, yet its lifetime follows the owning
//! value like any other resource.

use std::ptr::NonNull;

use crate::{Mapping, PageKind, PagePolicy};

pub struct PageBlock {
    /// `None` only transiently inside `drop`.
    mapping: Option<Mapping>,
    /// Requested length; the mapping capacity may be larger.
    len: usize,
}

impl PageBlock {
    /// Maps a zero-filled block of `len` bytes according to `policy`.
    pub fn allocate(len: usize, policy: PagePolicy) -> std::io::Result<PageBlock> {
        let mapping = Mapping::map(len, policy)?;
        Ok(PageBlock {
            mapping: Some(mapping),
            len,
        })
    }

    /// Maps a zero-filled block of `len` bytes on regular pages.
    pub fn allocate_regular(len: usize) -> std::io::Result<PageBlock> {
        Self::allocate(len, PagePolicy::Regular)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Mapped capacity, at least `len` and a multiple of the page size.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.mapping().capacity()
    }

    #[inline]
    pub fn page_kind(&self) -> PageKind {
        self.mapping().kind()
    }

    /// Start of the block. Never null, stable for the lifetime of the block.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.mapping().ptr().as_ptr()
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mapping().ptr().as_ptr()
    }

    #[inline]
    pub fn as_non_null(&self) -> NonNull<u8> {
        self.mapping().ptr()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.as_mut_ptr(), self.len) }
    }

    #[inline]
    fn mapping(&self) -> &Mapping {
        self.mapping.as_ref().expect("live page block")
    }
}

impl std::ops::Deref for PageBlock {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_bytes()
    }
}

impl std::ops::DerefMut for PageBlock {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_bytes_mut()
    }
}

impl Drop for PageBlock {
    fn drop(&mut self) {
        if let Some(mapping) = self.mapping.take() {
            let ptr = mapping.ptr();
            if let Err(e) = unsafe { mapping.unmap() } {
                log::warn!("failed to unmap page block at {ptr:p}: {e}");
            }
        }
    }
}

impl std::fmt::Debug for PageBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageBlock")
            .field("ptr", &self.as_ptr())
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("page_kind", &self.page_kind())
            .finish()
    }
}
