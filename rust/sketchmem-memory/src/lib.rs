//! Addressable memory for sketch data structures.
//!
//! A [`MemoryRegion`] lets numeric code read and write fixed-width values at
//! byte offsets whether the bytes live in a heap vector, a [`ByteBuffer`], or
//! off-heap memory from a [`NativeAllocator`]. Access comes in four tiers
//! trading bounds safety for throughput; see [`access`].

pub mod access;
pub mod address;
pub mod allocator;
pub mod buffer;
mod describe;
pub mod region;
pub mod resize;

pub use address::Addressing;
pub use allocator::{
    CountingAllocator, NativeAllocation, NativeAllocator, PageAllocator, SystemAllocator,
    default_allocator,
};
pub use buffer::ByteBuffer;
pub use region::{MemoryRegion, leaked_region_count};
pub use resize::ResizeCallback;
pub use sketchmem_common::{
    Result,
    error::{Error, ErrorKind},
};
pub use sketchmem_page_alloc::PagePolicy;
