//! Page-granular off-heap memory for the sketchmem native allocators and
//! direct buffers.
//!
//! [`mapping::Mapping`] is a raw, manually released block of pages;
//! [`page_block::PageBlock`] owns a mapping and releases it on drop.

pub mod config;
pub mod mapping;
pub mod page_block;

#[cfg_attr(target_os = "linux", path = "mmap_linux.rs")]
#[cfg_attr(not(target_os = "linux"), path = "mmap_fallback.rs")]
pub mod mmap;

pub use config::{PageKind, PagePolicy};
pub use mapping::Mapping;
pub use page_block::PageBlock;
