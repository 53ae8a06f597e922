//! Growth capability for containers that outgrow their region.

use sketchmem_common::Result;

use crate::MemoryRegion;

/// A hook a container invokes when its region is too small.
///
/// The memory layer only stores the callback on a region and hands it back
/// on request; it never calls it. Growth policy (doubling, pooled buffers,
/// refusal) belongs entirely to the implementor.
pub trait ResizeCallback: Send + Sync {
    /// Returns a new region of at least `new_capacity` bytes to replace
    /// `current`, or an error (typically `ResizeRefused`) if growth is declined.
    ///
    /// Implementations may carry the live bytes of `current` forward, e.g. with
    /// [`MemoryRegion::copy_to`].
    fn request(&self, current: &MemoryRegion, new_capacity: usize) -> Result<MemoryRegion>;

    /// Called by the container once it has switched to `replacement` and no
    /// longer needs `old`. Frees `old` by default.
    fn close(&self, mut old: MemoryRegion, replacement: &MemoryRegion) {
        let _ = replacement;
        old.free();
    }
}
