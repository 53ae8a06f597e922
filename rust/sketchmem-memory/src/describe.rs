//! Diagnostic rendering of regions for tests and debugging.

use std::fmt;

use sketchmem_common::{Result, error::Error};

use crate::MemoryRegion;

const BYTES_PER_ROW: usize = 8;

impl MemoryRegion {
    /// Renders the backing kind, base addresses and a hex grid of the
    /// `length` bytes starting at `offset`.
    ///
    /// Fails with `OutOfBounds` if the window exceeds the capacity.
    pub fn describe(&self, offset: usize, length: usize) -> Result<String> {
        match offset.checked_add(length) {
            Some(end) if end <= self.capacity() => Ok(Summary {
                region: self,
                window: &self.as_slice()[offset..end],
                offset,
            }
            .to_string()),
            _ => Err(Error::out_of_bounds(offset, length, self.capacity())),
        }
    }
}

struct Summary<'a> {
    region: &'a MemoryRegion,
    window: &'a [u8],
    offset: usize,
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.region;
        writeln!(f, "### MemoryRegion SUMMARY ###")?;
        writeln!(f, "Backing             : {}", r.backing_name())?;
        writeln!(f, "Native base address : {:#x}", r.native_base_address())?;
        writeln!(f, "Heap base offset    : {}", r.heap_base_offset())?;
        writeln!(f, "Capacity            : {}", r.capacity())?;
        writeln!(f, "Has array           : {}", r.has_array())?;
        writeln!(f, "Has buffer          : {}", r.has_buffer())?;
        writeln!(f, "Requires free       : {}", r.requires_free())?;
        writeln!(
            f,
            "Resize callback     : {}",
            if r.resize_callback().is_some() { "set" } else { "none" }
        )?;
        writeln!(
            f,
            "Window              : offset {}, length {}",
            self.offset,
            self.window.len()
        )?;
        write!(f, "ROW:")?;
        for col in 0..BYTES_PER_ROW {
            write!(f, " {col:>2}")?;
        }
        writeln!(f)?;
        for (row, chunk) in self.window.chunks(BYTES_PER_ROW).enumerate() {
            write!(f, "{:>3}:", self.offset + row * BYTES_PER_ROW)?;
            for b in chunk {
                write!(f, " {b:02x}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("backing", &self.backing_name())
            .field("addressing", &self.addressing())
            .field("capacity", &self.capacity())
            .field("backing_bytes", &self.backing_bytes())
            .field("requires_free", &self.requires_free())
            .field("resize_callback", &self.resize_callback().is_some())
            .finish()
    }
}
