/// The kind of pages backing a single mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    /// Regular operating system pages (typically 4KB).
    Regular,
    /// Large (huge) pages, typically 2MB.
    Large,
}

impl PageKind {
    /// Returns the page size, and hence the alignment, of mappings of this kind.
    pub fn page_size(self) -> usize {
        match self {
            PageKind::Regular => crate::mmap::get_page_size(),
            PageKind::Large => crate::mmap::get_large_page_size(),
        }
    }
}

/// Selects which kind of pages a new mapping should use.
///
/// Large pages reduce TLB pressure for big sketches, but need system
/// configuration (and on some platforms privileges) to be available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PagePolicy {
    /// Always map regular pages.
    #[default]
    Regular,
    /// Try large pages first, fall back to regular pages on failure.
    LargeWithFallback,
    /// Map large pages or fail.
    LargeOnly,
}
