//! LIFO scratch arena.
//!
//! A stack-like allocator used for per-statement scratch memory: evaluation
//! intermediates, encoder buffers and variable-length record payloads.
//! Allocations are addressed by [`ArenaSlice`] handles; the bytes behind a
//! handle never move. A [`Checkpoint`] taken before a unit of work lets the
//! caller drop everything allocated after it in O(1).

/// Handle to bytes allocated in a [`LifoArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ArenaSlice {
    page: u32,
    offset: u32,
    len: u32,
}

impl ArenaSlice {
    /// An empty handle; resolves to an empty slice in any arena.
    pub const EMPTY: Self = Self {
        page: 0,
        offset: 0,
        len: 0,
    };

    /// Size of the serialized handle.
    pub const ENCODED_SIZE: usize = 12;

    /// Returns the length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Serializes the handle for storage inside a record buffer.
    #[must_use]
    pub fn to_le_bytes(&self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..4].copy_from_slice(&self.page.to_le_bytes());
        out[4..8].copy_from_slice(&self.offset.to_le_bytes());
        out[8..12].copy_from_slice(&self.len.to_le_bytes());
        out
    }

    /// Restores a handle written by [`to_le_bytes`](Self::to_le_bytes).
    #[must_use]
    pub fn from_le_bytes(bytes: [u8; 12]) -> Self {
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Self {
            page: word(0),
            offset: word(4),
            len: word(8),
        }
    }

    /// Returns true for a zero-length handle.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Position of a [`LifoArena`] that can be restored later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pages: usize,
    offset: usize,
    sealed: usize,
}

/// Stack-like scratch allocator over fixed-size pages.
///
/// # Example
///
/// ```rust
/// use jogasaki_common::memory::LifoArena;
///
/// let mut arena = LifoArena::new(1024);
/// let cp = arena.checkpoint();
/// let s = arena.alloc_copy(b"hello");
/// assert_eq!(arena.get(s), b"hello");
/// arena.rewind(cp);
/// assert_eq!(arena.allocated_bytes(), 0);
/// ```
#[derive(Debug)]
pub struct LifoArena {
    page_size: usize,
    pages: Vec<Box<[u8]>>,
    /// Bytes used in the last page.
    offset: usize,
    /// Sum of bytes used in all pages but the last.
    sealed: usize,
}

impl LifoArena {
    /// Creates an empty arena; no page is allocated until first use.
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            pages: Vec::new(),
            offset: 0,
            sealed: 0,
        }
    }

    /// Returns the regular page size.
    #[inline]
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the number of pages currently held.
    #[inline]
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Returns the number of bytes handed out since the last reset.
    #[inline]
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.sealed + self.offset
    }

    /// Allocates `len` zeroed bytes.
    pub fn alloc(&mut self, len: usize) -> ArenaSlice {
        if len == 0 {
            return ArenaSlice::EMPTY;
        }
        let fits = self
            .pages
            .last()
            .is_some_and(|page| page.len() - self.offset >= len);
        if !fits {
            // oversize allocations get a dedicated page
            let size = len.max(self.page_size);
            if let Some(last) = self.pages.last() {
                self.sealed += last.len().min(self.offset);
            }
            self.pages.push(vec![0u8; size].into_boxed_slice());
            self.offset = 0;
        }
        let page = self.pages.len() - 1;
        let offset = self.offset;
        self.offset += len;
        let slice = ArenaSlice {
            page: page as u32,
            offset: offset as u32,
            len: len as u32,
        };
        if fits {
            // space may hold bytes from before a rewind
            self.get_mut(slice).fill(0);
        }
        slice
    }

    /// Allocates a copy of `bytes`.
    pub fn alloc_copy(&mut self, bytes: &[u8]) -> ArenaSlice {
        let slice = self.alloc(bytes.len());
        self.get_mut(slice).copy_from_slice(bytes);
        slice
    }

    /// Resolves a handle. Handles released by [`rewind`](Self::rewind) or
    /// [`reset`](Self::reset) resolve to an empty slice.
    #[must_use]
    pub fn get(&self, slice: ArenaSlice) -> &[u8] {
        let start = slice.offset as usize;
        self.pages
            .get(slice.page as usize)
            .and_then(|page| page.get(start..start + slice.len as usize))
            .unwrap_or(&[])
    }

    /// Resolves a handle mutably.
    pub fn get_mut(&mut self, slice: ArenaSlice) -> &mut [u8] {
        let start = slice.offset as usize;
        match self.pages.get_mut(slice.page as usize) {
            Some(page) => page
                .get_mut(start..start + slice.len as usize)
                .unwrap_or(&mut []),
            None => &mut [],
        }
    }

    /// Records the current position.
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pages: self.pages.len(),
            offset: self.offset,
            sealed: self.sealed,
        }
    }

    /// Releases everything allocated after `checkpoint`.
    ///
    /// Pages created after the checkpoint are freed.
    pub fn rewind(&mut self, checkpoint: Checkpoint) {
        if checkpoint.pages > self.pages.len() {
            return;
        }
        if checkpoint.pages == self.pages.len() && checkpoint.offset > self.offset {
            return;
        }
        self.pages.truncate(checkpoint.pages);
        self.offset = checkpoint.offset;
        self.sealed = checkpoint.sealed;
    }

    /// Releases every allocation but keeps the first page.
    pub fn reset(&mut self) {
        self.pages.truncate(1);
        self.offset = 0;
        self.sealed = 0;
        if let Some(page) = self.pages.first_mut() {
            page.fill(0);
        }
    }
}
