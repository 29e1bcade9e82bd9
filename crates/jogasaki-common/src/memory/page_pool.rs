//! Paged memory resource.
//!
//! Pages are fixed-size boxed slices identified by a page number. Fresh pages
//! are numbered consecutively, so two pages are adjacent exactly when their
//! numbers differ by one. Released pages are kept on a free list and handed
//! out again before new pages are allocated.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::constants::MIN_PAGE_SIZE;

/// A page owned by the caller until it is released back to the pool.
#[derive(Debug)]
pub struct Page {
    number: u64,
    data: Box<[u8]>,
}

impl Page {
    /// Returns the page number.
    #[inline]
    #[must_use]
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Returns true if `next` directly follows this page.
    #[inline]
    #[must_use]
    pub fn is_adjacent_to(&self, next: &Page) -> bool {
        self.number.checked_add(1) == Some(next.number)
    }

    /// Returns the page contents.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the page contents mutably.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Returns the page size.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true for a zero-sized page.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Statistics of a page pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PagePoolStats {
    /// Pages handed out so far.
    pub acquired: usize,
    /// Pages given back so far.
    pub released: usize,
    /// Pages currently sitting in the free list.
    pub cached: usize,
}

/// Thread-safe pool of fixed-size pages.
///
/// # Example
///
/// ```rust
/// use jogasaki_common::memory::PagePool;
///
/// let pool = PagePool::new(4096);
/// let a = pool.acquire();
/// let b = pool.acquire();
/// assert!(a.is_adjacent_to(&b));
/// pool.release(a);
/// pool.release(b);
/// assert_eq!(pool.stats().released, 2);
/// ```
#[derive(Debug)]
pub struct PagePool {
    page_size: usize,
    next_number: AtomicU64,
    free: Mutex<Vec<Page>>,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl PagePool {
    /// Creates a pool whose pages hold `page_size` bytes.
    ///
    /// Sizes below the minimum page size are raised to it.
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(MIN_PAGE_SIZE),
            next_number: AtomicU64::new(0),
            free: Mutex::new(Vec::new()),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    /// Returns the page size.
    #[inline]
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Acquires a page. Contents of a recycled page are zeroed.
    pub fn acquire(&self) -> Page {
        self.acquired.fetch_add(1, Ordering::Relaxed);
        if let Some(mut page) = self.free.lock().pop() {
            page.data.fill(0);
            return page;
        }
        Page {
            number: self.next_number.fetch_add(1, Ordering::Relaxed),
            data: vec![0u8; self.page_size].into_boxed_slice(),
        }
    }

    /// Returns a page to the pool.
    pub fn release(&self, page: Page) {
        self.released.fetch_add(1, Ordering::Relaxed);
        self.free.lock().push(page);
    }

    /// Returns the pool statistics.
    #[must_use]
    pub fn stats(&self) -> PagePoolStats {
        PagePoolStats {
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            cached: self.free.lock().len(),
        }
    }

    /// Number of pages currently held by callers.
    #[must_use]
    pub fn in_use(&self) -> usize {
        let stats = self.stats();
        stats.acquired.saturating_sub(stats.released)
    }
}

impl Default for PagePool {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_PAGE_SIZE)
    }
}
