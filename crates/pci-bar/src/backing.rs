use std::io;
use std::sync::atomic::{fence, Ordering};

/// Owned storage behind a [`crate::BarRegion`].
///
/// A backing hands out raw pointers into its byte range and provides the barrier that must run after
/// every store. [`crate::BarRegion`] is the only caller; it guarantees that every pointer it derives
/// stays within `[0, len())`.
pub trait RegionBacking {
    /// Number of accessible bytes starting at [`RegionBacking::as_ptr`].
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn as_ptr(&self) -> *const u8;

    fn as_mut_ptr(&mut self) -> *mut u8;

    /// Makes a completed store to `[offset, offset + len)` visible to the device.
    ///
    /// Called by [`crate::BarRegion`] after every write, before the write returns.
    fn flush_range(&mut self, offset: usize, len: usize) -> io::Result<()>;
}

/// Host-memory backing with 8-byte alignment.
///
/// Stands in for a device in tests. The write barrier is a plain memory fence.
#[derive(Debug, Clone)]
pub struct HeapBacking {
    words: Box<[u64]>,
    len: usize,
    barriers: u64,
}

impl HeapBacking {
    /// Allocates `len` zeroed bytes.
    pub fn new(len: usize) -> Self {
        let words = vec![0u64; len.div_ceil(8)].into_boxed_slice();
        Self {
            words,
            len,
            barriers: 0,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        // SAFETY: `words` holds at least `len` initialised bytes and `u8` has no alignment needs.
        unsafe { core::slice::from_raw_parts(self.words.as_ptr().cast::<u8>(), self.len) }
    }

    /// Number of write barriers issued so far.
    pub fn barrier_count(&self) -> u64 {
        self.barriers
    }
}

impl RegionBacking for HeapBacking {
    fn len(&self) -> usize {
        self.len
    }

    fn as_ptr(&self) -> *const u8 {
        self.words.as_ptr().cast()
    }

    fn as_mut_ptr(&mut self) -> *mut u8 {
        self.words.as_mut_ptr().cast()
    }

    fn flush_range(&mut self, offset: usize, len: usize) -> io::Result<()> {
        debug_assert!(offset.saturating_add(len) <= self.len);
        fence(Ordering::SeqCst);
        self.barriers += 1;
        Ok(())
    }
}
