use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;
use std::ptr::NonNull;

use crate::RegionBacking;

/// A shared, read/write mapping of a file (typically a sysfs `resourceN` node).
///
/// The write barrier is `msync(MS_SYNC | MS_INVALIDATE)` over the pages covering the written span.
/// Dropping the backing unmaps the range and then closes the file.
#[derive(Debug)]
pub struct MmapBacking {
    ptr: NonNull<u8>,
    len: usize,
    page_size: usize,
    _file: File,
}

impl MmapBacking {
    /// Maps the first `len` bytes of `file`.
    ///
    /// The accessible length reported by [`RegionBacking::len`] is `len` rounded up to the page
    /// size, because the kernel always maps whole pages.
    pub fn map(file: File, len: usize) -> io::Result<Self> {
        if len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot map an empty resource",
            ));
        }
        let page_size = page_size()?;

        // SAFETY: a fresh mapping is requested (null hint); the kernel validates fd/len/prot.
        let addr = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| io::Error::other("mmap returned a null mapping"))?;

        Ok(Self {
            ptr,
            len: round_up(len, page_size),
            page_size,
            _file: file,
        })
    }
}

impl RegionBacking for MmapBacking {
    fn len(&self) -> usize {
        self.len
    }

    fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    fn flush_range(&mut self, offset: usize, len: usize) -> io::Result<()> {
        // msync() requires a page-aligned start address.
        let start = offset & !(self.page_size - 1);
        let span = offset + len - start;

        // SAFETY: `[start, start + span)` lies within the live mapping; callers keep
        // `offset + len <= self.len`.
        let rc = unsafe {
            libc::msync(
                self.ptr.as_ptr().add(start).cast(),
                span,
                libc::MS_SYNC | libc::MS_INVALIDATE,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for MmapBacking {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`len` describe the mapping created in `map`, which nothing else unmaps.
        let rc = unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.len) };
        if rc != 0 {
            tracing::warn!(
                "munmap failed for {} byte mapping: {}",
                self.len,
                io::Error::last_os_error()
            );
        }
    }
}

fn page_size() -> io::Result<usize> {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(size as usize)
}

fn round_up(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size) * page_size
}

#[cfg(test)]
mod tests {
    use std::fs::OpenOptions;
    use std::io::{Read, Seek, SeekFrom};

    use super::*;

    fn scratch_file(len: u64) -> (tempfile::TempDir, std::path::PathBuf, File) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resource0");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .unwrap();
        file.set_len(len).unwrap();
        (dir, path, file)
    }

    #[test]
    fn mapping_rounds_length_to_whole_pages() {
        let (_dir, _path, file) = scratch_file(100);
        let backing = MmapBacking::map(file, 100).unwrap();
        assert!(backing.len() >= 100);
        assert_eq!(backing.len() % page_size().unwrap(), 0);
        assert_eq!(backing.as_ptr() as usize % page_size().unwrap(), 0);
    }

    #[test]
    fn flushed_store_reaches_the_file() {
        let (_dir, path, file) = scratch_file(64);
        let mut backing = MmapBacking::map(file, 64).unwrap();

        // SAFETY: offset 5 is inside the 64-byte mapping.
        unsafe { backing.as_mut_ptr().add(5).write_volatile(0xA5) };
        backing.flush_range(5, 1).unwrap();

        let mut contents = Vec::new();
        let mut f = File::open(&path).unwrap();
        f.seek(SeekFrom::Start(0)).unwrap();
        f.read_to_end(&mut contents).unwrap();
        assert_eq!(contents[5], 0xA5);
    }

    #[test]
    fn empty_mapping_is_rejected() {
        let (_dir, _path, file) = scratch_file(0);
        let err = MmapBacking::map(file, 0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
