//! The page manager: open files and random-access page I/O.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::StorageError;

/// Advisory I/O counters.
///
/// These are maintained with relaxed atomics; they guide diagnostics, not
/// correctness.
#[derive(Debug, Default)]
pub struct PagerStats {
    /// Files opened (first open per name).
    pub files_opened: AtomicU64,
    /// Pages read.
    pub pages_read: AtomicU64,
    /// Pages written.
    pub pages_written: AtomicU64,
    /// Bytes read from disk (before zero-fill).
    pub bytes_read: AtomicU64,
    /// Bytes written to disk.
    pub bytes_written: AtomicU64,
}

/// Manages the files under a data directory and performs page I/O.
///
/// One manager owns one data directory; callers address files by bare name
/// (e.g. `users.heap`). Handles are opened lazily, cached, and shared.
///
/// # Concurrency
///
/// The open-file map is guarded by a mutex, taken only on open/close. Page
/// I/O goes through `pread`/`pwrite`-style positional calls on a shared
/// handle, so no seek cursor is shared between threads. Page-level
/// atomicity is the responsibility of the caller (the heap serializes
/// mutations per table).
pub struct PageManager {
    data_dir: PathBuf,
    page_size: usize,
    files: Mutex<HashMap<String, Arc<File>>>,
    stats: PagerStats,
}

impl PageManager {
    /// Creates a manager rooted at `data_dir`, creating the directory if
    /// needed.
    pub fn new(data_dir: impl Into<PathBuf>, page_size: usize) -> Result<Self, StorageError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir,
            page_size,
            files: Mutex::new(HashMap::new()),
            stats: PagerStats::default(),
        })
    }

    /// Returns the page size every file under this manager uses.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the advisory I/O counters.
    pub fn stats(&self) -> &PagerStats {
        &self.stats
    }

    /// Opens (or creates) a file under the data directory.
    ///
    /// Idempotent: repeated opens return the same shared handle. The file
    /// is opened for binary random-access read+write; append mode is never
    /// used because it would break positional writes.
    pub fn open(&self, name: &str) -> Result<Arc<File>, StorageError> {
        let mut files = self.files.lock();
        if let Some(file) = files.get(name) {
            return Ok(file.clone());
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.data_dir.join(name))?;
        let file = Arc::new(file);
        files.insert(name.to_string(), file.clone());
        self.stats.files_opened.fetch_add(1, Ordering::Relaxed);
        Ok(file)
    }

    /// Closes a file, dropping it from the handle cache.
    pub fn close(&self, name: &str) {
        self.files.lock().remove(name);
    }

    /// Reads one page into `buf`.
    ///
    /// If the page lies past the end of the file, or the read comes up
    /// short, the remainder of `buf` is zero-filled and the call succeeds:
    /// the caller treats an all-zero page as "uninitialized", not an error.
    pub fn read_page(&self, name: &str, page_num: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        if buf.len() != self.page_size {
            return Err(StorageError::InvalidBufferSize {
                expected: self.page_size,
                actual: buf.len(),
            });
        }
        let file = self.open(name)?;
        let offset = page_num as u64 * self.page_size as u64;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read_at(&mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        buf[filled..].fill(0);

        self.stats.pages_read.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes_read
            .fetch_add(filled as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Writes one page and flushes it to disk before returning.
    pub fn write_page(&self, name: &str, page_num: u32, buf: &[u8]) -> Result<(), StorageError> {
        if buf.len() != self.page_size {
            return Err(StorageError::InvalidBufferSize {
                expected: self.page_size,
                actual: buf.len(),
            });
        }
        let file = self.open(name)?;
        let offset = page_num as u64 * self.page_size as u64;
        file.write_all_at(buf, offset)?;
        file.sync_data()?;

        self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes_written
            .fetch_add(buf.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Returns the number of pages in a file, rounding partial pages up.
    pub fn page_count(&self, name: &str) -> Result<u32, StorageError> {
        let file = self.open(name)?;
        let len = file.metadata()?.len();
        Ok(len.div_ceil(self.page_size as u64) as u32)
    }

    /// Returns the exact file size in bytes.
    pub fn file_size(&self, name: &str) -> Result<u64, StorageError> {
        let file = self.open(name)?;
        Ok(file.metadata()?.len())
    }

    /// Deletes a file from the data directory (DROP TABLE / DROP INDEX).
    ///
    /// Missing files are not an error; the drop is idempotent.
    pub fn remove(&self, name: &str) -> Result<(), StorageError> {
        self.files.lock().remove(name);
        match std::fs::remove_file(self.data_dir.join(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PAGE: usize = 4096;

    fn manager() -> (tempfile::TempDir, PageManager) {
        let dir = tempdir().unwrap();
        let pager = PageManager::new(dir.path(), PAGE).unwrap();
        (dir, pager)
    }

    #[test]
    fn test_open_is_idempotent() {
        let (_dir, pager) = manager();
        let a = pager.open("t.heap").unwrap();
        let b = pager.open("t.heap").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pager.stats().files_opened.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_read_past_eof_zero_fills() {
        let (_dir, pager) = manager();
        let mut buf = vec![0xFFu8; PAGE];
        pager.read_page("t.heap", 10, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_then_read() {
        let (_dir, pager) = manager();
        let mut page = vec![0u8; PAGE];
        page[0..4].copy_from_slice(&[1, 2, 3, 4]);
        pager.write_page("t.heap", 3, &page).unwrap();

        let mut buf = vec![0u8; PAGE];
        pager.read_page("t.heap", 3, &mut buf).unwrap();
        assert_eq!(&buf[0..4], &[1, 2, 3, 4]);

        // Pages 0-2 were never written and read back as zeros.
        pager.read_page("t.heap", 0, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_short_read_zero_fills_tail() {
        let (dir, pager) = manager();
        // A file whose length is not a page multiple: the tail zero-fills.
        std::fs::write(dir.path().join("t.heap"), vec![7u8; PAGE + 100]).unwrap();
        let mut buf = vec![0u8; PAGE];
        pager.read_page("t.heap", 1, &mut buf).unwrap();
        assert!(buf[..100].iter().all(|&b| b == 7));
        assert!(buf[100..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_buffer_size_validation() {
        let (_dir, pager) = manager();
        let mut small = vec![0u8; 100];
        assert!(matches!(
            pager.read_page("t.heap", 0, &mut small),
            Err(StorageError::InvalidBufferSize {
                expected: PAGE,
                actual: 100
            })
        ));
        assert!(matches!(
            pager.write_page("t.heap", 0, &small),
            Err(StorageError::InvalidBufferSize { .. })
        ));
    }

    #[test]
    fn test_page_count() {
        let (_dir, pager) = manager();
        assert_eq!(pager.page_count("t.heap").unwrap(), 0);
        let page = vec![0u8; PAGE];
        pager.write_page("t.heap", 0, &page).unwrap();
        pager.write_page("t.heap", 4, &page).unwrap();
        assert_eq!(pager.page_count("t.heap").unwrap(), 5);
    }

    #[test]
    fn test_persistence_across_managers() {
        let dir = tempdir().unwrap();
        {
            let pager = PageManager::new(dir.path(), PAGE).unwrap();
            let mut page = vec![0u8; PAGE];
            page[0] = 42;
            pager.write_page("t.heap", 0, &page).unwrap();
        }
        let pager = PageManager::new(dir.path(), PAGE).unwrap();
        let mut buf = vec![0u8; PAGE];
        pager.read_page("t.heap", 0, &mut buf).unwrap();
        assert_eq!(buf[0], 42);
    }

    #[test]
    fn test_remove() {
        let (dir, pager) = manager();
        let page = vec![0u8; PAGE];
        pager.write_page("t.heap", 0, &page).unwrap();
        assert!(dir.path().join("t.heap").exists());
        pager.remove("t.heap").unwrap();
        assert!(!dir.path().join("t.heap").exists());
        // Idempotent.
        pager.remove("t.heap").unwrap();
    }

    #[test]
    fn test_stats_counters() {
        let (_dir, pager) = manager();
        let page = vec![0u8; PAGE];
        pager.write_page("t.heap", 0, &page).unwrap();
        let mut buf = vec![0u8; PAGE];
        pager.read_page("t.heap", 0, &mut buf).unwrap();

        let stats = pager.stats();
        assert_eq!(stats.pages_written.load(Ordering::Relaxed), 1);
        assert_eq!(stats.pages_read.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_written.load(Ordering::Relaxed), PAGE as u64);
        assert_eq!(stats.bytes_read.load(Ordering::Relaxed), PAGE as u64);
    }
}
