//! Heap table: tuple storage over slotted pages.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::storage::PageManager;
use crate::value::{Tuple, TupleId};

use super::error::HeapError;
use super::page::{HeapPage, LINE_POINTER_SIZE, PAGE_HEADER_SIZE};
use super::scan::HeapScan;
use super::tuple_header::{TupleHeader, TUPLE_HEADER_SIZE};
use super::Visibility;

/// A heap table bound to one `<table>.heap` file.
///
/// All mutations serialize on an internal mutex (the unit of atomicity is
/// a full page write); reads and scans go straight to the page manager's
/// positional I/O.
pub struct HeapTable {
    filename: String,
    pager: Arc<PageManager>,
    /// Page count, maintained under `write_lock`; scans read it racily,
    /// which is fine: they stop at the first uninitialized page anyway.
    num_pages: AtomicU32,
    write_lock: Mutex<()>,
}

impl HeapTable {
    /// Opens (or creates) the heap file for `table_name`.
    pub fn open(pager: Arc<PageManager>, table_name: &str) -> Result<Self, HeapError> {
        let filename = format!("{table_name}.heap");
        let num_pages = pager.page_count(&filename)?;
        Ok(Self {
            filename,
            pager,
            num_pages: AtomicU32::new(num_pages),
            write_lock: Mutex::new(()),
        })
    }

    /// The file this table stores into.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Number of pages currently in the file.
    pub fn num_pages(&self) -> u32 {
        self.num_pages.load(Ordering::Acquire)
    }

    /// The largest serialized tuple (header included) a page can hold.
    pub fn max_tuple_size(&self) -> usize {
        self.pager.page_size() - PAGE_HEADER_SIZE - LINE_POINTER_SIZE
    }

    fn read_page(&self, page_num: u32) -> Result<Vec<u8>, HeapError> {
        let mut buf = vec![0u8; self.pager.page_size()];
        self.pager.read_page(&self.filename, page_num, &mut buf)?;
        Ok(buf)
    }

    fn write_page(&self, page_num: u32, buf: &[u8]) -> Result<(), HeapError> {
        self.pager.write_page(&self.filename, page_num, buf)?;
        Ok(())
    }

    /// Serializes `header` + `tuple` into one stored-tuple byte string.
    fn serialize_tuple(header: &TupleHeader, tuple: &Tuple) -> Vec<u8> {
        let mut bytes = vec![0u8; TUPLE_HEADER_SIZE];
        tuple.encode(&mut bytes);
        let mut stamped = *header;
        stamped.len = bytes.len() as u16;
        stamped.write_to(&mut bytes[..TUPLE_HEADER_SIZE]);
        bytes
    }

    /// Parses a stored tuple back into its header and values.
    fn deserialize_tuple(bytes: &[u8]) -> Result<(TupleHeader, Tuple), HeapError> {
        let header = TupleHeader::read_from(bytes);
        let (tuple, _) = Tuple::decode(&bytes[header.hoff as usize..])?;
        Ok((header, tuple))
    }

    /// Inserts a tuple stamped with `xmin`/`cid`, returning its id.
    ///
    /// Walks pages from 0 and takes the first with room for the tuple and
    /// a line pointer; appends a fresh page when none fits.
    pub fn insert(&self, tuple: &Tuple, xmin: u64, cid: u32) -> Result<TupleId, HeapError> {
        let size = TUPLE_HEADER_SIZE + tuple.encoded_size();
        if size > self.max_tuple_size() {
            return Err(HeapError::TupleTooLarge {
                size,
                max: self.max_tuple_size(),
            });
        }

        let _guard = self.write_lock.lock();
        let num_pages = self.num_pages.load(Ordering::Acquire);

        // First fit over the existing pages.
        let mut target: Option<(u32, Vec<u8>)> = None;
        for page_num in 0..num_pages {
            let buf = self.read_page(page_num)?;
            let page = HeapPage::new(&buf[..]);
            if !page.is_uninitialized() && page.can_insert(size) {
                target = Some((page_num, buf));
                break;
            }
        }
        let (page_num, mut buf, is_new) = match target {
            Some((page_num, buf)) => (page_num, buf, false),
            None => {
                let mut buf = vec![0u8; self.pager.page_size()];
                HeapPage::new(&mut buf[..]).init();
                (num_pages, buf, true)
            }
        };

        let mut page = HeapPage::new(&mut buf[..]);
        // The slot is known before the write, so the header can carry its
        // own id as the terminal ctid.
        let slot = page.header().num_items;
        let tid = TupleId::new(page_num, slot);

        let mut header = TupleHeader::new(xmin, cid, 0);
        header.ctid = tid;
        let bytes = Self::serialize_tuple(&header, tuple);
        page.insert_tuple(&bytes)?;

        self.write_page(page_num, &buf)?;
        if is_new {
            self.num_pages.store(page_num + 1, Ordering::Release);
        }
        Ok(tid)
    }

    /// Reads the tuple at `tid` without visibility filtering.
    ///
    /// Returns `None` for out-of-range ids and tombstoned slots.
    pub fn get_raw(&self, tid: TupleId) -> Result<Option<(TupleHeader, Tuple)>, HeapError> {
        if tid.page_num >= self.num_pages() {
            return Ok(None);
        }
        let buf = self.read_page(tid.page_num)?;
        let page = HeapPage::new(&buf[..]);
        if page.is_uninitialized() {
            return Ok(None);
        }
        match page.read_tuple(tid.slot_num) {
            Some(bytes) => Self::deserialize_tuple(bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Reads the tuple at `tid`, filtered through the caller's visibility.
    pub fn get(
        &self,
        tid: TupleId,
        vis: &impl Visibility,
    ) -> Result<Option<Tuple>, HeapError> {
        match self.get_raw(tid)? {
            Some((header, tuple)) if vis.is_visible(&header) => Ok(Some(tuple)),
            _ => Ok(None),
        }
    }

    /// Stamps `xmax` on the tuple at `tid` (MVCC delete).
    ///
    /// The slot is not compacted; slot numbers stay stable. Returns false
    /// if the slot was already a tombstone.
    pub fn remove(&self, tid: TupleId, xmax: u64) -> Result<bool, HeapError> {
        self.modify_header(tid, |header| header.xmax = xmax)
    }

    /// Updates the tuple at `tid` as remove-then-insert, forwarding the old
    /// tuple's `ctid` to the new location for chain-following.
    pub fn update(
        &self,
        tid: TupleId,
        new_tuple: &Tuple,
        xmax: u64,
        xmin: u64,
        cid: u32,
    ) -> Result<TupleId, HeapError> {
        if !self.remove(tid, xmax)? {
            return Err(HeapError::SlotNotFound(tid.slot_num));
        }
        let new_tid = self.insert(new_tuple, xmin, cid)?;
        self.modify_header(tid, |header| header.ctid = new_tid)?;
        Ok(new_tid)
    }

    /// Tombstones the slot at `tid` outright. Abort replay for inserts
    /// whose transaction never committed.
    pub fn erase(&self, tid: TupleId) -> Result<bool, HeapError> {
        let _guard = self.write_lock.lock();
        if tid.page_num >= self.num_pages.load(Ordering::Acquire) {
            return Ok(false);
        }
        let mut buf = self.read_page(tid.page_num)?;
        let mut page = HeapPage::new(&mut buf[..]);
        if page.is_uninitialized() {
            return Ok(false);
        }
        let changed = page.tombstone(tid.slot_num)?;
        if changed {
            self.write_page(tid.page_num, &buf)?;
        }
        Ok(changed)
    }

    /// Clears the deletion stamp at `tid`. Abort replay for deletes.
    pub fn clear_xmax(&self, tid: TupleId) -> Result<bool, HeapError> {
        self.modify_header(tid, |header| header.xmax = 0)
    }

    /// Points the tuple's `ctid` back at itself. Abort replay for updates.
    pub fn reset_ctid(&self, tid: TupleId) -> Result<bool, HeapError> {
        self.modify_header(tid, |header| header.ctid = tid)
    }

    /// Rewrites the MVCC header of the tuple at `tid` in place.
    fn modify_header(
        &self,
        tid: TupleId,
        mutate: impl FnOnce(&mut TupleHeader),
    ) -> Result<bool, HeapError> {
        let _guard = self.write_lock.lock();
        if tid.page_num >= self.num_pages.load(Ordering::Acquire) {
            return Ok(false);
        }
        let mut buf = self.read_page(tid.page_num)?;
        let mut page = HeapPage::new(&mut buf[..]);
        if page.is_uninitialized() {
            return Ok(false);
        }
        let Some(bytes) = page.read_tuple(tid.slot_num) else {
            return Ok(false);
        };
        let mut header = TupleHeader::read_from(bytes);
        mutate(&mut header);

        let mut header_bytes = [0u8; TUPLE_HEADER_SIZE];
        header.write_to(&mut header_bytes);
        let mut stored = bytes.to_vec();
        stored[..TUPLE_HEADER_SIZE].copy_from_slice(&header_bytes);
        page.overwrite_tuple(tid.slot_num, &stored)?;
        self.write_page(tid.page_num, &buf)?;
        Ok(true)
    }

    /// Begins a sequential scan borrowing this table.
    pub fn scan(&self) -> HeapScan<&HeapTable> {
        HeapScan::new(self)
    }

    /// Counts tuples that are neither tombstoned nor deletion-stamped.
    pub fn tuple_count(&self) -> Result<u64, HeapError> {
        let mut count = 0;
        let mut scan = self.scan();
        while let Some((_, header, _)) = scan.next_raw()? {
            if header.is_live() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Returns the heap file size in bytes.
    pub fn file_size(&self) -> Result<u64, HeapError> {
        Ok(self.pager.file_size(&self.filename)?)
    }

    /// Free space on a page, or `None` past the end of the file.
    pub fn page_free_space(&self, page_num: u32) -> Result<Option<usize>, HeapError> {
        if page_num >= self.num_pages() {
            return Ok(None);
        }
        let buf = self.read_page(page_num)?;
        let page = HeapPage::new(&buf[..]);
        if page.is_uninitialized() {
            return Ok(None);
        }
        Ok(Some(page.free_space()))
    }

    pub(super) fn pager(&self) -> &PageManager {
        &self.pager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::AllVisible;
    use crate::value::Value;
    use tempfile::tempdir;

    fn table() -> (tempfile::TempDir, HeapTable) {
        let dir = tempdir().unwrap();
        let pager = Arc::new(PageManager::new(dir.path(), 4096).unwrap());
        let table = HeapTable::open(pager, "t").unwrap();
        (dir, table)
    }

    fn row(id: i64, name: &str) -> Tuple {
        Tuple::new(vec![Value::Int64(id), Value::Text(name.into())])
    }

    #[test]
    fn test_insert_then_get() {
        let (_dir, table) = table();
        let tid = table.insert(&row(1, "one"), 10, 0).unwrap();
        let (header, tuple) = table.get_raw(tid).unwrap().unwrap();
        assert_eq!(tuple, row(1, "one"));
        assert_eq!(header.xmin, 10);
        assert_eq!(header.xmax, 0);
        assert_eq!(header.ctid, tid);
    }

    #[test]
    fn test_first_tid_is_not_null_sentinel() {
        let (_dir, table) = table();
        let tid = table.insert(&row(1, "x"), 1, 0).unwrap();
        // Page 0 slot 0 is a real address; TupleId::NULL is only a sentinel
        // and the heap never *returns* it for missing tuples.
        assert_eq!(tid, TupleId::new(0, 0));
        assert!(table.get_raw(TupleId::new(99, 0)).unwrap().is_none());
    }

    #[test]
    fn test_remove_stamps_xmax() {
        let (_dir, table) = table();
        let tid = table.insert(&row(1, "one"), 10, 0).unwrap();
        assert!(table.remove(tid, 20).unwrap());
        let (header, _) = table.get_raw(tid).unwrap().unwrap();
        assert_eq!(header.xmax, 20);
    }

    #[test]
    fn test_update_forwards_ctid() {
        let (_dir, table) = table();
        let tid = table.insert(&row(1, "old"), 10, 0).unwrap();
        let new_tid = table.update(tid, &row(1, "new"), 20, 20, 0).unwrap();
        assert_ne!(tid, new_tid);

        let (old_header, old_tuple) = table.get_raw(tid).unwrap().unwrap();
        assert_eq!(old_header.xmax, 20);
        assert_eq!(old_header.ctid, new_tid);
        assert_eq!(old_tuple, row(1, "old"));

        let (new_header, new_tuple) = table.get_raw(new_tid).unwrap().unwrap();
        assert_eq!(new_header.xmin, 20);
        assert_eq!(new_header.ctid, new_tid);
        assert_eq!(new_tuple, row(1, "new"));
    }

    #[test]
    fn test_scan_skips_tombstones() {
        let (_dir, table) = table();
        let t1 = table.insert(&row(1, "one"), 1, 0).unwrap();
        let _t2 = table.insert(&row(2, "two"), 1, 0).unwrap();
        table.erase(t1).unwrap();

        let mut scan = table.scan();
        let mut seen = Vec::new();
        while let Some((_, _, tuple)) = scan.next_raw().unwrap() {
            seen.push(tuple);
        }
        assert_eq!(seen, vec![row(2, "two")]);
    }

    #[test]
    fn test_scan_crosses_pages() {
        let (_dir, table) = table();
        // Large enough rows that several pages are needed.
        let filler = "x".repeat(900);
        for i in 0..12 {
            table.insert(&row(i, &filler), 1, 0).unwrap();
        }
        assert!(table.num_pages() > 1);

        let mut scan = table.scan();
        let mut ids = Vec::new();
        while let Some((_, _, tuple)) = scan.next_raw().unwrap() {
            ids.push(tuple.values[0].clone());
        }
        assert_eq!(ids.len(), 12);
    }

    #[test]
    fn test_tuple_count_ignores_deleted() {
        let (_dir, table) = table();
        let t1 = table.insert(&row(1, "one"), 1, 0).unwrap();
        table.insert(&row(2, "two"), 1, 0).unwrap();
        table.insert(&row(3, "three"), 1, 0).unwrap();
        assert_eq!(table.tuple_count().unwrap(), 3);
        table.remove(t1, 2).unwrap();
        assert_eq!(table.tuple_count().unwrap(), 2);
    }

    #[test]
    fn test_tuple_too_large() {
        let (_dir, table) = table();
        let huge = Tuple::new(vec![Value::Blob(vec![0u8; 5000])]);
        assert!(matches!(
            table.insert(&huge, 1, 0),
            Err(HeapError::TupleTooLarge { .. })
        ));
    }

    #[test]
    fn test_get_with_visibility() {
        let (_dir, table) = table();
        let tid = table.insert(&row(1, "one"), 1, 0).unwrap();
        assert!(table.get(tid, &AllVisible).unwrap().is_some());

        struct NoneVisible;
        impl Visibility for NoneVisible {
            fn is_visible(&self, _: &TupleHeader) -> bool {
                false
            }
        }
        assert!(table.get(tid, &NoneVisible).unwrap().is_none());
    }

    #[test]
    fn test_abort_replay_hooks() {
        let (_dir, table) = table();
        let tid = table.insert(&row(1, "one"), 1, 0).unwrap();
        table.remove(tid, 5).unwrap();
        assert!(table.clear_xmax(tid).unwrap());
        let (header, _) = table.get_raw(tid).unwrap().unwrap();
        assert!(header.is_live());

        assert!(table.reset_ctid(tid).unwrap());
        assert!(table.erase(tid).unwrap());
        assert!(table.get_raw(tid).unwrap().is_none());
    }

    #[test]
    fn test_reopen_preserves_rows() {
        let dir = tempdir().unwrap();
        {
            let pager = Arc::new(PageManager::new(dir.path(), 4096).unwrap());
            let table = HeapTable::open(pager, "t").unwrap();
            table.insert(&row(1, "persisted"), 1, 0).unwrap();
        }
        let pager = Arc::new(PageManager::new(dir.path(), 4096).unwrap());
        let table = HeapTable::open(pager, "t").unwrap();
        let mut scan = table.scan();
        let (_, _, tuple) = scan.next_raw().unwrap().unwrap();
        assert_eq!(tuple, row(1, "persisted"));
        assert!(scan.next_raw().unwrap().is_none());
    }
}
