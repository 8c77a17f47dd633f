//! Sequential heap scans.

use std::borrow::Borrow;

use crate::value::{Tuple, TupleId};

use super::error::HeapError;
use super::page::HeapPage;
use super::table::HeapTable;
use super::tuple_header::TupleHeader;
use super::Visibility;

/// A sequential scan over a heap table.
///
/// Emits tuples page-by-page, slot-by-slot, skipping tombstones, and stops
/// at the first page that reads as uninitialized. Pages written after the
/// scan started may or may not be seen; the scan tolerates them either way.
///
/// Generic over how the table is held so short-lived scans can borrow
/// (`&HeapTable`) while executor nodes own a shared handle
/// (`Arc<HeapTable>`).
pub struct HeapScan<T: Borrow<HeapTable>> {
    table: T,
    page_num: u32,
    slot_num: u16,
    /// Current page buffer; `None` until the first load of each page.
    page: Option<Vec<u8>>,
    eof: bool,
}

impl<T: Borrow<HeapTable>> HeapScan<T> {
    /// Creates a scan positioned before the first tuple.
    pub fn new(table: T) -> Self {
        Self {
            table,
            page_num: 0,
            slot_num: 0,
            page: None,
            eof: false,
        }
    }

    /// Returns the next stored tuple regardless of MVCC state.
    ///
    /// Tombstoned slots are skipped; deletion-stamped tuples are returned
    /// with their header so the caller can judge them.
    pub fn next_raw(&mut self) -> Result<Option<(TupleId, TupleHeader, Tuple)>, HeapError> {
        loop {
            if self.eof {
                return Ok(None);
            }
            let table = self.table.borrow();

            if self.page.is_none() {
                if self.page_num >= table.num_pages() {
                    self.eof = true;
                    return Ok(None);
                }
                let mut buf = vec![0u8; table.pager().page_size()];
                table
                    .pager()
                    .read_page(table.filename(), self.page_num, &mut buf)?;
                if HeapPage::new(&buf[..]).is_uninitialized() {
                    self.eof = true;
                    return Ok(None);
                }
                self.page = Some(buf);
            }

            let buf = self.page.as_ref().unwrap();
            let page = HeapPage::new(&buf[..]);
            let num_items = page.header().num_items;

            while self.slot_num < num_items {
                let slot = self.slot_num;
                self.slot_num += 1;
                if let Some(bytes) = page.read_tuple(slot) {
                    let header = TupleHeader::read_from(bytes);
                    let (tuple, _) = Tuple::decode(&bytes[header.hoff as usize..])?;
                    return Ok(Some((TupleId::new(self.page_num, slot), header, tuple)));
                }
            }

            self.page = None;
            self.page_num += 1;
            self.slot_num = 0;
        }
    }

    /// Returns the next tuple visible to the caller.
    pub fn next_visible(
        &mut self,
        vis: &impl Visibility,
    ) -> Result<Option<(TupleId, Tuple)>, HeapError> {
        while let Some((tid, header, tuple)) = self.next_raw()? {
            if vis.is_visible(&header) {
                return Ok(Some((tid, tuple)));
            }
        }
        Ok(None)
    }
}
