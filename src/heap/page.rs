//! Slotted heap page layout.
//!
//! A [`HeapPage`] is a typed view over one page-sized byte buffer. The
//! 24-byte header tracks the free-space watermarks; 8-byte line pointers
//! grow from `lower` while tuple bodies pack downward from `upper`.
//! Slot 0 sits at the smallest offset end of the line pointer array.

use super::error::HeapError;

/// Size of the heap page header in bytes.
pub const PAGE_HEADER_SIZE: usize = 24;

/// Size of one line pointer in bytes: 2 offset + 2 length + 4 padding.
///
/// The padding is carried forward for page-format compatibility; shrinking
/// it requires a format version bump.
pub const LINE_POINTER_SIZE: usize = 8;

/// Heap page header.
///
/// `lsn` is reserved for future recovery and always written as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// Reserved for write-ahead logging; not live data.
    pub lsn: u64,
    /// Offset to the start of free space (end of the line pointer array).
    pub lower: u16,
    /// Offset to the end of free space (start of tuple bodies).
    pub upper: u16,
    /// Offset to the special space (page end; unused by heap pages).
    pub special: u16,
    /// Number of line pointers, tombstones included.
    pub num_items: u16,
    /// Page flags (none defined yet).
    pub flags: u32,
}

impl PageHeader {
    /// Reads a header from the front of a page buffer.
    pub fn read_from(data: &[u8]) -> Self {
        Self {
            lsn: u64::from_le_bytes(data[0..8].try_into().unwrap()),
            lower: u16::from_le_bytes([data[8], data[9]]),
            upper: u16::from_le_bytes([data[10], data[11]]),
            special: u16::from_le_bytes([data[12], data[13]]),
            num_items: u16::from_le_bytes([data[14], data[15]]),
            flags: u32::from_le_bytes(data[16..20].try_into().unwrap()),
        }
    }

    /// Writes this header to the front of a page buffer.
    pub fn write_to(&self, data: &mut [u8]) {
        data[0..8].copy_from_slice(&self.lsn.to_le_bytes());
        data[8..10].copy_from_slice(&self.lower.to_le_bytes());
        data[10..12].copy_from_slice(&self.upper.to_le_bytes());
        data[12..14].copy_from_slice(&self.special.to_le_bytes());
        data[14..16].copy_from_slice(&self.num_items.to_le_bytes());
        data[16..20].copy_from_slice(&self.flags.to_le_bytes());
        data[20..24].fill(0);
    }
}

/// A line pointer: where one tuple body lives in the page.
///
/// `offset == 0` marks a tombstone; the slot index must never be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePointer {
    /// Tuple body offset from the page start (0 = tombstone).
    pub offset: u16,
    /// Tuple body length in bytes.
    pub length: u16,
}

impl LinePointer {
    /// Reads a line pointer from its 8-byte slot.
    pub fn read_from(data: &[u8]) -> Self {
        Self {
            offset: u16::from_le_bytes([data[0], data[1]]),
            length: u16::from_le_bytes([data[2], data[3]]),
        }
    }

    /// Writes this line pointer to its 8-byte slot (padding zeroed).
    pub fn write_to(&self, data: &mut [u8]) {
        data[0..2].copy_from_slice(&self.offset.to_le_bytes());
        data[2..4].copy_from_slice(&self.length.to_le_bytes());
        data[4..8].fill(0);
    }

    /// Returns true if this slot is a tombstone.
    pub fn is_tombstone(&self) -> bool {
        self.offset == 0
    }
}

/// A typed view over one page-sized buffer.
///
/// The type parameter lets the same code serve read-only (`&[u8]`),
/// mutable (`&mut [u8]`), and owned (`Vec<u8>`) buffers. The page size is
/// whatever the buffer length is; all offsets are computed from it.
pub struct HeapPage<T> {
    data: T,
}

impl<T: AsRef<[u8]>> HeapPage<T> {
    /// Wraps a page buffer.
    pub fn new(data: T) -> Self {
        Self { data }
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// The page size this view was created with.
    pub fn page_size(&self) -> usize {
        self.data().len()
    }

    /// Returns the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::read_from(&self.data()[..PAGE_HEADER_SIZE])
    }

    /// Returns true if the page reads as never-initialized (all watermark
    /// fields zero, which a valid header cannot have).
    pub fn is_uninitialized(&self) -> bool {
        self.header().lower == 0
    }

    /// Returns the line pointer at `slot`, or `None` past the slot array.
    pub fn line_pointer(&self, slot: u16) -> Option<LinePointer> {
        if slot >= self.header().num_items {
            return None;
        }
        let offset = PAGE_HEADER_SIZE + slot as usize * LINE_POINTER_SIZE;
        Some(LinePointer::read_from(
            &self.data()[offset..offset + LINE_POINTER_SIZE],
        ))
    }

    /// Returns the raw tuple bytes at `slot`, or `None` for tombstones and
    /// out-of-range slots.
    pub fn read_tuple(&self, slot: u16) -> Option<&[u8]> {
        let lp = self.line_pointer(slot)?;
        if lp.is_tombstone() {
            return None;
        }
        let start = lp.offset as usize;
        Some(&self.data()[start..start + lp.length as usize])
    }

    /// Contiguous free space between the watermarks.
    pub fn free_space(&self) -> usize {
        let header = self.header();
        (header.upper - header.lower) as usize
    }

    /// Checks whether a tuple of `size` bytes plus its line pointer fits.
    pub fn can_insert(&self, size: usize) -> bool {
        self.free_space() >= size + LINE_POINTER_SIZE
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> HeapPage<T> {
    fn data_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    /// Initializes this buffer as an empty heap page.
    pub fn init(&mut self) {
        let page_size = self.page_size() as u16;
        self.data_mut().fill(0);
        let header = PageHeader {
            lsn: 0,
            lower: PAGE_HEADER_SIZE as u16,
            upper: page_size,
            special: page_size,
            num_items: 0,
            flags: 0,
        };
        self.set_header(&header);
    }

    fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.data_mut()[..PAGE_HEADER_SIZE]);
    }

    fn set_line_pointer(&mut self, slot: u16, lp: &LinePointer) {
        let offset = PAGE_HEADER_SIZE + slot as usize * LINE_POINTER_SIZE;
        lp.write_to(&mut self.data_mut()[offset..offset + LINE_POINTER_SIZE]);
    }

    /// Inserts raw tuple bytes, returning the new slot number.
    ///
    /// The body is packed downward from `upper`; a fresh line pointer is
    /// appended at `lower`. Slots are never reused.
    pub fn insert_tuple(&mut self, bytes: &[u8]) -> Result<u16, HeapError> {
        if !self.can_insert(bytes.len()) {
            return Err(HeapError::PageFull {
                required: bytes.len() + LINE_POINTER_SIZE,
                available: self.free_space(),
            });
        }

        let mut header = self.header();
        header.upper -= bytes.len() as u16;
        let offset = header.upper;
        let slot = header.num_items;
        header.lower += LINE_POINTER_SIZE as u16;
        header.num_items += 1;

        let start = offset as usize;
        self.data_mut()[start..start + bytes.len()].copy_from_slice(bytes);
        self.set_line_pointer(
            slot,
            &LinePointer {
                offset,
                length: bytes.len() as u16,
            },
        );
        self.set_header(&header);
        Ok(slot)
    }

    /// Overwrites the tuple bytes at `slot` in place.
    ///
    /// Used to restamp MVCC header fields; the length must not change.
    pub fn overwrite_tuple(&mut self, slot: u16, bytes: &[u8]) -> Result<(), HeapError> {
        let lp = self
            .line_pointer(slot)
            .ok_or(HeapError::SlotNotFound(slot))?;
        if lp.is_tombstone() {
            return Err(HeapError::SlotNotFound(slot));
        }
        if lp.length as usize != bytes.len() {
            return Err(HeapError::TupleSizeChanged {
                expected: lp.length as usize,
                actual: bytes.len(),
            });
        }
        let start = lp.offset as usize;
        self.data_mut()[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Tombstones `slot`, keeping its line pointer so slot numbers stay
    /// stable. Returns false if the slot was already a tombstone.
    pub fn tombstone(&mut self, slot: u16) -> Result<bool, HeapError> {
        let lp = self
            .line_pointer(slot)
            .ok_or(HeapError::SlotNotFound(slot))?;
        if lp.is_tombstone() {
            return Ok(false);
        }
        self.set_line_pointer(
            slot,
            &LinePointer {
                offset: 0,
                length: 0,
            },
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: usize = 4096;

    fn new_page() -> Vec<u8> {
        let mut data = vec![0u8; PAGE];
        HeapPage::new(&mut data).init();
        data
    }

    #[test]
    fn test_init_header() {
        let data = new_page();
        let page = HeapPage::new(&data[..]);
        let header = page.header();
        assert_eq!(header.lsn, 0);
        assert_eq!(header.lower, PAGE_HEADER_SIZE as u16);
        assert_eq!(header.upper, PAGE as u16);
        assert_eq!(header.special, PAGE as u16);
        assert_eq!(header.num_items, 0);
        assert!(!page.is_uninitialized());
    }

    #[test]
    fn test_zeroed_page_is_uninitialized() {
        let data = vec![0u8; PAGE];
        assert!(HeapPage::new(&data[..]).is_uninitialized());
    }

    #[test]
    fn test_insert_and_read() {
        let mut data = new_page();
        let mut page = HeapPage::new(&mut data);
        let s0 = page.insert_tuple(b"alpha").unwrap();
        let s1 = page.insert_tuple(b"beta").unwrap();
        assert_eq!((s0, s1), (0, 1));
        assert_eq!(page.read_tuple(0), Some(b"alpha".as_slice()));
        assert_eq!(page.read_tuple(1), Some(b"beta".as_slice()));
        assert_eq!(page.read_tuple(2), None);
    }

    #[test]
    fn test_bodies_pack_downward() {
        let mut data = new_page();
        let mut page = HeapPage::new(&mut data);
        page.insert_tuple(b"aaaa").unwrap();
        page.insert_tuple(b"bb").unwrap();
        let lp0 = page.line_pointer(0).unwrap();
        let lp1 = page.line_pointer(1).unwrap();
        assert_eq!(lp0.offset as usize, PAGE - 4);
        assert_eq!(lp1.offset as usize, PAGE - 6);
    }

    #[test]
    fn test_tombstone_keeps_slot_numbers() {
        let mut data = new_page();
        let mut page = HeapPage::new(&mut data);
        page.insert_tuple(b"one").unwrap();
        page.insert_tuple(b"two").unwrap();

        assert!(page.tombstone(0).unwrap());
        assert!(!page.tombstone(0).unwrap());
        assert_eq!(page.read_tuple(0), None);
        assert_eq!(page.read_tuple(1), Some(b"two".as_slice()));

        // A new insert gets a fresh slot; tombstoned slots are not reused.
        let s2 = page.insert_tuple(b"three").unwrap();
        assert_eq!(s2, 2);
        assert_eq!(page.header().num_items, 3);
    }

    #[test]
    fn test_page_full() {
        let mut data = new_page();
        let mut page = HeapPage::new(&mut data);
        let big = vec![1u8; 1000];
        let mut inserted = 0;
        while page.insert_tuple(&big).is_ok() {
            inserted += 1;
        }
        assert!(inserted > 0);
        assert!(matches!(
            page.insert_tuple(&big),
            Err(HeapError::PageFull { .. })
        ));
        // Smaller tuples may still fit.
        assert!(page.can_insert(8) || page.free_space() < 8 + LINE_POINTER_SIZE);
    }

    #[test]
    fn test_overwrite_same_length() {
        let mut data = new_page();
        let mut page = HeapPage::new(&mut data);
        page.insert_tuple(b"hello").unwrap();
        page.overwrite_tuple(0, b"world").unwrap();
        assert_eq!(page.read_tuple(0), Some(b"world".as_slice()));
        assert!(matches!(
            page.overwrite_tuple(0, b"longer!"),
            Err(HeapError::TupleSizeChanged { .. })
        ));
    }

    #[test]
    fn test_free_space_accounting() {
        let mut data = new_page();
        let mut page = HeapPage::new(&mut data);
        let before = page.free_space();
        assert_eq!(before, PAGE - PAGE_HEADER_SIZE);
        page.insert_tuple(b"12345678").unwrap();
        assert_eq!(page.free_space(), before - 8 - LINE_POINTER_SIZE);
    }

    #[test]
    fn test_header_roundtrip() {
        let header = PageHeader {
            lsn: 0,
            lower: 40,
            upper: 3000,
            special: 4096,
            num_items: 2,
            flags: 7,
        };
        let mut buf = [0u8; PAGE_HEADER_SIZE];
        header.write_to(&mut buf);
        assert_eq!(PageHeader::read_from(&buf), header);
    }
}
