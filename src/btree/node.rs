//! On-disk B-tree node representation.
//!
//! Nodes are deserialized whole, mutated in memory, and written back whole;
//! variable-width keys make in-place entry surgery more trouble than it is
//! worth at this page size.

use crate::value::{SerializationError, TupleId};

use super::error::BtreeError;
use super::key::IndexKey;

/// Magic number at the start of every B-tree page ("BTRE").
pub const BTREE_MAGIC: u32 = 0x4254_5245;

/// Current B-tree page format version.
pub const BTREE_VERSION: u16 = 1;

/// Size of the B-tree page header in bytes.
pub const BTREE_PAGE_HEADER_SIZE: usize = 32;

/// Sentinel for "no page" in parent/sibling/child fields.
pub const INVALID_PAGE: u32 = u32::MAX;

/// Page role within the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageType {
    /// The root (page 0). May be a leaf when the tree has one page.
    Root = 1,
    /// An internal routing page.
    Internal = 2,
    /// A leaf holding `(key, TupleId)` entries.
    Leaf = 3,
}

impl PageType {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(PageType::Root),
            2 => Some(PageType::Internal),
            3 => Some(PageType::Leaf),
            _ => None,
        }
    }
}

/// B-tree page header.
///
/// `level` is 0 for leaves and grows toward the root; it is what
/// distinguishes a root-that-is-a-leaf from a root over children.
/// `lsn` is reserved for future recovery and always written as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHeader {
    pub magic: u32,
    pub version: u16,
    pub page_type: PageType,
    /// Distance to the leaf level (0 = leaf).
    pub level: u8,
    pub num_keys: u16,
    /// Parent page, `INVALID_PAGE` for the root. Maintained best-effort;
    /// descent never relies on it.
    pub parent: u32,
    /// Right sibling in the leaf chain, `INVALID_PAGE` at the chain end.
    pub right_sibling: u32,
    /// Reserved for write-ahead logging; not live data.
    pub lsn: u64,
}

impl NodeHeader {
    fn read_from(data: &[u8]) -> Result<Self, BtreeError> {
        let magic = u32::from_le_bytes(data[0..4].try_into().unwrap());
        if magic != BTREE_MAGIC {
            return Err(BtreeError::Corrupted(format!(
                "bad magic {magic:#010x}, expected {BTREE_MAGIC:#010x}"
            )));
        }
        let version = u16::from_le_bytes([data[4], data[5]]);
        if version != BTREE_VERSION {
            return Err(BtreeError::Corrupted(format!(
                "unsupported version {version}"
            )));
        }
        let page_type = PageType::from_code(data[6])
            .ok_or_else(|| BtreeError::Corrupted(format!("bad page type {}", data[6])))?;
        Ok(Self {
            magic,
            version,
            page_type,
            level: data[7],
            num_keys: u16::from_le_bytes([data[8], data[9]]),
            parent: u32::from_le_bytes(data[10..14].try_into().unwrap()),
            right_sibling: u32::from_le_bytes(data[14..18].try_into().unwrap()),
            lsn: u64::from_le_bytes(data[18..26].try_into().unwrap()),
        })
    }

    fn write_to(&self, data: &mut [u8]) {
        data[0..4].copy_from_slice(&self.magic.to_le_bytes());
        data[4..6].copy_from_slice(&self.version.to_le_bytes());
        data[6] = self.page_type as u8;
        data[7] = self.level;
        data[8..10].copy_from_slice(&self.num_keys.to_le_bytes());
        data[10..14].copy_from_slice(&self.parent.to_le_bytes());
        data[14..18].copy_from_slice(&self.right_sibling.to_le_bytes());
        data[18..26].copy_from_slice(&self.lsn.to_le_bytes());
        data[26..32].fill(0);
    }
}

/// One sorted entry.
///
/// In a leaf, `payload` is the heap TupleId. In an internal node, it is a
/// child page whose subtree holds keys up to and including `key` (each
/// internal entry carries the highest key reachable through its child).
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: IndexKey,
    pub payload: Payload,
}

/// Entry payload, leaf vs. internal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Tid(TupleId),
    Child(u32),
}

impl Payload {
    /// The TupleId of a leaf entry.
    ///
    /// # Panics
    ///
    /// Panics on internal-node payloads; callers check the node level first.
    pub fn tid(&self) -> TupleId {
        match self {
            Payload::Tid(tid) => *tid,
            Payload::Child(_) => panic!("internal entry where leaf entry expected"),
        }
    }

    /// The child page of an internal entry.
    ///
    /// # Panics
    ///
    /// Panics on leaf payloads; callers check the node level first.
    pub fn child(&self) -> u32 {
        match self {
            Payload::Child(page) => *page,
            Payload::Tid(_) => panic!("leaf entry where internal entry expected"),
        }
    }
}

/// An in-memory B-tree node.
#[derive(Debug, Clone)]
pub struct BtreeNode {
    pub header: NodeHeader,
    pub entries: Vec<Entry>,
}

impl BtreeNode {
    /// Creates an empty node.
    pub fn new(page_type: PageType, level: u8) -> Self {
        Self {
            header: NodeHeader {
                magic: BTREE_MAGIC,
                version: BTREE_VERSION,
                page_type,
                level,
                num_keys: 0,
                parent: INVALID_PAGE,
                right_sibling: INVALID_PAGE,
                lsn: 0,
            },
            entries: Vec::new(),
        }
    }

    /// Returns true if this node is at the leaf level.
    pub fn is_leaf(&self) -> bool {
        self.header.level == 0
    }

    /// The highest key in this node, if any.
    pub fn high_key(&self) -> Option<&IndexKey> {
        self.entries.last().map(|e| &e.key)
    }

    /// The serialized size of this node, header included.
    pub fn serialized_size(&self) -> usize {
        let payload_size = if self.is_leaf() { 6 } else { 4 };
        BTREE_PAGE_HEADER_SIZE
            + self
                .entries
                .iter()
                .map(|e| e.key.encoded_size() + payload_size)
                .sum::<usize>()
    }

    /// Serializes this node into a zeroed page buffer.
    pub fn write_to(&self, buf: &mut [u8]) -> Result<(), BtreeError> {
        if self.serialized_size() > buf.len() {
            return Err(BtreeError::Corrupted(format!(
                "node of {} bytes exceeds page size {}",
                self.serialized_size(),
                buf.len()
            )));
        }
        buf.fill(0);
        let mut header = self.header;
        header.num_keys = self.entries.len() as u16;
        header.write_to(&mut buf[..BTREE_PAGE_HEADER_SIZE]);

        let mut bytes = Vec::with_capacity(self.serialized_size() - BTREE_PAGE_HEADER_SIZE);
        for entry in &self.entries {
            entry.key.encode(&mut bytes);
            match entry.payload {
                Payload::Tid(tid) => {
                    bytes.extend_from_slice(&tid.page_num.to_le_bytes());
                    bytes.extend_from_slice(&tid.slot_num.to_le_bytes());
                }
                Payload::Child(page) => bytes.extend_from_slice(&page.to_le_bytes()),
            }
        }
        buf[BTREE_PAGE_HEADER_SIZE..BTREE_PAGE_HEADER_SIZE + bytes.len()].copy_from_slice(&bytes);
        Ok(())
    }

    /// Deserializes a node from a page buffer.
    pub fn read_from(buf: &[u8]) -> Result<Self, BtreeError> {
        let header = NodeHeader::read_from(&buf[..BTREE_PAGE_HEADER_SIZE])?;
        let is_leaf = header.level == 0;
        let mut offset = BTREE_PAGE_HEADER_SIZE;
        let mut entries = Vec::with_capacity(header.num_keys as usize);
        for _ in 0..header.num_keys {
            let (key, consumed) = IndexKey::decode(&buf[offset..])?;
            offset += consumed;
            let payload = if is_leaf {
                let page_num =
                    u32::from_le_bytes(slice4(buf, offset)?);
                let slot_num = u16::from_le_bytes([buf[offset + 4], buf[offset + 5]]);
                offset += 6;
                Payload::Tid(TupleId::new(page_num, slot_num))
            } else {
                let page = u32::from_le_bytes(slice4(buf, offset)?);
                offset += 4;
                Payload::Child(page)
            };
            entries.push(Entry { key, payload });
        }
        Ok(Self { header, entries })
    }

    /// First position whose key is >= `key` (lower bound).
    pub fn lower_bound(&self, key: &IndexKey) -> usize {
        self.entries.partition_point(|e| e.key < *key)
    }

    /// First position whose key is > `key` (upper bound). Inserting here
    /// keeps duplicate keys in insertion order.
    pub fn upper_bound(&self, key: &IndexKey) -> usize {
        self.entries.partition_point(|e| e.key <= *key)
    }

    /// Position of the child to descend into when *searching* for `key`:
    /// the first entry whose high key admits it, else the last child.
    pub fn child_index(&self, key: &IndexKey) -> usize {
        let pos = self.lower_bound(key);
        pos.min(self.entries.len().saturating_sub(1))
    }

    /// Position of the child to descend into when *inserting* `key`: the
    /// first entry whose high key exceeds it, else the last child.
    ///
    /// Searching and inserting deliberately differ on equal keys. A run
    /// of duplicates may span several leaves; lookups must start at the
    /// leftmost, while a new duplicate must land after every existing one
    /// so insertion order is preserved along the leaf chain.
    pub fn insert_child_index(&self, key: &IndexKey) -> usize {
        let pos = self.upper_bound(key);
        pos.min(self.entries.len().saturating_sub(1))
    }
}

fn slice4(buf: &[u8], offset: usize) -> Result<[u8; 4], SerializationError> {
    buf.get(offset..offset + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or(SerializationError::BufferTooSmall {
            required: offset + 4,
            available: buf.len(),
        })
}
