//! B-tree index operations: insert with splits, delete, point and range
//! lookup, structural verification.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::storage::PageManager;
use crate::value::TupleId;

use super::error::BtreeError;
use super::key::IndexKey;
use super::node::{
    BtreeNode, Entry, PageType, Payload, BTREE_PAGE_HEADER_SIZE, INVALID_PAGE,
};

/// A bound of a range scan.
#[derive(Debug, Clone, Copy)]
pub enum RangeBound<'a> {
    /// No bound on this side.
    Unbounded,
    /// Bound that admits the key itself.
    Inclusive(&'a IndexKey),
    /// Bound that excludes the key itself.
    Exclusive(&'a IndexKey),
}

impl RangeBound<'_> {
    fn admits_from_below(&self, key: &IndexKey) -> bool {
        match self {
            RangeBound::Unbounded => true,
            RangeBound::Inclusive(min) => key >= min,
            RangeBound::Exclusive(min) => key > min,
        }
    }

    fn admits_from_above(&self, key: &IndexKey) -> bool {
        match self {
            RangeBound::Unbounded => true,
            RangeBound::Inclusive(max) => key <= max,
            RangeBound::Exclusive(max) => key < max,
        }
    }
}

/// Structural statistics reported by [`BtreeIndex::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BtreeStats {
    /// Total leaf entries.
    pub num_entries: u64,
    /// Tree depth (1 = the root is a leaf).
    pub depth: u32,
    /// Pages in the index file.
    pub num_pages: u32,
}

/// Result of splitting a node: the halves' high keys and the right page.
struct Split {
    left_high: IndexKey,
    right_page: u32,
    right_high: IndexKey,
}

/// A file-backed B-tree index.
///
/// The root is pinned at page 0. Mutations serialize on an internal mutex;
/// lookups read pages without locking (the unit of atomicity is a full
/// page write, and readers tolerate momentarily stale routing keys by
/// walking the leaf chain).
pub struct BtreeIndex {
    filename: String,
    pager: Arc<PageManager>,
    unique: bool,
    num_pages: AtomicU32,
    write_lock: Mutex<()>,
}

impl BtreeIndex {
    /// Opens (or creates) the index file `<table>_<index>.idx`.
    ///
    /// A brand-new file gets an empty root leaf written at page 0.
    pub fn open(
        pager: Arc<PageManager>,
        table_name: &str,
        index_name: &str,
        unique: bool,
    ) -> Result<Self, BtreeError> {
        let filename = format!("{table_name}_{index_name}.idx");
        let mut num_pages = pager.page_count(&filename)?;
        let index = Self {
            filename,
            pager,
            unique,
            num_pages: AtomicU32::new(num_pages.max(1)),
            write_lock: Mutex::new(()),
        };
        if num_pages == 0 {
            let root = BtreeNode::new(PageType::Root, 0);
            index.write_node(0, &root)?;
            num_pages = 1;
            index.num_pages.store(num_pages, Ordering::Release);
        }
        Ok(index)
    }

    /// The file this index stores into.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Whether this index enforces key uniqueness.
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// The largest encoded key accepted, chosen so a node can always hold
    /// enough entries to split sanely.
    pub fn max_key_size(&self) -> usize {
        (self.pager.page_size() - BTREE_PAGE_HEADER_SIZE) / 4
    }

    fn read_node(&self, page_num: u32) -> Result<BtreeNode, BtreeError> {
        let mut buf = vec![0u8; self.pager.page_size()];
        self.pager.read_page(&self.filename, page_num, &mut buf)?;
        BtreeNode::read_from(&buf)
    }

    fn write_node(&self, page_num: u32, node: &BtreeNode) -> Result<(), BtreeError> {
        let mut buf = vec![0u8; self.pager.page_size()];
        node.write_to(&mut buf)?;
        self.pager.write_page(&self.filename, page_num, &buf)?;
        Ok(())
    }

    fn alloc_page(&self) -> u32 {
        self.num_pages.fetch_add(1, Ordering::AcqRel)
    }

    /// Inserts `(key, tid)`.
    ///
    /// Duplicate keys are appended after existing equals so lookup order
    /// matches insertion order. On a unique index, an existing equal key
    /// fails with [`BtreeError::DuplicateKey`].
    pub fn insert(&self, key: IndexKey, tid: TupleId) -> Result<(), BtreeError> {
        if key.encoded_size() > self.max_key_size() {
            return Err(BtreeError::KeyTooLarge {
                size: key.encoded_size(),
                max: self.max_key_size(),
            });
        }

        let _guard = self.write_lock.lock();
        if self.unique && !self.lookup(&key)?.is_empty() {
            return Err(BtreeError::DuplicateKey(key));
        }

        if let Some(split) = self.insert_rec(0, &key, tid)? {
            self.grow_root(split)?;
        }
        Ok(())
    }

    /// Recursive descent insert. Returns the split description when the
    /// node at `page_num` overflowed and shed its upper half.
    fn insert_rec(
        &self,
        page_num: u32,
        key: &IndexKey,
        tid: TupleId,
    ) -> Result<Option<Split>, BtreeError> {
        let mut node = self.read_node(page_num)?;

        if node.is_leaf() {
            let pos = node.upper_bound(key);
            node.entries.insert(
                pos,
                Entry {
                    key: key.clone(),
                    payload: Payload::Tid(tid),
                },
            );
        } else {
            let idx = node.insert_child_index(key);
            let child_page = node.entries[idx].payload.child();
            // Keep the routing key current when the new key becomes the
            // subtree maximum.
            if *key > node.entries[idx].key {
                node.entries[idx].key = key.clone();
            }
            if let Some(split) = self.insert_rec(child_page, key, tid)? {
                node.entries[idx].key = split.left_high;
                node.entries.insert(
                    idx + 1,
                    Entry {
                        key: split.right_high,
                        payload: Payload::Child(split.right_page),
                    },
                );
            }
        }

        if node.serialized_size() > self.pager.page_size() {
            let split = self.split_node(page_num, &mut node)?;
            self.write_node(page_num, &node)?;
            return Ok(Some(split));
        }
        self.write_node(page_num, &node)?;
        Ok(None)
    }

    /// Splits `node` (resident at `page_num`) at the median, moving the
    /// upper half to a fresh page. The caller writes the left half back.
    fn split_node(&self, page_num: u32, node: &mut BtreeNode) -> Result<Split, BtreeError> {
        let mid = node.entries.len() / 2;
        let right_entries = node.entries.split_off(mid);
        let right_page = self.alloc_page();

        let right_type = if node.is_leaf() {
            PageType::Leaf
        } else {
            PageType::Internal
        };
        let mut right = BtreeNode::new(right_type, node.header.level);
        right.entries = right_entries;
        right.header.parent = node.header.parent;

        if node.is_leaf() {
            // Link the new leaf into the right-sibling chain.
            right.header.right_sibling = node.header.right_sibling;
            node.header.right_sibling = right_page;
        } else {
            self.adopt_children(&right, right_page)?;
        }
        self.write_node(right_page, &right)?;

        Ok(Split {
            left_high: node
                .high_key()
                .cloned()
                .ok_or_else(|| BtreeError::Corrupted("split produced an empty left node".into()))?,
            right_page,
            right_high: right
                .high_key()
                .cloned()
                .ok_or_else(|| BtreeError::Corrupted("split produced an empty right node".into()))?,
        })
    }

    /// Handles a root split: both halves move off page 0 and page 0 is
    /// rewritten as a new root one level higher.
    fn grow_root(&self, split: Split) -> Result<(), BtreeError> {
        let mut left = self.read_node(0)?;
        let left_page = self.alloc_page();
        left.header.page_type = if left.is_leaf() {
            PageType::Leaf
        } else {
            PageType::Internal
        };
        left.header.parent = 0;
        if !left.is_leaf() {
            self.adopt_children(&left, left_page)?;
        }
        self.write_node(left_page, &left)?;

        let mut right = self.read_node(split.right_page)?;
        right.header.parent = 0;
        self.write_node(split.right_page, &right)?;

        let mut root = BtreeNode::new(PageType::Root, left.header.level + 1);
        root.entries = vec![
            Entry {
                key: split.left_high,
                payload: Payload::Child(left_page),
            },
            Entry {
                key: split.right_high,
                payload: Payload::Child(split.right_page),
            },
        ];
        self.write_node(0, &root)
    }

    /// Repoints the parent field of every child of `node` to `new_parent`.
    ///
    /// Parent pointers are maintained best-effort for diagnostics; descent
    /// never reads them.
    fn adopt_children(&self, node: &BtreeNode, new_parent: u32) -> Result<(), BtreeError> {
        for entry in &node.entries {
            let child_page = entry.payload.child();
            let mut child = self.read_node(child_page)?;
            child.header.parent = new_parent;
            self.write_node(child_page, &child)?;
        }
        Ok(())
    }

    /// Descends to the leaf where keys admitted by `min` begin.
    fn descend_to_leaf(&self, min: RangeBound<'_>) -> Result<(u32, BtreeNode), BtreeError> {
        let mut page_num = 0;
        let mut node = self.read_node(0)?;
        while !node.is_leaf() {
            if node.entries.is_empty() {
                return Err(BtreeError::Corrupted(format!(
                    "internal page {page_num} has no children"
                )));
            }
            let idx = match min {
                RangeBound::Unbounded => 0,
                RangeBound::Inclusive(key) | RangeBound::Exclusive(key) => node.child_index(key),
            };
            page_num = node.entries[idx].payload.child();
            node = self.read_node(page_num)?;
        }
        Ok((page_num, node))
    }

    /// Returns every TupleId stored under `key`, in insertion order.
    pub fn search(&self, key: &IndexKey) -> Result<Vec<TupleId>, BtreeError> {
        self.lookup(key)
    }

    fn lookup(&self, key: &IndexKey) -> Result<Vec<TupleId>, BtreeError> {
        self.range_scan(RangeBound::Inclusive(key), RangeBound::Inclusive(key))
    }

    /// Scans keys within `[min, max]` (each side optionally unbounded or
    /// exclusive), returning TupleIds in non-decreasing key order.
    pub fn range_scan(
        &self,
        min: RangeBound<'_>,
        max: RangeBound<'_>,
    ) -> Result<Vec<TupleId>, BtreeError> {
        let (_, mut node) = self.descend_to_leaf(min)?;
        let mut result = Vec::new();

        loop {
            for entry in &node.entries {
                if !min.admits_from_below(&entry.key) {
                    continue;
                }
                if !max.admits_from_above(&entry.key) {
                    return Ok(result);
                }
                result.push(entry.payload.tid());
            }
            match node.header.right_sibling {
                INVALID_PAGE => return Ok(result),
                next => node = self.read_node(next)?,
            }
        }
    }

    /// Removes the entry matching `(key, tid)`.
    ///
    /// No rebalancing happens on underflow; the page simply holds fewer
    /// entries. Returns false when no matching entry exists.
    pub fn delete(&self, key: &IndexKey, tid: TupleId) -> Result<bool, BtreeError> {
        let _guard = self.write_lock.lock();
        let (mut page_num, mut node) = self.descend_to_leaf(RangeBound::Inclusive(key))?;

        loop {
            if let Some(pos) = node
                .entries
                .iter()
                .position(|e| e.key == *key && e.payload.tid() == tid)
            {
                node.entries.remove(pos);
                self.write_node(page_num, &node)?;
                return Ok(true);
            }
            // Equal keys may continue into the right sibling.
            if node.high_key().is_some_and(|high| high > key) {
                return Ok(false);
            }
            match node.header.right_sibling {
                INVALID_PAGE => return Ok(false),
                next => {
                    page_num = next;
                    node = self.read_node(next)?;
                }
            }
        }
    }

    /// Structural audit: per-page magic/version, non-decreasing keys
    /// within each page, ordered leaf chain, no sibling cycles.
    pub fn verify(&self) -> Result<(), BtreeError> {
        let num_pages = self.num_pages.load(Ordering::Acquire);

        for page_num in 0..num_pages {
            let node = self.read_node(page_num)?;
            for pair in node.entries.windows(2) {
                if pair[0].key > pair[1].key {
                    return Err(BtreeError::Corrupted(format!(
                        "page {page_num}: keys out of order"
                    )));
                }
            }
            if page_num == 0 && node.header.page_type != PageType::Root {
                return Err(BtreeError::Corrupted("page 0 is not the root".into()));
            }
        }

        // Walk the leaf chain from the leftmost leaf.
        let (mut page_num, mut node) = self.descend_to_leaf(RangeBound::Unbounded)?;
        let mut visited = HashSet::new();
        loop {
            if !visited.insert(page_num) {
                return Err(BtreeError::Corrupted(format!(
                    "leaf chain cycles back to page {page_num}"
                )));
            }
            let next = node.header.right_sibling;
            if next == INVALID_PAGE {
                return Ok(());
            }
            let next_node = self.read_node(next)?;
            if let (Some(last), Some(first)) = (node.high_key(), next_node.entries.first()) {
                if *last > first.key {
                    return Err(BtreeError::Corrupted(format!(
                        "leaf {page_num} high key exceeds sibling {next} low key"
                    )));
                }
            }
            page_num = next;
            node = next_node;
        }
    }

    /// Returns entry count, tree depth, and page count.
    pub fn stats(&self) -> Result<BtreeStats, BtreeError> {
        let root = self.read_node(0)?;
        let depth = root.header.level as u32 + 1;

        let (_, mut node) = self.descend_to_leaf(RangeBound::Unbounded)?;
        let mut num_entries = node.entries.len() as u64;
        while node.header.right_sibling != INVALID_PAGE {
            node = self.read_node(node.header.right_sibling)?;
            num_entries += node.entries.len() as u64;
        }

        Ok(BtreeStats {
            num_entries,
            depth,
            num_pages: self.num_pages.load(Ordering::Acquire),
        })
    }
}
