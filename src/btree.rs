//! File-backed B-tree index.
//!
//! One `<table>_<index>.idx` file per index, pages the same size as heap
//! pages. Leaves hold `(key, TupleId)` entries and form a singly-linked
//! right chain for range scans; internal pages hold `(high key, child)`
//! entries where each entry's key is the highest key reachable through its
//! child. The root lives at page 0 for the life of the index: when it
//! splits, both halves move to fresh pages and page 0 is rewritten one
//! level higher.
//!
//! Duplicate keys are kept in insertion order. Deletion removes the
//! matching entry without rebalancing; underfull pages stay in place and
//! [`BtreeIndex::verify`] still reports the tree as valid.

mod error;
mod index;
mod key;
mod node;

pub use error::BtreeError;
pub use index::{BtreeIndex, BtreeStats, RangeBound};
pub use key::IndexKey;
pub use node::{BtreeNode, NodeHeader, PageType, BTREE_MAGIC, BTREE_PAGE_HEADER_SIZE, BTREE_VERSION};
