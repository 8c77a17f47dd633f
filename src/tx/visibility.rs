//! MVCC visibility rules.
//!
//! A tuple version is visible when its inserting transaction is visible to
//! the snapshot and its deleting transaction (if any) is not. The rules
//! follow the classic xmin/xmax discipline:
//!
//! - `xmin` is visible when the tuple was inserted by an earlier command of the current
//!   transaction, or by a transaction that committed before the snapshot.
//! - the tuple is deleted when `xmax` was set by the current transaction, or by a
//!   transaction whose commit is visible to the snapshot.
//!
//! Ids the manager has never seen belong to earlier runs of the process
//! and count as committed long ago.

use crate::heap::{TupleHeader, Visibility};

use super::manager::TransactionManager;
use super::snapshot::Snapshot;
use super::types::{TxState, INVALID_TXID};

/// A snapshot bound to the transaction manager; implements the heap's
/// [`Visibility`] seam so scans and point reads filter correctly.
pub struct SnapshotView<'a> {
    snapshot: &'a Snapshot,
    txns: &'a TransactionManager,
}

impl<'a> SnapshotView<'a> {
    /// Creates a view for one statement.
    pub fn new(snapshot: &'a Snapshot, txns: &'a TransactionManager) -> Self {
        Self { snapshot, txns }
    }

    fn xmin_visible(&self, header: &TupleHeader) -> bool {
        let xmin = header.xmin;
        if xmin == self.snapshot.current_txid {
            // Our own insert: visible to later commands only.
            return header.cid < self.snapshot.current_cid;
        }
        match self.txns.state(xmin) {
            // Unknown: written before this process started.
            None => true,
            Some(TxState::Committed) => self.snapshot.txid_visible(xmin),
            Some(TxState::Active) | Some(TxState::Aborted) => false,
        }
    }

    fn deleted(&self, header: &TupleHeader) -> bool {
        let xmax = header.xmax;
        if xmax == INVALID_TXID {
            return false;
        }
        if xmax == self.snapshot.current_txid {
            // Our own delete hides the tuple from this transaction.
            return true;
        }
        match self.txns.state(xmax) {
            None => true,
            Some(TxState::Committed) => self.snapshot.txid_visible(xmax),
            Some(TxState::Active) | Some(TxState::Aborted) => false,
        }
    }
}

impl Visibility for SnapshotView<'_> {
    fn is_visible(&self, header: &TupleHeader) -> bool {
        self.xmin_visible(header) && !self.deleted(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TupleId;

    fn header(xmin: u64, xmax: u64, cid: u32) -> TupleHeader {
        TupleHeader {
            xmin,
            xmax,
            cid,
            ctid: TupleId::new(1, 0),
            len: 0,
            hoff: 32,
        }
    }

    #[test]
    fn test_committed_before_snapshot_visible() {
        let txns = TransactionManager::new();
        let writer = txns.begin();
        txns.commit(writer).unwrap();

        let reader = txns.begin();
        let snapshot = txns.snapshot(reader, 0);
        let view = SnapshotView::new(&snapshot, &txns);
        assert!(view.is_visible(&header(writer, 0, 0)));
    }

    #[test]
    fn test_in_progress_writer_invisible() {
        let txns = TransactionManager::new();
        let writer = txns.begin(); // stays active

        let reader = txns.begin();
        let snapshot = txns.snapshot(reader, 0);
        let view = SnapshotView::new(&snapshot, &txns);
        assert!(!view.is_visible(&header(writer, 0, 0)));
    }

    #[test]
    fn test_commit_after_snapshot_invisible() {
        let txns = TransactionManager::new();
        let reader = txns.begin();
        let snapshot = txns.snapshot(reader, 0);

        // Commits after the reader's snapshot was taken.
        let writer = txns.begin();
        txns.commit(writer).unwrap();

        let view = SnapshotView::new(&snapshot, &txns);
        assert!(!view.is_visible(&header(writer, 0, 0)));
    }

    #[test]
    fn test_aborted_writer_invisible() {
        let txns = TransactionManager::new();
        let writer = txns.begin();
        txns.abort(writer).unwrap();

        let reader = txns.begin();
        let snapshot = txns.snapshot(reader, 0);
        let view = SnapshotView::new(&snapshot, &txns);
        assert!(!view.is_visible(&header(writer, 0, 0)));
    }

    #[test]
    fn test_own_insert_visible_to_later_commands_only() {
        let txns = TransactionManager::new();
        let tx = txns.begin();

        // Inserted at cid 0: invisible to command 0, visible to command 1.
        let snapshot_same = txns.snapshot(tx, 0);
        let view = SnapshotView::new(&snapshot_same, &txns);
        assert!(!view.is_visible(&header(tx, 0, 0)));

        let snapshot_later = txns.snapshot(tx, 1);
        let view = SnapshotView::new(&snapshot_later, &txns);
        assert!(view.is_visible(&header(tx, 0, 0)));
    }

    #[test]
    fn test_own_delete_hides_tuple() {
        let txns = TransactionManager::new();
        let writer = txns.begin();
        txns.commit(writer).unwrap();
        let tx = txns.begin();

        let snapshot = txns.snapshot(tx, 1);
        let view = SnapshotView::new(&snapshot, &txns);
        assert!(!view.is_visible(&header(writer, tx, 0)));
    }

    #[test]
    fn test_delete_by_concurrent_tx_still_visible() {
        let txns = TransactionManager::new();
        let writer = txns.begin();
        txns.commit(writer).unwrap();

        let deleter = txns.begin(); // active, has stamped xmax
        let reader = txns.begin();
        let snapshot = txns.snapshot(reader, 0);
        let view = SnapshotView::new(&snapshot, &txns);
        assert!(view.is_visible(&header(writer, deleter, 0)));
    }

    #[test]
    fn test_delete_by_aborted_tx_still_visible() {
        let txns = TransactionManager::new();
        let writer = txns.begin();
        txns.commit(writer).unwrap();

        let deleter = txns.begin();
        txns.abort(deleter).unwrap();

        let reader = txns.begin();
        let snapshot = txns.snapshot(reader, 0);
        let view = SnapshotView::new(&snapshot, &txns);
        assert!(view.is_visible(&header(writer, deleter, 0)));
    }

    #[test]
    fn test_unknown_ids_treated_as_ancient() {
        // Simulates a restart: the heap holds stamps from a previous run.
        let txns = TransactionManager::new();
        let reader = txns.begin();
        let snapshot = txns.snapshot(reader, 0);
        let view = SnapshotView::new(&snapshot, &txns);

        // Unknown xmin: committed long ago, visible.
        assert!(view.is_visible(&header(4242, 0, 0)));
        // Unknown xmax: deleted long ago, invisible.
        assert!(!view.is_visible(&header(4242, 4243, 0)));
    }
}
