//! The transaction manager.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::snapshot::Snapshot;
use super::types::{TxError, TxId, TxState, UndoRecord};

/// Id allocation and the active set, under one mutex so a snapshot sees a
/// consistent pair.
struct ManagerState {
    next_txid: TxId,
    active: Vec<TxId>,
}

/// Allocates transaction ids, tracks states, and stores undo logs.
///
/// State is volatile: after a restart every previously written `xmin` is
/// unknown to the manager and is treated as committed long ago (visible).
/// A write-ahead log would make this durable; this revision reserves the
/// page `lsn` fields for it but does not implement it.
pub struct TransactionManager {
    state: Mutex<ManagerState>,
    tx_states: Mutex<HashMap<TxId, TxState>>,
    undo_logs: Mutex<HashMap<TxId, Vec<UndoRecord>>>,
}

impl TransactionManager {
    /// Creates a manager. Ids start at 2 (0 invalid, 1 bootstrap).
    pub fn new() -> Self {
        Self::with_next(2)
    }

    /// Creates a manager whose first id is at least `next`.
    ///
    /// Used at engine startup with the high-water mark recovered from
    /// stored tuple headers, so ids never collide with stamps written by
    /// a previous run of the process.
    pub fn with_next(next: TxId) -> Self {
        Self {
            state: Mutex::new(ManagerState {
                next_txid: next.max(2),
                active: Vec::new(),
            }),
            tx_states: Mutex::new(HashMap::new()),
            undo_logs: Mutex::new(HashMap::new()),
        }
    }

    /// Begins a transaction, returning its fresh id.
    pub fn begin(&self) -> TxId {
        let txid = {
            let mut state = self.state.lock();
            let txid = state.next_txid;
            state.next_txid += 1;
            state.active.push(txid);
            txid
        };
        self.tx_states.lock().insert(txid, TxState::Active);
        self.undo_logs.lock().insert(txid, Vec::new());
        txid
    }

    /// Commits a transaction and discards its undo log.
    pub fn commit(&self, txid: TxId) -> Result<(), TxError> {
        self.complete(txid, TxState::Committed)?;
        self.undo_logs.lock().remove(&txid);
        Ok(())
    }

    /// Aborts a transaction, returning its undo log in append order.
    ///
    /// The caller (the engine, which owns the heaps and indexes) replays
    /// the records in reverse to erase the transaction's effects.
    pub fn abort(&self, txid: TxId) -> Result<Vec<UndoRecord>, TxError> {
        self.complete(txid, TxState::Aborted)?;
        Ok(self.undo_logs.lock().remove(&txid).unwrap_or_default())
    }

    fn complete(&self, txid: TxId, target: TxState) -> Result<(), TxError> {
        {
            let mut tx_states = self.tx_states.lock();
            match tx_states.get(&txid) {
                Some(TxState::Active) => {
                    tx_states.insert(txid, target);
                }
                Some(&current) => {
                    return Err(TxError::InvalidTransition {
                        txid,
                        current,
                        attempted: target,
                    });
                }
                None => return Err(TxError::NotFound(txid)),
            }
        }
        self.state.lock().active.retain(|&t| t != txid);
        Ok(())
    }

    /// Appends an undo record. The log is append-only and only while the
    /// transaction is active.
    pub fn push_undo(&self, txid: TxId, record: UndoRecord) -> Result<(), TxError> {
        match self.tx_states.lock().get(&txid) {
            Some(TxState::Active) => {}
            Some(&current) => {
                return Err(TxError::InvalidTransition {
                    txid,
                    current,
                    attempted: TxState::Active,
                });
            }
            None => return Err(TxError::NotFound(txid)),
        }
        self.undo_logs
            .lock()
            .entry(txid)
            .or_default()
            .push(record);
        Ok(())
    }

    /// Returns a transaction's state, or `None` for ids from before this
    /// process started (treated as committed long ago by visibility).
    pub fn state(&self, txid: TxId) -> Option<TxState> {
        self.tx_states.lock().get(&txid).copied()
    }

    /// Captures a snapshot for `txid` at command `cid`.
    pub fn snapshot(&self, current_txid: TxId, current_cid: u32) -> Snapshot {
        let (xmax, xip) = {
            let state = self.state.lock();
            (state.next_txid, state.active.clone())
        };
        let xmin = xip.iter().min().copied().unwrap_or(current_txid);
        Snapshot {
            xmin,
            xmax,
            xip,
            current_txid,
            current_cid,
        }
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Tuple, TupleId};

    #[test]
    fn test_sequential_ids_from_two() {
        let manager = TransactionManager::new();
        assert_eq!(manager.begin(), 2);
        assert_eq!(manager.begin(), 3);
        assert_eq!(manager.begin(), 4);
    }

    #[test]
    fn test_with_next_respects_high_water_mark() {
        let manager = TransactionManager::with_next(100);
        assert_eq!(manager.begin(), 100);
        // Never below the reserved range.
        let manager = TransactionManager::with_next(0);
        assert_eq!(manager.begin(), 2);
    }

    #[test]
    fn test_state_transitions() {
        let manager = TransactionManager::new();
        let tx = manager.begin();
        assert_eq!(manager.state(tx), Some(TxState::Active));

        manager.commit(tx).unwrap();
        assert_eq!(manager.state(tx), Some(TxState::Committed));

        // Terminal states are final.
        assert!(matches!(
            manager.commit(tx),
            Err(TxError::InvalidTransition { .. })
        ));
        assert!(matches!(
            manager.abort(tx),
            Err(TxError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_unknown_txid() {
        let manager = TransactionManager::new();
        assert_eq!(manager.state(999), None);
        assert!(matches!(manager.commit(999), Err(TxError::NotFound(_))));
    }

    #[test]
    fn test_abort_returns_undo_in_append_order() {
        let manager = TransactionManager::new();
        let tx = manager.begin();
        for page in 1..=3 {
            manager
                .push_undo(
                    tx,
                    UndoRecord::Insert {
                        table: 1,
                        tid: TupleId::new(page, 0),
                        tuple: Tuple::new(vec![]),
                    },
                )
                .unwrap();
        }
        let undo = manager.abort(tx).unwrap();
        assert_eq!(undo.len(), 3);
        let pages: Vec<u32> = undo
            .iter()
            .map(|r| match r {
                UndoRecord::Insert { tid, .. } => tid.page_num,
                _ => panic!("unexpected record"),
            })
            .collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[test]
    fn test_commit_clears_undo() {
        let manager = TransactionManager::new();
        let tx = manager.begin();
        manager
            .push_undo(
                tx,
                UndoRecord::Insert {
                    table: 1,
                    tid: TupleId::new(1, 0),
                    tuple: Tuple::new(vec![]),
                },
            )
            .unwrap();
        manager.commit(tx).unwrap();
        assert!(manager.undo_logs.lock().get(&tx).is_none());
    }

    #[test]
    fn test_push_undo_rejected_after_terminal() {
        let manager = TransactionManager::new();
        let tx = manager.begin();
        manager.commit(tx).unwrap();
        assert!(manager
            .push_undo(
                tx,
                UndoRecord::Delete {
                    table: 1,
                    tid: TupleId::new(1, 0),
                    tuple: Tuple::new(vec![]),
                },
            )
            .is_err());
    }

    #[test]
    fn test_snapshot_captures_active_set() {
        let manager = TransactionManager::new();
        let tx1 = manager.begin();
        let tx2 = manager.begin();
        manager.commit(tx1).unwrap();
        let tx3 = manager.begin();

        let snapshot = manager.snapshot(tx3, 0);
        assert!(!snapshot.is_in_progress(tx1));
        assert!(snapshot.is_in_progress(tx2));
        assert!(snapshot.is_in_progress(tx3));
        assert_eq!(snapshot.xmin, tx2);
        assert_eq!(snapshot.xmax, tx3 + 1);
    }
}
