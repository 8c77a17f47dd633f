//! Transaction snapshots.

use super::types::TxId;

/// What a transaction is allowed to see, captured once at `begin()`.
///
/// A committed transaction `t` is visible to this snapshot exactly when it
/// began before the snapshot (`t < xmax`) and was not still in progress at
/// snapshot time (`t` not in `xip`). Reads within one transaction therefore see
/// one consistent state no matter what commits concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Oldest transaction active at snapshot time.
    pub xmin: TxId,
    /// First transaction id *not* started at snapshot time.
    pub xmax: TxId,
    /// Transactions in progress at snapshot time.
    pub xip: Vec<TxId>,
    /// The transaction this snapshot belongs to.
    pub current_txid: TxId,
    /// Current command id within the transaction; writes of command `n`
    /// become visible to commands `> n`.
    pub current_cid: u32,
}

impl Snapshot {
    /// Returns true if `txid` was in progress when the snapshot was taken.
    pub fn is_in_progress(&self, txid: TxId) -> bool {
        self.xip.contains(&txid)
    }

    /// Returns true if a *committed* transaction `txid` is visible to this
    /// snapshot.
    pub fn txid_visible(&self, txid: TxId) -> bool {
        if txid >= self.xmax {
            // Started after the snapshot was taken.
            return false;
        }
        if txid < self.xmin {
            // Older than every active transaction.
            return true;
        }
        !self.is_in_progress(txid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(xmin: TxId, xmax: TxId, xip: Vec<TxId>) -> Snapshot {
        Snapshot {
            xmin,
            xmax,
            xip,
            current_txid: 99,
            current_cid: 0,
        }
    }

    #[test]
    fn test_old_txids_visible() {
        let s = snapshot(5, 10, vec![5, 7]);
        assert!(s.txid_visible(2));
        assert!(s.txid_visible(4));
    }

    #[test]
    fn test_future_txids_invisible() {
        let s = snapshot(5, 10, vec![5]);
        assert!(!s.txid_visible(10));
        assert!(!s.txid_visible(11));
    }

    #[test]
    fn test_in_progress_invisible() {
        let s = snapshot(5, 10, vec![5, 7]);
        assert!(!s.txid_visible(7));
        assert!(s.txid_visible(6));
    }
}
