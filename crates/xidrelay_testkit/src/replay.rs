//! A simulated master and replica for end-to-end visibility tests.
//!
//! [`SimulatedMaster`] hands out transaction ids, records changes in a
//! transaction log and takes snapshots the way the capture triggers would.
//! [`ReplicaHarness`] advances from snapshot to snapshot, applying the
//! changes of every transaction that committed in between.

use std::collections::BTreeSet;
use xidrelay_core::{ChangeRecord, CommandType, Snapshot, TransactionId};

/// An in-memory master database.
#[derive(Debug, Clone)]
pub struct SimulatedMaster {
    next: TransactionId,
    running: BTreeSet<TransactionId>,
    committed: Vec<TransactionId>,
    log: Vec<ChangeRecord>,
}

impl SimulatedMaster {
    /// Creates a master whose next transaction id is `start`.
    pub fn starting_at(start: TransactionId) -> Self {
        Self {
            next: start,
            running: BTreeSet::new(),
            committed: Vec::new(),
            log: Vec::new(),
        }
    }

    /// Starts a transaction.
    pub fn begin(&mut self) -> TransactionId {
        let xid = self.next;
        self.next = xid.next_normal();
        self.running.insert(xid);
        xid
    }

    /// Records a change made by running transaction `xid`.
    pub fn write(&mut self, xid: TransactionId, command: CommandType, table: &str) {
        assert!(self.running.contains(&xid), "{xid} is not running");
        let rowid = self.log.len() as i64 + 1;
        self.log.push(ChangeRecord {
            rowid,
            xid,
            command,
            table: table.to_string(),
            info: format!("row {rowid}"),
        });
    }

    /// Commits `xid`.
    pub fn commit(&mut self, xid: TransactionId) {
        assert!(self.running.remove(&xid), "{xid} is not running");
        self.committed.push(xid);
    }

    /// Takes a snapshot from a new, immediately committed transaction.
    pub fn snapshot(&mut self) -> Snapshot {
        let current = self.begin();
        let min = self.running.iter().copied().min().unwrap_or(current);
        let outstanding: Vec<TransactionId> =
            self.running.iter().copied().filter(|x| *x != current).collect();
        let snapshot = Snapshot::new(current, min, self.next, outstanding)
            .expect("running ids never precede the next id");
        self.commit(current);
        snapshot
    }

    /// The transaction log.
    pub fn log(&self) -> &[ChangeRecord] {
        &self.log
    }

    /// Transactions committed so far, in commit order.
    pub fn committed(&self) -> &[TransactionId] {
        &self.committed
    }

    /// Returns true if `xid` is running.
    pub fn is_running(&self, xid: TransactionId) -> bool {
        self.running.contains(&xid)
    }
}

/// A replica that replays the master's log between snapshots.
#[derive(Debug, Default, Clone)]
pub struct ReplicaHarness {
    position: Option<Snapshot>,
    applied: Vec<ChangeRecord>,
}

impl ReplicaHarness {
    /// Creates a replica with no position.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the replica to `next`, applying every logged change whose
    /// transaction committed since the current position.
    ///
    /// The first call only sets the starting position. Returns the changes
    /// applied, in capture order.
    pub fn advance(&mut self, next: Snapshot, log: &[ChangeRecord]) -> Vec<ChangeRecord> {
        let batch = match &self.position {
            None => Vec::new(),
            Some(previous) => {
                let newly: BTreeSet<TransactionId> = previous.committed_between(&next).collect();
                let mut batch: Vec<ChangeRecord> = log
                    .iter()
                    .filter(|r| newly.contains(&r.xid))
                    .cloned()
                    .collect();
                batch.sort();
                batch
            }
        };
        self.position = Some(next);
        self.applied.extend(batch.iter().cloned());
        batch
    }

    /// The current position.
    pub fn position(&self) -> Option<&Snapshot> {
        self.position.as_ref()
    }

    /// Every change applied so far.
    pub fn applied(&self) -> &[ChangeRecord] {
        &self.applied
    }
}
