//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use rand::Rng;
use xidrelay_core::{Snapshot, TransactionId};

/// Builds a snapshot `width` ids wide starting at `min`, with `outstanding`
/// randomly chosen running ids.
pub fn random_snapshot(min: u32, width: u32, outstanding: usize) -> Snapshot {
    let mut rng = rand::thread_rng();
    let min = xid(min);
    let running: Vec<TransactionId> = (0..outstanding)
        .map(|_| offset(min, rng.gen_range(0..width.max(1))))
        .collect();
    Snapshot::new(offset(min, width), min, offset(min, width), running).expect("ordered bounds")
}

/// Random ids within `width` of `min`, some before it.
pub fn random_xids(min: u32, width: u32, count: usize) -> Vec<TransactionId> {
    let mut rng = rand::thread_rng();
    let start = min.saturating_sub(width / 4).max(TransactionId::FIRST_NORMAL.value());
    (0..count)
        .map(|_| offset(xid(start), rng.gen_range(0..width + width / 2)))
        .collect()
}

fn xid(value: u32) -> TransactionId {
    TransactionId::new(u64::from(value)).expect("non-zero id")
}

// steps `by` normal ids forward, skipping the special ids on wrap
fn offset(base: TransactionId, by: u32) -> TransactionId {
    let first = u64::from(TransactionId::FIRST_NORMAL.value());
    let span = u64::from(u32::MAX) - 2;
    let pos = (u64::from(base.value()) - first + u64::from(by)) % span;
    TransactionId::new(pos + first).expect("normal id")
}
