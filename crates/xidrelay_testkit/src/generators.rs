//! Property-based test generators using proptest.
//!
//! Snapshots are generated with `max` less than half the id space past
//! `min`, the window in which circular precedence is a total order.

use proptest::prelude::*;
use xidrelay_core::{ChangeRecord, CommandType, Snapshot, TransactionId};

/// Number of normal transaction ids.
const NORMAL_SPAN: u64 = u32::MAX as u64 - 2;

/// Returns the normal id `by` steps after `base`, wrapping past the special
/// ids.
pub fn advance(base: TransactionId, by: u32) -> TransactionId {
    let first = u64::from(TransactionId::FIRST_NORMAL.value());
    let pos = (u64::from(base.value()).max(first) - first + u64::from(by)) % NORMAL_SPAN;
    TransactionId::new(pos + first).expect("normal ids are never zero")
}

/// Strategy for any valid transaction id, special ids included.
pub fn xid_strategy() -> impl Strategy<Value = TransactionId> {
    prop_oneof![
        1 => (1u32..TransactionId::FIRST_NORMAL.value()).prop_map(to_xid),
        9 => normal_xid_strategy(),
    ]
}

/// Strategy for normal transaction ids, biased towards the wrap point.
pub fn normal_xid_strategy() -> impl Strategy<Value = TransactionId> {
    prop_oneof![
        3 => (TransactionId::FIRST_NORMAL.value()..=u32::MAX).prop_map(to_xid),
        1 => (u32::MAX - 64..=u32::MAX).prop_map(to_xid),
        1 => (TransactionId::FIRST_NORMAL.value()..64).prop_map(to_xid),
    ]
}

/// Number of `next_normal` steps from `from` to `to`.
pub fn distance(from: TransactionId, to: TransactionId) -> u32 {
    let raw = to.value().wrapping_sub(from.value());
    if to.value() < from.value() {
        // the special ids are skipped when wrapping
        raw - TransactionId::FIRST_NORMAL.value()
    } else {
        raw
    }
}

fn to_xid(value: u32) -> TransactionId {
    TransactionId::new(u64::from(value)).expect("strategy never yields zero")
}

fn offsets_strategy(width: u32) -> impl Strategy<Value = std::collections::BTreeSet<u32>> {
    let span = width.max(1);
    prop::collection::btree_set(0..span, 0..=span.min(16) as usize)
}

/// Strategy for snapshots up to `max_width` ids wide.
pub fn snapshot_strategy_with_width(max_width: u32) -> impl Strategy<Value = Snapshot> {
    (normal_xid_strategy(), 0..=max_width).prop_flat_map(|(min, width)| {
        (
            Just(min),
            Just(width),
            0..=width,
            offsets_strategy(width),
        )
            .prop_map(|(min, width, current, offsets)| {
                Snapshot::new(
                    advance(min, current),
                    min,
                    advance(min, width),
                    offsets.into_iter().map(|o| advance(min, o)),
                )
                .expect("max never precedes min")
            })
    })
}

/// Strategy for snapshots up to 2000 ids wide.
pub fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
    snapshot_strategy_with_width(2000)
}

/// Strategy for two snapshots of the same master, earlier first.
///
/// The later snapshot's `max` is strictly after the earlier one's and its
/// `min` never precedes the earlier `min`.
pub fn snapshot_pair_strategy() -> impl Strategy<Value = (Snapshot, Snapshot)> {
    snapshot_strategy().prop_flat_map(|earlier| {
        let width = distance(earlier.min(), earlier.max());
        (Just(earlier), 0u32..500, 1u32..2000).prop_flat_map(move |(earlier, dmin, dmax)| {
            let min = advance(earlier.min(), dmin.min(width.saturating_add(dmax)));
            let max = advance(earlier.max(), dmax);
            (
                Just(earlier),
                Just((min, max)),
                offsets_strategy(distance(min, max)),
            )
                .prop_map(|(earlier, (min, max), offsets)| {
                    let later = Snapshot::new(max, min, max, offsets.into_iter().map(|o| advance(min, o)))
                        .expect("max never precedes min");
                    (earlier, later)
                })
        })
    })
}

/// Strategy for command types.
pub fn command_type_strategy() -> impl Strategy<Value = CommandType> {
    prop_oneof![
        Just(CommandType::Insert),
        Just(CommandType::Update),
        Just(CommandType::Delete),
    ]
}

/// Strategy for change records whose ids fall inside `snapshot`'s range.
pub fn change_records_strategy(snapshot: &Snapshot) -> impl Strategy<Value = Vec<ChangeRecord>> {
    let min = snapshot.min();
    let width = distance(min, snapshot.max());
    prop::collection::vec(
        (
            0..=width,
            command_type_strategy(),
            prop::string::string_regex("[a-z]{1,8}\\.[a-z]{1,8}").expect("valid regex"),
        ),
        0..32,
    )
    .prop_map(move |rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (offset, command, table))| ChangeRecord {
                rowid: i as i64 + 1,
                xid: advance(min, offset),
                command,
                table,
                info: String::new(),
            })
            .collect()
    })
}

/// Configuration for property-based tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 64,
            max_shrink_iters: 200,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 2048,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
