//! MVCC snapshots and the committed-before visibility test.

use crate::error::{CoreError, CoreResult};
use crate::xid::TransactionId;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Separator used by the textual outstanding-transaction list.
pub const OUTSTANDING_SEPARATOR: char = ',';

/// An immutable visibility boundary taken from the master.
///
/// A snapshot records the transaction that took it (`current`), the oldest
/// transaction still running at that moment (`min`), the first transaction id
/// not yet assigned (`max`), and the ids between the two bounds that were
/// running concurrently (`outstanding`).
///
/// Equality is structural. Ordering follows `current` only: two snapshots with
/// the same `current` but different bounds are neither equal nor ordered.
/// Use [`Snapshot::compare_position`] for a total order on `current`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Snapshot {
    current: TransactionId,
    min: TransactionId,
    max: TransactionId,
    outstanding: BTreeSet<TransactionId>,
}

impl Snapshot {
    /// Creates a snapshot from an explicit set of outstanding ids.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvertedSnapshotBounds`] if `max` precedes `min`.
    pub fn new(
        current: TransactionId,
        min: TransactionId,
        max: TransactionId,
        outstanding: impl IntoIterator<Item = TransactionId>,
    ) -> CoreResult<Self> {
        if max.precedes(min) {
            return Err(CoreError::InvertedSnapshotBounds {
                min: min.value(),
                max: max.value(),
            });
        }
        Ok(Self {
            current,
            min,
            max,
            outstanding: outstanding.into_iter().collect(),
        })
    }

    /// Creates a snapshot from a comma separated outstanding list.
    ///
    /// An empty (or all-blank) list yields an empty set. Blank elements are
    /// skipped, so a trailing separator is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedOutstandingList`] if any element is not a
    /// valid transaction id, and [`CoreError::InvertedSnapshotBounds`] if the
    /// bounds are inverted.
    pub fn from_outstanding_list(
        current: TransactionId,
        min: TransactionId,
        max: TransactionId,
        list: &str,
    ) -> CoreResult<Self> {
        let outstanding = parse_outstanding(list)?;
        Self::new(current, min, max, outstanding)
    }

    /// The transaction that took this snapshot.
    #[must_use]
    pub const fn current(&self) -> TransactionId {
        self.current
    }

    /// The oldest transaction that was still running.
    #[must_use]
    pub const fn min(&self) -> TransactionId {
        self.min
    }

    /// The first transaction id that had not been assigned.
    #[must_use]
    pub const fn max(&self) -> TransactionId {
        self.max
    }

    /// The transactions that were running concurrently.
    #[must_use]
    pub const fn outstanding(&self) -> &BTreeSet<TransactionId> {
        &self.outstanding
    }

    /// Returns true if `xid` is guaranteed committed as of this snapshot.
    ///
    /// That holds when `xid` precedes `min`, or when it lies strictly between
    /// `min` and `max` and was not outstanding. `min` and `max` themselves are
    /// never committed-before.
    #[must_use]
    pub fn is_committed_before(&self, xid: TransactionId) -> bool {
        if xid.precedes(self.min) {
            return true;
        }
        self.min.precedes(xid) && xid.precedes(self.max) && !self.outstanding.contains(&xid)
    }

    /// Returns true if `xid` was still running or not yet started.
    #[must_use]
    pub fn is_active_or_future(&self, xid: TransactionId) -> bool {
        !self.is_committed_before(xid)
    }

    /// Renders the outstanding set in the textual list form.
    #[must_use]
    pub fn outstanding_list(&self) -> String {
        let mut out = String::new();
        for (i, xid) in self.outstanding.iter().enumerate() {
            if i > 0 {
                out.push(OUTSTANDING_SEPARATOR);
            }
            out.push_str(&xid.to_string());
        }
        out
    }

    /// Orders two snapshots by the transaction that took them.
    #[must_use]
    pub fn compare_position(&self, other: &Self) -> Ordering {
        self.current.compare(other.current)
    }

    /// Iterates the transactions that became committed between two snapshots.
    ///
    /// The snapshot with the earlier `max` is treated as the starting point.
    /// Yields, in precedence order, every id that was active or future at the
    /// starting point and is committed-before at the other snapshot. This is
    /// the set a replica must replay when advancing between them.
    #[must_use]
    pub fn committed_between<'a>(&'a self, other: &'a Self) -> CommittedBetween<'a> {
        let (earlier, later) = if other.max.precedes(self.max) {
            (other, self)
        } else {
            (self, other)
        };
        CommittedBetween {
            earlier,
            later,
            cursor: Some(earlier.min),
        }
    }

    /// Splits `items` into those safe to replay now and those to defer.
    ///
    /// Input order is preserved within each half.
    pub fn partition<T, I, F>(&self, items: I, key: F) -> (Vec<T>, Vec<T>)
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> TransactionId,
    {
        items
            .into_iter()
            .partition(|item| self.is_committed_before(key(item)))
    }
}

impl PartialOrd for Snapshot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        match self.compare_position(other) {
            Ordering::Equal => None,
            ord => Some(ord),
        }
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{} (current {})",
            self.min,
            self.max,
            self.outstanding_list(),
            self.current
        )
    }
}

fn parse_outstanding(list: &str) -> CoreResult<BTreeSet<TransactionId>> {
    let mut out = BTreeSet::new();
    for (index, element) in list.split(OUTSTANDING_SEPARATOR).enumerate() {
        let element = element.trim();
        if element.is_empty() {
            continue;
        }
        let xid = element
            .parse::<TransactionId>()
            .map_err(|_| CoreError::MalformedOutstandingList {
                list: list.to_string(),
                index,
                element: element.to_string(),
            })?;
        out.insert(xid);
    }
    Ok(out)
}

/// Iterator returned by [`Snapshot::committed_between`].
#[derive(Debug, Clone)]
pub struct CommittedBetween<'a> {
    earlier: &'a Snapshot,
    later: &'a Snapshot,
    cursor: Option<TransactionId>,
}

impl Iterator for CommittedBetween<'_> {
    type Item = TransactionId;

    fn next(&mut self) -> Option<TransactionId> {
        while let Some(xid) = self.cursor {
            if !xid.precedes(self.later.max) {
                self.cursor = None;
                return None;
            }
            self.cursor = Some(xid.next_normal());
            if self.earlier.is_active_or_future(xid) && self.later.is_committed_before(xid) {
                return Some(xid);
            }
        }
        None
    }
}
