//! Transaction identifiers and their circular ordering.
//!
//! PostgreSQL assigns 32-bit transaction ids that wrap around. Ids are
//! therefore ordered by precedence within a window of 2^31 rather than by raw
//! numeric value:
//!
//! - `0` is invalid and can never be constructed.
//! - `1` (bootstrap) and `2` (frozen) are special; they precede every normal id
//!   and are ordered among themselves numerically.
//! - Normal ids (`3..=u32::MAX`) are compared with signed 32-bit subtraction:
//!   `a` precedes `b` when `(a - b) mod 2^32`, read as an `i32`, is negative.
//!
//! Two normal ids exactly 2^31 apart are ambiguous under signed subtraction
//! (each would precede the other). That tie is broken by raw numeric value so
//! the order stays antisymmetric.
//!
//! The order is total and transitive for any set of ids spanning less than
//! 2^31, which holds for ids drawn from one database's live range.

use crate::error::{CoreError, CoreResult};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A PostgreSQL transaction id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u32);

impl TransactionId {
    /// The bootstrap transaction id.
    pub const BOOTSTRAP: Self = Self(1);

    /// The frozen transaction id.
    pub const FROZEN: Self = Self(2);

    /// The first normal transaction id.
    pub const FIRST_NORMAL: Self = Self(3);

    /// The last normal transaction id before wraparound.
    pub const MAX_NORMAL: Self = Self(u32::MAX);

    /// Creates a transaction id from its numeric value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransactionId`] for `0` and for values that
    /// do not fit in 32 bits.
    pub fn new(value: u64) -> CoreResult<Self> {
        match u32::try_from(value) {
            Ok(0) | Err(_) => Err(CoreError::InvalidTransactionId { value }),
            Ok(v) => Ok(Self(v)),
        }
    }

    /// Returns the numeric value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns true for ids at or above [`TransactionId::FIRST_NORMAL`].
    #[inline]
    #[must_use]
    pub const fn is_normal(self) -> bool {
        self.0 >= Self::FIRST_NORMAL.0
    }

    /// Returns the next normal id, wrapping from the last normal id (or any
    /// special id) to the first normal id.
    #[must_use]
    pub fn next_normal(self) -> Self {
        match self.0.checked_add(1) {
            Some(v) if v >= Self::FIRST_NORMAL.0 => Self(v),
            _ => Self::FIRST_NORMAL,
        }
    }

    /// Returns the previous normal id, wrapping from the first normal id (or
    /// any special id) to the last normal id.
    #[must_use]
    pub fn prior_normal(self) -> Self {
        if self.0 > Self::FIRST_NORMAL.0 {
            Self(self.0 - 1)
        } else {
            Self::MAX_NORMAL
        }
    }

    /// Compares two ids by precedence in the circular id space.
    #[must_use]
    pub fn compare(self, other: Self) -> Ordering {
        if self.0 == other.0 {
            return Ordering::Equal;
        }
        if !self.is_normal() || !other.is_normal() {
            return self.0.cmp(&other.0);
        }
        let diff = self.0.wrapping_sub(other.0) as i32;
        if diff == i32::MIN {
            // Exactly half the id space apart.
            return self.0.cmp(&other.0);
        }
        diff.cmp(&0)
    }

    /// Returns true if `self` logically precedes `other`.
    #[inline]
    #[must_use]
    pub fn precedes(self, other: Self) -> bool {
        self.compare(other) == Ordering::Less
    }

    /// Returns true if `self` is `other` or logically follows it.
    #[inline]
    #[must_use]
    pub fn follows_or_equals(self, other: Self) -> bool {
        self.compare(other) != Ordering::Less
    }
}

impl PartialOrd for TransactionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TransactionId {
    /// Circular precedence; see the module documentation for the window in
    /// which this is a total order.
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(*other)
    }
}

impl TryFrom<u64> for TransactionId {
    type Error = CoreError;

    fn try_from(value: u64) -> CoreResult<Self> {
        Self::new(value)
    }
}

impl TryFrom<i64> for TransactionId {
    type Error = CoreError;

    fn try_from(value: i64) -> CoreResult<Self> {
        let unsigned =
            u64::try_from(value).map_err(|_| CoreError::unparsable(value.to_string()))?;
        Self::new(unsigned)
    }
}

impl From<TransactionId> for i64 {
    fn from(xid: TransactionId) -> Self {
        i64::from(xid.0)
    }
}

impl FromStr for TransactionId {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let value: u64 = s.trim().parse().map_err(|_| CoreError::unparsable(s))?;
        Self::new(value)
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", self.0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
