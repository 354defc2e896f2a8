//! Rows of the transaction log and snapshot log.

use crate::error::{CoreError, CoreResult};
use crate::snapshot::Snapshot;
use crate::xid::TransactionId;
use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

/// The kind of row change captured by the log trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandType {
    /// Row inserted.
    Insert,
    /// Row updated.
    Update,
    /// Row deleted.
    Delete,
}

impl CommandType {
    /// Returns the single-character marker stored in `cmdtype`.
    #[must_use]
    pub const fn marker(self) -> char {
        match self {
            Self::Insert => 'I',
            Self::Update => 'U',
            Self::Delete => 'D',
        }
    }
}

impl FromStr for CommandType {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        // character(1) columns come back blank padded
        match s.trim() {
            "I" => Ok(Self::Insert),
            "U" => Ok(Self::Update),
            "D" => Ok(Self::Delete),
            _ => Err(CoreError::unknown_command(s)),
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.marker())
    }
}

/// One row of the transaction log: a single captured row change.
///
/// Records order by `rowid`, which is the capture order on the master.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChangeRecord {
    /// Sequence-assigned capture position.
    pub rowid: i64,
    /// Transaction that made the change.
    pub xid: TransactionId,
    /// Insert, update or delete.
    pub command: CommandType,
    /// Qualified name of the changed table.
    pub table: String,
    /// Encoded row image.
    pub info: String,
}

impl ChangeRecord {
    /// Builds a record from raw column values.
    ///
    /// # Errors
    ///
    /// Returns an error if `xaction` is not a valid transaction id or
    /// `cmdtype` is not a known marker.
    pub fn from_columns(
        rowid: i64,
        xaction: i64,
        cmdtype: &str,
        tabname: impl Into<String>,
        info: impl Into<String>,
    ) -> CoreResult<Self> {
        Ok(Self {
            rowid,
            xid: TransactionId::try_from(xaction)?,
            command: cmdtype.parse()?,
            table: tabname.into(),
            info: info.into(),
        })
    }
}

/// One row of the snapshot log, as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    /// `current_xaction` column.
    pub current_xaction: i64,
    /// `min_xaction` column.
    pub min_xaction: i64,
    /// `max_xaction` column.
    pub max_xaction: i64,
    /// `outstanding_xactions` column.
    pub outstanding_xactions: Option<String>,
    /// `update_time` column; unset for records that were never stored.
    pub update_time: Option<NaiveDateTime>,
}

impl TryFrom<&SnapshotRecord> for Snapshot {
    type Error = CoreError;

    fn try_from(record: &SnapshotRecord) -> CoreResult<Self> {
        Snapshot::from_outstanding_list(
            TransactionId::try_from(record.current_xaction)?,
            TransactionId::try_from(record.min_xaction)?,
            TransactionId::try_from(record.max_xaction)?,
            record.outstanding_xactions.as_deref().unwrap_or(""),
        )
    }
}

impl From<&Snapshot> for SnapshotRecord {
    fn from(snapshot: &Snapshot) -> Self {
        let list = snapshot.outstanding_list();
        Self {
            current_xaction: snapshot.current().into(),
            min_xaction: snapshot.min().into(),
            max_xaction: snapshot.max().into(),
            outstanding_xactions: (!list.is_empty()).then_some(list),
            update_time: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_markers() {
        assert_eq!("I".parse::<CommandType>().unwrap(), CommandType::Insert);
        assert_eq!("U ".parse::<CommandType>().unwrap(), CommandType::Update);
        assert_eq!(CommandType::Delete.to_string(), "D");
        assert_eq!(
            "X".parse::<CommandType>(),
            Err(CoreError::unknown_command("X"))
        );
    }

    #[test]
    fn change_records_sort_by_rowid() {
        let mut rows = vec![
            ChangeRecord::from_columns(7, 500, "U", "public.a", "x").unwrap(),
            ChangeRecord::from_columns(3, 501, "I", "public.b", "y").unwrap(),
            ChangeRecord::from_columns(5, 499, "D", "public.a", "z").unwrap(),
        ];
        rows.sort();
        let ids: Vec<i64> = rows.iter().map(|r| r.rowid).collect();
        assert_eq!(ids, vec![3, 5, 7]);
    }

    #[test]
    fn change_record_rejects_bad_columns() {
        assert!(ChangeRecord::from_columns(1, 0, "I", "t", "").is_err());
        assert!(ChangeRecord::from_columns(1, 10, "Q", "t", "").is_err());
    }

    #[test]
    fn snapshot_record_conversion() {
        let record = SnapshotRecord {
            current_xaction: 17,
            min_xaction: 12,
            max_xaction: 18,
            outstanding_xactions: Some("13,15".into()),
            update_time: None,
        };
        let snapshot = Snapshot::try_from(&record).unwrap();
        assert!(snapshot.is_committed_before(TransactionId::new(14).unwrap()));
        assert!(snapshot.is_active_or_future(TransactionId::new(15).unwrap()));
        assert_eq!(SnapshotRecord::from(&snapshot), record);
    }

    #[test]
    fn snapshot_record_without_outstanding() {
        let record = SnapshotRecord {
            current_xaction: 9,
            min_xaction: 9,
            max_xaction: 10,
            outstanding_xactions: None,
            update_time: None,
        };
        let snapshot = Snapshot::try_from(&record).unwrap();
        assert!(snapshot.outstanding().is_empty());
        assert_eq!(SnapshotRecord::from(&snapshot).outstanding_xactions, None);
    }
}
