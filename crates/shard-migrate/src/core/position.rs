//! Positions inside a table's key space and inside a change stream.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lowest bound of the printable string key domain.
pub const STRING_KEY_LOW: &str = "!";

/// Highest bound of the printable string key domain.
pub const STRING_KEY_HIGH: &str = "~";

/// Where an inventory task starts and ends in a table's unique key space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IngestPosition {
    /// Inclusive integer key range.
    IntegerRange { begin: i64, end: i64 },

    /// Inclusive string key range.
    StringRange { begin: String, end: String },

    /// Table-level marker: not split yet.
    Placeholder,

    /// The task covering this range has completed.
    Finished,
}

impl IngestPosition {
    /// Integer range `[begin, end]`.
    pub fn integer(begin: i64, end: i64) -> Self {
        IngestPosition::IntegerRange { begin, end }
    }

    /// The full printable string key domain `("!", "~")`.
    pub fn full_string_range() -> Self {
        IngestPosition::StringRange {
            begin: STRING_KEY_LOW.to_string(),
            end: STRING_KEY_HIGH.to_string(),
        }
    }

    /// Whether a task may execute from this position.
    pub fn is_concrete(&self) -> bool {
        !matches!(self, IngestPosition::Placeholder)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, IngestPosition::Finished)
    }
}

impl fmt::Display for IngestPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestPosition::IntegerRange { begin, end } => write!(f, "i,{},{}", begin, end),
            IngestPosition::StringRange { begin, end } => write!(f, "s,{},{}", begin, end),
            IngestPosition::Placeholder => write!(f, "placeholder"),
            IngestPosition::Finished => write!(f, "finished"),
        }
    }
}

/// Resume point of a change-data-capture stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncrementalPosition {
    /// PostgreSQL logical replication slot and WAL location.
    PostgresWal { slot: String, lsn: String },

    /// MySQL binlog file and offset, produced by a caller-supplied position manager.
    MysqlBinlog { file: String, position: u64 },
}

impl fmt::Display for IncrementalPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncrementalPosition::PostgresWal { slot, lsn } => write!(f, "{}@{}", slot, lsn),
            IncrementalPosition::MysqlBinlog { file, position } => {
                write!(f, "{}:{}", file, position)
            }
        }
    }
}
