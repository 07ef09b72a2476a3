//! Table, column, and unique key metadata used while splitting a job.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Table name that compares case-insensitively but keeps the original spelling.
///
/// Metadata lookups must use [`TableName::original`], since some backends
/// treat identifiers as case-sensitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TableName {
    original: String,
    lowercase: String,
}

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        let original = name.into();
        let lowercase = original.to_lowercase();
        Self {
            original,
            lowercase,
        }
    }

    /// Name as written in the configuration.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Lowercased name used for comparisons.
    pub fn lowercase(&self) -> &str {
        &self.lowercase
    }
}

impl PartialEq for TableName {
    fn eq(&self, other: &Self) -> bool {
        self.lowercase == other.lowercase
    }
}

impl Eq for TableName {}

impl Hash for TableName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lowercase.hash(state);
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl From<String> for TableName {
    fn from(v: String) -> Self {
        TableName::new(v)
    }
}

impl From<&str> for TableName {
    fn from(v: &str) -> Self {
        TableName::new(v)
    }
}

impl From<TableName> for String {
    fn from(v: TableName) -> Self {
        v.original
    }
}

/// Mapping of an actual (physical) source table to its logical table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMapping {
    /// Physical table name in the source database.
    pub actual: TableName,

    /// Logical table name the rows belong to.
    pub logic: TableName,
}

impl TableMapping {
    pub fn new(actual: impl Into<TableName>, logic: impl Into<TableName>) -> Self {
        Self {
            actual: actual.into(),
            logic: logic.into(),
        }
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Data type as reported by the source catalog (e.g., "int8", "varchar").
    pub data_type: String,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Whether the column is part of the primary key.
    pub is_primary_key: bool,

    /// Ordinal position (1-based).
    pub ordinal_pos: i32,
}

/// Column used to split a table into key ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueKeyColumn {
    /// Column name.
    pub name: String,

    /// Data type; resolved from source metadata when not configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

impl UniqueKeyColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: Some(data_type.into()),
        }
    }

    /// Splitting strategy for this key; unknown when the type is unresolved.
    pub fn kind(&self) -> KeyKind {
        self.data_type
            .as_deref()
            .map(KeyKind::classify)
            .unwrap_or(KeyKind::Unsupported)
    }
}

/// How a unique key's value space can be split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Integer-like: split into contiguous numeric ranges.
    Integer,
    /// String-like: one range over the full printable domain.
    String,
    /// Neither; the table cannot be split.
    Unsupported,
}

impl KeyKind {
    /// Classify a catalog data type name.
    pub fn classify(data_type: &str) -> Self {
        let normalized = data_type.trim().to_lowercase();
        // Strip length/precision suffixes such as "varchar(64)" or "int(11) unsigned"
        let base = normalized
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default();

        match base {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "int2"
            | "int4" | "int8" | "smallserial" | "serial" | "bigserial" | "serial2" | "serial4"
            | "serial8" => KeyKind::Integer,
            "char" | "varchar" | "nchar" | "nvarchar" | "text" | "bpchar" | "character"
            | "longvarchar" | "longnvarchar" | "tinytext" | "mediumtext" | "longtext" => {
                KeyKind::String
            }
            _ if normalized.starts_with("character varying") => KeyKind::String,
            _ => KeyKind::Unsupported,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_case_insensitive_eq() {
        let a = TableName::new("T_Order");
        let b = TableName::new("t_order");
        assert_eq!(a, b);
        assert_eq!(a.original(), "T_Order");
        assert_eq!(a.lowercase(), "t_order");
    }

    #[test]
    fn test_table_name_serializes_original() {
        let json = serde_json::to_string(&TableName::new("T_Order")).unwrap();
        assert_eq!(json, "\"T_Order\"");
    }

    #[test]
    fn test_key_kind_integer_types() {
        for t in ["int", "INT", "bigint", "int8", "int4", "smallint", "int(11)", "bigint unsigned", "serial"] {
            assert_eq!(KeyKind::classify(t), KeyKind::Integer, "{}", t);
        }
    }

    #[test]
    fn test_key_kind_string_types() {
        for t in ["varchar", "varchar(64)", "character varying", "char", "nvarchar", "text", "bpchar"] {
            assert_eq!(KeyKind::classify(t), KeyKind::String, "{}", t);
        }
    }

    #[test]
    fn test_key_kind_unsupported() {
        for t in ["uuid", "timestamp", "numeric(10,2)", "bytea", ""] {
            assert_eq!(KeyKind::classify(t), KeyKind::Unsupported, "{}", t);
        }
    }

    #[test]
    fn test_unresolved_key_is_unsupported() {
        let key = UniqueKeyColumn {
            name: "id".into(),
            data_type: None,
        };
        assert_eq!(key.kind(), KeyKind::Unsupported);
        assert_eq!(UniqueKeyColumn::new("id", "int8").kind(), KeyKind::Integer);
    }
}
