//! Portable schema objects.
//!
//! These types are the backend-agnostic output of introspection and the
//! backend-agnostic input of DDL generation. They are constructed fresh on
//! each introspection call and never cached across calls.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Backend-agnostic scalar type names used in the column model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortableType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Decimal,
    /// Variable or fixed length character data (see [`Column::fixed`]).
    String,
    /// Unbounded character data (CLOB family).
    Text,
    /// Variable or fixed length binary data.
    Binary,
    /// Unbounded binary data (BLOB family).
    Blob,
    Date,
    Time,
    DateTime,
    DateTimeTz,
    Guid,
    Json,
}

impl PortableType {
    /// Whether values of this type are numeric (affects default-value
    /// rendering in DDL: numeric defaults are emitted unquoted).
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            PortableType::SmallInt
                | PortableType::Integer
                | PortableType::BigInt
                | PortableType::Float
                | PortableType::Decimal
        )
    }
}

/// Column metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Portable type.
    pub portable_type: PortableType,

    /// Length for character/binary types.
    pub length: Option<u32>,

    /// Numeric precision.
    pub precision: Option<u32>,

    /// Numeric scale.
    pub scale: Option<u32>,

    /// Whether a character/binary column is fixed-width (CHAR vs VARCHAR).
    pub fixed: bool,

    /// Whether the column rejects NULL.
    pub notnull: bool,

    /// Default value expression, as reported or requested.
    pub default: Option<String>,

    /// Whether the column receives an auto-generated value on insert.
    pub autoincrement: bool,

    /// Backend-specific options that survive the portable model
    /// (e.g. the emulation sequence name recorded during introspection).
    #[serde(default)]
    pub platform_options: BTreeMap<String, String>,
}

impl Column {
    /// Create a column of the given portable type with the model defaults:
    /// NOT NULL, no length/precision, no default, not auto-incrementing.
    pub fn new(name: impl Into<String>, portable_type: PortableType) -> Self {
        Self {
            name: name.into(),
            portable_type,
            length: None,
            precision: None,
            scale: None,
            fixed: false,
            notnull: true,
            default: None,
            autoincrement: false,
            platform_options: BTreeMap::new(),
        }
    }
}

/// Index metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,

    /// Indexed column names, in key order.
    pub columns: Vec<String>,

    /// Whether the index enforces uniqueness.
    pub is_unique: bool,

    /// Whether this is the primary key index.
    pub is_primary: bool,
}

/// Foreign key constraint metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyConstraint {
    /// Constraint name.
    pub name: String,

    /// Referencing column names.
    pub columns: Vec<String>,

    /// Referenced table name.
    pub foreign_table: String,

    /// Referenced column names.
    pub foreign_columns: Vec<String>,

    /// ON DELETE action, when reported.
    pub on_delete: Option<String>,

    /// ON UPDATE action, when reported.
    pub on_update: Option<String>,
}

/// Sequence metadata. Increment and start value are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequence {
    /// Sequence name, schema-qualified only when outside the current schema.
    pub name: String,

    /// Allocation increment.
    pub increment_by: i64,

    /// Initial value.
    pub start_with: i64,

    /// Preallocation cache size; emitted in DDL only when greater than 1.
    pub cache: Option<u32>,
}

impl Sequence {
    /// Create a sequence with the given increment and start value.
    pub fn new(name: impl Into<String>, increment_by: i64, start_with: i64) -> Self {
        Self {
            name: name.into(),
            increment_by,
            start_with,
            cache: None,
        }
    }
}

/// View metadata: name plus definition text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct View {
    /// View name, schema-qualified only when outside the current schema.
    pub name: String,

    /// The defining SELECT statement, as the backend stores it.
    pub sql: String,
}

/// Table definition used by the create-table builders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Column definitions.
    pub columns: Vec<Column>,

    /// Primary key column names.
    pub primary_key: Vec<String>,

    /// Secondary indexes.
    pub indexes: Vec<Index>,

    /// Foreign key constraints.
    pub foreign_keys: Vec<ForeignKeyConstraint>,

    /// Backend-specific table options (charset, engine, ...), merged with
    /// the configuration's default table options before DDL generation.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl Table {
    /// Create an empty table definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            options: BTreeMap::new(),
        }
    }

    /// Look up a column by name, case-insensitively.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// A changed column inside a [`TableDiff`]: old name plus the new definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDiff {
    /// The column's current name in the database.
    pub old_name: String,

    /// The requested definition.
    pub column: Column,
}

/// A requested set of alterations to an existing table.
///
/// Platforms apply the kinds of change they support and reject the rest
/// with a typed not-supported error; a diff is never silently truncated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableDiff {
    /// Name of the table being altered.
    pub table_name: String,

    /// Columns to add.
    pub added_columns: Vec<Column>,

    /// Column names to drop.
    pub dropped_columns: Vec<String>,

    /// Columns whose definition changes.
    pub changed_columns: Vec<ColumnDiff>,

    /// Columns to rename: (old name, new name).
    pub renamed_columns: Vec<(String, String)>,
}

impl TableDiff {
    /// Create an empty diff for the given table.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    /// Whether the diff requests no changes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_columns.is_empty()
            && self.dropped_columns.is_empty()
            && self.changed_columns.is_empty()
            && self.renamed_columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_defaults() {
        let col = Column::new("id", PortableType::Integer);
        assert!(col.notnull);
        assert!(!col.autoincrement);
        assert!(col.default.is_none());
        assert!(col.length.is_none());
    }

    #[test]
    fn test_portable_type_is_numeric() {
        assert!(PortableType::Decimal.is_numeric());
        assert!(PortableType::BigInt.is_numeric());
        assert!(!PortableType::String.is_numeric());
        assert!(!PortableType::DateTime.is_numeric());
    }

    #[test]
    fn test_table_column_lookup_case_insensitive() {
        let mut table = Table::new("users");
        table.columns.push(Column::new("Id", PortableType::Integer));
        assert!(table.column("id").is_some());
        assert!(table.column("missing").is_none());
    }

    #[test]
    fn test_table_diff_is_empty() {
        let mut diff = TableDiff::new("users");
        assert!(diff.is_empty());
        diff.dropped_columns.push("legacy".to_string());
        assert!(!diff.is_empty());
    }
}
