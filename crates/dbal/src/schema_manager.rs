//! Schema introspection.
//!
//! A [`SchemaManager`] issues backend-specific metadata queries through its
//! [`Connection`] and normalizes the raw rows into portable schema objects.
//! Portable objects are built fresh on every call; the only state a manager
//! keeps is its memoized current-schema name, computed at most once per
//! manager instance.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::Connection;
use crate::core::schema::{Column, ForeignKeyConstraint, Index, Sequence, Table, View};
use crate::core::traits::RowSet;
use crate::core::value::SqlValue;
use crate::error::{DbalError, Result};
use crate::platform::Platform;

/// Backend-specific schema introspection.
#[async_trait]
pub trait SchemaManager: Send + Sync {
    /// The connection metadata queries run through.
    fn connection(&self) -> &Connection;

    /// The dialect engine consulted for quoting and DDL.
    fn platform(&self) -> &Arc<dyn Platform>;

    /// The backend's active namespace for unqualified object names,
    /// memoized for this manager's lifetime.
    async fn current_schema_name(&self) -> Result<String> {
        Err(DbalError::not_supported("schema namespaces"))
    }

    /// Names of all base tables visible in the current schema.
    async fn list_table_names(&self) -> Result<Vec<String>>;

    /// Portable column definitions of one table.
    async fn list_table_columns(&self, table: &str) -> Result<Vec<Column>>;

    /// Indexes of one table. An empty result is a valid answer when the
    /// backend reports no index metadata.
    async fn list_table_indexes(&self, table: &str) -> Result<Vec<Index>>;

    /// Foreign keys of one table. Backends that cannot introspect them
    /// report the typed not-supported condition instead of an empty list.
    async fn list_table_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyConstraint>>;

    /// Sequences visible in the current schema.
    async fn list_sequences(&self) -> Result<Vec<Sequence>> {
        Err(DbalError::not_supported("sequences"))
    }

    /// Views visible in the current schema.
    async fn list_views(&self) -> Result<Vec<View>>;

    /// Create a database.
    async fn create_database(&self, name: &str) -> Result<()> {
        let sql = self.platform().create_database_sql(name)?;
        self.connection().execute(&sql, &[]).await?;
        Ok(())
    }

    /// Drop a database. Backends needing a detach/shutdown step first
    /// override this; the statement order is part of the contract.
    async fn drop_database(&self, name: &str) -> Result<()> {
        let sql = self.platform().drop_database_sql(name)?;
        self.connection().execute(&sql, &[]).await?;
        Ok(())
    }

    /// Create a table (and its secondary indexes). Table options left unset
    /// on the definition are filled from the connection's defaults before
    /// SQL generation.
    async fn create_table(&self, table: &Table) -> Result<()> {
        let mut table = table.clone();
        let connection = self.connection();
        let defaults = connection
            .configuration()
            .default_table_options()
            .iter()
            .chain(connection.params().default_table_options.iter());
        for (key, value) in defaults {
            table
                .options
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        for sql in self.platform().create_table_sql(&table)? {
            self.connection().execute(&sql, &[]).await?;
        }
        Ok(())
    }

    /// Drop a table.
    async fn drop_table(&self, name: &str) -> Result<()> {
        let sql = self.platform().drop_table_sql(name);
        self.connection().execute(&sql, &[]).await?;
        Ok(())
    }
}

/// One raw metadata row with its keys normalized to lower case, so the
/// portable transforms are independent of the case the backend reports
/// column labels in.
#[derive(Debug)]
pub(crate) struct MetadataRow {
    values: BTreeMap<String, SqlValue>,
}

impl MetadataRow {
    /// Split a result set into normalized rows.
    pub fn rows_from(rowset: RowSet) -> Vec<MetadataRow> {
        let keys: Vec<String> = rowset
            .columns
            .iter()
            .map(|c| c.to_ascii_lowercase())
            .collect();
        rowset
            .rows
            .into_iter()
            .map(|row| {
                let values = keys.iter().cloned().zip(row).collect();
                MetadataRow { values }
            })
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&SqlValue> {
        self.values.get(key)
    }

    /// String value under the key; NULL reads as absent.
    pub fn string(&self, key: &str) -> Option<String> {
        self.values.get(key).and_then(|v| v.clone().into_string())
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(SqlValue::as_i64)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(SqlValue::as_bool)
    }
}

/// Error for a metadata row missing a field the transform requires.
pub(crate) fn malformed_row(field: &str) -> DbalError {
    DbalError::Driver {
        kind: crate::error::DriverErrorKind::Other,
        code: None,
        sqlstate: None,
        message: format!("malformed metadata row: missing {field}"),
    }
}

/// Split a native type declaration into its base keyword and up to two
/// parenthesized arguments: `VARCHAR(255)` yields `("varchar", Some(255),
/// None)`, `DECIMAL(10,2)` yields `("decimal", Some(10), Some(2))`.
pub(crate) fn parse_type_declaration(raw: &str) -> (String, Option<u32>, Option<u32>) {
    let raw = raw.trim();
    let Some(open) = raw.find('(') else {
        return (raw.to_ascii_lowercase(), None, None);
    };
    let base = raw[..open].trim().to_ascii_lowercase();
    let args = raw[open + 1..].trim_end_matches(')');
    let mut parts = args.splitn(2, ',');
    let first = parts.next().and_then(|p| p.trim().parse().ok());
    let second = parts.next().and_then(|p| p.trim().parse().ok());
    (base, first, second)
}

/// Detect a `<schema>.<sequence>.nextval`-shaped default expression and
/// return the sequence name (possibly schema-qualified) when it matches.
pub(crate) fn parse_nextval_default(default: &str) -> Option<String> {
    let trimmed = default.trim();
    let lower = trimmed.to_ascii_lowercase();
    let stem = lower.strip_suffix(".nextval")?;
    if stem.is_empty() {
        return None;
    }
    // Keep the original spelling of the sequence name, unquoted.
    let name = trimmed[..stem.len()].replace('"', "");
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_row_key_normalization() {
        let rowset = RowSet {
            columns: vec!["TABLE_NAME".to_string(), "Is_Nullable".to_string()],
            rows: vec![vec![SqlValue::Text("ORDERS".into()), SqlValue::Text("Y".into())]],
        };
        let rows = MetadataRow::rows_from(rowset);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].string("table_name").as_deref(), Some("ORDERS"));
        assert_eq!(rows[0].bool("is_nullable"), Some(true));
        assert!(rows[0].get("TABLE_NAME").is_none());
    }

    #[test]
    fn test_parse_type_declaration_forms() {
        assert_eq!(
            parse_type_declaration("VARCHAR(255)"),
            ("varchar".to_string(), Some(255), None)
        );
        assert_eq!(
            parse_type_declaration("DECIMAL(10,2)"),
            ("decimal".to_string(), Some(10), Some(2))
        );
        assert_eq!(
            parse_type_declaration("DECIMAL(10)"),
            ("decimal".to_string(), Some(10), None)
        );
        assert_eq!(
            parse_type_declaration("TIMESTAMP WITH TIME ZONE"),
            ("timestamp with time zone".to_string(), None, None)
        );
    }

    #[test]
    fn test_parse_nextval_default() {
        assert_eq!(parse_nextval_default("myseq.nextval").as_deref(), Some("myseq"));
        assert_eq!(
            parse_nextval_default("APP.ORDERS_ID_SEQ.NEXTVAL").as_deref(),
            Some("APP.ORDERS_ID_SEQ")
        );
        assert_eq!(
            parse_nextval_default("\"MYSEQ\".nextval").as_deref(),
            Some("MYSEQ")
        );
        assert_eq!(parse_nextval_default("42"), None);
        assert_eq!(parse_nextval_default(".nextval"), None);
        assert_eq!(parse_nextval_default("nextval"), None);
    }
}
