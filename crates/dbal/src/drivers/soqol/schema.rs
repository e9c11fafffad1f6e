//! SOQOL schema introspection.
//!
//! Metadata queries run against the backend's dictionary views, scoped to
//! the current schema. Identifiers are stored upper-cased, so table-name
//! arguments are upper-cased before binding.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::connection::Connection;
use crate::core::schema::{Column, ForeignKeyConstraint, Index, Sequence, View};
use crate::core::value::SqlValue;
use crate::error::{DbalError, Result};
use crate::platform::Platform;
use crate::schema_manager::{
    malformed_row, parse_nextval_default, parse_type_declaration, MetadataRow, SchemaManager,
};

/// Key under which a detected emulation sequence is recorded on a column.
pub const AUTOINCREMENT_SEQUENCE_OPTION: &str = "autoincrement_sequence";

/// Schema manager for the SOQOL backend.
pub struct SoqolSchemaManager<'a> {
    conn: &'a Connection,
    platform: Arc<dyn Platform>,
    /// Computed at most once per manager instance, then read-only.
    current_schema: OnceCell<String>,
}

impl<'a> SoqolSchemaManager<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            platform: conn.platform().clone(),
            current_schema: OnceCell::new(),
        }
    }

    /// Identifiers are stored upper-cased; normalize lookups to match.
    fn normalize_name(name: &str) -> String {
        name.to_ascii_uppercase()
    }

    /// Qualify an object name with its schema only when it lives outside
    /// the current schema.
    fn qualified_name(current_schema: &str, schema: &str, name: &str) -> String {
        if schema.is_empty() || schema == current_schema {
            name.to_string()
        } else {
            format!("{schema}.{name}")
        }
    }

}

/// Build one portable column from one normalized metadata row.
pub(crate) fn portable_column(platform: &dyn Platform, row: &MetadataRow) -> Result<Column> {
    let name = row
        .string("column_name")
        .ok_or_else(|| malformed_row("column_name"))?;
    let declared = row
        .string("data_type")
        .ok_or_else(|| malformed_row("data_type"))?;

    let (base, first, second) = parse_type_declaration(&declared);
    let portable_type = platform.portable_type_for(&base)?;

    let mut column = Column::new(name, portable_type);
    if portable_type.is_numeric() {
        column.precision = first;
        column.scale = second;
    } else {
        column.length = first;
    }
    column.fixed = matches!(base.as_str(), "char" | "raw");

    // Nullability is the literal inverse of the reported flag.
    let nullable = row.bool("is_nullable").unwrap_or(true);
    column.notnull = !nullable;

    if let Some(default) = row.string("data_default") {
        let default = default.trim().to_string();
        if let Some(sequence) = parse_nextval_default(&default) {
            // A sequence-backed default is how this backend spells
            // autoincrement; surface it as the portable flag.
            column.autoincrement = true;
            column.default = None;
            column
                .platform_options
                .insert(AUTOINCREMENT_SEQUENCE_OPTION.to_string(), sequence);
        } else if !default.is_empty() && !default.eq_ignore_ascii_case("null") {
            column.default = Some(default);
        }
    }

    Ok(column)
}

#[async_trait]
impl SchemaManager for SoqolSchemaManager<'_> {
    fn connection(&self) -> &Connection {
        self.conn
    }

    fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    async fn current_schema_name(&self) -> Result<String> {
        let schema = self
            .current_schema
            .get_or_try_init(|| async {
                debug!("resolving current schema");
                let rows = self.conn.query("SELECT CURRENT_SCHEMA", &[]).await?;
                rows.single_value()
                    .and_then(|v| v.clone().into_string())
                    .ok_or_else(|| malformed_row("current schema"))
            })
            .await?;
        Ok(schema.clone())
    }

    async fn list_table_names(&self) -> Result<Vec<String>> {
        let schema = self.current_schema_name().await?;
        let rows = self
            .conn
            .query(
                "SELECT schema_name, table_name FROM sys.tables \
                 WHERE table_type = 'TABLE' AND schema_name = ? ORDER BY table_name",
                &[SqlValue::from(schema.clone())],
            )
            .await?;
        MetadataRow::rows_from(rows)
            .iter()
            .map(|row| {
                let table_schema = row.string("schema_name").unwrap_or_default();
                let name = row
                    .string("table_name")
                    .ok_or_else(|| malformed_row("table_name"))?;
                Ok(Self::qualified_name(&schema, &table_schema, &name))
            })
            .collect()
    }

    async fn list_table_columns(&self, table: &str) -> Result<Vec<Column>> {
        let schema = self.current_schema_name().await?;
        let rows = self
            .conn
            .query(
                "SELECT column_name, data_type, data_default, is_nullable, ordinal_position \
                 FROM sys.columns WHERE schema_name = ? AND table_name = ? \
                 ORDER BY ordinal_position",
                &[
                    SqlValue::from(schema),
                    SqlValue::from(Self::normalize_name(table)),
                ],
            )
            .await?;
        MetadataRow::rows_from(rows)
            .iter()
            .map(|row| portable_column(self.platform.as_ref(), row))
            .collect()
    }

    /// The backend may not report index metadata yet; an empty result is a
    /// valid answer here, unlike the foreign-key case.
    async fn list_table_indexes(&self, table: &str) -> Result<Vec<Index>> {
        let schema = self.current_schema_name().await?;
        let rows = self
            .conn
            .query(
                "SELECT index_name, column_name, is_unique, is_primary \
                 FROM sys.index_columns WHERE schema_name = ? AND table_name = ? \
                 ORDER BY index_name, ordinal_position",
                &[
                    SqlValue::from(schema),
                    SqlValue::from(Self::normalize_name(table)),
                ],
            )
            .await?;

        let mut indexes: Vec<Index> = Vec::new();
        for row in MetadataRow::rows_from(rows) {
            let name = row
                .string("index_name")
                .ok_or_else(|| malformed_row("index_name"))?;
            let column = row
                .string("column_name")
                .ok_or_else(|| malformed_row("column_name"))?;
            match indexes.iter_mut().find(|i| i.name == name) {
                Some(index) => index.columns.push(column),
                None => indexes.push(Index {
                    name,
                    columns: vec![column],
                    is_unique: row.bool("is_unique").unwrap_or(false),
                    is_primary: row.bool("is_primary").unwrap_or(false),
                }),
            }
        }
        Ok(indexes)
    }

    /// Foreign keys cannot be introspected on this backend. Failing here is
    /// deliberate: an empty list would masquerade as a successful answer.
    async fn list_table_foreign_keys(&self, _table: &str) -> Result<Vec<ForeignKeyConstraint>> {
        Err(DbalError::not_supported("foreign key introspection"))
    }

    async fn list_sequences(&self) -> Result<Vec<Sequence>> {
        let schema = self.current_schema_name().await?;
        let rows = self
            .conn
            .query(
                "SELECT schema_name, sequence_name, increment_by, start_with \
                 FROM sys.sequences WHERE schema_name = ? ORDER BY sequence_name",
                &[SqlValue::from(schema.clone())],
            )
            .await?;
        MetadataRow::rows_from(rows)
            .iter()
            .map(|row| {
                let seq_schema = row.string("schema_name").unwrap_or_default();
                let name = row
                    .string("sequence_name")
                    .ok_or_else(|| malformed_row("sequence_name"))?;
                let increment_by = row
                    .i64("increment_by")
                    .ok_or_else(|| malformed_row("increment_by"))?;
                let start_with = row
                    .i64("start_with")
                    .ok_or_else(|| malformed_row("start_with"))?;
                Ok(Sequence::new(
                    Self::qualified_name(&schema, &seq_schema, &name),
                    increment_by,
                    start_with,
                ))
            })
            .collect()
    }

    async fn list_views(&self) -> Result<Vec<View>> {
        let schema = self.current_schema_name().await?;
        let rows = self
            .conn
            .query(
                "SELECT schema_name, view_name, definition FROM sys.views \
                 WHERE schema_name = ? ORDER BY view_name",
                &[SqlValue::from(schema.clone())],
            )
            .await?;
        MetadataRow::rows_from(rows)
            .iter()
            .map(|row| {
                let view_schema = row.string("schema_name").unwrap_or_default();
                let name = row
                    .string("view_name")
                    .ok_or_else(|| malformed_row("view_name"))?;
                let sql = row
                    .string("definition")
                    .ok_or_else(|| malformed_row("definition"))?;
                Ok(View {
                    name: Self::qualified_name(&schema, &view_schema, &name),
                    sql,
                })
            })
            .collect()
    }

    /// The backend requires the database to be detached before it can be
    /// dropped; the statement order must not change.
    async fn drop_database(&self, name: &str) -> Result<()> {
        let quoted = self.platform.quote_identifier(name);
        self.conn
            .execute(&format!("DETACH DATABASE {quoted}"), &[])
            .await?;
        let sql = self.platform.drop_database_sql(name)?;
        self.conn.execute(&sql, &[]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::PortableType;
    use crate::core::traits::RowSet;
    use crate::drivers::soqol::platform::SoqolPlatform;

    fn row(values: Vec<(&str, SqlValue)>) -> MetadataRow {
        let rowset = RowSet {
            columns: values.iter().map(|(k, _)| k.to_string()).collect(),
            rows: vec![values.into_iter().map(|(_, v)| v).collect()],
        };
        MetadataRow::rows_from(rowset).remove(0)
    }

    #[test]
    fn test_nextval_default_becomes_autoincrement() {
        let platform = SoqolPlatform::new();
        let column = portable_column(
            &platform,
            &row(vec![
                ("COLUMN_NAME", SqlValue::from("ID")),
                ("DATA_TYPE", SqlValue::from("INTEGER")),
                ("DATA_DEFAULT", SqlValue::from("myseq.nextval")),
                ("IS_NULLABLE", SqlValue::from("N")),
            ]),
        )
        .unwrap();

        assert!(column.autoincrement);
        assert_eq!(column.default, None);
        assert_eq!(
            column
                .platform_options
                .get(AUTOINCREMENT_SEQUENCE_OPTION)
                .map(String::as_str),
            Some("myseq")
        );
        assert!(column.notnull);
    }

    #[test]
    fn test_character_length_parsed_from_suffix() {
        let platform = SoqolPlatform::new();
        let column = portable_column(
            &platform,
            &row(vec![
                ("column_name", SqlValue::from("TITLE")),
                ("data_type", SqlValue::from("VARCHAR(120)")),
                ("is_nullable", SqlValue::from("Y")),
            ]),
        )
        .unwrap();

        assert_eq!(column.portable_type, PortableType::String);
        assert_eq!(column.length, Some(120));
        assert!(!column.fixed);
        // Nullability is the literal inverse of the reported flag.
        assert!(!column.notnull);
    }

    #[test]
    fn test_numeric_precision_and_scale_forms() {
        let platform = SoqolPlatform::new();
        let both = portable_column(
            &platform,
            &row(vec![
                ("column_name", SqlValue::from("PRICE")),
                ("data_type", SqlValue::from("DECIMAL(10,2)")),
                ("is_nullable", SqlValue::from("N")),
            ]),
        )
        .unwrap();
        assert_eq!(both.precision, Some(10));
        assert_eq!(both.scale, Some(2));

        let precision_only = portable_column(
            &platform,
            &row(vec![
                ("column_name", SqlValue::from("QTY")),
                ("data_type", SqlValue::from("NUMBER(5)")),
                ("is_nullable", SqlValue::from("N")),
            ]),
        )
        .unwrap();
        assert_eq!(precision_only.precision, Some(5));
        assert_eq!(precision_only.scale, None);
    }

    #[test]
    fn test_unknown_native_type_fails() {
        let platform = SoqolPlatform::new();
        let err = portable_column(
            &platform,
            &row(vec![
                ("column_name", SqlValue::from("SHAPE")),
                ("data_type", SqlValue::from("GEOMETRY")),
                ("is_nullable", SqlValue::from("Y")),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, DbalError::UnknownColumnType { .. }));
    }

    #[test]
    fn test_plain_default_is_preserved() {
        let platform = SoqolPlatform::new();
        let column = portable_column(
            &platform,
            &row(vec![
                ("column_name", SqlValue::from("STATE")),
                ("data_type", SqlValue::from("VARCHAR(16)")),
                ("data_default", SqlValue::from("'new'")),
                ("is_nullable", SqlValue::from("Y")),
            ]),
        )
        .unwrap();
        assert!(!column.autoincrement);
        assert_eq!(column.default.as_deref(), Some("'new'"));
    }

    #[test]
    fn test_qualified_name_only_outside_current_schema() {
        assert_eq!(
            SoqolSchemaManager::qualified_name("APP", "APP", "ORDERS"),
            "ORDERS"
        );
        assert_eq!(
            SoqolSchemaManager::qualified_name("APP", "AUDIT", "LOGS"),
            "AUDIT.LOGS"
        );
        assert_eq!(SoqolSchemaManager::qualified_name("APP", "", "X"), "X");
    }

    #[test]
    fn test_table_name_normalization() {
        assert_eq!(SoqolSchemaManager::normalize_name("orders"), "ORDERS");
    }
}
