//! MySQL schema introspection over `INFORMATION_SCHEMA`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::connection::Connection;
use crate::core::schema::{Column, ForeignKeyConstraint, Index, View};
use crate::core::value::SqlValue;
use crate::error::Result;
use crate::platform::Platform;
use crate::schema_manager::{malformed_row, MetadataRow, SchemaManager};

/// Schema manager for MySQL/MariaDB.
pub struct MysqlSchemaManager<'a> {
    conn: &'a Connection,
    platform: Arc<dyn Platform>,
    current_schema: OnceCell<String>,
}

impl<'a> MysqlSchemaManager<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            platform: conn.platform().clone(),
            current_schema: OnceCell::new(),
        }
    }

    fn portable_column(&self, row: &MetadataRow) -> Result<Column> {
        let name = row
            .string("column_name")
            .ok_or_else(|| malformed_row("column_name"))?;
        let data_type = row
            .string("data_type")
            .ok_or_else(|| malformed_row("data_type"))?;

        let portable_type = self.platform.portable_type_for(&data_type)?;
        let mut column = Column::new(name, portable_type);

        column.length = row
            .i64("character_maximum_length")
            .and_then(|v| u32::try_from(v).ok());
        if portable_type.is_numeric() {
            column.precision = row.i64("numeric_precision").and_then(|v| u32::try_from(v).ok());
            column.scale = row.i64("numeric_scale").and_then(|v| u32::try_from(v).ok());
        }
        column.fixed = matches!(data_type.to_ascii_lowercase().as_str(), "char" | "binary");
        column.notnull = !row.bool("is_nullable").unwrap_or(true);
        column.autoincrement = row
            .string("extra")
            .is_some_and(|e| e.to_ascii_lowercase().contains("auto_increment"));
        if !column.autoincrement {
            column.default = row
                .string("column_default")
                .filter(|d| !d.eq_ignore_ascii_case("null"));
        }

        Ok(column)
    }
}

#[async_trait]
impl SchemaManager for MysqlSchemaManager<'_> {
    fn connection(&self) -> &Connection {
        self.conn
    }

    fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    /// MySQL treats databases as schemas; the current one is `DATABASE()`.
    async fn current_schema_name(&self) -> Result<String> {
        let schema = self
            .current_schema
            .get_or_try_init(|| async {
                let rows = self.conn.query("SELECT DATABASE()", &[]).await?;
                rows.single_value()
                    .and_then(|v| v.clone().into_string())
                    .ok_or_else(|| malformed_row("current database"))
            })
            .await?;
        Ok(schema.clone())
    }

    async fn list_table_names(&self) -> Result<Vec<String>> {
        let rows = self
            .conn
            .query(
                "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
                 ORDER BY TABLE_NAME",
                &[],
            )
            .await?;
        MetadataRow::rows_from(rows)
            .iter()
            .map(|row| {
                row.string("table_name")
                    .ok_or_else(|| malformed_row("table_name"))
            })
            .collect()
    }

    async fn list_table_columns(&self, table: &str) -> Result<Vec<Column>> {
        let rows = self
            .conn
            .query(
                "SELECT COLUMN_NAME, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH, \
                        NUMERIC_PRECISION, NUMERIC_SCALE, IS_NULLABLE, COLUMN_DEFAULT, EXTRA \
                 FROM INFORMATION_SCHEMA.COLUMNS \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
                 ORDER BY ORDINAL_POSITION",
                &[SqlValue::from(table)],
            )
            .await?;
        MetadataRow::rows_from(rows)
            .iter()
            .map(|row| self.portable_column(row))
            .collect()
    }

    async fn list_table_indexes(&self, table: &str) -> Result<Vec<Index>> {
        let rows = self
            .conn
            .query(
                "SELECT INDEX_NAME, COLUMN_NAME, NON_UNIQUE \
                 FROM INFORMATION_SCHEMA.STATISTICS \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
                 ORDER BY INDEX_NAME, SEQ_IN_INDEX",
                &[SqlValue::from(table)],
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
                None => {
                    let is_primary = name == "PRIMARY";
                    indexes.push(Index {
                        is_unique: !row.bool("non_unique").unwrap_or(true),
                        is_primary,
                        name,
                        columns: vec![column],
                    });
                }
            }
        }
        Ok(indexes)
    }

    async fn list_table_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyConstraint>> {
        let rows = self
            .conn
            .query(
                "SELECT kcu.CONSTRAINT_NAME, kcu.COLUMN_NAME, kcu.REFERENCED_TABLE_NAME, \
                        kcu.REFERENCED_COLUMN_NAME, rc.DELETE_RULE, rc.UPDATE_RULE \
                 FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu \
                 INNER JOIN INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS rc \
                     ON rc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
                     AND rc.CONSTRAINT_SCHEMA = kcu.TABLE_SCHEMA \
                 WHERE kcu.TABLE_SCHEMA = DATABASE() AND kcu.TABLE_NAME = ? \
                     AND kcu.REFERENCED_TABLE_NAME IS NOT NULL \
                 ORDER BY kcu.CONSTRAINT_NAME, kcu.ORDINAL_POSITION",
                &[SqlValue::from(table)],
            )
            .await?;

        let mut fks: Vec<ForeignKeyConstraint> = Vec::new();
        for row in MetadataRow::rows_from(rows) {
            let name = row
                .string("constraint_name")
                .ok_or_else(|| malformed_row("constraint_name"))?;
            let column = row
                .string("column_name")
                .ok_or_else(|| malformed_row("column_name"))?;
            let foreign_column = row
                .string("referenced_column_name")
                .ok_or_else(|| malformed_row("referenced_column_name"))?;
            match fks.iter_mut().find(|fk| fk.name == name) {
                Some(fk) => {
                    fk.columns.push(column);
                    fk.foreign_columns.push(foreign_column);
                }
                None => fks.push(ForeignKeyConstraint {
                    foreign_table: row
                        .string("referenced_table_name")
                        .ok_or_else(|| malformed_row("referenced_table_name"))?,
                    on_delete: row.string("delete_rule"),
                    on_update: row.string("update_rule"),
                    name,
                    columns: vec![column],
                    foreign_columns: vec![foreign_column],
                }),
            }
        }
        Ok(fks)
    }

    async fn list_views(&self) -> Result<Vec<View>> {
        let rows = self
            .conn
            .query(
                "SELECT TABLE_NAME, VIEW_DEFINITION FROM INFORMATION_SCHEMA.VIEWS \
                 WHERE TABLE_SCHEMA = DATABASE() ORDER BY TABLE_NAME",
                &[],
            )
            .await?;
        MetadataRow::rows_from(rows)
            .iter()
            .map(|row| {
                Ok(View {
                    name: row
                        .string("table_name")
                        .ok_or_else(|| malformed_row("table_name"))?,
                    sql: row.string("view_definition").unwrap_or_default(),
                })
            })
            .collect()
    }
}
