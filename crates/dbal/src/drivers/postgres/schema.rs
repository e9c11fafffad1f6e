//! PostgreSQL schema introspection over `information_schema` and
//! `pg_catalog`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::connection::Connection;
use crate::core::schema::{Column, ForeignKeyConstraint, Index, Sequence, View};
use crate::core::value::SqlValue;
use crate::error::Result;
use crate::platform::Platform;
use crate::schema_manager::{malformed_row, MetadataRow, SchemaManager};

/// Schema manager for PostgreSQL.
pub struct PostgresSchemaManager<'a> {
    conn: &'a Connection,
    platform: Arc<dyn Platform>,
    current_schema: OnceCell<String>,
}

impl<'a> PostgresSchemaManager<'a> {
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
        column.fixed = matches!(data_type.as_str(), "character" | "bpchar" | "char");
        column.notnull = !row.bool("is_nullable").unwrap_or(true);

        if let Some(default) = row.string("column_default") {
            // A nextval() default marks a serial column; record the backing
            // sequence and surface the portable flag instead.
            if let Some(sequence) = parse_serial_default(&default) {
                column.autoincrement = true;
                column
                    .platform_options
                    .insert("autoincrement_sequence".to_string(), sequence);
            } else {
                column.default = Some(default);
            }
        }

        Ok(column)
    }
}

/// Extract the sequence name out of a `nextval('name'::regclass)` default.
fn parse_serial_default(default: &str) -> Option<String> {
    let rest = default.trim().strip_prefix("nextval('")?;
    let end = rest.find('\'')?;
    Some(rest[..end].to_string())
}

#[async_trait]
impl SchemaManager for PostgresSchemaManager<'_> {
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
                let rows = self.conn.query("SELECT current_schema()", &[]).await?;
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
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
                 ORDER BY table_name",
                &[SqlValue::from(schema)],
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
        let schema = self.current_schema_name().await?;
        let rows = self
            .conn
            .query(
                "SELECT column_name, data_type, character_maximum_length, \
                        numeric_precision, numeric_scale, is_nullable, column_default \
                 FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 \
                 ORDER BY ordinal_position",
                &[SqlValue::from(schema), SqlValue::from(table)],
            )
            .await?;
        MetadataRow::rows_from(rows)
            .iter()
            .map(|row| self.portable_column(row))
            .collect()
    }

    async fn list_table_indexes(&self, table: &str) -> Result<Vec<Index>> {
        let schema = self.current_schema_name().await?;
        let rows = self
            .conn
            .query(
                "SELECT i.relname AS index_name, a.attname AS column_name, \
                        ix.indisunique AS is_unique, ix.indisprimary AS is_primary \
                 FROM pg_catalog.pg_index ix \
                 JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid \
                 JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid \
                 JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace \
                 JOIN pg_catalog.pg_attribute a \
                     ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
                 WHERE n.nspname = $1 AND t.relname = $2 \
                 ORDER BY i.relname, a.attnum",
                &[SqlValue::from(schema), SqlValue::from(table)],
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
                    is_unique: row.bool("is_unique").unwrap_or(false),
                    is_primary: row.bool("is_primary").unwrap_or(false),
                    name,
                    columns: vec![column],
                }),
            }
        }
        Ok(indexes)
    }

    async fn list_table_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyConstraint>> {
        let schema = self.current_schema_name().await?;
        let rows = self
            .conn
            .query(
                "SELECT tc.constraint_name, kcu.column_name, \
                        ccu.table_name AS foreign_table, \
                        ccu.column_name AS foreign_column, \
                        rc.delete_rule, rc.update_rule \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                     ON kcu.constraint_name = tc.constraint_name \
                     AND kcu.table_schema = tc.table_schema \
                 JOIN information_schema.constraint_column_usage ccu \
                     ON ccu.constraint_name = tc.constraint_name \
                     AND ccu.table_schema = tc.table_schema \
                 JOIN information_schema.referential_constraints rc \
                     ON rc.constraint_name = tc.constraint_name \
                     AND rc.constraint_schema = tc.table_schema \
                 WHERE tc.constraint_type = 'FOREIGN KEY' \
                     AND tc.table_schema = $1 AND tc.table_name = $2 \
                 ORDER BY tc.constraint_name, kcu.ordinal_position",
                &[SqlValue::from(schema), SqlValue::from(table)],
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
                .string("foreign_column")
                .ok_or_else(|| malformed_row("foreign_column"))?;
            match fks.iter_mut().find(|fk| fk.name == name) {
                Some(fk) => {
                    fk.columns.push(column);
                    fk.foreign_columns.push(foreign_column);
                }
                None => fks.push(ForeignKeyConstraint {
                    foreign_table: row
                        .string("foreign_table")
                        .ok_or_else(|| malformed_row("foreign_table"))?,
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

    async fn list_sequences(&self) -> Result<Vec<Sequence>> {
        let schema = self.current_schema_name().await?;
        let rows = self
            .conn
            .query(
                "SELECT sequence_name, increment, start_value \
                 FROM information_schema.sequences \
                 WHERE sequence_schema = $1 ORDER BY sequence_name",
                &[SqlValue::from(schema)],
            )
            .await?;
        MetadataRow::rows_from(rows)
            .iter()
            .map(|row| {
                let name = row
                    .string("sequence_name")
                    .ok_or_else(|| malformed_row("sequence_name"))?;
                let increment = row
                    .i64("increment")
                    .ok_or_else(|| malformed_row("increment"))?;
                let start = row
                    .i64("start_value")
                    .ok_or_else(|| malformed_row("start_value"))?;
                Ok(Sequence::new(name, increment, start))
            })
            .collect()
    }

    async fn list_views(&self) -> Result<Vec<View>> {
        let schema = self.current_schema_name().await?;
        let rows = self
            .conn
            .query(
                "SELECT table_name, view_definition FROM information_schema.views \
                 WHERE table_schema = $1 ORDER BY table_name",
                &[SqlValue::from(schema)],
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serial_default() {
        assert_eq!(
            parse_serial_default("nextval('users_id_seq'::regclass)").as_deref(),
            Some("users_id_seq")
        );
        assert_eq!(parse_serial_default("'fixed'::text"), None);
        assert_eq!(parse_serial_default("42"), None);
    }
}
