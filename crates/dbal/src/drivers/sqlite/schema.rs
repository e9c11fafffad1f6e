//! SQLite schema introspection over `sqlite_master` and PRAGMAs.
//!
//! PRAGMA statements cannot take bound parameters, so identifiers are
//! quoted and interpolated.

use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::Connection;
use crate::core::schema::{Column, ForeignKeyConstraint, Index, PortableType, View};
use crate::error::Result;
use crate::platform::Platform;
use crate::schema_manager::{
    malformed_row, parse_type_declaration, MetadataRow, SchemaManager,
};

/// Schema manager for SQLite.
pub struct SqliteSchemaManager<'a> {
    conn: &'a Connection,
    platform: Arc<dyn Platform>,
}

impl<'a> SqliteSchemaManager<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            platform: conn.platform().clone(),
        }
    }

    fn portable_column(&self, row: &MetadataRow) -> Result<Column> {
        let name = row
            .string("name")
            .ok_or_else(|| malformed_row("name"))?;
        let declared = row.string("type").unwrap_or_else(|| "blob".to_string());

        let (base, first, second) = parse_type_declaration(&declared);
        let portable_type = self.platform.portable_type_for(&base)?;

        let mut column = Column::new(name, portable_type);
        if portable_type.is_numeric() {
            column.precision = first;
            column.scale = second;
        } else {
            column.length = first;
        }
        column.fixed = matches!(base.as_str(), "char" | "nchar" | "binary");
        column.notnull = row.bool("notnull").unwrap_or(false);
        column.default = row
            .string("dflt_value")
            .filter(|d| !d.eq_ignore_ascii_case("null"));
        // A single-column INTEGER primary key aliases the rowid and
        // auto-assigns on insert.
        column.autoincrement =
            portable_type == PortableType::Integer && row.i64("pk").unwrap_or(0) == 1;

        Ok(column)
    }
}

#[async_trait]
impl SchemaManager for SqliteSchemaManager<'_> {
    fn connection(&self) -> &Connection {
        self.conn
    }

    fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    async fn list_table_names(&self) -> Result<Vec<String>> {
        let rows = self
            .conn
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' \
                 AND name NOT LIKE 'sqlite_%' ORDER BY name",
                &[],
            )
            .await?;
        MetadataRow::rows_from(rows)
            .iter()
            .map(|row| row.string("name").ok_or_else(|| malformed_row("name")))
            .collect()
    }

    async fn list_table_columns(&self, table: &str) -> Result<Vec<Column>> {
        let sql = format!(
            "PRAGMA table_info({})",
            self.platform.quote_single_identifier(table)
        );
        let rows = self.conn.query(&sql, &[]).await?;
        MetadataRow::rows_from(rows)
            .iter()
            .map(|row| self.portable_column(row))
            .collect()
    }

    async fn list_table_indexes(&self, table: &str) -> Result<Vec<Index>> {
        let sql = format!(
            "PRAGMA index_list({})",
            self.platform.quote_single_identifier(table)
        );
        let rows = self.conn.query(&sql, &[]).await?;

        let mut indexes = Vec::new();
        for row in MetadataRow::rows_from(rows) {
            let name = row.string("name").ok_or_else(|| malformed_row("name"))?;
            let is_unique = row.bool("unique").unwrap_or(false);
            let is_primary = row
                .string("origin")
                .is_some_and(|origin| origin == "pk");

            let info_sql = format!(
                "PRAGMA index_info({})",
                self.platform.quote_single_identifier(&name)
            );
            let info_rows = self.conn.query(&info_sql, &[]).await?;
            let columns = MetadataRow::rows_from(info_rows)
                .iter()
                .filter_map(|r| r.string("name"))
                .collect();

            indexes.push(Index {
                name,
                columns,
                is_unique,
                is_primary,
            });
        }
        Ok(indexes)
    }

    async fn list_table_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyConstraint>> {
        let sql = format!(
            "PRAGMA foreign_key_list({})",
            self.platform.quote_single_identifier(table)
        );
        let rows = self.conn.query(&sql, &[]).await?;

        let mut fks: Vec<(i64, ForeignKeyConstraint)> = Vec::new();
        for row in MetadataRow::rows_from(rows) {
            let id = row.i64("id").ok_or_else(|| malformed_row("id"))?;
            let column = row.string("from").ok_or_else(|| malformed_row("from"))?;
            let foreign_column = row.string("to").unwrap_or_default();
            match fks.iter_mut().find(|(fk_id, _)| *fk_id == id) {
                Some((_, fk)) => {
                    fk.columns.push(column);
                    fk.foreign_columns.push(foreign_column);
                }
                None => fks.push((
                    id,
                    ForeignKeyConstraint {
                        // SQLite reports no constraint names; synthesize a
                        // stable one from the ordinal.
                        name: format!("fk_{table}_{id}"),
                        columns: vec![column],
                        foreign_table: row
                            .string("table")
                            .ok_or_else(|| malformed_row("table"))?,
                        foreign_columns: vec![foreign_column],
                        on_delete: row.string("on_delete"),
                        on_update: row.string("on_update"),
                    },
                )),
            }
        }
        Ok(fks.into_iter().map(|(_, fk)| fk).collect())
    }

    async fn list_views(&self) -> Result<Vec<View>> {
        let rows = self
            .conn
            .query(
                "SELECT name, sql FROM sqlite_master WHERE type = 'view' ORDER BY name",
                &[],
            )
            .await?;
        MetadataRow::rows_from(rows)
            .iter()
            .map(|row| {
                Ok(View {
                    name: row.string("name").ok_or_else(|| malformed_row("name"))?,
                    sql: row.string("sql").unwrap_or_default(),
                })
            })
            .collect()
    }
}
