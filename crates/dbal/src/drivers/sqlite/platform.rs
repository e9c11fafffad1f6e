//! SQLite SQL dialect.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::core::schema::{Column, PortableType, Table, TableDiff};
use crate::error::{DbalError, Result};
use crate::platform::keywords::{KeywordList, SQLITE_KEYWORDS};
use crate::platform::{
    build_create_table, DateIntervalUnit, Platform, TransactionIsolationLevel, TrimMode,
};

/// SQLite dialect implementation.
#[derive(Debug)]
pub struct SqlitePlatform {
    type_mappings: HashMap<&'static str, PortableType>,
    keywords: OnceLock<KeywordList>,
}

impl Default for SqlitePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlitePlatform {
    /// Create the platform; the type-mapping table is initialized here, once.
    pub fn new() -> Self {
        let mut m = HashMap::new();
        m.insert("boolean", PortableType::Boolean);
        m.insert("tinyint", PortableType::Boolean);
        m.insert("smallint", PortableType::SmallInt);
        m.insert("mediumint", PortableType::Integer);
        m.insert("int", PortableType::Integer);
        m.insert("integer", PortableType::Integer);
        m.insert("serial", PortableType::Integer);
        m.insert("bigint", PortableType::BigInt);
        m.insert("bigserial", PortableType::BigInt);
        m.insert("decimal", PortableType::Decimal);
        m.insert("numeric", PortableType::Decimal);
        m.insert("float", PortableType::Float);
        m.insert("double", PortableType::Float);
        m.insert("double precision", PortableType::Float);
        m.insert("real", PortableType::Float);
        m.insert("char", PortableType::String);
        m.insert("nchar", PortableType::String);
        m.insert("varchar", PortableType::String);
        m.insert("nvarchar", PortableType::String);
        m.insert("varchar2", PortableType::String);
        m.insert("text", PortableType::Text);
        m.insert("clob", PortableType::Text);
        m.insert("longtext", PortableType::Text);
        m.insert("binary", PortableType::Binary);
        m.insert("varbinary", PortableType::Binary);
        m.insert("blob", PortableType::Blob);
        m.insert("date", PortableType::Date);
        m.insert("time", PortableType::Time);
        m.insert("datetime", PortableType::DateTime);
        m.insert("timestamp", PortableType::DateTime);
        Self {
            type_mappings: m,
            keywords: OnceLock::new(),
        }
    }

    fn has_autoincrement_column(table: &Table) -> bool {
        table.columns.iter().any(|c| c.autoincrement)
    }
}

impl Platform for SqlitePlatform {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn keywords(&self) -> &KeywordList {
        self.keywords
            .get_or_init(|| KeywordList::new("sqlite", SQLITE_KEYWORDS))
    }

    fn portable_type_for(&self, db_type: &str) -> Result<PortableType> {
        self.type_mappings
            .get(db_type.to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| DbalError::UnknownColumnType {
                db_type: db_type.to_string(),
                platform: "sqlite",
            })
    }

    fn text_type_sql(&self, _column: &Column) -> String {
        "CLOB".to_string()
    }

    fn datetime_type_sql(&self, _column: &Column) -> String {
        "DATETIME".to_string()
    }

    fn binary_type_sql(&self, _column: &Column) -> Result<String> {
        Ok("BLOB".to_string())
    }

    /// An autoincrement column must be declared exactly as
    /// `INTEGER PRIMARY KEY AUTOINCREMENT`; the generic declaration applies
    /// otherwise.
    fn column_declaration_sql(&self, column: &Column) -> Result<String> {
        if column.autoincrement {
            return Ok(format!(
                "{} INTEGER PRIMARY KEY AUTOINCREMENT",
                self.quote_identifier(&column.name)
            ));
        }
        crate::platform::build_column_declaration(self, column)
    }

    /// When a column declares itself the primary key, the table-level
    /// PRIMARY KEY clause must be dropped.
    fn create_table_sql(&self, table: &Table) -> Result<Vec<String>> {
        if Self::has_autoincrement_column(table) {
            let mut table = table.clone();
            table.primary_key.clear();
            return build_create_table(self, &table);
        }
        build_create_table(self, table)
    }

    fn substring_expression(&self, string: &str, start: &str, length: Option<&str>) -> String {
        match length {
            Some(length) => format!("SUBSTR({string}, {start}, {length})"),
            None => format!("SUBSTR({string}, {start})"),
        }
    }

    fn trim_expression(&self, expr: &str, mode: TrimMode, trim_char: Option<&str>) -> String {
        let func = match mode {
            TrimMode::Leading => "LTRIM",
            TrimMode::Trailing => "RTRIM",
            TrimMode::Both => "TRIM",
        };
        match trim_char {
            Some(c) => format!("{func}({expr}, {c})"),
            None => format!("{func}({expr})"),
        }
    }

    fn locate_expression(&self, haystack: &str, needle: &str, start: Option<&str>) -> Result<String> {
        match start {
            None => Ok(format!("INSTR({haystack}, {needle})")),
            Some(_) => Err(DbalError::not_supported("locate with a start offset")),
        }
    }

    /// SQLite has no notion of a current database.
    fn current_database_expression(&self) -> Result<String> {
        Err(DbalError::not_supported("a current database expression"))
    }

    fn regexp_expression(&self) -> Result<String> {
        Ok("REGEXP".to_string())
    }

    fn date_interval_expression(
        &self,
        date: &str,
        interval: i64,
        unit: DateIntervalUnit,
    ) -> Result<String> {
        let (magnitude, unit_name) = match unit {
            DateIntervalUnit::Second => (interval, "seconds"),
            DateIntervalUnit::Minute => (interval, "minutes"),
            DateIntervalUnit::Hour => (interval, "hours"),
            DateIntervalUnit::Day => (interval, "days"),
            DateIntervalUnit::Week => (interval * 7, "days"),
            DateIntervalUnit::Month => (interval, "months"),
            DateIntervalUnit::Quarter => (interval * 3, "months"),
            DateIntervalUnit::Year => (interval, "years"),
        };
        let sign = if magnitude < 0 { "" } else { "+" };
        Ok(format!("DATETIME({date}, '{sign}{magnitude} {unit_name}')"))
    }

    fn create_database_sql(&self, _name: &str) -> Result<String> {
        Err(DbalError::not_supported("creating databases"))
    }

    fn drop_database_sql(&self, _name: &str) -> Result<String> {
        Err(DbalError::not_supported("dropping databases"))
    }

    /// Only column additions are expressible; everything else would need a
    /// table rebuild, which this layer does not perform implicitly.
    fn alter_table_sql(&self, diff: &TableDiff) -> Result<Vec<String>> {
        if !diff.dropped_columns.is_empty()
            || !diff.changed_columns.is_empty()
            || !diff.renamed_columns.is_empty()
        {
            return Err(DbalError::not_supported(
                "altering columns other than adding them",
            ));
        }
        let table = self.quote_identifier(&diff.table_name);
        diff.added_columns
            .iter()
            .map(|column| {
                Ok(format!(
                    "ALTER TABLE {table} ADD COLUMN {}",
                    self.column_declaration_sql(column)?
                ))
            })
            .collect()
    }

    fn supports_isolation_level(&self, level: TransactionIsolationLevel) -> bool {
        matches!(
            level,
            TransactionIsolationLevel::ReadUncommitted | TransactionIsolationLevel::Serializable
        )
    }

    /// SQLite sets isolation through `PRAGMA read_uncommitted`.
    fn set_transaction_isolation_sql(&self, level: TransactionIsolationLevel) -> Result<String> {
        match level {
            TransactionIsolationLevel::ReadUncommitted => {
                Ok("PRAGMA read_uncommitted = 1".to_string())
            }
            TransactionIsolationLevel::Serializable => {
                Ok("PRAGMA read_uncommitted = 0".to_string())
            }
            other => Err(DbalError::not_supported(format!(
                "isolation level {}",
                other.as_sql()
            ))),
        }
    }

    fn default_transaction_isolation_level(&self) -> TransactionIsolationLevel {
        TransactionIsolationLevel::Serializable
    }

    fn supports_schemas(&self) -> bool {
        false
    }

    fn as_platform(&self) -> &dyn Platform {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autoincrement_declaration() {
        let platform = SqlitePlatform::new();
        let mut col = Column::new("id", PortableType::Integer);
        col.autoincrement = true;
        assert_eq!(
            platform.column_declaration_sql(&col).unwrap(),
            "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"
        );
    }

    #[test]
    fn test_create_table_drops_redundant_pk_clause() {
        let platform = SqlitePlatform::new();
        let mut table = Table::new("t");
        let mut id = Column::new("id", PortableType::Integer);
        id.autoincrement = true;
        table.columns.push(id);
        table.primary_key.push("id".to_string());

        let statements = platform.create_table_sql(&table).unwrap();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].contains("INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(!statements[0].contains("PRIMARY KEY (\"id\")"));
    }

    #[test]
    fn test_isolation_pragmas() {
        let platform = SqlitePlatform::new();
        assert_eq!(
            platform
                .set_transaction_isolation_sql(TransactionIsolationLevel::ReadUncommitted)
                .unwrap(),
            "PRAGMA read_uncommitted = 1"
        );
        assert!(platform
            .set_transaction_isolation_sql(TransactionIsolationLevel::RepeatableRead)
            .unwrap_err()
            .is_not_supported());
    }

    #[test]
    fn test_no_database_ddl() {
        let platform = SqlitePlatform::new();
        assert!(platform.create_database_sql("x").unwrap_err().is_not_supported());
        assert!(platform.drop_database_sql("x").unwrap_err().is_not_supported());
    }

    #[test]
    fn test_alter_table_only_adds() {
        let platform = SqlitePlatform::new();
        let mut diff = TableDiff::new("t");
        diff.added_columns.push(Column::new("c", PortableType::Text));
        let statements = platform.alter_table_sql(&diff).unwrap();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with("ALTER TABLE \"t\" ADD COLUMN"));

        diff.dropped_columns.push("d".to_string());
        assert!(platform.alter_table_sql(&diff).unwrap_err().is_not_supported());
    }

    #[test]
    fn test_current_database_not_supported() {
        let platform = SqlitePlatform::new();
        assert!(platform
            .current_database_expression()
            .unwrap_err()
            .is_not_supported());
    }

    #[test]
    fn test_date_interval_modifier_strings() {
        let platform = SqlitePlatform::new();
        assert_eq!(
            platform
                .date_interval_expression("d", 2, DateIntervalUnit::Week)
                .unwrap(),
            "DATETIME(d, '+14 days')"
        );
        assert_eq!(
            platform
                .date_interval_expression("d", -1, DateIntervalUnit::Hour)
                .unwrap(),
            "DATETIME(d, '-1 hours')"
        );
    }
}
