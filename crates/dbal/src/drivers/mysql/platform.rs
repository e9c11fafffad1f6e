//! MySQL/MariaDB SQL dialect.
//!
//! Compatible with MySQL 5.7+, 8.0+, and MariaDB 10.2+.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use crate::core::schema::{Column, PortableType, TableDiff};
use crate::error::{DbalError, Result};
use crate::platform::keywords::{KeywordList, MYSQL_KEYWORDS};
use crate::platform::{DateIntervalUnit, Platform, TrimMode};

/// MySQL dialect implementation.
#[derive(Debug)]
pub struct MysqlPlatform {
    type_mappings: HashMap<&'static str, PortableType>,
    keywords: OnceLock<KeywordList>,
}

impl Default for MysqlPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MysqlPlatform {
    /// Create the platform; the type-mapping table is initialized here, once.
    pub fn new() -> Self {
        let mut m = HashMap::new();
        m.insert("tinyint", PortableType::Boolean);
        m.insert("smallint", PortableType::SmallInt);
        m.insert("mediumint", PortableType::Integer);
        m.insert("int", PortableType::Integer);
        m.insert("integer", PortableType::Integer);
        m.insert("bigint", PortableType::BigInt);
        m.insert("decimal", PortableType::Decimal);
        m.insert("numeric", PortableType::Decimal);
        m.insert("float", PortableType::Float);
        m.insert("double", PortableType::Float);
        m.insert("real", PortableType::Float);
        m.insert("char", PortableType::String);
        m.insert("varchar", PortableType::String);
        m.insert("enum", PortableType::String);
        m.insert("set", PortableType::String);
        m.insert("tinytext", PortableType::Text);
        m.insert("text", PortableType::Text);
        m.insert("mediumtext", PortableType::Text);
        m.insert("longtext", PortableType::Text);
        m.insert("binary", PortableType::Binary);
        m.insert("varbinary", PortableType::Binary);
        m.insert("tinyblob", PortableType::Blob);
        m.insert("blob", PortableType::Blob);
        m.insert("mediumblob", PortableType::Blob);
        m.insert("longblob", PortableType::Blob);
        m.insert("date", PortableType::Date);
        m.insert("time", PortableType::Time);
        m.insert("datetime", PortableType::DateTime);
        m.insert("timestamp", PortableType::DateTime);
        m.insert("year", PortableType::SmallInt);
        m.insert("json", PortableType::Json);
        Self {
            type_mappings: m,
            keywords: OnceLock::new(),
        }
    }
}

impl Platform for MysqlPlatform {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn identifier_quote_char(&self) -> char {
        '`'
    }

    fn keywords(&self) -> &KeywordList {
        self.keywords
            .get_or_init(|| KeywordList::new("mysql", MYSQL_KEYWORDS))
    }

    fn portable_type_for(&self, db_type: &str) -> Result<PortableType> {
        self.type_mappings
            .get(db_type.to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| DbalError::UnknownColumnType {
                db_type: db_type.to_string(),
                platform: "mysql",
            })
    }

    fn boolean_type_sql(&self, _column: &Column) -> String {
        "TINYINT(1)".to_string()
    }

    fn float_type_sql(&self, _column: &Column) -> String {
        "DOUBLE PRECISION".to_string()
    }

    fn text_type_sql(&self, _column: &Column) -> String {
        "LONGTEXT".to_string()
    }

    fn blob_type_sql(&self, _column: &Column) -> String {
        "LONGBLOB".to_string()
    }

    fn datetime_type_sql(&self, _column: &Column) -> String {
        "DATETIME".to_string()
    }

    fn json_type_sql(&self, _column: &Column) -> String {
        "JSON".to_string()
    }

    fn substring_expression(&self, string: &str, start: &str, length: Option<&str>) -> String {
        match length {
            Some(length) => format!("SUBSTRING({string}, {start}, {length})"),
            None => format!("SUBSTRING({string}, {start})"),
        }
    }

    /// MySQL TRIM does not compose LTRIM/RTRIM; the ANSI form works for all
    /// modes, so only the char-less leading/trailing forms differ.
    fn trim_expression(&self, expr: &str, mode: TrimMode, trim_char: Option<&str>) -> String {
        match (mode, trim_char) {
            (TrimMode::Both, None) => format!("TRIM({expr})"),
            (TrimMode::Leading, None) => format!("LTRIM({expr})"),
            (TrimMode::Trailing, None) => format!("RTRIM({expr})"),
            (TrimMode::Both, Some(c)) => format!("TRIM(BOTH {c} FROM {expr})"),
            (TrimMode::Leading, Some(c)) => format!("TRIM(LEADING {c} FROM {expr})"),
            (TrimMode::Trailing, Some(c)) => format!("TRIM(TRAILING {c} FROM {expr})"),
        }
    }

    fn concat_expression(&self, parts: &[&str]) -> String {
        format!("CONCAT({})", parts.join(", "))
    }

    fn locate_expression(&self, haystack: &str, needle: &str, start: Option<&str>) -> Result<String> {
        Ok(match start {
            Some(start) => format!("LOCATE({needle}, {haystack}, {start})"),
            None => format!("LOCATE({needle}, {haystack})"),
        })
    }

    fn current_database_expression(&self) -> Result<String> {
        Ok("DATABASE()".to_string())
    }

    fn regexp_expression(&self) -> Result<String> {
        Ok("RLIKE".to_string())
    }

    fn date_interval_expression(
        &self,
        date: &str,
        interval: i64,
        unit: DateIntervalUnit,
    ) -> Result<String> {
        let func = if interval < 0 { "DATE_SUB" } else { "DATE_ADD" };
        Ok(format!(
            "{func}({date}, INTERVAL {} {})",
            interval.abs(),
            unit.as_sql()
        ))
    }

    fn identity_declaration_sql(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn table_options_sql(&self, options: &BTreeMap<String, String>) -> String {
        let mut parts = Vec::new();
        if let Some(engine) = options.get("engine") {
            parts.push(format!("ENGINE = {engine}"));
        }
        if let Some(charset) = options.get("charset") {
            parts.push(format!("DEFAULT CHARACTER SET {charset}"));
        }
        if let Some(collation) = options.get("collate") {
            parts.push(format!("COLLATE {collation}"));
        }
        parts.join(" ")
    }

    fn alter_table_sql(&self, diff: &TableDiff) -> Result<Vec<String>> {
        let table = self.quote_identifier(&diff.table_name);
        let mut clauses = Vec::new();
        for column in &diff.added_columns {
            clauses.push(format!("ADD {}", self.column_declaration_sql(column)?));
        }
        for change in &diff.changed_columns {
            clauses.push(format!(
                "CHANGE {} {}",
                self.quote_identifier(&change.old_name),
                self.column_declaration_sql(&change.column)?
            ));
        }
        for (old, new) in &diff.renamed_columns {
            clauses.push(format!(
                "RENAME COLUMN {} TO {}",
                self.quote_identifier(old),
                self.quote_identifier(new)
            ));
        }
        for name in &diff.dropped_columns {
            clauses.push(format!("DROP COLUMN {}", self.quote_identifier(name)));
        }
        if clauses.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![format!("ALTER TABLE {table} {}", clauses.join(", "))])
    }

    fn drop_index_sql(&self, name: &str, table: &str) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(name),
            self.quote_identifier(table)
        )
    }

    fn as_platform(&self) -> &dyn Platform {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::Table;

    #[test]
    fn test_quoting_uses_backticks() {
        let platform = MysqlPlatform::new();
        assert_eq!(platform.quote_identifier("users"), "`users`");
        assert_eq!(platform.quote_identifier("db.users"), "`db`.`users`");
        assert_eq!(platform.quote_single_identifier("a`b"), "`a``b`");
    }

    #[test]
    fn test_autoincrement_column_declaration() {
        let platform = MysqlPlatform::new();
        let mut col = Column::new("id", PortableType::Integer);
        col.autoincrement = true;
        let sql = platform.column_declaration_sql(&col).unwrap();
        assert_eq!(sql, "`id` INTEGER NOT NULL AUTO_INCREMENT");
    }

    #[test]
    fn test_create_table_with_options() {
        let platform = MysqlPlatform::new();
        let mut table = Table::new("t");
        table.columns.push(Column::new("id", PortableType::BigInt));
        table
            .options
            .insert("charset".to_string(), "utf8mb4".to_string());
        let statements = platform.create_table_sql(&table).unwrap();
        assert!(statements[0].ends_with("DEFAULT CHARACTER SET utf8mb4"));
    }

    #[test]
    fn test_date_interval_is_sign_aware() {
        let platform = MysqlPlatform::new();
        assert_eq!(
            platform
                .date_interval_expression("d", 4, DateIntervalUnit::Month)
                .unwrap(),
            "DATE_ADD(d, INTERVAL 4 MONTH)"
        );
        assert_eq!(
            platform
                .date_interval_expression("d", -4, DateIntervalUnit::Month)
                .unwrap(),
            "DATE_SUB(d, INTERVAL 4 MONTH)"
        );
    }

    #[test]
    fn test_alter_table_single_statement() {
        let platform = MysqlPlatform::new();
        let mut diff = TableDiff::new("t");
        diff.added_columns.push(Column::new("a", PortableType::Integer));
        diff.dropped_columns.push("b".to_string());
        let statements = platform.alter_table_sql(&diff).unwrap();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].contains("ADD `a` INTEGER NOT NULL"));
        assert!(statements[0].contains("DROP COLUMN `b`"));
    }

    #[test]
    fn test_sequences_unsupported() {
        let platform = MysqlPlatform::new();
        assert!(!platform.supports_sequences());
        assert!(platform
            .sequence_next_val_sql("s")
            .unwrap_err()
            .is_not_supported());
    }

    #[test]
    fn test_tinyint_maps_to_boolean() {
        let platform = MysqlPlatform::new();
        assert_eq!(
            platform.portable_type_for("TINYINT").unwrap(),
            PortableType::Boolean
        );
    }
}
