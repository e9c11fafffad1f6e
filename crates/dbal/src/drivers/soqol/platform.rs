//! SOQOL SQL dialect.
//!
//! SOQOL stores identifiers upper-cased, has no identity columns (sequences
//! emulate autoincrement), and accepts only READ COMMITTED and SERIALIZABLE
//! isolation.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::core::schema::{Column, PortableType, Sequence, Table, TableDiff};
use crate::error::{DbalError, Result};
use crate::platform::keywords::{KeywordList, SOQOL_KEYWORDS};
use crate::platform::{
    build_alter_sequence, build_create_sequence, build_create_table, build_default_clause,
    DateIntervalUnit, Platform, TransactionIsolationLevel, TrimMode,
};

/// SOQOL dialect implementation.
#[derive(Debug)]
pub struct SoqolPlatform {
    type_mappings: HashMap<&'static str, PortableType>,
    keywords: OnceLock<KeywordList>,
}

impl Default for SoqolPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SoqolPlatform {
    /// Create the platform; the type-mapping table is initialized here, once.
    pub fn new() -> Self {
        let mut m = HashMap::new();
        m.insert("boolean", PortableType::Boolean);
        m.insert("smallint", PortableType::SmallInt);
        m.insert("int", PortableType::Integer);
        m.insert("integer", PortableType::Integer);
        m.insert("bigint", PortableType::BigInt);
        m.insert("number", PortableType::Decimal);
        m.insert("numeric", PortableType::Decimal);
        m.insert("decimal", PortableType::Decimal);
        m.insert("float", PortableType::Float);
        m.insert("real", PortableType::Float);
        m.insert("double precision", PortableType::Float);
        m.insert("char", PortableType::String);
        m.insert("varchar", PortableType::String);
        m.insert("clob", PortableType::Text);
        m.insert("raw", PortableType::Binary);
        m.insert("blob", PortableType::Blob);
        m.insert("date", PortableType::Date);
        m.insert("time", PortableType::Time);
        m.insert("timestamp", PortableType::DateTime);
        m.insert("timestamp with time zone", PortableType::DateTimeTz);
        m.insert("guid", PortableType::Guid);
        m.insert("json", PortableType::Json);
        Self {
            type_mappings: m,
            keywords: OnceLock::new(),
        }
    }

    /// Deterministic name of the sequence emulating autoincrement for a
    /// table/column pair.
    #[must_use]
    pub fn autoincrement_sequence_name(table: &str, column: &str) -> String {
        format!(
            "{}_{}_SEQ",
            table.replace('.', "_").to_ascii_uppercase(),
            column.to_ascii_uppercase()
        )
    }
}

impl Platform for SoqolPlatform {
    fn name(&self) -> &'static str {
        "soqol"
    }

    fn keywords(&self) -> &KeywordList {
        self.keywords
            .get_or_init(|| KeywordList::new("soqol", SOQOL_KEYWORDS))
    }

    fn portable_type_for(&self, db_type: &str) -> Result<PortableType> {
        self.type_mappings
            .get(db_type.to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| DbalError::UnknownColumnType {
                db_type: db_type.to_string(),
                platform: "soqol",
            })
    }

    fn binary_type_sql(&self, column: &Column) -> Result<String> {
        Ok(format!("RAW({})", column.length.unwrap_or(255)))
    }

    fn datetime_tz_type_sql(&self, _column: &Column) -> String {
        "TIMESTAMP WITH TIME ZONE".to_string()
    }

    fn substring_expression(&self, string: &str, start: &str, length: Option<&str>) -> String {
        match length {
            Some(length) => format!("SUBSTR({string}, {start}, {length})"),
            None => format!("SUBSTR({string}, {start})"),
        }
    }

    /// SOQOL has no ANSI TRIM; leading/trailing trims map to LTRIM/RTRIM
    /// and BOTH composes the two.
    fn trim_expression(&self, expr: &str, mode: TrimMode, trim_char: Option<&str>) -> String {
        let one = |func: &str| match trim_char {
            Some(c) => format!("{func}({expr}, {c})"),
            None => format!("{func}({expr})"),
        };
        match mode {
            TrimMode::Leading => one("LTRIM"),
            TrimMode::Trailing => one("RTRIM"),
            TrimMode::Both => {
                let inner = one("RTRIM");
                match trim_char {
                    Some(c) => format!("LTRIM({inner}, {c})"),
                    None => format!("LTRIM({inner})"),
                }
            }
        }
    }

    fn locate_expression(&self, haystack: &str, needle: &str, start: Option<&str>) -> Result<String> {
        Ok(match start {
            Some(start) => format!("INSTR({haystack}, {needle}, {start})"),
            None => format!("INSTR({haystack}, {needle})"),
        })
    }

    fn current_database_expression(&self) -> Result<String> {
        Ok("CURRENT_DATABASE".to_string())
    }

    fn date_interval_expression(
        &self,
        date: &str,
        interval: i64,
        unit: DateIntervalUnit,
    ) -> Result<String> {
        let (op, magnitude) = if interval < 0 {
            ('-', -interval)
        } else {
            ('+', interval)
        };
        // WEEK and QUARTER have no interval keyword here; rescale them.
        let (magnitude, unit_sql) = match unit {
            DateIntervalUnit::Week => (magnitude * 7, "DAY"),
            DateIntervalUnit::Quarter => (magnitude * 3, "MONTH"),
            other => (magnitude, other.as_sql()),
        };
        Ok(format!("({date} {op} INTERVAL '{magnitude}' {unit_sql})"))
    }

    fn create_sequence_sql(&self, sequence: &Sequence) -> Result<String> {
        Ok(build_create_sequence(self, sequence))
    }

    fn alter_sequence_sql(&self, sequence: &Sequence) -> Result<String> {
        Ok(build_alter_sequence(self, sequence))
    }

    fn sequence_next_val_sql(&self, name: &str) -> Result<String> {
        Ok(format!("{name}.nextval"))
    }

    /// Autoincrement columns have no identity syntax here; each one gets a
    /// dedicated sequence and a `<sequence>.nextval` default, and loses its
    /// NOT NULL constraint, before the generic builder runs.
    fn create_table_sql(&self, table: &Table) -> Result<Vec<String>> {
        let mut table = table.clone();
        let mut statements = Vec::new();
        for column in table.columns.iter_mut() {
            if !column.autoincrement {
                continue;
            }
            let sequence_name = Self::autoincrement_sequence_name(&table.name, &column.name);
            statements.push(self.create_sequence_sql(&Sequence::new(&sequence_name, 1, 1))?);
            column.default = Some(format!("{sequence_name}.nextval"));
            column.notnull = false;
            column.autoincrement = false;
        }
        statements.extend(build_create_table(self, &table)?);
        Ok(statements)
    }

    /// Next-value defaults are expressions, not string literals.
    fn default_value_declaration_sql(&self, column: &Column) -> String {
        if let Some(default) = &column.default {
            if default.to_ascii_lowercase().ends_with(".nextval") {
                return format!("DEFAULT {default}");
            }
        }
        build_default_clause(self, column)
    }

    fn alter_table_sql(&self, diff: &TableDiff) -> Result<Vec<String>> {
        if !diff.renamed_columns.is_empty() {
            return Err(DbalError::not_supported("renaming columns"));
        }
        let table = self.quote_identifier(&diff.table_name);
        let mut statements = Vec::new();
        for column in &diff.added_columns {
            statements.push(format!(
                "ALTER TABLE {table} ADD {}",
                self.column_declaration_sql(column)?
            ));
        }
        for change in &diff.changed_columns {
            statements.push(format!(
                "ALTER TABLE {table} MODIFY {}",
                self.column_declaration_sql(&change.column)?
            ));
        }
        for name in &diff.dropped_columns {
            statements.push(format!(
                "ALTER TABLE {table} DROP COLUMN {}",
                self.quote_identifier(name)
            ));
        }
        Ok(statements)
    }

    fn supports_isolation_level(&self, level: TransactionIsolationLevel) -> bool {
        matches!(
            level,
            TransactionIsolationLevel::ReadCommitted | TransactionIsolationLevel::Serializable
        )
    }

    fn supports_sequences(&self) -> bool {
        true
    }

    fn supports_identity_columns(&self) -> bool {
        false
    }

    fn supports_schemas(&self) -> bool {
        true
    }

    fn as_platform(&self) -> &dyn Platform {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_modes() {
        let platform = SoqolPlatform::new();
        assert_eq!(
            platform.trim_expression("x", TrimMode::Both, None),
            "LTRIM(RTRIM(x))"
        );
        assert_eq!(
            platform.trim_expression("x", TrimMode::Leading, Some("'0'")),
            "LTRIM(x, '0')"
        );
        assert_eq!(
            platform.trim_expression("x", TrimMode::Trailing, Some("'0'")),
            "RTRIM(x, '0')"
        );
        assert_eq!(
            platform.trim_expression("x", TrimMode::Both, Some("'0'")),
            "LTRIM(RTRIM(x, '0'), '0')"
        );
    }

    #[test]
    fn test_autoincrement_emulated_via_sequence() {
        let platform = SoqolPlatform::new();
        let mut table = Table::new("articles");
        let mut id = Column::new("id", PortableType::Integer);
        id.autoincrement = true;
        table.columns.push(id);
        table.primary_key.push("id".to_string());

        let statements = platform.create_table_sql(&table).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0],
            "CREATE SEQUENCE \"ARTICLES_ID_SEQ\" INCREMENT BY 1 START WITH 1"
        );
        // The column default becomes the sequence's next value and the
        // NOT NULL constraint is cleared.
        assert!(statements[1].contains("\"id\" INTEGER DEFAULT ARTICLES_ID_SEQ.nextval"));
        assert!(!statements[1].contains("NOT NULL"));
        assert!(statements[1].contains("PRIMARY KEY (\"id\")"));
    }

    #[test]
    fn test_unsupported_isolation_levels_rejected() {
        let platform = SoqolPlatform::new();
        let err = platform
            .set_transaction_isolation_sql(TransactionIsolationLevel::RepeatableRead)
            .unwrap_err();
        assert!(err.is_not_supported());

        assert_eq!(
            platform
                .set_transaction_isolation_sql(TransactionIsolationLevel::Serializable)
                .unwrap(),
            "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE"
        );
    }

    #[test]
    fn test_sequence_next_val() {
        let platform = SoqolPlatform::new();
        assert_eq!(
            platform.sequence_next_val_sql("myseq").unwrap(),
            "myseq.nextval"
        );
    }

    #[test]
    fn test_regexp_not_supported() {
        let platform = SoqolPlatform::new();
        assert!(platform.regexp_expression().unwrap_err().is_not_supported());
    }

    #[test]
    fn test_date_interval_sign() {
        let platform = SoqolPlatform::new();
        assert_eq!(
            platform
                .date_interval_expression("created_at", 3, DateIntervalUnit::Day)
                .unwrap(),
            "(created_at + INTERVAL '3' DAY)"
        );
        assert_eq!(
            platform
                .date_interval_expression("created_at", -2, DateIntervalUnit::Week)
                .unwrap(),
            "(created_at - INTERVAL '14' DAY)"
        );
    }

    #[test]
    fn test_type_mapping_total_or_loud() {
        let platform = SoqolPlatform::new();
        assert_eq!(
            platform.portable_type_for("NUMBER").unwrap(),
            PortableType::Decimal
        );
        assert!(matches!(
            platform.portable_type_for("geometry").unwrap_err(),
            DbalError::UnknownColumnType { .. }
        ));
    }

    #[test]
    fn test_alter_table_rejects_rename() {
        let platform = SoqolPlatform::new();
        let mut diff = TableDiff::new("t");
        diff.renamed_columns.push(("a".to_string(), "b".to_string()));
        assert!(platform.alter_table_sql(&diff).unwrap_err().is_not_supported());
    }
}
