//! PostgreSQL SQL dialect.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::core::schema::{Column, PortableType, Sequence, TableDiff};
use crate::error::{DbalError, Result};
use crate::platform::keywords::{KeywordList, POSTGRES_KEYWORDS};
use crate::platform::{
    build_alter_sequence, build_create_sequence, build_default_clause, DateIntervalUnit, Platform,
};

/// PostgreSQL dialect implementation.
#[derive(Debug)]
pub struct PostgresPlatform {
    type_mappings: HashMap<&'static str, PortableType>,
    keywords: OnceLock<KeywordList>,
}

impl Default for PostgresPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PostgresPlatform {
    /// Create the platform; the type-mapping table is initialized here, once.
    pub fn new() -> Self {
        let mut m = HashMap::new();
        m.insert("bool", PortableType::Boolean);
        m.insert("boolean", PortableType::Boolean);
        m.insert("int2", PortableType::SmallInt);
        m.insert("smallint", PortableType::SmallInt);
        m.insert("smallserial", PortableType::SmallInt);
        m.insert("int", PortableType::Integer);
        m.insert("int4", PortableType::Integer);
        m.insert("integer", PortableType::Integer);
        m.insert("serial", PortableType::Integer);
        m.insert("int8", PortableType::BigInt);
        m.insert("bigint", PortableType::BigInt);
        m.insert("bigserial", PortableType::BigInt);
        m.insert("numeric", PortableType::Decimal);
        m.insert("decimal", PortableType::Decimal);
        m.insert("money", PortableType::Decimal);
        m.insert("float4", PortableType::Float);
        m.insert("float8", PortableType::Float);
        m.insert("real", PortableType::Float);
        m.insert("double precision", PortableType::Float);
        m.insert("char", PortableType::String);
        m.insert("bpchar", PortableType::String);
        m.insert("character", PortableType::String);
        m.insert("varchar", PortableType::String);
        m.insert("character varying", PortableType::String);
        m.insert("text", PortableType::Text);
        m.insert("bytea", PortableType::Blob);
        m.insert("date", PortableType::Date);
        m.insert("time", PortableType::Time);
        m.insert("time without time zone", PortableType::Time);
        m.insert("timestamp", PortableType::DateTime);
        m.insert("timestamp without time zone", PortableType::DateTime);
        m.insert("timestamptz", PortableType::DateTimeTz);
        m.insert("timestamp with time zone", PortableType::DateTimeTz);
        m.insert("uuid", PortableType::Guid);
        m.insert("json", PortableType::Json);
        m.insert("jsonb", PortableType::Json);
        Self {
            type_mappings: m,
            keywords: OnceLock::new(),
        }
    }
}

impl Platform for PostgresPlatform {
    fn name(&self) -> &'static str {
        "pgsql"
    }

    fn keywords(&self) -> &KeywordList {
        self.keywords
            .get_or_init(|| KeywordList::new("pgsql", POSTGRES_KEYWORDS))
    }

    fn portable_type_for(&self, db_type: &str) -> Result<PortableType> {
        self.type_mappings
            .get(db_type.to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| DbalError::UnknownColumnType {
                db_type: db_type.to_string(),
                platform: "pgsql",
            })
    }

    /// Autoincrement integers become serial columns.
    fn integer_type_sql(&self, column: &Column) -> String {
        if column.autoincrement {
            "SERIAL".to_string()
        } else {
            "INTEGER".to_string()
        }
    }

    fn bigint_type_sql(&self, column: &Column) -> String {
        if column.autoincrement {
            "BIGSERIAL".to_string()
        } else {
            "BIGINT".to_string()
        }
    }

    fn smallint_type_sql(&self, column: &Column) -> String {
        if column.autoincrement {
            "SMALLSERIAL".to_string()
        } else {
            "SMALLINT".to_string()
        }
    }

    fn binary_type_sql(&self, _column: &Column) -> Result<String> {
        Ok("BYTEA".to_string())
    }

    fn blob_type_sql(&self, _column: &Column) -> String {
        "BYTEA".to_string()
    }

    fn text_type_sql(&self, _column: &Column) -> String {
        "TEXT".to_string()
    }

    fn datetime_type_sql(&self, _column: &Column) -> String {
        "TIMESTAMP WITHOUT TIME ZONE".to_string()
    }

    fn datetime_tz_type_sql(&self, _column: &Column) -> String {
        "TIMESTAMP WITH TIME ZONE".to_string()
    }

    fn guid_type_sql(&self, _column: &Column) -> String {
        "UUID".to_string()
    }

    fn json_type_sql(&self, _column: &Column) -> String {
        "JSONB".to_string()
    }

    /// Serial columns carry their own implicit default.
    fn default_value_declaration_sql(&self, column: &Column) -> String {
        if column.autoincrement {
            return String::new();
        }
        build_default_clause(self, column)
    }

    fn current_database_expression(&self) -> Result<String> {
        Ok("CURRENT_DATABASE()".to_string())
    }

    fn regexp_expression(&self) -> Result<String> {
        Ok("SIMILAR TO".to_string())
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
        Ok(format!(
            "({date} {op} INTERVAL '{magnitude} {}')",
            unit.as_sql()
        ))
    }

    fn create_sequence_sql(&self, sequence: &Sequence) -> Result<String> {
        Ok(build_create_sequence(self, sequence))
    }

    fn alter_sequence_sql(&self, sequence: &Sequence) -> Result<String> {
        Ok(build_alter_sequence(self, sequence))
    }

    fn sequence_next_val_sql(&self, name: &str) -> Result<String> {
        Ok(format!("nextval('{name}')"))
    }

    fn alter_table_sql(&self, diff: &TableDiff) -> Result<Vec<String>> {
        let table = self.quote_identifier(&diff.table_name);
        let mut statements = Vec::new();
        for column in &diff.added_columns {
            statements.push(format!(
                "ALTER TABLE {table} ADD {}",
                self.column_declaration_sql(column)?
            ));
        }
        for change in &diff.changed_columns {
            let name = self.quote_identifier(&change.column.name);
            statements.push(format!(
                "ALTER TABLE {table} ALTER {name} TYPE {}",
                self.type_declaration_sql(&change.column)?
            ));
            statements.push(format!(
                "ALTER TABLE {table} ALTER {name} {} NOT NULL",
                if change.column.notnull { "SET" } else { "DROP" }
            ));
        }
        for (old, new) in &diff.renamed_columns {
            statements.push(format!(
                "ALTER TABLE {table} RENAME COLUMN {} TO {}",
                self.quote_identifier(old),
                self.quote_identifier(new)
            ));
        }
        for name in &diff.dropped_columns {
            statements.push(format!(
                "ALTER TABLE {table} DROP {}",
                self.quote_identifier(name)
            ));
        }
        Ok(statements)
    }

    fn supports_sequences(&self) -> bool {
        true
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
    use crate::core::schema::Table;
    use crate::platform::TransactionIsolationLevel;

    #[test]
    fn test_serial_for_autoincrement() {
        let platform = PostgresPlatform::new();
        let mut col = Column::new("id", PortableType::Integer);
        col.autoincrement = true;
        let sql = platform.column_declaration_sql(&col).unwrap();
        assert_eq!(sql, "\"id\" SERIAL NOT NULL");

        col.portable_type = PortableType::BigInt;
        let sql = platform.column_declaration_sql(&col).unwrap();
        assert_eq!(sql, "\"id\" BIGSERIAL NOT NULL");
    }

    #[test]
    fn test_sequence_sql() {
        let platform = PostgresPlatform::new();
        let mut seq = Sequence::new("user_id_seq", 1, 10);
        seq.cache = Some(50);
        assert_eq!(
            platform.create_sequence_sql(&seq).unwrap(),
            "CREATE SEQUENCE \"user_id_seq\" INCREMENT BY 1 START WITH 10 CACHE 50"
        );
        assert_eq!(
            platform.sequence_next_val_sql("user_id_seq").unwrap(),
            "nextval('user_id_seq')"
        );
    }

    #[test]
    fn test_all_isolation_levels_supported() {
        let platform = PostgresPlatform::new();
        for level in [
            TransactionIsolationLevel::ReadUncommitted,
            TransactionIsolationLevel::ReadCommitted,
            TransactionIsolationLevel::RepeatableRead,
            TransactionIsolationLevel::Serializable,
        ] {
            assert!(platform.set_transaction_isolation_sql(level).is_ok());
        }
    }

    #[test]
    fn test_create_table_uses_bytea_and_jsonb() {
        let platform = PostgresPlatform::new();
        let mut table = Table::new("docs");
        table.columns.push(Column::new("body", PortableType::Json));
        table.columns.push(Column::new("raw", PortableType::Blob));
        let statements = platform.create_table_sql(&table).unwrap();
        assert!(statements[0].contains("\"body\" JSONB"));
        assert!(statements[0].contains("\"raw\" BYTEA"));
    }

    #[test]
    fn test_timestamp_mappings() {
        let platform = PostgresPlatform::new();
        assert_eq!(
            platform.portable_type_for("timestamptz").unwrap(),
            PortableType::DateTimeTz
        );
        assert_eq!(
            platform
                .portable_type_for("timestamp without time zone")
                .unwrap(),
            PortableType::DateTime
        );
    }
}
