//! The dialect engine (Strategy pattern).
//!
//! A [`Platform`] translates portable schema/DDL/DML intents into
//! backend-specific SQL text and answers capability queries. One platform
//! instance exists per connection; it is stateless after construction apart
//! from its lazily-built reserved-keyword list.
//!
//! Shared SQL generation lives in default method bodies and in the
//! free-standing builders at the bottom of this module, so backend
//! implementations override only what actually differs.

pub mod keywords;

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::core::schema::{Column, PortableType, Sequence, Table, TableDiff};
use crate::error::{DbalError, Result};

pub use keywords::KeywordList;

/// Position argument of a trim expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimMode {
    Leading,
    Trailing,
    Both,
}

/// Unit of a date arithmetic interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateIntervalUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl DateIntervalUnit {
    /// The SQL keyword for this unit.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            DateIntervalUnit::Second => "SECOND",
            DateIntervalUnit::Minute => "MINUTE",
            DateIntervalUnit::Hour => "HOUR",
            DateIntervalUnit::Day => "DAY",
            DateIntervalUnit::Week => "WEEK",
            DateIntervalUnit::Month => "MONTH",
            DateIntervalUnit::Quarter => "QUARTER",
            DateIntervalUnit::Year => "YEAR",
        }
    }
}

/// Transaction isolation levels in the portable model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionIsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl TransactionIsolationLevel {
    /// The ANSI keyword phrase for this level.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            TransactionIsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            TransactionIsolationLevel::ReadCommitted => "READ COMMITTED",
            TransactionIsolationLevel::RepeatableRead => "REPEATABLE READ",
            TransactionIsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// SQL syntax strategy for one database backend.
///
/// Every method either has a portable default here or must be provided by
/// the backend; a backend that cannot express an operation reports the
/// typed not-supported condition instead of emitting invalid SQL.
pub trait Platform: Send + Sync + Debug {
    /// The dialect identifier ("mysql", "pgsql", "sqlite", "soqol").
    fn name(&self) -> &'static str;

    // ===== Quoting =====

    /// The character used for identifier quoting.
    fn identifier_quote_char(&self) -> char {
        '"'
    }

    /// Quote a single identifier, escaping embedded quote characters by
    /// doubling them.
    fn quote_single_identifier(&self, identifier: &str) -> String {
        let q = self.identifier_quote_char();
        let doubled = format!("{q}{q}");
        format!("{q}{}{q}", identifier.replace(q, &doubled))
    }

    /// Quote an identifier, treating dots as chain separators so that
    /// `schema.table` quotes each part independently.
    fn quote_identifier(&self, identifier: &str) -> String {
        identifier
            .split('.')
            .map(|part| self.quote_single_identifier(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Escape a string literal. This only doubles the literal quote
    /// character; it is not an injection barrier for untrusted input.
    fn quote_string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    // ===== Reserved keywords =====

    /// The reserved-keyword list of this dialect, constructed once per
    /// platform instance and reused.
    fn keywords(&self) -> &KeywordList;

    // ===== Type mapping =====

    /// Map a backend-native type keyword to its portable type.
    ///
    /// The mapping table is total over every keyword introspection can
    /// report; an unmapped keyword is a loud failure, never a guess.
    fn portable_type_for(&self, db_type: &str) -> Result<PortableType>;

    /// Whether a native type keyword has a portable mapping.
    fn has_type_mapping_for(&self, db_type: &str) -> bool {
        self.portable_type_for(db_type).is_ok()
    }

    // ===== Type declarations =====

    fn boolean_type_sql(&self, _column: &Column) -> String {
        "BOOLEAN".to_string()
    }

    fn smallint_type_sql(&self, _column: &Column) -> String {
        "SMALLINT".to_string()
    }

    fn integer_type_sql(&self, _column: &Column) -> String {
        "INTEGER".to_string()
    }

    fn bigint_type_sql(&self, _column: &Column) -> String {
        "BIGINT".to_string()
    }

    fn float_type_sql(&self, _column: &Column) -> String {
        "DOUBLE PRECISION".to_string()
    }

    /// Decimal declaration. Precision and scale appear only when given:
    /// `DECIMAL(10, 2)`, `DECIMAL(10)` or bare `DECIMAL`.
    fn decimal_type_sql(&self, column: &Column) -> String {
        match (column.precision, column.scale) {
            (Some(p), Some(s)) => format!("DECIMAL({p}, {s})"),
            (Some(p), None) => format!("DECIMAL({p})"),
            _ => "DECIMAL".to_string(),
        }
    }

    /// Character type declaration: CHAR when fixed, VARCHAR otherwise,
    /// with a conventional default length of 255.
    fn string_type_sql(&self, column: &Column) -> Result<String> {
        let length = column.length.unwrap_or(255);
        Ok(if column.fixed {
            format!("CHAR({length})")
        } else {
            format!("VARCHAR({length})")
        })
    }

    /// Binary type declaration: BINARY when fixed, VARBINARY otherwise.
    fn binary_type_sql(&self, column: &Column) -> Result<String> {
        let length = column.length.unwrap_or(255);
        Ok(if column.fixed {
            format!("BINARY({length})")
        } else {
            format!("VARBINARY({length})")
        })
    }

    fn text_type_sql(&self, _column: &Column) -> String {
        "CLOB".to_string()
    }

    fn blob_type_sql(&self, _column: &Column) -> String {
        "BLOB".to_string()
    }

    fn date_type_sql(&self, _column: &Column) -> String {
        "DATE".to_string()
    }

    fn time_type_sql(&self, _column: &Column) -> String {
        "TIME".to_string()
    }

    fn datetime_type_sql(&self, _column: &Column) -> String {
        "TIMESTAMP".to_string()
    }

    /// Timestamp with timezone; backends without a dedicated type fall back
    /// to the plain timestamp declaration.
    fn datetime_tz_type_sql(&self, column: &Column) -> String {
        self.datetime_type_sql(column)
    }

    /// GUID declaration; maps to CHAR(36) unless the backend has a native
    /// type.
    fn guid_type_sql(&self, _column: &Column) -> String {
        "CHAR(36)".to_string()
    }

    /// JSON declaration; stored as unbounded text unless the backend has a
    /// native type.
    fn json_type_sql(&self, column: &Column) -> String {
        self.text_type_sql(column)
    }

    /// Full type declaration for a column, dispatched on its portable type.
    fn type_declaration_sql(&self, column: &Column) -> Result<String> {
        Ok(match column.portable_type {
            PortableType::Boolean => self.boolean_type_sql(column),
            PortableType::SmallInt => self.smallint_type_sql(column),
            PortableType::Integer => self.integer_type_sql(column),
            PortableType::BigInt => self.bigint_type_sql(column),
            PortableType::Float => self.float_type_sql(column),
            PortableType::Decimal => self.decimal_type_sql(column),
            PortableType::String => self.string_type_sql(column)?,
            PortableType::Text => self.text_type_sql(column),
            PortableType::Binary => self.binary_type_sql(column)?,
            PortableType::Blob => self.blob_type_sql(column),
            PortableType::Date => self.date_type_sql(column),
            PortableType::Time => self.time_type_sql(column),
            PortableType::DateTime => self.datetime_type_sql(column),
            PortableType::DateTimeTz => self.datetime_tz_type_sql(column),
            PortableType::Guid => self.guid_type_sql(column),
            PortableType::Json => self.json_type_sql(column),
        })
    }

    // ===== Expressions =====

    /// Substring expression over SQL fragments (column references or
    /// literals), ANSI form by default.
    fn substring_expression(&self, string: &str, start: &str, length: Option<&str>) -> String {
        match length {
            Some(length) => format!("SUBSTRING({string} FROM {start} FOR {length})"),
            None => format!("SUBSTRING({string} FROM {start})"),
        }
    }

    /// Trim expression. `trim_char`, when given, must already be a quoted
    /// literal. ANSI form by default.
    fn trim_expression(&self, expr: &str, mode: TrimMode, trim_char: Option<&str>) -> String {
        let position = match mode {
            TrimMode::Leading => "LEADING",
            TrimMode::Trailing => "TRAILING",
            TrimMode::Both => "BOTH",
        };
        match (mode, trim_char) {
            (TrimMode::Both, None) => format!("TRIM({expr})"),
            (_, None) => format!("TRIM({position} FROM {expr})"),
            (_, Some(c)) => format!("TRIM({position} {c} FROM {expr})"),
        }
    }

    /// Concatenation expression, ANSI `||` by default.
    fn concat_expression(&self, parts: &[&str]) -> String {
        parts.join(" || ")
    }

    /// Position of `needle` inside `haystack`. The optional start offset is
    /// not expressible in the ANSI form and is rejected by default.
    fn locate_expression(&self, haystack: &str, needle: &str, start: Option<&str>) -> Result<String> {
        match start {
            None => Ok(format!("POSITION({needle} IN {haystack})")),
            Some(_) => Err(DbalError::not_supported(
                "locate with a start offset".to_string(),
            )),
        }
    }

    /// Expression yielding the currently selected database.
    fn current_database_expression(&self) -> Result<String>;

    /// The regular-expression match operator.
    fn regexp_expression(&self) -> Result<String> {
        Err(DbalError::not_supported("regular expression matching"))
    }

    /// Date arithmetic: add `interval` units to `date`. A negative interval
    /// subtracts; implementations must keep the sign observable in the
    /// generated SQL.
    fn date_interval_expression(
        &self,
        _date: &str,
        _interval: i64,
        _unit: DateIntervalUnit,
    ) -> Result<String> {
        Err(DbalError::not_supported("date interval arithmetic"))
    }

    fn current_timestamp_sql(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    // ===== Databases and schemas =====

    fn create_database_sql(&self, name: &str) -> Result<String> {
        Ok(format!("CREATE DATABASE {}", self.quote_identifier(name)))
    }

    fn drop_database_sql(&self, name: &str) -> Result<String> {
        Ok(format!("DROP DATABASE {}", self.quote_identifier(name)))
    }

    fn create_schema_sql(&self, name: &str) -> Result<String> {
        if self.supports_schemas() {
            Ok(format!("CREATE SCHEMA {}", self.quote_identifier(name)))
        } else {
            Err(DbalError::not_supported("schemas"))
        }
    }

    fn drop_schema_sql(&self, name: &str) -> Result<String> {
        if self.supports_schemas() {
            Ok(format!("DROP SCHEMA {}", self.quote_identifier(name)))
        } else {
            Err(DbalError::not_supported("schemas"))
        }
    }

    // ===== Sequences =====

    fn create_sequence_sql(&self, _sequence: &Sequence) -> Result<String> {
        Err(DbalError::not_supported("sequences"))
    }

    fn alter_sequence_sql(&self, _sequence: &Sequence) -> Result<String> {
        Err(DbalError::not_supported("sequences"))
    }

    fn drop_sequence_sql(&self, name: &str) -> Result<String> {
        if self.supports_sequences() {
            Ok(format!("DROP SEQUENCE {}", self.quote_identifier(name)))
        } else {
            Err(DbalError::not_supported("sequences"))
        }
    }

    /// Expression yielding the next value of a sequence.
    fn sequence_next_val_sql(&self, _name: &str) -> Result<String> {
        Err(DbalError::not_supported("sequences"))
    }

    // ===== Tables, views, indexes =====

    /// The statements creating a table, its constraints and its secondary
    /// indexes, in execution order.
    fn create_table_sql(&self, table: &Table) -> Result<Vec<String>> {
        build_create_table(self.as_platform(), table)
    }

    /// Declaration of one column inside CREATE TABLE.
    fn column_declaration_sql(&self, column: &Column) -> Result<String> {
        build_column_declaration(self.as_platform(), column)
    }

    /// The DEFAULT clause for a column declaration, empty when the column
    /// has no default.
    fn default_value_declaration_sql(&self, column: &Column) -> String {
        build_default_clause(self.as_platform(), column)
    }

    /// Suffix marking an identity column in a column declaration
    /// (e.g. `AUTO_INCREMENT`); empty for backends that use other syntax.
    fn identity_declaration_sql(&self) -> &'static str {
        ""
    }

    /// Backend-specific trailing clause of CREATE TABLE (engine, charset).
    fn table_options_sql(&self, _options: &BTreeMap<String, String>) -> String {
        String::new()
    }

    /// Statements applying a table diff. Backends support or reject each
    /// diff kind explicitly.
    fn alter_table_sql(&self, _diff: &TableDiff) -> Result<Vec<String>> {
        Err(DbalError::not_supported("alter table"))
    }

    fn drop_table_sql(&self, name: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(name))
    }

    fn create_index_sql(&self, index: &crate::core::schema::Index, table: &str) -> String {
        let unique = if index.is_unique { "UNIQUE " } else { "" };
        let columns = index
            .columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE {unique}INDEX {} ON {} ({columns})",
            self.quote_identifier(&index.name),
            self.quote_identifier(table)
        )
    }

    fn drop_index_sql(&self, name: &str, _table: &str) -> String {
        format!("DROP INDEX {}", self.quote_identifier(name))
    }

    fn create_view_sql(&self, name: &str, sql: &str) -> String {
        format!("CREATE VIEW {} AS {sql}", self.quote_identifier(name))
    }

    fn drop_view_sql(&self, name: &str) -> String {
        format!("DROP VIEW {}", self.quote_identifier(name))
    }

    // ===== Query modification =====

    /// Append the dialect's LIMIT/OFFSET form to a query.
    fn modify_limit_query(&self, query: &str, limit: Option<u64>, offset: Option<u64>) -> String {
        let mut sql = query.to_string();
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }

    // ===== Savepoints =====

    fn create_savepoint_sql(&self, name: &str) -> String {
        format!("SAVEPOINT {name}")
    }

    fn release_savepoint_sql(&self, name: &str) -> String {
        format!("RELEASE SAVEPOINT {name}")
    }

    fn rollback_savepoint_sql(&self, name: &str) -> String {
        format!("ROLLBACK TO SAVEPOINT {name}")
    }

    fn supports_savepoints(&self) -> bool {
        true
    }

    // ===== Transaction isolation =====

    /// Whether the backend accepts the given isolation level.
    fn supports_isolation_level(&self, _level: TransactionIsolationLevel) -> bool {
        true
    }

    /// SQL setting the transaction isolation level; unsupported levels are
    /// rejected with the typed not-supported condition.
    fn set_transaction_isolation_sql(&self, level: TransactionIsolationLevel) -> Result<String> {
        if !self.supports_isolation_level(level) {
            return Err(DbalError::not_supported(format!(
                "isolation level {}",
                level.as_sql()
            )));
        }
        Ok(format!(
            "SET TRANSACTION ISOLATION LEVEL {}",
            level.as_sql()
        ))
    }

    fn default_transaction_isolation_level(&self) -> TransactionIsolationLevel {
        TransactionIsolationLevel::ReadCommitted
    }

    // ===== Capability flags =====

    /// Whether the backend has sequences.
    fn supports_sequences(&self) -> bool {
        false
    }

    /// Whether the backend has identity columns. When it does not, the
    /// create-table builder emulates autoincrement through a sequence plus
    /// a next-value default.
    fn supports_identity_columns(&self) -> bool {
        true
    }

    /// Whether the backend has database schemas (namespaces).
    fn supports_schemas(&self) -> bool {
        false
    }

    /// Upcast helper so default method bodies can hand `self` to the
    /// free-standing builders.
    fn as_platform(&self) -> &dyn Platform;
}

// ===== Shared builders =====
//
// These are free functions rather than default methods so an overriding
// implementation can still reuse the generic shape (e.g. after rewriting
// autoincrement columns).

/// Generic CREATE TABLE builder: column list, primary key, foreign keys,
/// table options, then secondary indexes as separate statements.
pub(crate) fn build_create_table(platform: &dyn Platform, table: &Table) -> Result<Vec<String>> {
    let mut parts = Vec::with_capacity(table.columns.len() + 1);
    for column in &table.columns {
        parts.push(platform.column_declaration_sql(column)?);
    }

    if !table.primary_key.is_empty() {
        let pk = table
            .primary_key
            .iter()
            .map(|c| platform.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("PRIMARY KEY ({pk})"));
    }

    for fk in &table.foreign_keys {
        parts.push(build_foreign_key_declaration(platform, fk));
    }

    let mut sql = format!(
        "CREATE TABLE {} ({})",
        platform.quote_identifier(&table.name),
        parts.join(", ")
    );
    let options = platform.table_options_sql(&table.options);
    if !options.is_empty() {
        sql.push(' ');
        sql.push_str(&options);
    }

    let mut statements = vec![sql];
    for index in table.indexes.iter().filter(|i| !i.is_primary) {
        statements.push(platform.create_index_sql(index, &table.name));
    }
    Ok(statements)
}

/// Generic column declaration: name, type, default, nullability, identity.
pub(crate) fn build_column_declaration(platform: &dyn Platform, column: &Column) -> Result<String> {
    let mut sql = format!(
        "{} {}",
        platform.quote_identifier(&column.name),
        platform.type_declaration_sql(column)?
    );

    let default = platform.default_value_declaration_sql(column);
    if !default.is_empty() {
        sql.push(' ');
        sql.push_str(&default);
    }

    if column.notnull {
        sql.push_str(" NOT NULL");
    }

    if column.autoincrement && platform.supports_identity_columns() {
        let identity = platform.identity_declaration_sql();
        if !identity.is_empty() {
            sql.push(' ');
            sql.push_str(identity);
        }
    }

    Ok(sql)
}

/// Generic DEFAULT clause. Numeric and boolean defaults plus the current
/// timestamp function stay unquoted; everything else is a string literal.
pub(crate) fn build_default_clause(platform: &dyn Platform, column: &Column) -> String {
    let Some(default) = &column.default else {
        return String::new();
    };
    let raw = column.portable_type.is_numeric()
        || column.portable_type == PortableType::Boolean
        || default.eq_ignore_ascii_case("CURRENT_TIMESTAMP");
    if raw {
        format!("DEFAULT {default}")
    } else {
        format!("DEFAULT {}", platform.quote_string_literal(default))
    }
}

/// Foreign key clause inside CREATE TABLE.
pub(crate) fn build_foreign_key_declaration(
    platform: &dyn Platform,
    fk: &crate::core::schema::ForeignKeyConstraint,
) -> String {
    let columns = fk
        .columns
        .iter()
        .map(|c| platform.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let foreign_columns = fk
        .foreign_columns
        .iter()
        .map(|c| platform.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!(
        "CONSTRAINT {} FOREIGN KEY ({columns}) REFERENCES {} ({foreign_columns})",
        platform.quote_identifier(&fk.name),
        platform.quote_identifier(&fk.foreign_table)
    );
    if let Some(action) = &fk.on_delete {
        sql.push_str(&format!(" ON DELETE {action}"));
    }
    if let Some(action) = &fk.on_update {
        sql.push_str(&format!(" ON UPDATE {action}"));
    }
    sql
}

/// Generic CREATE SEQUENCE builder. The cache clause appears only when the
/// cache size is greater than 1.
pub(crate) fn build_create_sequence(platform: &dyn Platform, sequence: &Sequence) -> String {
    let mut sql = format!(
        "CREATE SEQUENCE {} INCREMENT BY {} START WITH {}",
        platform.quote_identifier(&sequence.name),
        sequence.increment_by,
        sequence.start_with
    );
    if let Some(cache) = sequence.cache {
        if cache > 1 {
            sql.push_str(&format!(" CACHE {cache}"));
        }
    }
    sql
}

/// Generic ALTER SEQUENCE builder.
pub(crate) fn build_alter_sequence(platform: &dyn Platform, sequence: &Sequence) -> String {
    format!(
        "ALTER SEQUENCE {} INCREMENT BY {}",
        platform.quote_identifier(&sequence.name),
        sequence.increment_by
    )
}
