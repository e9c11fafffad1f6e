//! Native SQLite connection over SQLx.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column as _, ConnectOptions, Row as _, TypeInfo as _, ValueRef as _};
use tracing::info;

use crate::config::ConnectionParams;
use crate::core::traits::{DriverConnection, DriverResult, NativeError, RowSet};
use crate::core::value::SqlValue;

/// One live SQLite connection (file-backed or in-memory).
pub struct SqliteNativeConnection {
    conn: SqliteConnection,
}

impl SqliteNativeConnection {
    /// Open a connection. `memory` wins over `path`; with neither set the
    /// database is in-memory.
    pub async fn open(params: &ConnectionParams) -> DriverResult<Self> {
        let options = if params.memory || params.path.is_none() {
            SqliteConnectOptions::new().in_memory(true)
        } else {
            let path = params.path.as_deref().unwrap_or_default();
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
        };

        let conn = options.connect().await.map_err(to_native)?;
        info!(
            path = params.path.as_deref().unwrap_or(":memory:"),
            "opened SQLite database"
        );
        Ok(Self { conn })
    }
}

#[async_trait]
impl DriverConnection for SqliteNativeConnection {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> DriverResult<RowSet> {
        let query = bind_params(sqlx::query(sql), params);
        let rows: Vec<SqliteRow> = query
            .fetch_all(&mut self.conn)
            .await
            .map_err(to_native)?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let rows = rows.iter().map(decode_row).collect();
        Ok(RowSet { columns, rows })
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DriverResult<u64> {
        let query = bind_params(sqlx::query(sql), params);
        let result = query.execute(&mut self.conn).await.map_err(to_native)?;
        Ok(result.rows_affected())
    }

    async fn server_version(&mut self) -> DriverResult<Option<String>> {
        let row: (String,) = sqlx::query_as("SELECT sqlite_version()")
            .fetch_one(&mut self.conn)
            .await
            .map_err(to_native)?;
        Ok(Some(row.0))
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_params<'q>(mut query: SqliteQuery<'q>, params: &[SqlValue]) -> SqliteQuery<'q> {
    for value in params {
        query = match value {
            SqlValue::Null => query.bind(Option::<String>::None),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::I16(v) => query.bind(i32::from(*v)),
            SqlValue::I32(v) => query.bind(*v),
            SqlValue::I64(v) => query.bind(*v),
            SqlValue::F64(v) => query.bind(*v),
            SqlValue::Decimal(v) => query.bind(v.to_string()),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Bytes(v) => query.bind(v.clone()),
            SqlValue::Uuid(v) => query.bind(v.to_string()),
            SqlValue::Date(v) => query.bind(*v),
            SqlValue::Time(v) => query.bind(*v),
            SqlValue::DateTime(v) => query.bind(*v),
            SqlValue::DateTimeTz(v) => query.bind(v.naive_utc()),
        };
    }
    query
}

/// Decode one row by SQLite's storage classes.
fn decode_row(row: &SqliteRow) -> Vec<SqlValue> {
    row.columns()
        .iter()
        .map(|col| {
            let i = col.ordinal();
            let is_null = row.try_get_raw(i).map(|v| v.is_null()).unwrap_or(true);
            if is_null {
                return SqlValue::Null;
            }
            match col.type_info().name() {
                "BOOLEAN" => row
                    .try_get::<bool, _>(i)
                    .map(SqlValue::Bool)
                    .unwrap_or(SqlValue::Null),
                "INTEGER" | "INT8" => row
                    .try_get::<i64, _>(i)
                    .map(SqlValue::I64)
                    .unwrap_or(SqlValue::Null),
                "REAL" => row
                    .try_get::<f64, _>(i)
                    .map(SqlValue::F64)
                    .unwrap_or(SqlValue::Null),
                "BLOB" => row
                    .try_get::<Vec<u8>, _>(i)
                    .map(SqlValue::Bytes)
                    .unwrap_or(SqlValue::Null),
                "DATE" => row
                    .try_get::<chrono::NaiveDate, _>(i)
                    .map(SqlValue::Date)
                    .unwrap_or(SqlValue::Null),
                "TIME" => row
                    .try_get::<chrono::NaiveTime, _>(i)
                    .map(SqlValue::Time)
                    .unwrap_or(SqlValue::Null),
                "DATETIME" => row
                    .try_get::<chrono::NaiveDateTime, _>(i)
                    .map(SqlValue::DateTime)
                    .unwrap_or(SqlValue::Null),
                _ => row
                    .try_get::<String, _>(i)
                    .map(SqlValue::Text)
                    .unwrap_or(SqlValue::Null),
            }
        })
        .collect()
}

/// Translate a SQLx error into the raw native form. SQLite reports most
/// conditions textually, so the message is the classifier's main input.
pub(crate) fn to_native(error: sqlx::Error) -> NativeError {
    match &error {
        sqlx::Error::Database(db) => {
            let mut native = NativeError::message(db.message());
            if let Some(code) = db.code() {
                if let Ok(code) = code.parse::<i64>() {
                    native = native.with_code(code);
                }
            }
            native
        }
        other => NativeError::message(other.to_string()),
    }
}
