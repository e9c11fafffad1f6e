//! Native MySQL connection over SQLx.

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column as _, ConnectOptions, Row as _, TypeInfo as _, ValueRef as _};
use tracing::info;

use crate::config::ConnectionParams;
use crate::core::traits::{DriverConnection, DriverResult, NativeError, RowSet};
use crate::core::value::SqlValue;

/// One live MySQL connection.
pub struct MysqlNativeConnection {
    conn: MySqlConnection,
}

impl MysqlNativeConnection {
    /// Open a connection with the given resolved parameters.
    pub async fn open(params: &ConnectionParams) -> DriverResult<Self> {
        let mut options = MySqlConnectOptions::new();
        if let Some(host) = &params.host {
            options = options.host(host);
        }
        if let Some(port) = params.port {
            options = options.port(port);
        }
        if let Some(user) = &params.user {
            options = options.username(user);
        }
        if let Some(password) = &params.password {
            options = options.password(password);
        }
        if let Some(dbname) = &params.dbname {
            options = options.database(dbname);
        }
        if let Some(charset) = &params.charset {
            options = options.charset(charset);
        }
        if let Some(socket) = &params.unix_socket {
            options = options.socket(socket);
        }

        let conn = options.connect().await.map_err(to_native)?;
        info!(
            host = params.host.as_deref().unwrap_or("localhost"),
            dbname = params.dbname.as_deref().unwrap_or(""),
            "connected to MySQL"
        );
        Ok(Self { conn })
    }
}

#[async_trait]
impl DriverConnection for MysqlNativeConnection {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> DriverResult<RowSet> {
        let query = bind_params(sqlx::query(sql), params);
        let rows: Vec<MySqlRow> = query
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
        let row: (String,) = sqlx::query_as("SELECT VERSION()")
            .fetch_one(&mut self.conn)
            .await
            .map_err(to_native)?;
        Ok(Some(row.0))
    }
}

type MysqlQuery<'q> = sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments>;

fn bind_params<'q>(mut query: MysqlQuery<'q>, params: &[SqlValue]) -> MysqlQuery<'q> {
    for value in params {
        query = match value {
            SqlValue::Null => query.bind(Option::<String>::None),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::I16(v) => query.bind(*v),
            SqlValue::I32(v) => query.bind(*v),
            SqlValue::I64(v) => query.bind(*v),
            SqlValue::F64(v) => query.bind(*v),
            SqlValue::Decimal(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Bytes(v) => query.bind(v.clone()),
            // MySQL has no native UUID type; bind the canonical text form.
            SqlValue::Uuid(v) => query.bind(v.to_string()),
            SqlValue::Date(v) => query.bind(*v),
            SqlValue::Time(v) => query.bind(*v),
            SqlValue::DateTime(v) => query.bind(*v),
            SqlValue::DateTimeTz(v) => query.bind(v.naive_utc()),
        };
    }
    query
}

/// Decode one row by the declared column types, falling back to text for
/// anything unrecognized.
fn decode_row(row: &MySqlRow) -> Vec<SqlValue> {
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
                "TINYINT" => row
                    .try_get::<i8, _>(i)
                    .map(|v| SqlValue::I16(i16::from(v)))
                    .unwrap_or(SqlValue::Null),
                "SMALLINT" | "TINYINT UNSIGNED" | "YEAR" => row
                    .try_get::<i16, _>(i)
                    .map(SqlValue::I16)
                    .unwrap_or(SqlValue::Null),
                "INT" | "MEDIUMINT" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" => row
                    .try_get::<i32, _>(i)
                    .map(SqlValue::I32)
                    .unwrap_or(SqlValue::Null),
                "BIGINT" | "INT UNSIGNED" => row
                    .try_get::<i64, _>(i)
                    .map(SqlValue::I64)
                    .unwrap_or(SqlValue::Null),
                "BIGINT UNSIGNED" => row
                    .try_get::<u64, _>(i)
                    .map(|v| SqlValue::I64(v as i64))
                    .unwrap_or(SqlValue::Null),
                "FLOAT" => row
                    .try_get::<f32, _>(i)
                    .map(|v| SqlValue::F64(f64::from(v)))
                    .unwrap_or(SqlValue::Null),
                "DOUBLE" => row
                    .try_get::<f64, _>(i)
                    .map(SqlValue::F64)
                    .unwrap_or(SqlValue::Null),
                "DECIMAL" => row
                    .try_get::<rust_decimal::Decimal, _>(i)
                    .map(SqlValue::Decimal)
                    .unwrap_or(SqlValue::Null),
                "DATE" => row
                    .try_get::<chrono::NaiveDate, _>(i)
                    .map(SqlValue::Date)
                    .unwrap_or(SqlValue::Null),
                "TIME" => row
                    .try_get::<chrono::NaiveTime, _>(i)
                    .map(SqlValue::Time)
                    .unwrap_or(SqlValue::Null),
                "DATETIME" | "TIMESTAMP" => row
                    .try_get::<chrono::NaiveDateTime, _>(i)
                    .map(SqlValue::DateTime)
                    .unwrap_or(SqlValue::Null),
                "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB"
                | "BIT" | "GEOMETRY" => row
                    .try_get::<Vec<u8>, _>(i)
                    .map(SqlValue::Bytes)
                    .unwrap_or(SqlValue::Null),
                _ => row
                    .try_get::<String, _>(i)
                    .map(SqlValue::Text)
                    .unwrap_or(SqlValue::Null),
            }
        })
        .collect()
}

/// Translate a SQLx error into the raw native form the exception converter
/// classifies. Non-database failures carry no code and classify as
/// connection errors.
pub(crate) fn to_native(error: sqlx::Error) -> NativeError {
    match &error {
        sqlx::Error::Database(db) => {
            let mut native = NativeError::message(db.message());
            if let Some(state) = db.code() {
                native = native.with_sqlstate(state.to_string());
            }
            if let Some(mysql) = db.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>() {
                native = native.with_code(i64::from(mysql.number()));
            }
            native
        }
        other => NativeError::message(other.to_string()),
    }
}
