//! Native PostgreSQL connection over tokio-postgres.

use async_trait::async_trait;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, info};

use crate::config::ConnectionParams;
use crate::core::traits::{DriverConnection, DriverResult, NativeError, RowSet};
use crate::core::value::SqlValue;

/// One live PostgreSQL connection.
pub struct PostgresNativeConnection {
    client: Client,
}

impl PostgresNativeConnection {
    /// Open a connection with the given resolved parameters.
    pub async fn open(params: &ConnectionParams) -> DriverResult<Self> {
        let mut config = tokio_postgres::Config::new();
        if let Some(host) = &params.host {
            config.host(host);
        }
        if let Some(socket) = &params.unix_socket {
            config.host_path(socket);
        }
        if let Some(port) = params.port {
            config.port(port);
        }
        if let Some(user) = &params.user {
            config.user(user);
        }
        if let Some(password) = &params.password {
            config.password(password);
        }
        if let Some(dbname) = &params.dbname {
            config.dbname(dbname);
        }

        let (client, connection) = config.connect(NoTls).await.map_err(to_native)?;
        // The connection task drives the socket until the client is dropped.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(error = %e, "postgres connection task ended");
            }
        });

        info!(
            host = params.host.as_deref().unwrap_or("localhost"),
            dbname = params.dbname.as_deref().unwrap_or(""),
            "connected to PostgreSQL"
        );
        Ok(Self { client })
    }
}

#[async_trait]
impl DriverConnection for PostgresNativeConnection {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> DriverResult<RowSet> {
        let owned = to_sql_params(params);
        let refs: Vec<&(dyn ToSql + Sync)> =
            owned.iter().map(|b| &**b as &(dyn ToSql + Sync)).collect();
        let rows = self.client.query(sql, &refs).await.map_err(to_native)?;

        let columns = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect()
            })
            .unwrap_or_default();
        let rows = rows.iter().map(decode_row).collect();
        Ok(RowSet { columns, rows })
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DriverResult<u64> {
        let owned = to_sql_params(params);
        let refs: Vec<&(dyn ToSql + Sync)> =
            owned.iter().map(|b| &**b as &(dyn ToSql + Sync)).collect();
        self.client.execute(sql, &refs).await.map_err(to_native)
    }

    async fn server_version(&mut self) -> DriverResult<Option<String>> {
        let row = self
            .client
            .query_one("SHOW server_version", &[])
            .await
            .map_err(to_native)?;
        Ok(row.try_get::<_, String>(0).ok())
    }
}

fn to_sql_params(params: &[SqlValue]) -> Vec<Box<dyn ToSql + Sync + Send>> {
    params
        .iter()
        .map(|value| -> Box<dyn ToSql + Sync + Send> {
            match value {
                SqlValue::Null => Box::new(Option::<String>::None),
                SqlValue::Bool(v) => Box::new(*v),
                SqlValue::I16(v) => Box::new(*v),
                SqlValue::I32(v) => Box::new(*v),
                SqlValue::I64(v) => Box::new(*v),
                SqlValue::F64(v) => Box::new(*v),
                SqlValue::Decimal(v) => Box::new(*v),
                SqlValue::Text(v) => Box::new(v.clone()),
                SqlValue::Bytes(v) => Box::new(v.clone()),
                SqlValue::Uuid(v) => Box::new(*v),
                SqlValue::Date(v) => Box::new(*v),
                SqlValue::Time(v) => Box::new(*v),
                SqlValue::DateTime(v) => Box::new(*v),
                SqlValue::DateTimeTz(v) => Box::new(*v),
            }
        })
        .collect()
}

/// Decode one row by its reported column types, falling back to text.
fn decode_row(row: &Row) -> Vec<SqlValue> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| match *col.type_() {
            Type::BOOL => opt(row.try_get::<_, Option<bool>>(i)),
            Type::INT2 => opt(row.try_get::<_, Option<i16>>(i)),
            Type::INT4 => opt(row.try_get::<_, Option<i32>>(i)),
            Type::INT8 => opt(row.try_get::<_, Option<i64>>(i)),
            Type::OID => match row.try_get::<_, Option<u32>>(i) {
                Ok(Some(v)) => SqlValue::I64(i64::from(v)),
                _ => SqlValue::Null,
            },
            Type::FLOAT4 => opt(row.try_get::<_, Option<f32>>(i).map(|v| v.map(f64::from))),
            Type::FLOAT8 => opt(row.try_get::<_, Option<f64>>(i)),
            Type::NUMERIC => opt(row.try_get::<_, Option<rust_decimal::Decimal>>(i)),
            Type::BYTEA => opt(row.try_get::<_, Option<Vec<u8>>>(i)),
            Type::UUID => opt(row.try_get::<_, Option<uuid::Uuid>>(i)),
            Type::DATE => opt(row.try_get::<_, Option<chrono::NaiveDate>>(i)),
            Type::TIME => opt(row.try_get::<_, Option<chrono::NaiveTime>>(i)),
            Type::TIMESTAMP => opt(row.try_get::<_, Option<chrono::NaiveDateTime>>(i)),
            Type::TIMESTAMPTZ => opt(row
                .try_get::<_, Option<chrono::DateTime<chrono::FixedOffset>>>(i)),
            _ => opt(row.try_get::<_, Option<String>>(i)),
        })
        .collect()
}

fn opt<T: Into<SqlValue>>(value: Result<Option<T>, tokio_postgres::Error>) -> SqlValue {
    match value {
        Ok(Some(v)) => v.into(),
        _ => SqlValue::Null,
    }
}

/// Translate a tokio-postgres error into the raw native form. The SQLSTATE
/// survives for the converter; transport failures carry only a message.
pub(crate) fn to_native(error: tokio_postgres::Error) -> NativeError {
    let message = error
        .as_db_error()
        .map(|db| db.message().to_string())
        .unwrap_or_else(|| error.to_string());
    let mut native = NativeError::message(message);
    if let Some(state) = error.code() {
        native = native.with_sqlstate(state.code());
    }
    native
}
