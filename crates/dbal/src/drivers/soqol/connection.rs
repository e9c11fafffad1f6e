//! Native SOQOL connection over ODBC.
//!
//! No dedicated Rust client exists for this backend; it ships an ODBC
//! driver, so the connection goes through the system driver manager. ODBC
//! is a synchronous text-protocol path here: every value comes back as
//! text, and placeholder binding is emulated client-side with escaped
//! literals.

use async_trait::async_trait;
use odbc_api::{buffers::TextRowSet, ConnectionOptions, Cursor, Environment, ResultSetMetadata};
use tracing::{debug, info};

use crate::config::ConnectionParams;
use crate::core::traits::{DriverConnection, DriverResult, NativeError, RowSet};
use crate::core::value::SqlValue;

const BATCH_SIZE: usize = 1000;
const MAX_STR_LEN: usize = 4096;

/// One live SOQOL connection. The ODBC environment outlives every
/// connection drawn from it; operations reconnect per call, which keeps
/// the borrow local and matches how the driver manager pools internally.
pub struct SoqolNativeConnection {
    env: Environment,
    connection_string: String,
}

impl SoqolNativeConnection {
    /// Open (and verify) a connection with the given resolved parameters.
    pub async fn open(params: &ConnectionParams) -> DriverResult<Self> {
        let env = Environment::new().map_err(|e| {
            NativeError::message(format!(
                "failed to create ODBC environment: {e}. \
                 Make sure an ODBC driver manager and the SOQOL driver are installed."
            ))
        })?;

        let connection_string = build_connection_string(params);
        debug!(
            host = params.host.as_deref().unwrap_or(""),
            dbname = params.dbname.as_deref().unwrap_or(""),
            "connecting to SOQOL via ODBC"
        );

        // Verify connectivity once; the scope drops the borrow before the
        // environment moves into the struct.
        {
            env.connect_with_connection_string(&connection_string, ConnectionOptions::default())
                .map_err(to_native)?;
        }

        info!(
            host = params.host.as_deref().unwrap_or(""),
            dbname = params.dbname.as_deref().unwrap_or(""),
            "connected to SOQOL"
        );
        Ok(Self {
            env,
            connection_string,
        })
    }

    fn connect(&self) -> Result<odbc_api::Connection<'_>, NativeError> {
        self.env
            .connect_with_connection_string(&self.connection_string, ConnectionOptions::default())
            .map_err(to_native)
    }

    /// Execute a statement and fetch every row as text.
    fn run(&self, sql: &str) -> Result<RowSet, NativeError> {
        let conn = self.connect()?;
        let mut result = RowSet::default();

        let Some(mut cursor) = conn.execute(sql, ()).map_err(to_native)? else {
            return Ok(result);
        };

        result.columns = cursor
            .column_names()
            .map_err(to_native)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(to_native)?;
        let num_cols = result.columns.len();

        let mut buffers =
            TextRowSet::for_cursor(BATCH_SIZE, &mut cursor, Some(MAX_STR_LEN)).map_err(to_native)?;
        let mut row_cursor = cursor.bind_buffer(&mut buffers).map_err(to_native)?;

        while let Some(batch) = row_cursor.fetch().map_err(to_native)? {
            for row_idx in 0..batch.num_rows() {
                let mut row = Vec::with_capacity(num_cols);
                for col_idx in 0..num_cols {
                    let value = batch
                        .at(col_idx, row_idx)
                        .map(|bytes| SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()))
                        .unwrap_or(SqlValue::Null);
                    row.push(value);
                }
                result.rows.push(row);
            }
        }

        Ok(result)
    }
}

#[async_trait]
impl DriverConnection for SoqolNativeConnection {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> DriverResult<RowSet> {
        let sql = substitute_placeholders(sql, params)?;
        self.run(&sql)
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DriverResult<u64> {
        let sql = substitute_placeholders(sql, params)?;
        let conn = self.connect()?;
        // The text path does not surface SQLRowCount; DDL statements (the
        // bulk of what runs here) report no count anyway.
        conn.execute(&sql, ()).map_err(to_native)?;
        Ok(0)
    }

    async fn server_version(&mut self) -> DriverResult<Option<String>> {
        Ok(None)
    }
}

fn build_connection_string(params: &ConnectionParams) -> String {
    let driver = params
        .driver_options
        .get("odbc_driver")
        .map(String::as_str)
        .unwrap_or("SOQOL");
    let mut parts = vec![format!("Driver={{{driver}}}")];
    if let Some(host) = &params.host {
        match params.port {
            Some(port) => parts.push(format!("Server={host},{port}")),
            None => parts.push(format!("Server={host}")),
        }
    }
    if let Some(dbname) = &params.dbname {
        parts.push(format!("Database={dbname}"));
    }
    if let Some(user) = &params.user {
        parts.push(format!("UID={user}"));
    }
    if let Some(password) = &params.password {
        parts.push(format!("PWD={password}"));
    }
    let mut s = parts.join(";");
    s.push(';');
    s
}

/// Render positional `?` placeholders as escaped literals. Placeholders
/// inside string literals are left untouched.
fn substitute_placeholders(sql: &str, params: &[SqlValue]) -> Result<String, NativeError> {
    let mut out = String::with_capacity(sql.len() + params.len() * 8);
    let mut values = params.iter();
    let mut in_string = false;
    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_string = !in_string;
                out.push(ch);
            }
            '?' if !in_string => {
                let value = values
                    .next()
                    .ok_or_else(|| NativeError::message("too few parameters for statement"))?;
                out.push_str(&render_literal(value)?);
            }
            _ => out.push(ch),
        }
    }
    if values.next().is_some() {
        return Err(NativeError::message("too many parameters for statement"));
    }
    Ok(out)
}

fn render_literal(value: &SqlValue) -> Result<String, NativeError> {
    Ok(match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(v) => if *v { "1" } else { "0" }.to_string(),
        SqlValue::I16(v) => v.to_string(),
        SqlValue::I32(v) => v.to_string(),
        SqlValue::I64(v) => v.to_string(),
        SqlValue::F64(v) => v.to_string(),
        SqlValue::Decimal(v) => v.to_string(),
        SqlValue::Text(v) => format!("'{}'", v.replace('\'', "''")),
        SqlValue::Uuid(v) => format!("'{v}'"),
        SqlValue::Date(v) => format!("'{}'", v.format("%Y-%m-%d")),
        SqlValue::Time(v) => format!("'{}'", v.format("%H:%M:%S")),
        SqlValue::DateTime(v) => format!("'{}'", v.format("%Y-%m-%d %H:%M:%S")),
        SqlValue::DateTimeTz(v) => format!("'{}'", v.format("%Y-%m-%d %H:%M:%S%:z")),
        SqlValue::Bytes(_) => {
            return Err(NativeError::message(
                "binary parameters are not supported over the ODBC text path",
            ));
        }
    })
}

/// Translate an ODBC error into the raw native form, keeping the SQLSTATE
/// when diagnostics carry one.
fn to_native(error: odbc_api::Error) -> NativeError {
    let message = error.to_string();
    match &error {
        odbc_api::Error::Diagnostics { record, .. } => {
            let state = String::from_utf8_lossy(&record.state.0).into_owned();
            NativeError::message(message).with_sqlstate(state)
        }
        _ => NativeError::message(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_placeholders() {
        let sql = substitute_placeholders(
            "SELECT * FROM t WHERE a = ? AND b = ?",
            &[SqlValue::Text("x'y".into()), SqlValue::I64(7)],
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a = 'x''y' AND b = 7");
    }

    #[test]
    fn test_placeholder_inside_literal_untouched() {
        let sql = substitute_placeholders(
            "SELECT '?' FROM t WHERE a = ?",
            &[SqlValue::Bool(true)],
        )
        .unwrap();
        assert_eq!(sql, "SELECT '?' FROM t WHERE a = 1");
    }

    #[test]
    fn test_parameter_count_mismatch() {
        assert!(substitute_placeholders("SELECT ?", &[]).is_err());
        assert!(substitute_placeholders(
            "SELECT 1",
            &[SqlValue::I64(1)]
        )
        .is_err());
    }

    #[test]
    fn test_connection_string_shape() {
        let mut params = ConnectionParams::default();
        params.host = Some("db1".to_string());
        params.port = Some(7777);
        params.dbname = Some("sales".to_string());
        params.user = Some("app".to_string());
        params.password = Some("secret".to_string());
        assert_eq!(
            build_connection_string(&params),
            "Driver={SOQOL};Server=db1,7777;Database=sales;UID=app;PWD=secret;"
        );
    }
}
