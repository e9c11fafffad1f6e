//! Core capability traits for the abstraction layer.
//!
//! This module defines the seams between the portable layer and the
//! backend-specific plugins:
//!
//! - [`Driver`]: opens a native connection and binds the platform and
//!   exception converter for one backend
//! - [`DriverConnection`]: the opaque native connection surface
//! - [`ExceptionConverter`]: maps backend error codes to the portable taxonomy
//! - [`Middleware`]: decorates a driver transparently before use

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ConnectionParams;
use crate::core::value::SqlValue;
use crate::error::DbalError;
use crate::platform::Platform;

/// An error as the native client reported it, before classification.
///
/// The exception converter turns this into a [`DbalError::Driver`] carrying
/// the original code and message losslessly.
#[derive(Debug, Clone)]
pub struct NativeError {
    /// Backend-specific numeric error code, when reported.
    pub code: Option<i64>,

    /// Five-character SQLSTATE, when reported.
    pub sqlstate: Option<String>,

    /// The backend's message text.
    pub message: String,
}

impl NativeError {
    /// An error carrying only a message, typically a transport failure.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            sqlstate: None,
            message: message.into(),
        }
    }

    /// Attach a SQLSTATE.
    #[must_use]
    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }

    /// Attach a numeric vendor code.
    #[must_use]
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }
}

/// Result type for operations at the native driver boundary.
pub type DriverResult<T> = std::result::Result<T, NativeError>;

/// Rows returned by a native query, already decoded to portable values.
#[derive(Debug, Default)]
pub struct RowSet {
    /// Column names, in result order, as the backend reported them.
    pub columns: Vec<String>,

    /// Row data; each row has one value per column.
    pub rows: Vec<Vec<SqlValue>>,
}

impl RowSet {
    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the result is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by name, case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// First value of the first row, for single-cell queries.
    pub fn single_value(&self) -> Option<&SqlValue> {
        self.rows.first().and_then(|r| r.first())
    }
}

/// The opaque native connection capability.
///
/// One instance wraps one live backend connection for its lifetime. The
/// wire protocol behind it is an external collaborator; this layer only
/// requires query/execute with positional parameters.
#[async_trait]
pub trait DriverConnection: Send {
    /// Run a statement that produces rows.
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> DriverResult<RowSet>;

    /// Run a statement that produces an affected-row count.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DriverResult<u64>;

    /// The backend's reported server version, when available.
    async fn server_version(&mut self) -> DriverResult<Option<String>>;
}

/// Backend plugin entry point.
///
/// A driver is a thin factory: it opens native connections for resolved
/// parameters and names the platform and exception converter the rest of
/// the system should use with them.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Canonical backend family name ("mysql", "pgsql", "sqlite", "soqol").
    fn name(&self) -> &'static str;

    /// Open a native connection with the given resolved parameters.
    async fn connect(&self, params: &ConnectionParams) -> DriverResult<Box<dyn DriverConnection>>;

    /// The dialect engine for this backend. A server version, when known,
    /// lets the driver pick a version-specific dialect.
    fn platform(&self, server_version: Option<&str>) -> Arc<dyn Platform>;

    /// The error classifier for this backend.
    fn exception_converter(&self) -> Arc<dyn ExceptionConverter>;
}

impl std::fmt::Debug for dyn Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver").field("name", &self.name()).finish()
    }
}

/// Maps backend-specific error codes to the portable taxonomy.
///
/// Unmapped codes must fall back to a generic driver-error kind that keeps
/// the original code and message.
pub trait ExceptionConverter: Send + Sync {
    /// Classify a native error.
    fn convert(&self, error: NativeError) -> DbalError;
}

/// Decorator applied around a [`Driver`] before connection use.
///
/// The driver manager applies middlewares in registration order; each may
/// return the driver unchanged or a transparent replacement.
pub trait Middleware: Send + Sync {
    /// Wrap (or pass through) the given driver.
    fn wrap_driver(&self, driver: Arc<dyn Driver>) -> Arc<dyn Driver>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_error_builders() {
        let err = NativeError::message("boom").with_sqlstate("42601").with_code(7);
        assert_eq!(err.sqlstate.as_deref(), Some("42601"));
        assert_eq!(err.code, Some(7));
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn test_rowset_column_index() {
        let rows = RowSet {
            columns: vec!["TABLE_NAME".to_string(), "owner".to_string()],
            rows: vec![vec![SqlValue::Text("t".into()), SqlValue::Text("s".into())]],
        };
        assert_eq!(rows.column_index("table_name"), Some(0));
        assert_eq!(rows.column_index("OWNER"), Some(1));
        assert_eq!(rows.column_index("missing"), None);
        assert_eq!(rows.single_value(), Some(&SqlValue::Text("t".into())));
    }
}
