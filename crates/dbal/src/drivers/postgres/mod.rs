//! PostgreSQL driver.

pub mod connection;
pub mod platform;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ConnectionParams;
use crate::core::traits::{
    Driver, DriverConnection, DriverResult, ExceptionConverter, NativeError,
};
use crate::error::{DbalError, DriverErrorKind};
use crate::platform::Platform;

pub use connection::PostgresNativeConnection;
pub use platform::PostgresPlatform;
pub use schema::PostgresSchemaManager;

/// Driver for PostgreSQL servers.
#[derive(Debug, Clone, Default)]
pub struct PostgresDriver;

impl PostgresDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for PostgresDriver {
    fn name(&self) -> &'static str {
        "pgsql"
    }

    async fn connect(&self, params: &ConnectionParams) -> DriverResult<Box<dyn DriverConnection>> {
        Ok(Box::new(PostgresNativeConnection::open(params).await?))
    }

    fn platform(&self, _server_version: Option<&str>) -> Arc<dyn Platform> {
        Arc::new(PostgresPlatform::new())
    }

    fn exception_converter(&self) -> Arc<dyn ExceptionConverter> {
        Arc::new(PostgresExceptionConverter)
    }
}

/// Classifies PostgreSQL SQLSTATE codes into the portable taxonomy.
#[derive(Debug, Clone, Default)]
pub struct PostgresExceptionConverter;

impl ExceptionConverter for PostgresExceptionConverter {
    fn convert(&self, error: NativeError) -> DbalError {
        let kind = match error.sqlstate.as_deref() {
            Some("23505") => DriverErrorKind::UniqueConstraintViolation,
            Some("23502") => DriverErrorKind::NotNullConstraintViolation,
            Some("42601") => DriverErrorKind::SyntaxError,
            Some("42P07") => DriverErrorKind::TableExists,
            Some("42P01") => DriverErrorKind::TableNotFound,
            Some("42703") => DriverErrorKind::InvalidFieldName,
            Some("42702") => DriverErrorKind::NonUniqueFieldName,
            Some(state) if state.starts_with("08") => DriverErrorKind::ConnectionError,
            Some(_) => DriverErrorKind::Other,
            // Failures without a SQLSTATE come from the transport layer.
            None => DriverErrorKind::ConnectionError,
        };
        DbalError::Driver {
            kind,
            code: error.code,
            sqlstate: error.sqlstate,
            message: error.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(state: &str) -> DbalError {
        PostgresExceptionConverter.convert(NativeError::message("boom").with_sqlstate(state))
    }

    #[test]
    fn test_sqlstate_classification() {
        assert_eq!(
            convert("23505").driver_kind(),
            Some(DriverErrorKind::UniqueConstraintViolation)
        );
        assert_eq!(
            convert("42P01").driver_kind(),
            Some(DriverErrorKind::TableNotFound)
        );
        assert_eq!(
            convert("08006").driver_kind(),
            Some(DriverErrorKind::ConnectionError)
        );
        assert_eq!(convert("22003").driver_kind(), Some(DriverErrorKind::Other));
    }

    #[test]
    fn test_message_survives_classification() {
        let err = convert("42601");
        assert!(err.to_string().contains("boom"));
        assert_eq!(err.driver_kind(), Some(DriverErrorKind::SyntaxError));
    }
}
