//! SQLite driver.

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

pub use connection::SqliteNativeConnection;
pub use platform::SqlitePlatform;
pub use schema::SqliteSchemaManager;

/// Driver for SQLite databases.
#[derive(Debug, Clone, Default)]
pub struct SqliteDriver;

impl SqliteDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn connect(&self, params: &ConnectionParams) -> DriverResult<Box<dyn DriverConnection>> {
        Ok(Box::new(SqliteNativeConnection::open(params).await?))
    }

    fn platform(&self, _server_version: Option<&str>) -> Arc<dyn Platform> {
        Arc::new(SqlitePlatform::new())
    }

    fn exception_converter(&self) -> Arc<dyn ExceptionConverter> {
        Arc::new(SqliteExceptionConverter)
    }
}

/// Classifies SQLite errors. SQLite reports most conditions only in the
/// message text, so classification sniffs the message and falls back to the
/// extended result code where one exists.
#[derive(Debug, Clone, Default)]
pub struct SqliteExceptionConverter;

impl ExceptionConverter for SqliteExceptionConverter {
    fn convert(&self, error: NativeError) -> DbalError {
        let message = error.message.to_ascii_lowercase();
        let kind = if message.contains("unique constraint failed")
            || message.contains("is not unique")
            || message.contains("are not unique")
        {
            DriverErrorKind::UniqueConstraintViolation
        } else if message.contains("not null constraint failed")
            || message.contains("may not be null")
        {
            DriverErrorKind::NotNullConstraintViolation
        } else if message.contains("syntax error") {
            DriverErrorKind::SyntaxError
        } else if message.contains("already exists") {
            DriverErrorKind::TableExists
        } else if message.contains("no such table") {
            DriverErrorKind::TableNotFound
        } else if message.contains("no such column") || message.contains("has no column named") {
            DriverErrorKind::InvalidFieldName
        } else if message.contains("ambiguous column name") {
            DriverErrorKind::NonUniqueFieldName
        } else if message.contains("unable to open database") || error.code.is_none() {
            DriverErrorKind::ConnectionError
        } else {
            DriverErrorKind::Other
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

    fn convert(message: &str) -> DbalError {
        SqliteExceptionConverter.convert(NativeError::message(message).with_code(1))
    }

    #[test]
    fn test_message_classification() {
        assert_eq!(
            convert("UNIQUE constraint failed: users.email").driver_kind(),
            Some(DriverErrorKind::UniqueConstraintViolation)
        );
        assert_eq!(
            convert("NOT NULL constraint failed: users.name").driver_kind(),
            Some(DriverErrorKind::NotNullConstraintViolation)
        );
        assert_eq!(
            convert("near \"SELEC\": syntax error").driver_kind(),
            Some(DriverErrorKind::SyntaxError)
        );
        assert_eq!(
            convert("table users already exists").driver_kind(),
            Some(DriverErrorKind::TableExists)
        );
        assert_eq!(
            convert("no such table: missing").driver_kind(),
            Some(DriverErrorKind::TableNotFound)
        );
        assert_eq!(
            convert("no such column: nope").driver_kind(),
            Some(DriverErrorKind::InvalidFieldName)
        );
        assert_eq!(
            convert("ambiguous column name: id").driver_kind(),
            Some(DriverErrorKind::NonUniqueFieldName)
        );
    }

    #[test]
    fn test_unmapped_message_is_other() {
        assert_eq!(
            convert("database is locked").driver_kind(),
            Some(DriverErrorKind::Other)
        );
    }
}
