//! SOQOL driver.
//!
//! The native client path goes through ODBC and needs a system driver
//! manager, so it sits behind the non-default `odbc` cargo feature. With
//! the feature off the driver still resolves, generates SQL and classifies
//! errors; only `connect` reports the missing capability (SQLSTATE `0A000`,
//! which the converter surfaces as the typed not-supported condition).

#[cfg(feature = "odbc")]
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

#[cfg(feature = "odbc")]
pub use connection::SoqolNativeConnection;
pub use platform::SoqolPlatform;
pub use schema::{SoqolSchemaManager, AUTOINCREMENT_SEQUENCE_OPTION};

/// Driver for SOQOL servers.
#[derive(Debug, Clone, Default)]
pub struct SoqolDriver;

impl SoqolDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for SoqolDriver {
    fn name(&self) -> &'static str {
        "soqol"
    }

    #[cfg(feature = "odbc")]
    async fn connect(&self, params: &ConnectionParams) -> DriverResult<Box<dyn DriverConnection>> {
        Ok(Box::new(connection::SoqolNativeConnection::open(params).await?))
    }

    #[cfg(not(feature = "odbc"))]
    async fn connect(
        &self,
        _params: &ConnectionParams,
    ) -> DriverResult<Box<dyn DriverConnection>> {
        Err(NativeError::message(
            "the soqol native client requires the `odbc` cargo feature",
        )
        .with_sqlstate("0A000"))
    }

    fn platform(&self, _server_version: Option<&str>) -> Arc<dyn Platform> {
        Arc::new(SoqolPlatform::new())
    }

    fn exception_converter(&self) -> Arc<dyn ExceptionConverter> {
        Arc::new(SoqolExceptionConverter)
    }
}

/// Classifies SOQOL/ODBC SQLSTATEs into the portable taxonomy. The 23000
/// integrity class covers both constraint kinds, so the message
/// disambiguates them.
#[derive(Debug, Clone, Default)]
pub struct SoqolExceptionConverter;

impl ExceptionConverter for SoqolExceptionConverter {
    fn convert(&self, error: NativeError) -> DbalError {
        let message_lower = error.message.to_ascii_lowercase();
        let kind = match error.sqlstate.as_deref() {
            Some("0A000") => return DbalError::not_supported(error.message),
            Some("23000" | "23505") if message_lower.contains("unique") => {
                DriverErrorKind::UniqueConstraintViolation
            }
            Some("23000" | "23502") if message_lower.contains("null") => {
                DriverErrorKind::NotNullConstraintViolation
            }
            Some("23000") => DriverErrorKind::Other,
            Some("37000" | "42000" | "42601") => DriverErrorKind::SyntaxError,
            Some("42S01") => DriverErrorKind::TableExists,
            Some("42S02") => DriverErrorKind::TableNotFound,
            Some("42S22") => DriverErrorKind::InvalidFieldName,
            Some("42702") => DriverErrorKind::NonUniqueFieldName,
            Some(state) if state.starts_with("08") => DriverErrorKind::ConnectionError,
            Some(_) => DriverErrorKind::Other,
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

    fn convert(state: &str, message: &str) -> DbalError {
        SoqolExceptionConverter.convert(NativeError::message(message).with_sqlstate(state))
    }

    #[test]
    fn test_integrity_class_disambiguated_by_message() {
        assert_eq!(
            convert("23000", "UNIQUE constraint violated on IDX_U").driver_kind(),
            Some(DriverErrorKind::UniqueConstraintViolation)
        );
        assert_eq!(
            convert("23000", "column ID must not be NULL").driver_kind(),
            Some(DriverErrorKind::NotNullConstraintViolation)
        );
    }

    #[test]
    fn test_object_errors() {
        assert_eq!(
            convert("42S01", "table exists").driver_kind(),
            Some(DriverErrorKind::TableExists)
        );
        assert_eq!(
            convert("42S02", "no table").driver_kind(),
            Some(DriverErrorKind::TableNotFound)
        );
        assert_eq!(
            convert("42S22", "no column").driver_kind(),
            Some(DriverErrorKind::InvalidFieldName)
        );
    }

    #[test]
    fn test_feature_not_supported_state() {
        let err = convert("0A000", "sequences cannot be cached");
        assert!(err.is_not_supported());
    }

    #[test]
    fn test_connection_class() {
        assert_eq!(
            convert("08001", "cannot connect").driver_kind(),
            Some(DriverErrorKind::ConnectionError)
        );
    }
}
