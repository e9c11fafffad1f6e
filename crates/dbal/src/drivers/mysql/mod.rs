//! MySQL/MariaDB driver.

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

pub use connection::MysqlNativeConnection;
pub use platform::MysqlPlatform;
pub use schema::MysqlSchemaManager;

/// Driver for MySQL and MariaDB servers.
#[derive(Debug, Clone, Default)]
pub struct MysqlDriver;

impl MysqlDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Driver for MysqlDriver {
    fn name(&self) -> &'static str {
        "mysql"
    }

    async fn connect(&self, params: &ConnectionParams) -> DriverResult<Box<dyn DriverConnection>> {
        Ok(Box::new(MysqlNativeConnection::open(params).await?))
    }

    fn platform(&self, _server_version: Option<&str>) -> Arc<dyn Platform> {
        Arc::new(MysqlPlatform::new())
    }

    fn exception_converter(&self) -> Arc<dyn ExceptionConverter> {
        Arc::new(MysqlExceptionConverter)
    }
}

/// Classifies MySQL vendor error codes into the portable taxonomy.
#[derive(Debug, Clone, Default)]
pub struct MysqlExceptionConverter;

impl ExceptionConverter for MysqlExceptionConverter {
    fn convert(&self, error: NativeError) -> DbalError {
        let kind = match error.code {
            Some(1062 | 1557 | 1569 | 1586) => DriverErrorKind::UniqueConstraintViolation,
            Some(1048 | 1121 | 1138 | 1171 | 1252 | 1263 | 1364 | 1566) => {
                DriverErrorKind::NotNullConstraintViolation
            }
            Some(1064 | 1149 | 1287 | 1341 | 1342 | 1343 | 1344 | 1382 | 1479 | 1541 | 1554
            | 1626) => DriverErrorKind::SyntaxError,
            Some(1050) => DriverErrorKind::TableExists,
            Some(1051 | 1146) => DriverErrorKind::TableNotFound,
            Some(1054 | 1166 | 1611) => DriverErrorKind::InvalidFieldName,
            Some(1052 | 1060 | 1110) => DriverErrorKind::NonUniqueFieldName,
            Some(1044 | 1045 | 1046 | 1049 | 1095 | 1142 | 1143 | 1227 | 1370 | 1429 | 2002
            | 2005 | 2006) => DriverErrorKind::ConnectionError,
            // Failures without a vendor code come from the transport layer.
            None => DriverErrorKind::ConnectionError,
            _ => DriverErrorKind::Other,
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

    fn convert(code: i64) -> DbalError {
        MysqlExceptionConverter.convert(NativeError::message("boom").with_code(code))
    }

    #[test]
    fn test_code_classification() {
        assert_eq!(
            convert(1062).driver_kind(),
            Some(DriverErrorKind::UniqueConstraintViolation)
        );
        assert_eq!(
            convert(1146).driver_kind(),
            Some(DriverErrorKind::TableNotFound)
        );
        assert_eq!(
            convert(1054).driver_kind(),
            Some(DriverErrorKind::InvalidFieldName)
        );
        assert_eq!(
            convert(1045).driver_kind(),
            Some(DriverErrorKind::ConnectionError)
        );
    }

    #[test]
    fn test_unmapped_code_keeps_original_losslessly() {
        let err = MysqlExceptionConverter.convert(
            NativeError::message("strange failure")
                .with_code(9999)
                .with_sqlstate("HY000"),
        );
        match err {
            DbalError::Driver {
                kind,
                code,
                sqlstate,
                message,
            } => {
                assert_eq!(kind, DriverErrorKind::Other);
                assert_eq!(code, Some(9999));
                assert_eq!(sqlstate.as_deref(), Some("HY000"));
                assert_eq!(message, "strange failure");
            }
            other => panic!("expected a driver error, got {other:?}"),
        }
    }

    #[test]
    fn test_transport_failure_is_connection_error() {
        let err = MysqlExceptionConverter.convert(NativeError::message("socket closed"));
        assert_eq!(err.driver_kind(), Some(DriverErrorKind::ConnectionError));
    }
}
