//! Error types for the abstraction layer.
//!
//! Errors come in two tiers. Resolution-time errors (`DriverRequired`,
//! `UnknownDriver`, ...) are raised synchronously by the driver manager
//! before any network I/O. Runtime errors reported by a backend are
//! classified into [`DriverErrorKind`] by the driver's exception converter.

use thiserror::Error;

/// Portable classification of backend-reported errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverErrorKind {
    /// A unique or primary key constraint was violated.
    UniqueConstraintViolation,
    /// A NOT NULL constraint was violated.
    NotNullConstraintViolation,
    /// The statement could not be parsed by the backend.
    SyntaxError,
    /// An object with the same name already exists.
    TableExists,
    /// The referenced table does not exist.
    TableNotFound,
    /// A referenced column does not exist.
    InvalidFieldName,
    /// A column reference is ambiguous.
    NonUniqueFieldName,
    /// The connection could not be established or was lost.
    ConnectionError,
    /// Any backend error without a more specific classification.
    Other,
}

impl std::fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DriverErrorKind::UniqueConstraintViolation => "unique constraint violation",
            DriverErrorKind::NotNullConstraintViolation => "not-null constraint violation",
            DriverErrorKind::SyntaxError => "syntax error",
            DriverErrorKind::TableExists => "table already exists",
            DriverErrorKind::TableNotFound => "table not found",
            DriverErrorKind::InvalidFieldName => "invalid field name",
            DriverErrorKind::NonUniqueFieldName => "non-unique field name",
            DriverErrorKind::ConnectionError => "connection error",
            DriverErrorKind::Other => "driver error",
        };
        f.write_str(name)
    }
}

/// Main error type for the abstraction layer.
#[derive(Error, Debug)]
pub enum DbalError {
    /// Neither a driver name nor a custom driver identifier was supplied.
    #[error(
        "no database driver specified; set either the `driver` or the `driver_class` \
         connection parameter"
    )]
    DriverRequired,

    /// The requested driver name is not in the registry.
    #[error("unknown database driver '{name}'; known drivers: {}", .known.join(", "))]
    UnknownDriver {
        /// The name that failed to resolve.
        name: String,
        /// Every name the registry accepts.
        known: Vec<String>,
    },

    /// The requested custom driver identifier is not registered.
    #[error("custom driver '{0}' is not registered with this driver manager")]
    InvalidDriverClass(String),

    /// The requested connection wrapper identifier is not registered.
    #[error("connection wrapper '{0}' is not registered with this driver manager")]
    InvalidWrapperClass(String),

    /// The connection URL could not be parsed.
    #[error("malformed database URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A dialect feature the caller asked for does not exist on this backend.
    #[error("{0} is not supported by this platform")]
    NotSupported(String),

    /// Introspection reported a native type with no portable mapping.
    #[error(
        "unknown database type '{db_type}' on platform '{platform}'; \
         the type mapping table has no entry for it"
    )]
    UnknownColumnType {
        db_type: String,
        platform: &'static str,
    },

    /// A backend-reported error, classified by the exception converter.
    /// The original code and message are carried losslessly.
    #[error("{kind}: {message}")]
    Driver {
        kind: DriverErrorKind,
        /// Backend-specific numeric code, if the backend reports one.
        code: Option<i64>,
        /// SQLSTATE, if the backend reports one.
        sqlstate: Option<String>,
        message: String,
    },
}

impl DbalError {
    /// Create a `NotSupported` error for a named feature.
    pub fn not_supported(feature: impl Into<String>) -> Self {
        DbalError::NotSupported(feature.into())
    }

    /// Whether this is the typed "not supported" condition, letting callers
    /// degrade gracefully instead of treating the failure as fatal.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, DbalError::NotSupported(_))
    }

    /// The portable classification, when this is a backend-reported error.
    pub fn driver_kind(&self) -> Option<DriverErrorKind> {
        match self {
            DbalError::Driver { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type alias for abstraction-layer operations.
pub type Result<T> = std::result::Result<T, DbalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_driver_lists_names() {
        let err = DbalError::UnknownDriver {
            name: "mongodb".to_string(),
            known: vec!["mysql".to_string(), "pgsql".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("mongodb"));
        assert!(msg.contains("mysql, pgsql"));
    }

    #[test]
    fn test_not_supported_detection() {
        let err = DbalError::not_supported("sequences");
        assert!(err.is_not_supported());
        assert_eq!(err.to_string(), "sequences is not supported by this platform");

        assert!(!DbalError::DriverRequired.is_not_supported());
    }

    #[test]
    fn test_driver_kind_accessor() {
        let err = DbalError::Driver {
            kind: DriverErrorKind::TableNotFound,
            code: Some(1146),
            sqlstate: None,
            message: "Table 'db.missing' doesn't exist".to_string(),
        };
        assert_eq!(err.driver_kind(), Some(DriverErrorKind::TableNotFound));
        assert!(err.to_string().starts_with("table not found"));

        assert_eq!(DbalError::DriverRequired.driver_kind(), None);
    }
}
