//! Database driver implementations and the built-in driver registry.
//!
//! Each driver module implements the core capability traits for one
//! backend family:
//!
//! - `Platform`: SQL dialect strategy
//! - `SchemaManager`: metadata introspection
//! - `Driver` + `DriverConnection`: native connection factory
//! - `ExceptionConverter`: error-code classification
//!
//! The registry below is a closed, immutable set. It is only extensible
//! through the driver manager's typed custom-driver registry; nothing
//! mutates this table at runtime.

pub mod mysql;
pub mod postgres;
pub mod sqlite;
pub mod soqol;

use std::sync::Arc;

use crate::core::traits::Driver;
use crate::error::{DbalError, Result};

pub use mysql::MysqlDriver;
pub use postgres::PostgresDriver;
pub use sqlite::SqliteDriver;
pub use soqol::SoqolDriver;

/// Every name the built-in registry accepts, in the order error messages
/// list them.
pub const AVAILABLE_DRIVERS: &[&str] = &[
    "mysql",
    "mysqli",
    "pdo_mysql",
    "pgsql",
    "postgres",
    "postgresql",
    "pdo_pgsql",
    "sqlite",
    "sqlite3",
    "pdo_sqlite",
    "soqol",
];

/// Instantiate the built-in driver registered under the given name.
///
/// # Errors
///
/// Returns [`DbalError::UnknownDriver`] carrying the full list of known
/// names when the name is not registered.
pub fn create_driver(name: &str) -> Result<Arc<dyn Driver>> {
    match name {
        "mysql" | "mysqli" | "pdo_mysql" => Ok(Arc::new(MysqlDriver::new())),
        "pgsql" | "postgres" | "postgresql" | "pdo_pgsql" => Ok(Arc::new(PostgresDriver::new())),
        "sqlite" | "sqlite3" | "pdo_sqlite" => Ok(Arc::new(SqliteDriver::new())),
        "soqol" => Ok(Arc::new(SoqolDriver::new())),
        other => Err(DbalError::UnknownDriver {
            name: other.to_string(),
            known: AVAILABLE_DRIVERS.iter().map(|s| s.to_string()).collect(),
        }),
    }
}

/// Whether a driver name belongs to the SQLite family, which changes how
/// URL paths resolve (`path`/`memory` instead of `dbname`).
pub(crate) fn is_sqlite_family(name: &str) -> bool {
    matches!(name, "sqlite" | "sqlite3" | "pdo_sqlite")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_driver_aliases() {
        assert_eq!(create_driver("mysql").unwrap().name(), "mysql");
        assert_eq!(create_driver("pdo_mysql").unwrap().name(), "mysql");
        assert_eq!(create_driver("postgresql").unwrap().name(), "pgsql");
        assert_eq!(create_driver("sqlite3").unwrap().name(), "sqlite");
        assert_eq!(create_driver("soqol").unwrap().name(), "soqol");
    }

    #[test]
    fn test_unknown_driver_lists_all_names() {
        let err = create_driver("mongodb").unwrap_err();
        match err {
            DbalError::UnknownDriver { name, known } => {
                assert_eq!(name, "mongodb");
                assert_eq!(known.len(), AVAILABLE_DRIVERS.len());
                assert!(known.iter().any(|n| n == "soqol"));
            }
            other => panic!("expected UnknownDriver, got {other:?}"),
        }
    }

    #[test]
    fn test_sqlite_family() {
        assert!(is_sqlite_family("sqlite3"));
        assert!(is_sqlite_family("pdo_sqlite"));
        assert!(!is_sqlite_family("mysql"));
        assert!(!is_sqlite_family("soqol"));
    }
}
