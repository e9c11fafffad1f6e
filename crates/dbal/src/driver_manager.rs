//! Connection resolution.
//!
//! [`DriverManager::get_connection`] turns heterogeneous connection
//! configuration (explicit parameters, connection URLs, primary/replica
//! topologies) into a concrete driver wrapped in middleware and a
//! user-facing [`Connection`]. Resolution is synchronous and performs no
//! I/O; every configuration error fails fast with enough context to act on.
//!
//! Custom drivers and connection wrappers are typed registries populated
//! at construction time, so conformance is checked when an entry is
//! registered rather than reflectively at call time.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::{url, Configuration, ConnectionParams};
use crate::connection::Connection;
use crate::core::traits::Driver;
use crate::drivers;
use crate::error::{DbalError, Result};

/// The base contract every connection wrapper satisfies. The plain
/// [`Connection`] is its own wrapper; registered wrapper factories produce
/// richer types that still expose the underlying connection.
pub trait WrappedConnection: Send + Sync {
    /// The wrapped base connection.
    fn connection(&self) -> &Connection;

    /// Downcast support, letting callers recover the concrete wrapper type.
    fn as_any(&self) -> &dyn Any;
}

impl WrappedConnection for Connection {
    fn connection(&self) -> &Connection {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for dyn WrappedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrappedConnection").finish_non_exhaustive()
    }
}

/// Factory producing a wrapper around a freshly built connection.
pub type WrapperFactory = Arc<dyn Fn(Connection) -> Box<dyn WrappedConnection> + Send + Sync>;

/// Top-level entry point resolving parameters into connections.
#[derive(Default)]
pub struct DriverManager {
    custom_drivers: BTreeMap<String, Arc<dyn Driver>>,
    wrappers: BTreeMap<String, WrapperFactory>,
}

impl DriverManager {
    /// A manager with the built-in registry and no custom entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom driver under an identifier that connection
    /// parameters can select via `driver_class`. The value already
    /// conforms to the [`Driver`] capability interface, so registration
    /// is the conformance check.
    pub fn register_driver(&mut self, id: impl Into<String>, driver: Arc<dyn Driver>) {
        self.custom_drivers.insert(id.into(), driver);
    }

    /// Register a connection wrapper under an identifier that connection
    /// parameters can select via `wrapper_class`.
    pub fn register_wrapper(&mut self, id: impl Into<String>, factory: WrapperFactory) {
        self.wrappers.insert(id.into(), factory);
    }

    /// Resolve parameters into a connection.
    ///
    /// Steps, in order: default the configuration; parse and merge the URL
    /// (recursively for primary/replica sub-maps); resolve the driver;
    /// apply middlewares in registration order; resolve the wrapper; build
    /// the connection. No network I/O happens here.
    pub fn get_connection(
        &self,
        params: ConnectionParams,
        config: Option<Configuration>,
    ) -> Result<Box<dyn WrappedConnection>> {
        let config = config.unwrap_or_default();

        let mut params = params;
        url::resolve(&mut params)?;

        let mut driver = self.resolve_driver(&params)?;
        debug!(driver = driver.name(), "resolved database driver");

        for middleware in config.middlewares() {
            driver = middleware.wrap_driver(driver);
        }

        let wrapper = match params.wrapper_class.as_deref() {
            None => None,
            Some(id) => Some(
                self.wrappers
                    .get(id)
                    .cloned()
                    .ok_or_else(|| DbalError::InvalidWrapperClass(id.to_string()))?,
            ),
        };

        let connection = Connection::new(params, driver, config);
        Ok(match wrapper {
            Some(factory) => factory(connection),
            None => Box::new(connection),
        })
    }

    /// Driver selection: a custom `driver_class` identifier wins (unless a
    /// URL scheme already cancelled it), then the built-in registry, then
    /// the driver-required failure.
    fn resolve_driver(&self, params: &ConnectionParams) -> Result<Arc<dyn Driver>> {
        if let Some(id) = &params.driver_class {
            return self
                .custom_drivers
                .get(id)
                .cloned()
                .ok_or_else(|| DbalError::InvalidDriverClass(id.to_string()));
        }
        match &params.driver {
            Some(name) => drivers::create_driver(name),
            None => Err(DbalError::DriverRequired),
        }
    }
}

impl std::fmt::Debug for DriverManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverManager")
            .field(
                "custom_drivers",
                &self.custom_drivers.keys().collect::<Vec<_>>(),
            )
            .field("wrappers", &self.wrappers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_driver_fails() {
        let manager = DriverManager::new();
        let err = manager
            .get_connection(ConnectionParams::default(), None)
            .unwrap_err();
        assert!(matches!(err, DbalError::DriverRequired));
    }

    #[test]
    fn test_unknown_driver_lists_valid_names() {
        let manager = DriverManager::new();
        let err = manager
            .get_connection(ConnectionParams::for_driver("db2"), None)
            .unwrap_err();
        match err {
            DbalError::UnknownDriver { name, known } => {
                assert_eq!(name, "db2");
                assert!(!known.is_empty());
            }
            other => panic!("expected UnknownDriver, got {other:?}"),
        }
    }

    #[test]
    fn test_unregistered_custom_driver_fails() {
        let manager = DriverManager::new();
        let mut params = ConnectionParams::default();
        params.driver_class = Some("my_driver".to_string());
        let err = manager.get_connection(params, None).unwrap_err();
        assert!(matches!(err, DbalError::InvalidDriverClass(id) if id == "my_driver"));
    }

    #[test]
    fn test_unregistered_wrapper_fails() {
        let manager = DriverManager::new();
        let mut params = ConnectionParams::for_driver("sqlite3");
        params.wrapper_class = Some("audited".to_string());
        let err = manager.get_connection(params, None).unwrap_err();
        assert!(matches!(err, DbalError::InvalidWrapperClass(id) if id == "audited"));
    }

    #[test]
    fn test_plain_connection_for_builtin_driver() {
        let manager = DriverManager::new();
        let conn = manager
            .get_connection(ConnectionParams::from_url("sqlite3:///:memory:"), None)
            .unwrap();
        assert_eq!(conn.connection().driver().name(), "sqlite");
        assert!(conn.connection().params().memory);
    }

    #[test]
    fn test_url_scheme_discards_custom_driver() {
        let manager = DriverManager::new();
        let mut params = ConnectionParams::from_url("pdo-mysql://h/db");
        // Points at a registered-nowhere identifier; the URL scheme must
        // cancel it before resolution would look at it.
        params.driver_class = Some("unregistered".to_string());
        let conn = manager.get_connection(params, None).unwrap();
        assert_eq!(conn.connection().driver().name(), "mysql");
    }
}
