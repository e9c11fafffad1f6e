//! The user-facing connection wrapper.
//!
//! A [`Connection`] owns one native backend connection for its lifetime,
//! together with the driver that produced it, the platform bound to it and
//! the per-connection configuration. The native connection opens lazily on
//! first use; resolution never performs I/O.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{Configuration, ConnectionParams};
use crate::core::traits::{Driver, DriverConnection, NativeError, RowSet};
use crate::core::value::SqlValue;
use crate::error::{DbalError, Result};
use crate::platform::{Platform, TransactionIsolationLevel};
use crate::schema_manager::SchemaManager;

/// A live (or lazily-opened) database connection.
pub struct Connection {
    params: ConnectionParams,
    driver: Arc<dyn Driver>,
    config: Configuration,
    platform: Arc<dyn Platform>,
    native: Mutex<Option<Box<dyn DriverConnection>>>,
}

impl Connection {
    /// Build a connection around resolved parameters, a (possibly
    /// middleware-wrapped) driver and a configuration. No I/O happens here.
    pub(crate) fn new(
        params: ConnectionParams,
        driver: Arc<dyn Driver>,
        config: Configuration,
    ) -> Self {
        // A caller that already knows the server version can pin it through
        // the opaque driver options and get a version-specific dialect
        // without a round trip.
        let version = params
            .driver_options
            .get("server_version")
            .map(String::as_str);
        let platform = driver.platform(version);
        Self {
            params,
            driver,
            config,
            platform,
            native: Mutex::new(None),
        }
    }

    /// The resolved connection parameters.
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// The driver this connection was built with.
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// The per-connection configuration.
    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// The dialect engine bound to this connection.
    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    /// Run a statement that produces rows.
    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> Result<RowSet> {
        let mut guard = self.native.lock().await;
        let native = self.ensure_connected(&mut guard).await?;
        native
            .query(sql, params)
            .await
            .map_err(|e| self.convert(e))
    }

    /// Run a statement that produces an affected-row count.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let mut guard = self.native.lock().await;
        let native = self.ensure_connected(&mut guard).await?;
        native
            .execute(sql, params)
            .await
            .map_err(|e| self.convert(e))
    }

    /// The backend's reported server version, when it reports one.
    pub async fn server_version(&self) -> Result<Option<String>> {
        let mut guard = self.native.lock().await;
        let native = self.ensure_connected(&mut guard).await?;
        native.server_version().await.map_err(|e| self.convert(e))
    }

    /// Set the transaction isolation level through the platform's SQL.
    /// Levels the platform rejects surface as the typed not-supported
    /// condition without touching the backend.
    pub async fn set_transaction_isolation(
        &self,
        level: TransactionIsolationLevel,
    ) -> Result<()> {
        let sql = self.platform.set_transaction_isolation_sql(level)?;
        self.execute(&sql, &[]).await?;
        Ok(())
    }

    /// Create a schema manager for this connection. The manager borrows the
    /// connection and memoizes its current-schema lookup for its own
    /// lifetime only.
    pub fn schema_manager(&self) -> Result<Box<dyn SchemaManager + '_>> {
        match self.driver.name() {
            "mysql" => Ok(Box::new(crate::drivers::mysql::MysqlSchemaManager::new(
                self,
            ))),
            "pgsql" => Ok(Box::new(
                crate::drivers::postgres::PostgresSchemaManager::new(self),
            )),
            "sqlite" => Ok(Box::new(crate::drivers::sqlite::SqliteSchemaManager::new(
                self,
            ))),
            "soqol" => Ok(Box::new(crate::drivers::soqol::SoqolSchemaManager::new(
                self,
            ))),
            other => Err(DbalError::not_supported(format!(
                "schema introspection for driver '{other}'"
            ))),
        }
    }

    async fn ensure_connected<'a>(
        &self,
        guard: &'a mut Option<Box<dyn DriverConnection>>,
    ) -> Result<&'a mut Box<dyn DriverConnection>> {
        if guard.is_none() {
            debug!(driver = self.driver.name(), "opening native connection");
            let native = self
                .driver
                .connect(&self.params)
                .await
                .map_err(|e| self.convert(e))?;
            *guard = Some(native);
        }
        guard
            .as_mut()
            .ok_or_else(|| self.convert(NativeError::message("native connection unavailable")))
    }

    fn convert(&self, error: NativeError) -> DbalError {
        self.driver.exception_converter().convert(error)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("driver", &self.driver.name())
            .field("platform", &self.platform.name())
            .finish()
    }
}
