//! Statement-logging middleware.
//!
//! Reference middleware implementation: wraps the resolved driver so every
//! statement and connection attempt is logged through `tracing` before it
//! reaches the native client.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::ConnectionParams;
use crate::core::traits::{
    Driver, DriverConnection, DriverResult, ExceptionConverter, Middleware, RowSet,
};
use crate::core::value::SqlValue;
use crate::platform::Platform;

/// Middleware logging connections and statements.
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for LoggingMiddleware {
    fn wrap_driver(&self, driver: Arc<dyn Driver>) -> Arc<dyn Driver> {
        Arc::new(LoggingDriver { inner: driver })
    }
}

struct LoggingDriver {
    inner: Arc<dyn Driver>,
}

#[async_trait]
impl Driver for LoggingDriver {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn connect(&self, params: &ConnectionParams) -> DriverResult<Box<dyn DriverConnection>> {
        debug!(
            driver = self.inner.name(),
            host = params.host.as_deref().unwrap_or(""),
            "connecting"
        );
        let inner = self.inner.connect(params).await?;
        Ok(Box::new(LoggingConnection { inner }))
    }

    fn platform(&self, server_version: Option<&str>) -> Arc<dyn Platform> {
        self.inner.platform(server_version)
    }

    fn exception_converter(&self) -> Arc<dyn ExceptionConverter> {
        self.inner.exception_converter()
    }
}

struct LoggingConnection {
    inner: Box<dyn DriverConnection>,
}

#[async_trait]
impl DriverConnection for LoggingConnection {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> DriverResult<RowSet> {
        debug!(sql, params = params.len(), "executing query");
        self.inner.query(sql, params).await
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DriverResult<u64> {
        debug!(sql, params = params.len(), "executing statement");
        self.inner.execute(sql, params).await
    }

    async fn server_version(&mut self) -> DriverResult<Option<String>> {
        self.inner.server_version().await
    }
}
