//! Connection configuration: parameters, URL resolution and the
//! per-connection [`Configuration`] object.

pub mod params;
pub(crate) mod url;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::traits::Middleware;

pub use params::ConnectionParams;

/// Per-connection configuration: the middleware chain and the table-option
/// defaults applied to generated DDL.
#[derive(Clone, Default)]
pub struct Configuration {
    middlewares: Vec<Arc<dyn Middleware>>,
    default_table_options: BTreeMap<String, String>,
}

impl Configuration {
    /// An empty configuration: no middlewares, no table-option defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware. Middlewares wrap the driver in registration
    /// order, so the first one registered is the innermost decorator.
    #[must_use]
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Set a table option applied to every created table unless the table
    /// definition overrides it.
    #[must_use]
    pub fn with_default_table_option(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_table_options.insert(key.into(), value.into());
        self
    }

    /// The registered middlewares, in registration order.
    pub fn middlewares(&self) -> &[Arc<dyn Middleware>] {
        &self.middlewares
    }

    /// The table-option defaults.
    pub fn default_table_options(&self) -> &BTreeMap<String, String> {
        &self.default_table_options
    }
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("middlewares", &self.middlewares.len())
            .field("default_table_options", &self.default_table_options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::Driver;

    struct NoopMiddleware;

    impl Middleware for NoopMiddleware {
        fn wrap_driver(&self, driver: Arc<dyn Driver>) -> Arc<dyn Driver> {
            driver
        }
    }

    #[test]
    fn test_configuration_builders() {
        let config = Configuration::new()
            .with_middleware(Arc::new(NoopMiddleware))
            .with_default_table_option("charset", "utf8mb4");
        assert_eq!(config.middlewares().len(), 1);
        assert_eq!(
            config.default_table_options().get("charset").map(String::as_str),
            Some("utf8mb4")
        );
    }
}
