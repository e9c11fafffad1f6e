//! Connection parameter model.
//!
//! [`ConnectionParams`] carries every key the resolution algorithm
//! recognizes. Keys it does not recognize travel opaquely to the native
//! driver through [`ConnectionParams::driver_options`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Connection configuration handed to the driver manager.
///
/// Exactly one of `driver` / `driver_class` must resolve to a known driver
/// for resolution to succeed. A `url`, when present, is parsed first and its
/// components merged in; the URL's query string wins over every same-named
/// key resolved earlier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionParams {
    /// Driver name looked up in the built-in registry.
    pub driver: Option<String>,

    /// Identifier of a custom driver registered with the driver manager.
    /// A URL scheme, when present, cancels this override.
    pub driver_class: Option<String>,

    /// Connection URL; parsed and merged during resolution.
    pub url: Option<String>,

    /// Server host.
    pub host: Option<String>,

    /// Server port.
    pub port: Option<u16>,

    /// User name.
    pub user: Option<String>,

    /// Password.
    pub password: Option<String>,

    /// Database name (server-based backends).
    pub dbname: Option<String>,

    /// Database file path (file-based backends; distinct from `dbname`).
    pub path: Option<String>,

    /// In-memory database flag (file-based backends).
    pub memory: bool,

    /// Client charset.
    pub charset: Option<String>,

    /// Unix domain socket path, for backends that accept one.
    pub unix_socket: Option<String>,

    /// Identifier of a connection wrapper registered with the driver manager.
    pub wrapper_class: Option<String>,

    /// Table options applied to every created table unless overridden.
    pub default_table_options: BTreeMap<String, String>,

    /// Opaque pass-through options for the native driver layer.
    pub driver_options: BTreeMap<String, String>,

    /// Sharding configuration, passed through opaquely.
    pub sharding: BTreeMap<String, serde_json::Value>,

    /// Primary server override map (replica topologies).
    pub primary: Option<Box<ConnectionParams>>,

    /// Ordered replica override maps.
    pub replica: Vec<ConnectionParams>,
}

impl ConnectionParams {
    /// Parameters consisting only of a connection URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Parameters selecting a driver by registry name.
    pub fn for_driver(driver: impl Into<String>) -> Self {
        Self {
            driver: Some(driver.into()),
            ..Default::default()
        }
    }

    /// Set a parameter addressed by its key name, overwriting any prior
    /// value. This is the merge primitive for URL query strings, which is
    /// why the semantics are strictly last-writer-wins.
    pub(crate) fn set_key(&mut self, key: &str, value: &str) {
        match key {
            "driver" => self.driver = Some(value.to_string()),
            "driver_class" => self.driver_class = Some(value.to_string()),
            "host" => self.host = Some(value.to_string()),
            "port" => self.port = value.parse().ok(),
            "user" => self.user = Some(value.to_string()),
            "password" => self.password = Some(value.to_string()),
            "dbname" => self.dbname = Some(value.to_string()),
            "path" => self.path = Some(value.to_string()),
            "memory" => {
                self.memory = matches!(value, "1" | "true" | "on" | "yes");
            }
            "charset" => self.charset = Some(value.to_string()),
            "unix_socket" => self.unix_socket = Some(value.to_string()),
            "wrapper_class" => self.wrapper_class = Some(value.to_string()),
            other => {
                self.driver_options
                    .insert(other.to_string(), value.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_key_recognized() {
        let mut params = ConnectionParams::default();
        params.set_key("host", "db.example.com");
        params.set_key("port", "5432");
        params.set_key("memory", "true");
        assert_eq!(params.host.as_deref(), Some("db.example.com"));
        assert_eq!(params.port, Some(5432));
        assert!(params.memory);
    }

    #[test]
    fn test_set_key_overwrites() {
        let mut params = ConnectionParams::default();
        params.set_key("dbname", "first");
        params.set_key("dbname", "second");
        assert_eq!(params.dbname.as_deref(), Some("second"));
    }

    #[test]
    fn test_set_key_unrecognized_passes_through() {
        let mut params = ConnectionParams::default();
        params.set_key("application_name", "reports");
        assert_eq!(
            params.driver_options.get("application_name").map(String::as_str),
            Some("reports")
        );
    }

    #[test]
    fn test_invalid_port_is_dropped() {
        let mut params = ConnectionParams::default();
        params.set_key("port", "not-a-port");
        assert_eq!(params.port, None);
    }
}
