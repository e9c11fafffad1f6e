//! End-to-end tests for connection resolution and introspection, run
//! against a stub driver so no real server is needed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use dbal::drivers::soqol::{SoqolExceptionConverter, SoqolPlatform};
use dbal::{
    Configuration, Connection, ConnectionParams, DbalError, Driver, DriverConnection,
    DriverManager, DriverResult, ExceptionConverter, Middleware, Platform, RowSet, SqlValue,
    TransactionIsolationLevel, WrappedConnection,
};

/// Counters shared between a stub driver and the assertions.
#[derive(Default)]
struct StubStats {
    connects: AtomicUsize,
    schema_queries: AtomicUsize,
}

/// A driver that answers the illustrated backend's metadata queries from
/// canned rows.
struct StubDriver {
    stats: Arc<StubStats>,
}

#[async_trait]
impl Driver for StubDriver {
    fn name(&self) -> &'static str {
        "soqol"
    }

    async fn connect(&self, _params: &ConnectionParams) -> DriverResult<Box<dyn DriverConnection>> {
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubConnection {
            stats: self.stats.clone(),
        }))
    }

    fn platform(&self, _server_version: Option<&str>) -> Arc<dyn Platform> {
        Arc::new(SoqolPlatform::new())
    }

    fn exception_converter(&self) -> Arc<dyn ExceptionConverter> {
        Arc::new(SoqolExceptionConverter)
    }
}

struct StubConnection {
    stats: Arc<StubStats>,
}

#[async_trait]
impl DriverConnection for StubConnection {
    async fn query(&mut self, sql: &str, _params: &[SqlValue]) -> DriverResult<RowSet> {
        if sql.contains("CURRENT_SCHEMA") {
            self.stats.schema_queries.fetch_add(1, Ordering::SeqCst);
            return Ok(RowSet {
                columns: vec!["current_schema".to_string()],
                rows: vec![vec![SqlValue::Text("APP".to_string())]],
            });
        }
        if sql.contains("sys.tables") {
            return Ok(RowSet {
                columns: vec!["SCHEMA_NAME".to_string(), "TABLE_NAME".to_string()],
                rows: vec![
                    vec![SqlValue::Text("APP".into()), SqlValue::Text("ORDERS".into())],
                    vec![SqlValue::Text("AUDIT".into()), SqlValue::Text("LOGS".into())],
                ],
            });
        }
        if sql.contains("sys.columns") {
            return Ok(RowSet {
                columns: vec![
                    "COLUMN_NAME".to_string(),
                    "DATA_TYPE".to_string(),
                    "DATA_DEFAULT".to_string(),
                    "IS_NULLABLE".to_string(),
                ],
                rows: vec![
                    vec![
                        SqlValue::Text("ID".into()),
                        SqlValue::Text("INTEGER".into()),
                        SqlValue::Text("APP.ORDERS_ID_SEQ.nextval".into()),
                        SqlValue::Text("N".into()),
                    ],
                    vec![
                        SqlValue::Text("TOTAL".into()),
                        SqlValue::Text("DECIMAL(10,2)".into()),
                        SqlValue::Null,
                        SqlValue::Text("Y".into()),
                    ],
                ],
            });
        }
        if sql.contains("sys.index_columns") {
            // The backend reports no index metadata yet.
            return Ok(RowSet::default());
        }
        Ok(RowSet::default())
    }

    async fn execute(&mut self, _sql: &str, _params: &[SqlValue]) -> DriverResult<u64> {
        Ok(1)
    }

    async fn server_version(&mut self) -> DriverResult<Option<String>> {
        Ok(Some("1.0-stub".to_string()))
    }
}

fn manager_with_stub() -> (DriverManager, Arc<StubStats>) {
    let stats = Arc::new(StubStats::default());
    let mut manager = DriverManager::new();
    manager.register_driver(
        "stub",
        Arc::new(StubDriver {
            stats: stats.clone(),
        }),
    );
    (manager, stats)
}

fn stub_params() -> ConnectionParams {
    let mut params = ConnectionParams::default();
    params.driver_class = Some("stub".to_string());
    params
}

#[tokio::test]
async fn resolves_custom_driver_and_connects_lazily() {
    let (manager, stats) = manager_with_stub();
    let conn = manager.get_connection(stub_params(), None).unwrap();

    // Resolution alone must not open a native connection.
    assert_eq!(stats.connects.load(Ordering::SeqCst), 0);

    let version = conn.connection().server_version().await.unwrap();
    assert_eq!(version.as_deref(), Some("1.0-stub"));
    assert_eq!(stats.connects.load(Ordering::SeqCst), 1);

    // The second statement reuses the native connection.
    conn.connection().execute("DELETE FROM t", &[]).await.unwrap();
    assert_eq!(stats.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn introspection_normalizes_portable_objects() {
    let (manager, _stats) = manager_with_stub();
    let conn = manager.get_connection(stub_params(), None).unwrap();
    let connection = conn.connection();
    let schema = connection.schema_manager().unwrap();

    let tables = schema.list_table_names().await.unwrap();
    // Objects in the current schema stay bare; foreign ones are qualified.
    assert_eq!(tables, vec!["ORDERS".to_string(), "AUDIT.LOGS".to_string()]);

    let columns = schema.list_table_columns("orders").await.unwrap();
    assert_eq!(columns.len(), 2);

    let id = &columns[0];
    assert!(id.autoincrement);
    assert_eq!(id.default, None);
    assert_eq!(
        id.platform_options.get("autoincrement_sequence").map(String::as_str),
        Some("APP.ORDERS_ID_SEQ")
    );

    let total = &columns[1];
    assert_eq!(total.precision, Some(10));
    assert_eq!(total.scale, Some(2));
    assert!(!total.notnull);

    // Index metadata may legitimately be empty.
    let indexes = schema.list_table_indexes("orders").await.unwrap();
    assert!(indexes.is_empty());

    // Foreign keys are a typed refusal, not an empty success.
    let err = schema.list_table_foreign_keys("orders").await.unwrap_err();
    assert!(err.is_not_supported());
}

#[tokio::test]
async fn current_schema_is_memoized_per_manager_instance() {
    let (manager, stats) = manager_with_stub();
    let conn = manager.get_connection(stub_params(), None).unwrap();
    let connection = conn.connection();

    let schema = connection.schema_manager().unwrap();
    schema.list_table_names().await.unwrap();
    schema.list_table_columns("orders").await.unwrap();
    schema.list_sequences().await.unwrap();
    assert_eq!(stats.schema_queries.load(Ordering::SeqCst), 1);

    // A new manager instance re-resolves the current schema.
    let fresh = connection.schema_manager().unwrap();
    fresh.list_table_names().await.unwrap();
    assert_eq!(stats.schema_queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unsupported_isolation_level_is_rejected_before_io() {
    let (manager, stats) = manager_with_stub();
    let conn = manager.get_connection(stub_params(), None).unwrap();

    let err = conn
        .connection()
        .set_transaction_isolation(TransactionIsolationLevel::RepeatableRead)
        .await
        .unwrap_err();
    assert!(err.is_not_supported());
    // The rejection happened in the platform, not on the wire.
    assert_eq!(stats.connects.load(Ordering::SeqCst), 0);

    conn.connection()
        .set_transaction_isolation(TransactionIsolationLevel::Serializable)
        .await
        .unwrap();
    assert_eq!(stats.connects.load(Ordering::SeqCst), 1);
}

/// Middleware that counts how many times it wrapped a driver.
struct CountingMiddleware {
    wraps: Arc<AtomicUsize>,
}

impl Middleware for CountingMiddleware {
    fn wrap_driver(&self, driver: Arc<dyn Driver>) -> Arc<dyn Driver> {
        self.wraps.fetch_add(1, Ordering::SeqCst);
        driver
    }
}

#[test]
fn middlewares_wrap_in_registration_order() {
    let (manager, _stats) = manager_with_stub();
    let wraps = Arc::new(AtomicUsize::new(0));
    let config = Configuration::new()
        .with_middleware(Arc::new(CountingMiddleware {
            wraps: wraps.clone(),
        }))
        .with_middleware(Arc::new(dbal::LoggingMiddleware::new()))
        .with_middleware(Arc::new(CountingMiddleware {
            wraps: wraps.clone(),
        }));

    let conn = manager.get_connection(stub_params(), Some(config)).unwrap();
    assert_eq!(wraps.load(Ordering::SeqCst), 2);
    // The logging decorator is transparent: the driver still reports the
    // wrapped driver's identity.
    assert_eq!(conn.connection().driver().name(), "soqol");
}

/// A wrapper type registered under `wrapper_class = "audited"`.
struct AuditedConnection {
    inner: Connection,
    label: &'static str,
}

impl WrappedConnection for AuditedConnection {
    fn connection(&self) -> &Connection {
        &self.inner
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[test]
fn registered_wrapper_produces_its_subtype() {
    let (mut manager, _stats) = manager_with_stub();
    manager.register_wrapper(
        "audited",
        Arc::new(|conn| {
            Box::new(AuditedConnection {
                inner: conn,
                label: "audit",
            }) as Box<dyn WrappedConnection>
        }),
    );

    let mut params = stub_params();
    params.wrapper_class = Some("audited".to_string());
    let conn = manager.get_connection(params, None).unwrap();

    let audited = conn
        .as_any()
        .downcast_ref::<AuditedConnection>()
        .expect("wrapper subtype");
    assert_eq!(audited.label, "audit");
    assert_eq!(audited.connection().driver().name(), "soqol");
}

#[test]
fn unknown_wrapper_fails_even_with_valid_driver() {
    let (manager, _stats) = manager_with_stub();
    let mut params = stub_params();
    params.wrapper_class = Some("missing".to_string());
    let err = manager.get_connection(params, None).unwrap_err();
    assert!(matches!(err, DbalError::InvalidWrapperClass(id) if id == "missing"));
}
