//! Session: the primary query execution surface.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::config::DriverConfig;
use super::connection::Connection;
use super::convert;
use super::error::{DriverError, DriverResult};
use super::pool::ConnectionPool;
use super::result::{QueryResult, ResultSummary};
use super::retry::{RetryDecision, SpaceRetryPolicy, TransientRetryPolicy};
use super::types::Value;

// ============================================================================
// Query
// ============================================================================

/// Statement text plus named parameters. Immutable once built.
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub parameters: HashMap<String, Value>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: HashMap<String, Value>) -> Self {
        self.parameters.extend(params);
        self
    }
}

impl From<&str> for Query {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Query {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

// ============================================================================
// Session
// ============================================================================

/// A logical session bound to one space.
///
/// Each `run` borrows a connection from the shared pool, makes sure the
/// server-side session has the right space active, executes, and returns
/// the connection. A session is not meant for concurrent `run` calls; use
/// one session per task, all drawing from the same pool.
pub struct Session {
    pool: Arc<ConnectionPool>,
    space_name: String,
    open: AtomicBool,
    space_retry: SpaceRetryPolicy,
    transient_retry: TransientRetryPolicy,
}

impl Session {
    pub(crate) fn new(pool: Arc<ConnectionPool>, space_name: String, config: &DriverConfig) -> Self {
        Self {
            pool,
            space_name,
            open: AtomicBool::new(true),
            space_retry: SpaceRetryPolicy::new(
                config.space_retry_attempts,
                config.space_retry_interval,
            ),
            transient_retry: TransientRetryPolicy::new(config.max_retries),
        }
    }

    /// Execute a query and return its materialized result.
    ///
    /// Transient transport failures are retried up to the configured
    /// bound; server-reported failures surface immediately.
    pub async fn run(&self, query: impl Into<Query>) -> DriverResult<QueryResult> {
        self.ensure_open()?;
        let query = query.into();

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.run_once(&query).await {
                Ok(result) => return Ok(result),
                Err(e) => match self.transient_retry.decide(&e, attempt) {
                    RetryDecision::Retry(delay) => {
                        tracing::debug!(error = %e, attempt, "retrying after transient failure");
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                    RetryDecision::Fail => return Err(e),
                },
            }
        }
    }

    /// Connectivity probe.
    pub async fn ping(&self) -> DriverResult<()> {
        self.run("YIELD 1;").await.map(|_| ())
    }

    /// The space this session runs against.
    pub fn space_name(&self) -> &str {
        &self.space_name
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Close the session. Later operations fail; an in-flight `run` is not
    /// interrupted.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(DriverError::SessionClosed)
        }
    }

    /// One attempt: borrow, ensure space, execute, build result. The
    /// connection goes back to the pool on every path.
    async fn run_once(&self, query: &Query) -> DriverResult<QueryResult> {
        let mut pooled = self.pool.acquire().await?;
        let result = self.execute_on(pooled.connection_mut(), query).await;
        pooled.release().await;
        result
    }

    async fn execute_on(&self, conn: &mut Connection, query: &Query) -> DriverResult<QueryResult> {
        if conn.needs_space_switch(&self.space_name) {
            self.switch_space(conn).await?;
        }

        let parameters = convert::to_parameter_map(&query.parameters)?;

        let started = Instant::now();
        let response = conn.execute(&query.text, parameters).await?;
        let elapsed = started.elapsed();

        if !response.is_succeeded() {
            return Err(DriverError::client(response.error_message()));
        }

        let summary = ResultSummary::new(
            elapsed,
            query.clone(),
            self.space_name.clone(),
            conn.address().clone(),
        );
        QueryResult::from_wire(
            response.data.unwrap_or_default(),
            conn.timezone_offset(),
            summary,
        )
    }

    /// Issue `USE <space>` until it sticks.
    ///
    /// Space-not-found is retried with the configured spacing while the
    /// space propagates through the cluster; anything else the server
    /// reports is final.
    async fn switch_space(&self, conn: &mut Connection) -> DriverResult<()> {
        let statement = format!("USE {};", self.space_name);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = conn.execute(&statement, HashMap::new()).await?;
            if response.is_succeeded() {
                conn.set_current_space(&self.space_name);
                return Ok(());
            }
            match self.space_retry.decide(response.error_code, attempt) {
                RetryDecision::Retry(delay) => {
                    tracing::debug!(space = %self.space_name, attempt, "space not ready, retrying");
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Fail => {
                    tracing::error!(
                        space = %self.space_name,
                        code = response.error_code,
                        message = %response.error_message(),
                        "failed to switch space"
                    );
                    return Err(DriverError::client(response.error_message()));
                }
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("space_name", &self.space_name)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::codec::ExecutionResponse;
    use crate::graph::codes;
    use crate::graph::testserver::TestServer;
    use crate::graph::value::{DataSet, NebulaValue, Row, Tag, Vertex};
    use std::time::Duration;

    use super::super::config::Address;

    fn address_of(server: &TestServer) -> Address {
        let addr = server.address();
        let (host, port) = addr.rsplit_once(':').unwrap();
        Address::new(host, port.parse().unwrap())
    }

    fn config_for(server: &TestServer) -> DriverConfig {
        DriverConfig::builder("test")
            .address(address_of(server))
            .max_sessions(2)
            .wait_time(Duration::from_millis(500))
            .space_retry(5, Duration::from_millis(10))
            .build()
    }

    fn session_with(config: DriverConfig) -> Session {
        let space = config.space_name.clone();
        let pool = Arc::new(ConnectionPool::new(config.clone()));
        Session::new(pool, space, &config)
    }

    #[tokio::test]
    async fn test_three_runs_share_one_connection_auth_and_use() {
        let server = TestServer::spawn().await;
        let session = session_with(config_for(&server));

        session.run("GO FROM 1 OVER e;").await.unwrap();
        session.run("GO FROM 2 OVER e;").await.unwrap();
        session.run("GO FROM 3 OVER e;").await.unwrap();

        assert_eq!(server.auth_count(), 1);
        assert_eq!(server.use_count(), 1);
        let statements = server.statements();
        assert_eq!(statements.len(), 4);
        assert_eq!(statements[0], "USE test;");
    }

    #[tokio::test]
    async fn test_space_not_found_retries_until_ready() {
        let server = TestServer::spawn().await;
        server.fail_space_not_found(2);
        let session = session_with(config_for(&server));

        session.run("GO FROM 1 OVER e;").await.unwrap();

        // Two failures plus the attempt that stuck.
        assert_eq!(server.use_count(), 3);
    }

    #[tokio::test]
    async fn test_space_not_found_exhausts_attempts() {
        let server = TestServer::spawn().await;
        server.fail_space_not_found(100);
        let mut config = config_for(&server);
        config.space_retry_attempts = 3;
        config.space_retry_interval = Duration::from_millis(1);
        let session = session_with(config);

        let err = session.run("GO FROM 1 OVER e;").await.unwrap_err();
        assert!(matches!(err, DriverError::Client(_)));
        assert_eq!(server.use_count(), 3);
    }

    #[tokio::test]
    async fn test_other_use_failure_is_fatal() {
        let server = TestServer::spawn().await;
        server.set_response(
            "USE test;",
            ExecutionResponse {
                error_code: codes::E_BAD_PERMISSION,
                error_msg: Some("permission denied".into()),
                ..Default::default()
            },
        );
        let session = session_with(config_for(&server));

        let err = session.run("GO FROM 1 OVER e;").await.unwrap_err();
        match err {
            DriverError::Client(msg) => assert!(msg.contains("permission denied")),
            other => panic!("expected Client error, got {:?}", other),
        }
        // No retry on a non-transient server failure.
        assert_eq!(server.use_count(), 1);
    }

    #[tokio::test]
    async fn test_server_failure_carries_message_and_is_not_retried() {
        let server = TestServer::spawn().await;
        server.set_response(
            "BROKEN;",
            ExecutionResponse {
                error_code: codes::E_SYNTAX_ERROR,
                error_msg: Some("syntax error near BROKEN".into()),
                ..Default::default()
            },
        );
        let session = session_with(config_for(&server));

        let err = session.run("BROKEN;").await.unwrap_err();
        match err {
            DriverError::Client(msg) => assert!(msg.contains("syntax error")),
            other => panic!("expected Client error, got {:?}", other),
        }
        let broken_count = server
            .statements()
            .iter()
            .filter(|s| s.as_str() == "BROKEN;")
            .count();
        assert_eq!(broken_count, 1);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_operations() {
        let server = TestServer::spawn().await;
        let session = session_with(config_for(&server));
        session.close();

        let err = session.run("YIELD 1;").await.unwrap_err();
        assert!(matches!(err, DriverError::SessionClosed));
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn test_ping() {
        let server = TestServer::spawn().await;
        let session = session_with(config_for(&server));
        session.ping().await.unwrap();
        assert!(server.statements().contains(&"YIELD 1;".to_string()));
    }

    #[tokio::test]
    async fn test_run_converts_result_rows() {
        let server = TestServer::spawn().await;
        let mut props = std::collections::HashMap::new();
        props.insert("name".to_string(), NebulaValue::string("n1"));
        server.set_response(
            "MATCH (n) RETURN n;",
            ExecutionResponse {
                error_code: codes::SUCCEEDED,
                data: Some(DataSet {
                    column_names: vec!["n".to_string()],
                    rows: vec![Row {
                        values: vec![NebulaValue::Vertex(Vertex {
                            vid: Box::new(NebulaValue::Int(9)),
                            tags: vec![Tag {
                                name: "host".into(),
                                props,
                            }],
                        })],
                    }],
                }),
                ..Default::default()
            },
        );
        let session = session_with(config_for(&server));

        let result = session.run("MATCH (n) RETURN n;").await.unwrap();
        let record = result.single().unwrap();
        let node = record.get_node("n").unwrap();
        assert_eq!(node.id, 9);
        assert_eq!(node.labels, vec!["host".to_string()]);
        assert_eq!(node.get("name").unwrap().as_str(), Some("n1"));

        let summary = result.consume();
        assert_eq!(summary.space_name, "test");
        assert_eq!(summary.query.text, "MATCH (n) RETURN n;");
    }

    #[tokio::test]
    async fn test_query_parameters_travel_natively() {
        let server = TestServer::spawn().await;
        let session = session_with(config_for(&server));

        let query = Query::new("MATCH (n) WHERE n.id == $id RETURN n;").with_param("id", 123i64);
        session.run(query).await.unwrap();

        assert!(server
            .statements()
            .contains(&"MATCH (n) WHERE n.id == $id RETURN n;".to_string()));
    }

    #[tokio::test]
    async fn test_sessions_share_the_pool() {
        let server = TestServer::spawn().await;
        let config = config_for(&server);
        let pool = Arc::new(ConnectionPool::new(config.clone()));
        let a = Session::new(pool.clone(), "test".into(), &config);
        let b = Session::new(pool.clone(), "test".into(), &config);

        a.run("GO FROM 1 OVER e;").await.unwrap();
        b.run("GO FROM 2 OVER e;").await.unwrap();

        // Second session reuses the connection the first returned, and the
        // space is already active on it.
        assert_eq!(server.auth_count(), 1);
        assert_eq!(server.use_count(), 1);
        assert_eq!(pool.size(), 1);
    }
}
