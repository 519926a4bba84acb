//! Transaction call-shape adapter.
//!
//! The underlying store has no transactions: every statement is applied as
//! it executes. This type exists so code written against a
//! session/transaction API keeps its shape; `commit` and `rollback` are
//! deliberate no-ops.

use super::error::{DriverError, DriverResult};
use super::result::QueryResult;
use super::session::{Query, Session};

/// A transaction-shaped handle over a session.
pub struct Transaction<'a> {
    session: &'a Session,
    open: bool,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(session: &'a Session) -> Self {
        Self {
            session,
            open: true,
        }
    }

    /// Run a query inside the "transaction". Executes immediately; there
    /// is no buffering and no isolation.
    pub async fn run(&self, query: impl Into<Query>) -> DriverResult<QueryResult> {
        self.ensure_open()?;
        self.session.run(query).await
    }

    /// No-op. Statements already took effect when they ran.
    pub fn commit(&mut self) -> DriverResult<()> {
        self.ensure_open()?;
        self.open = false;
        Ok(())
    }

    /// No-op. Nothing executed by this transaction can be undone.
    pub fn rollback(&mut self) -> DriverResult<()> {
        self.ensure_open()?;
        self.open = false;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(DriverError::client("Transaction is already closed"))
        }
    }
}

impl Session {
    /// Begin a transaction-shaped handle on this session.
    pub fn begin_transaction(&self) -> DriverResult<Transaction<'_>> {
        if !self.is_open() {
            return Err(DriverError::SessionClosed);
        }
        Ok(Transaction::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::config::{Address, DriverConfig};
    use crate::driver::pool::ConnectionPool;
    use crate::graph::testserver::TestServer;
    use std::sync::Arc;
    use std::time::Duration;

    fn session_for(server: &TestServer) -> Session {
        let addr = server.address();
        let (host, port) = addr.rsplit_once(':').unwrap();
        let config = DriverConfig::builder("test")
            .address(Address::new(host, port.parse().unwrap()))
            .wait_time(Duration::from_millis(500))
            .build();
        let pool = Arc::new(ConnectionPool::new(config.clone()));
        Session::new(pool, "test".into(), &config)
    }

    #[tokio::test]
    async fn test_transaction_runs_and_commits() {
        let server = TestServer::spawn().await;
        let session = session_for(&server);

        let mut tx = session.begin_transaction().unwrap();
        tx.run("GO FROM 1 OVER e;").await.unwrap();
        tx.commit().unwrap();
        assert!(!tx.is_open());

        // Statements executed immediately, not on commit.
        assert!(server
            .statements()
            .contains(&"GO FROM 1 OVER e;".to_string()));
    }

    #[tokio::test]
    async fn test_rollback_undoes_nothing_and_closes() {
        let server = TestServer::spawn().await;
        let session = session_for(&server);

        let mut tx = session.begin_transaction().unwrap();
        tx.run("GO FROM 1 OVER e;").await.unwrap();
        tx.rollback().unwrap();

        assert!(tx.run("GO FROM 2 OVER e;").await.is_err());
        assert!(tx.commit().is_err());
    }

    #[tokio::test]
    async fn test_closed_session_rejects_begin() {
        let server = TestServer::spawn().await;
        let session = session_for(&server);
        session.close();
        assert!(session.begin_transaction().is_err());
    }
}
