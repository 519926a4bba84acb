//! One pooled connection to a graph service node.

use std::collections::HashMap;

use std::time::Duration;

use crate::graph::client::GraphClient;
use crate::graph::codec::ExecutionResponse;
use crate::graph::value::NebulaValue;

use super::config::Address;
use super::error::DriverResult;
use super::pool::{SessionData, SessionIdentifier};

/// An authenticated connection: one exclusive transport bound to a server
/// session.
///
/// The underlying client is not reentrant; exclusivity is enforced by the
/// pool handing a connection to at most one borrower at a time.
pub struct Connection {
    id: u64,
    identifier: SessionIdentifier,
    session: SessionData,
    client: GraphClient,
    /// The space the server-side session last executed a `USE` against.
    /// Only the current borrower mutates this.
    current_space: Option<String>,
}

impl Connection {
    /// Open a connection for `identifier`.
    ///
    /// When `existing` carries session data that a sibling connection
    /// already authenticated for this identifier, the version check and
    /// authentication are skipped and the connection binds to that
    /// session. Otherwise the full handshake runs: version check first,
    /// failing fast on an incompatible client, then authentication.
    pub async fn open(
        id: u64,
        identifier: SessionIdentifier,
        existing: Option<SessionData>,
        timeout: Duration,
    ) -> DriverResult<Self> {
        let mut client = GraphClient::connect(&identifier.address.to_socket_addr(), timeout).await?;

        let session = match existing {
            Some(data) => data,
            None => {
                client.verify_version().await?;
                let auth = client
                    .authenticate(identifier.username.as_bytes(), identifier.password.as_bytes())
                    .await?;
                SessionData::new(auth.session_id, auth.timezone_offset_seconds)
            }
        };

        Ok(Self {
            id,
            identifier,
            session,
            client,
            current_space: None,
        })
    }

    /// Execute one statement. Callers must not invoke this concurrently;
    /// the client allows a single in-flight call.
    pub async fn execute(
        &mut self,
        statement: &str,
        parameters: HashMap<Vec<u8>, NebulaValue>,
    ) -> DriverResult<ExecutionResponse> {
        let response = self
            .client
            .execute(self.session.session_id, statement.as_bytes(), parameters)
            .await?;
        Ok(response)
    }

    /// Liveness probe used by the pool validator. Never errors.
    pub fn is_open(&self) -> bool {
        self.client.is_open()
    }

    /// Best-effort sign-out of the server session. Called by the pool only
    /// when this connection is the last reference to its session data.
    pub async fn sign_out(&mut self) -> DriverResult<()> {
        self.client.signout(self.session.session_id).await?;
        Ok(())
    }

    /// Close the transport. Idempotent, never errors.
    pub async fn close(&mut self) {
        self.client.close().await;
    }

    /// Whether running against `space` requires a `USE` first.
    pub fn needs_space_switch(&self, space: &str) -> bool {
        self.current_space.as_deref() != Some(space)
    }

    /// Record that the server-side session switched to `space`.
    pub fn set_current_space(&mut self, space: &str) {
        self.current_space = Some(space.to_string());
    }

    /// Pool-local connection id.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn identifier(&self) -> &SessionIdentifier {
        &self.identifier
    }

    /// The session data this connection was opened with.
    pub fn session_data(&self) -> SessionData {
        self.session
    }

    /// Session timezone offset in seconds east of UTC, captured at
    /// authentication.
    pub fn timezone_offset(&self) -> i32 {
        self.session.timezone_offset_seconds
    }

    pub fn address(&self) -> &Address {
        &self.identifier.address
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("address", &self.identifier.address)
            .field("session_id", &self.session.session_id)
            .field("current_space", &self.current_space)
            .field("open", &self.is_open())
            .finish()
    }
}
