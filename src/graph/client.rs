//! Raw RPC client for one graph service connection.
//!
//! Owns a single TCP stream. Calls are strictly one-at-a-time; the client
//! is not reentrant and callers must serialize access to it.

use std::collections::HashMap;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder};

use super::codec::{ExecutionResponse, GraphClientCodec, GraphRequest, GraphResponse};
use super::codes;
use super::error::{GraphError, GraphResult, TransportKind};
use super::value::NebulaValue;
use super::CLIENT_VERSION;

/// Session handle returned by a successful authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthResult {
    pub session_id: i64,
    pub timezone_offset_seconds: i32,
}

/// Client side of one graph service connection.
pub struct GraphClient {
    stream: TcpStream,
    codec: GraphClientCodec,
    read_buffer: BytesMut,
    write_buffer: BytesMut,
    address: String,
    timeout: Duration,
    open: bool,
}

impl GraphClient {
    /// Open a TCP connection to a graph service node.
    ///
    /// `timeout` bounds the connect and every later call on this client;
    /// a zero timeout means unbounded.
    pub async fn connect(address: &str, timeout: Duration) -> GraphResult<Self> {
        let connect = TcpStream::connect(address);
        let stream = maybe_timeout(timeout, connect)
            .await
            .map_err(|_| GraphError::Connect {
                address: address.to_string(),
                message: "connect timed out".to_string(),
            })?
            .map_err(|e| GraphError::Connect {
                address: address.to_string(),
                message: e.to_string(),
            })?;
        stream.set_nodelay(true).ok();

        Ok(Self {
            stream,
            codec: GraphClientCodec,
            read_buffer: BytesMut::with_capacity(8192),
            write_buffer: BytesMut::with_capacity(8192),
            address: address.to_string(),
            timeout,
            open: true,
        })
    }

    /// Check the client protocol version against the server.
    pub async fn verify_version(&mut self) -> GraphResult<()> {
        let request = GraphRequest::VerifyVersion {
            version: CLIENT_VERSION.to_string(),
        };
        match self.call(request).await? {
            GraphResponse::VerifyVersion(status) if status.error_code == codes::SUCCEEDED => Ok(()),
            GraphResponse::VerifyVersion(status) => Err(GraphError::IncompatibleVersion(
                status.error_msg.unwrap_or_else(|| "version rejected by server".to_string()),
            )),
            other => Err(unexpected(&other)),
        }
    }

    /// Authenticate and obtain a session.
    pub async fn authenticate(&mut self, username: &[u8], password: &[u8]) -> GraphResult<AuthResult> {
        let request = GraphRequest::Authenticate {
            username: username.to_vec(),
            password: password.to_vec(),
        };
        match self.call(request).await? {
            GraphResponse::Authenticate(auth) if auth.error_code == codes::SUCCEEDED => Ok(AuthResult {
                session_id: auth.session_id,
                timezone_offset_seconds: auth.timezone_offset_seconds,
            }),
            GraphResponse::Authenticate(auth) => Err(GraphError::AuthFailed(
                auth.error_msg
                    .unwrap_or_else(|| "no error message in authentication response".to_string()),
            )),
            other => Err(unexpected(&other)),
        }
    }

    /// Execute a statement with native parameter binding.
    ///
    /// Server-side failures come back inside the [`ExecutionResponse`];
    /// only transport-level problems surface as `Err`.
    pub async fn execute(
        &mut self,
        session_id: i64,
        statement: &[u8],
        parameters: HashMap<Vec<u8>, NebulaValue>,
    ) -> GraphResult<ExecutionResponse> {
        let request = GraphRequest::Execute {
            session_id,
            statement: statement.to_vec(),
            parameters,
        };
        match self.call(request).await? {
            GraphResponse::Execute(exec) => Ok(exec),
            other => Err(unexpected(&other)),
        }
    }

    /// Sign the session out on the server.
    pub async fn signout(&mut self, session_id: i64) -> GraphResult<()> {
        match self.call(GraphRequest::Signout { session_id }).await? {
            GraphResponse::Signout(_) => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Liveness probe. Never errors.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The address this client is connected to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Close the transport. Idempotent.
    pub async fn close(&mut self) {
        if self.open {
            self.open = false;
            let _ = self.stream.shutdown().await;
        }
    }

    /// Send one request and wait for its response, bounded by the socket
    /// timeout. Any transport failure marks the client closed.
    async fn call(&mut self, request: GraphRequest) -> GraphResult<GraphResponse> {
        if !self.open {
            return Err(GraphError::not_open());
        }

        let result = maybe_timeout(self.timeout, self.roundtrip(request)).await;
        match result {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                self.open = false;
                Err(e)
            }
            Err(_) => {
                self.open = false;
                Err(GraphError::timed_out())
            }
        }
    }

    async fn roundtrip(&mut self, request: GraphRequest) -> GraphResult<GraphResponse> {
        self.write_buffer.clear();
        self.codec.encode(request, &mut self.write_buffer)?;
        self.stream
            .write_all(&self.write_buffer)
            .await
            .map_err(GraphError::from_io)?;
        self.stream.flush().await.map_err(GraphError::from_io)?;

        loop {
            if let Some(response) = self.codec.decode(&mut self.read_buffer)? {
                return Ok(response);
            }
            let n = self
                .stream
                .read_buf(&mut self.read_buffer)
                .await
                .map_err(GraphError::from_io)?;
            if n == 0 {
                return Err(GraphError::Transport {
                    kind: TransportKind::ConnectionBroken,
                    message: "connection closed by peer".to_string(),
                });
            }
        }
    }
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("address", &self.address)
            .field("open", &self.open)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn unexpected(response: &GraphResponse) -> GraphError {
    GraphError::Protocol(format!("unexpected response variant: {:?}", response))
}

async fn maybe_timeout<F: std::future::Future>(
    timeout: Duration,
    future: F,
) -> Result<F::Output, tokio::time::error::Elapsed> {
    if timeout.is_zero() {
        Ok(future.await)
    } else {
        tokio::time::timeout(timeout, future).await
    }
}
