//! In-process graph service for tests.
//!
//! Speaks the real wire protocol over a loopback listener so the client,
//! pool, and session layers can be exercised end to end. Behavior is
//! scriptable per statement, and the server keeps counters for the
//! assertions the concurrency and reuse tests need.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::{Decoder, Encoder};

use super::codec::{
    AuthResponse, ExecutionResponse, GraphRequest, GraphResponse, GraphServerCodec, StatusResponse,
};
use super::codes;
use super::value::{DataSet, NebulaValue, Row};

#[derive(Default)]
struct ServerState {
    next_session: AtomicI64,
    sessions: Mutex<HashSet<i64>>,
    auth_count: AtomicUsize,
    signout_count: AtomicUsize,
    statements: Mutex<Vec<String>>,
    /// Number of upcoming `USE` statements to fail with space-not-found.
    space_not_found_remaining: AtomicUsize,
    reject_version: AtomicBool,
    reject_auth: AtomicBool,
    responses: Mutex<HashMap<String, ExecutionResponse>>,
}

/// Scriptable loopback graph service.
pub(crate) struct TestServer {
    address: String,
    state: Arc<ServerState>,
    accept_task: JoinHandle<()>,
}

impl TestServer {
    pub(crate) async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let state = Arc::new(ServerState {
            next_session: AtomicI64::new(1),
            ..Default::default()
        });

        let accept_state = state.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let conn_state = accept_state.clone();
                tokio::spawn(async move {
                    let _ = serve_connection(stream, conn_state).await;
                });
            }
        });

        Self {
            address,
            state,
            accept_task,
        }
    }

    pub(crate) fn address(&self) -> String {
        self.address.clone()
    }

    pub(crate) fn auth_count(&self) -> usize {
        self.state.auth_count.load(Ordering::SeqCst)
    }

    pub(crate) fn signout_count(&self) -> usize {
        self.state.signout_count.load(Ordering::SeqCst)
    }

    /// Every executed statement, in arrival order.
    pub(crate) fn statements(&self) -> Vec<String> {
        self.state.statements.lock().clone()
    }

    /// Number of `USE` statements seen so far.
    pub(crate) fn use_count(&self) -> usize {
        self.statements()
            .iter()
            .filter(|s| s.starts_with("USE "))
            .count()
    }

    /// Fail the next `n` `USE` statements with space-not-found.
    pub(crate) fn fail_space_not_found(&self, n: usize) {
        self.state
            .space_not_found_remaining
            .store(n, Ordering::SeqCst);
    }

    /// Reject the protocol version check for new connections.
    pub(crate) fn reject_version(&self) {
        self.state.reject_version.store(true, Ordering::SeqCst);
    }

    /// Reject all authentication attempts.
    pub(crate) fn reject_auth(&self) {
        self.state.reject_auth.store(true, Ordering::SeqCst);
    }

    /// Script the response for an exact statement text.
    pub(crate) fn set_response(&self, statement: impl Into<String>, response: ExecutionResponse) {
        self.state.responses.lock().insert(statement.into(), response);
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve_connection(mut stream: TcpStream, state: Arc<ServerState>) -> std::io::Result<()> {
    let mut codec = GraphServerCodec;
    let mut read_buffer = BytesMut::with_capacity(8192);
    let mut write_buffer = BytesMut::with_capacity(8192);

    loop {
        let request = loop {
            match codec.decode(&mut read_buffer) {
                Ok(Some(request)) => break request,
                Ok(None) => {}
                Err(_) => return Ok(()),
            }
            if stream.read_buf(&mut read_buffer).await? == 0 {
                return Ok(());
            }
        };

        let response = handle_request(request, &state);
        write_buffer.clear();
        if codec.encode(response, &mut write_buffer).is_err() {
            return Ok(());
        }
        stream.write_all(&write_buffer).await?;
        stream.flush().await?;
    }
}

fn handle_request(request: GraphRequest, state: &ServerState) -> GraphResponse {
    match request {
        GraphRequest::VerifyVersion { .. } => {
            if state.reject_version.load(Ordering::SeqCst) {
                GraphResponse::VerifyVersion(StatusResponse::error(
                    codes::E_CLIENT_SERVER_INCOMPATIBLE,
                    "please upgrade the client",
                ))
            } else {
                GraphResponse::VerifyVersion(StatusResponse::ok())
            }
        }
        GraphRequest::Authenticate { username, password } => {
            let rejected = state.reject_auth.load(Ordering::SeqCst)
                || username != b"root"
                || password != b"nebula";
            if rejected {
                return GraphResponse::Authenticate(AuthResponse {
                    error_code: codes::E_BAD_USERNAME_PASSWORD,
                    error_msg: Some("bad username/password".to_string()),
                    ..Default::default()
                });
            }
            state.auth_count.fetch_add(1, Ordering::SeqCst);
            let session_id = state.next_session.fetch_add(1, Ordering::SeqCst);
            state.sessions.lock().insert(session_id);
            GraphResponse::Authenticate(AuthResponse {
                error_code: codes::SUCCEEDED,
                error_msg: None,
                session_id,
                timezone_offset_seconds: 3600,
            })
        }
        GraphRequest::Execute {
            session_id,
            statement,
            ..
        } => {
            if !state.sessions.lock().contains(&session_id) {
                return GraphResponse::Execute(ExecutionResponse {
                    error_code: codes::E_SESSION_INVALID,
                    error_msg: Some(format!("invalid session id {}", session_id)),
                    ..Default::default()
                });
            }

            let text = String::from_utf8_lossy(&statement).to_string();
            state.statements.lock().push(text.clone());

            if let Some(response) = state.responses.lock().get(&text) {
                return GraphResponse::Execute(response.clone());
            }

            if text.starts_with("USE ") {
                let remaining = &state.space_not_found_remaining;
                let failed = remaining
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if failed {
                    return GraphResponse::Execute(ExecutionResponse {
                        error_code: codes::E_SPACE_NOT_FOUND,
                        error_msg: Some("SpaceNotFound".to_string()),
                        ..Default::default()
                    });
                }
                return GraphResponse::Execute(ExecutionResponse {
                    error_code: codes::SUCCEEDED,
                    space_name: text
                        .trim_start_matches("USE ")
                        .trim_end_matches(';')
                        .trim()
                        .to_string()
                        .into(),
                    ..Default::default()
                });
            }

            if text.starts_with("YIELD 1") {
                return GraphResponse::Execute(ExecutionResponse {
                    error_code: codes::SUCCEEDED,
                    data: Some(DataSet {
                        column_names: vec!["1".to_string()],
                        rows: vec![Row {
                            values: vec![NebulaValue::Int(1)],
                        }],
                    }),
                    latency_us: 42,
                    ..Default::default()
                });
            }

            GraphResponse::Execute(ExecutionResponse {
                error_code: codes::SUCCEEDED,
                data: Some(DataSet::default()),
                ..Default::default()
            })
        }
        GraphRequest::Signout { session_id } => {
            state.signout_count.fetch_add(1, Ordering::SeqCst);
            state.sessions.lock().remove(&session_id);
            GraphResponse::Signout(StatusResponse::ok())
        }
    }
}
