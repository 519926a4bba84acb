//! Server status codes returned by the graph service.
//!
//! The numeric values are part of the wire contract and must not change.

/// The request completed successfully.
pub const SUCCEEDED: i32 = 0;

/// The connection to the peer was lost mid-request.
pub const E_DISCONNECTED: i32 = -1;
/// The server could not be reached.
pub const E_FAIL_TO_CONNECT: i32 = -2;
/// The RPC layer failed before a response was produced.
pub const E_RPC_FAILURE: i32 = -3;

/// Bad username or password.
pub const E_BAD_USERNAME_PASSWORD: i32 = -1001;
/// The session id is not known to the server.
pub const E_SESSION_INVALID: i32 = -1002;
/// The session expired on the server side.
pub const E_SESSION_TIMEOUT: i32 = -1003;
/// The statement failed to parse.
pub const E_SYNTAX_ERROR: i32 = -1004;
/// The statement failed during execution.
pub const E_EXECUTION_ERROR: i32 = -1005;
/// The statement was empty.
pub const E_STATEMENT_EMPTY: i32 = -1006;
/// The user lacks permission for the statement.
pub const E_BAD_PERMISSION: i32 = -1008;
/// The statement failed semantic analysis.
pub const E_SEMANTIC_ERROR: i32 = -1009;
/// The client and server protocol versions are incompatible.
pub const E_CLIENT_SERVER_INCOMPATIBLE: i32 = -1010;

/// The named space does not exist (yet) on the contacted node.
///
/// Newly created spaces propagate through the cluster asynchronously, so
/// this code is treated as transient by the session space-switch retry.
pub const E_SPACE_NOT_FOUND: i32 = -23;
