//! Wire protocol layer for the graph service.
//!
//! A binary RPC contract over TCP: one request frame, one response frame.
//! Four methods exist — version check, authenticate, execute, sign-out —
//! and the layer treats them as fixed; no feature negotiation happens.
//!
//! Nothing in this module knows about pooling, spaces, or the public value
//! model; that all lives in [`crate::driver`].

pub mod client;
pub mod codec;
pub mod codes;
pub mod error;
pub mod value;

#[cfg(test)]
pub(crate) mod testserver;

pub use client::{AuthResult, GraphClient};
pub use codec::{ExecutionResponse, GraphRequest, GraphResponse};
pub use error::{GraphError, GraphResult, TransportKind};
pub use value::{DataSet, NebulaValue};

/// Client version string sent in the version check.
pub const CLIENT_VERSION: &str = "3.0.0";
