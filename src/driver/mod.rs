//! Public driver layer.
//!
//! Call shape follows the session/transaction/result style of mainstream
//! graph drivers: a [`Driver`] owns the pool, a [`Session`] runs queries
//! against one space, results come back fully materialized with typed
//! values.

pub mod config;
pub mod convert;
pub mod reactive;
pub mod retry;
pub mod text;
mod connection;
mod driver;
mod error;
mod pool;
mod record;
mod result;
mod session;
mod transaction;
mod types;

pub use config::{Address, DriverConfig, DriverConfigBuilder, SslMode};
pub use connection::Connection;
pub use driver::Driver;
pub use error::{DriverError, DriverResult};
pub use pool::{ConnectionPool, PooledConnection, SessionData, SessionIdentifier};
pub use reactive::RecordStream;
pub use record::Record;
pub use result::{QueryResult, ResultSummary, SummaryCounters};
pub use retry::{RetryDecision, SpaceRetryPolicy, TransientRetryPolicy};
pub use session::{Query, Session};
pub use transaction::Transaction;
pub use types::{
    Duration, Node, OffsetTime, Path, Relationship, Segment, Value, RELATIONSHIP_ID,
};
