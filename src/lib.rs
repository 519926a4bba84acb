//! # NebulaGraph Driver
//!
//! A Rust client driver for [NebulaGraph](https://nebula-graph.io) clusters
//! with the session/result call shape of mainstream graph drivers.
//!
//! ## Features
//!
//! - **Connection pooling** - Pooled transports with session reuse: one
//!   authenticated server session is shared by every pooled connection with
//!   the same address and credentials
//! - **Cluster rotation** - Round-robin across configured nodes with retry
//!   on connect failures
//! - **Space management** - Lazy `USE <space>` switching with bounded retry
//!   while a freshly created space propagates through the cluster
//! - **Typed values** - Wire values convert into a rich value model:
//!   scalars, temporal types, collections, nodes, relationships, paths
//! - **Async/Await** - Built on Tokio
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use nebula_driver::{Address, Driver, DriverConfig, Query};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DriverConfig::builder("my_space")
//!         .address(Address::new("graphd-1", 9669))
//!         .address(Address::new("graphd-2", 9669))
//!         .username("root")
//!         .password("nebula")
//!         .build();
//!
//!     let driver = Driver::new(config)?;
//!     driver.verify_connectivity().await?;
//!
//!     let session = driver.session()?;
//!     let query = Query::new("MATCH (n:host) WHERE id(n) == $id RETURN n")
//!         .with_param("id", 123i64);
//!     let mut result = session.run(query).await?;
//!
//!     while result.has_next() {
//!         let record = result.next_record()?;
//!         println!("{}", record);
//!     }
//!
//!     session.close();
//!     driver.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`driver`] - Driver, session, pool, results, and the value model
//! - [`graph`] - Low-level wire protocol implementation

pub mod driver;
pub mod graph;

pub use driver::{
    Address, Driver, DriverConfig, DriverConfigBuilder, DriverError, DriverResult, Duration,
    Node, OffsetTime, Path, Query, QueryResult, Record, RecordStream, Relationship,
    ResultSummary, Segment, Session, SslMode, Transaction, Value,
};

pub use graph::{GraphError, NebulaValue, TransportKind};
