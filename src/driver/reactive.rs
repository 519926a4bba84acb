//! Stream facade over query results.
//!
//! Adapts the synchronous result contract into a `futures::Stream` of
//! records. Pure pass-through: no retry and no conversion logic lives
//! here.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio_stream::StreamExt;

use super::error::{DriverError, DriverResult};
use super::record::Record;
use super::result::QueryResult;
use super::session::{Query, Session};

/// Asynchronous stream of records.
pub struct RecordStream {
    inner: Pin<Box<dyn Stream<Item = DriverResult<Record>> + Send>>,
    keys: Option<Vec<String>>,
}

impl RecordStream {
    /// Wrap a finished result as a stream.
    pub fn from_result(mut result: QueryResult) -> Self {
        let keys = Some(result.keys().to_vec());
        let records = result.list();
        Self {
            inner: Box::pin(tokio_stream::iter(records.into_iter().map(Ok))),
            keys,
        }
    }

    pub fn empty() -> Self {
        Self {
            inner: Box::pin(tokio_stream::empty()),
            keys: None,
        }
    }

    /// A stream that yields one error.
    pub fn from_error(err: DriverError) -> Self {
        Self {
            inner: Box::pin(tokio_stream::once(Err(err))),
            keys: None,
        }
    }

    /// Column names, when known.
    pub fn keys(&self) -> Option<&[String]> {
        self.keys.as_deref()
    }

    /// Collect every record, discarding errors.
    pub async fn collect(self) -> Vec<Record> {
        self.inner.filter_map(|r| r.ok()).collect().await
    }

    /// Collect every record, stopping at the first error.
    pub async fn try_collect(mut self) -> DriverResult<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(item) = self.inner.next().await {
            records.push(item?);
        }
        Ok(records)
    }

    /// The first record, if any.
    pub async fn first(self) -> Option<Record> {
        let mut inner = self.inner;
        while let Some(item) = inner.next().await {
            if let Ok(record) = item {
                return Some(record);
            }
        }
        None
    }

    /// Exactly one record, or an error.
    pub async fn single(self) -> DriverResult<Record> {
        let records = self.try_collect().await?;
        if records.len() != 1 {
            return Err(DriverError::no_such_record(format!(
                "Expected a single record, got {}",
                records.len()
            )));
        }
        Ok(records.into_iter().next().expect("length checked above"))
    }
}

impl Stream for RecordStream {
    type Item = DriverResult<Record>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStream").field("keys", &self.keys).finish()
    }
}

impl Session {
    /// Run a query and expose the result as a record stream.
    pub async fn run_stream(&self, query: impl Into<Query>) -> RecordStream {
        match self.run(query).await {
            Ok(result) => RecordStream::from_result(result),
            Err(e) => RecordStream::from_error(e),
        }
    }
}
