//! Query result and summary.
//!
//! The wire protocol returns complete row sets, so a result is fully
//! materialized up front. The cursor methods exist to match the target
//! call shape, not to stream.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::graph::value::DataSet;

use super::config::Address;
use super::convert;
use super::error::{DriverError, DriverResult};
use super::record::Record;
use super::session::Query;

// ============================================================================
// SummaryCounters
// ============================================================================

/// Update counters for a statement.
///
/// The graph service reports none, so every field is zero; the struct
/// exists to satisfy the summary surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryCounters {
    pub nodes_created: i64,
    pub nodes_deleted: i64,
    pub relationships_created: i64,
    pub relationships_deleted: i64,
    pub properties_set: i64,
    pub labels_added: i64,
    pub labels_removed: i64,
    pub indexes_added: i64,
    pub indexes_removed: i64,
    pub constraints_added: i64,
    pub constraints_removed: i64,
}

impl SummaryCounters {
    pub fn contains_updates(&self) -> bool {
        self.nodes_created > 0
            || self.nodes_deleted > 0
            || self.relationships_created > 0
            || self.relationships_deleted > 0
            || self.properties_set > 0
            || self.labels_added > 0
            || self.labels_removed > 0
    }
}

// ============================================================================
// ResultSummary
// ============================================================================

/// Summary of one executed query.
#[derive(Debug, Clone)]
pub struct ResultSummary {
    /// Client-measured execution time.
    pub elapsed: Duration,
    /// The query that produced this result.
    pub query: Query,
    /// The space the query ran against.
    pub space_name: String,
    /// The node that served the query.
    pub address: Address,
    pub counters: SummaryCounters,
}

impl ResultSummary {
    pub fn new(elapsed: Duration, query: Query, space_name: String, address: Address) -> Self {
        Self {
            elapsed,
            query,
            space_name,
            address,
            counters: SummaryCounters::default(),
        }
    }
}

// ============================================================================
// QueryResult
// ============================================================================

/// An index-addressable, iterable query result.
#[derive(Debug)]
pub struct QueryResult {
    keys: Arc<Vec<String>>,
    records: Vec<Record>,
    cursor: usize,
    summary: ResultSummary,
}

impl QueryResult {
    /// Materialize a wire result set, converting every cell.
    pub(crate) fn from_wire(
        data: DataSet,
        timezone_offset: i32,
        summary: ResultSummary,
    ) -> DriverResult<Self> {
        let keys = Arc::new(data.column_names);
        let key_index: Arc<HashMap<String, usize>> = Arc::new(
            keys.iter()
                .enumerate()
                .map(|(i, k)| (k.clone(), i))
                .collect(),
        );

        let mut records = Vec::with_capacity(data.rows.len());
        for row in &data.rows {
            let values = row
                .values
                .iter()
                .map(|v| convert::to_value(v, timezone_offset))
                .collect::<DriverResult<Vec<_>>>()?;
            records.push(Record::new(keys.clone(), key_index.clone(), values));
        }

        Ok(Self {
            keys,
            records,
            cursor: 0,
            summary,
        })
    }

    /// Column names, in wire order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Total number of records, regardless of cursor position.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Whether [`next`](Self::next) would return another record.
    pub fn has_next(&self) -> bool {
        self.cursor < self.records.len()
    }

    /// Advance to and return the next record.
    pub fn next_record(&mut self) -> DriverResult<Record> {
        if !self.has_next() {
            return Err(DriverError::no_such_record("No more records left"));
        }
        let record = self.records[self.cursor].clone();
        self.cursor += 1;
        Ok(record)
    }

    /// The sole record of the result; an error unless exactly one row came
    /// back.
    pub fn single(&self) -> DriverResult<Record> {
        if self.records.len() != 1 {
            return Err(DriverError::no_such_record(format!(
                "Invalid number of records returned: {}",
                self.records.len()
            )));
        }
        Ok(self.records[0].clone())
    }

    /// The record the cursor is on, without advancing.
    pub fn peek(&self) -> DriverResult<&Record> {
        self.records
            .get(self.cursor)
            .ok_or_else(|| DriverError::no_such_record("Peek past the end of the result"))
    }

    /// All remaining records. Exhausts the cursor.
    pub fn list(&mut self) -> Vec<Record> {
        let remaining = self.records[self.cursor..].to_vec();
        self.cursor = self.records.len();
        remaining
    }

    /// The result summary.
    pub fn consume(&self) -> ResultSummary {
        self.summary.clone()
    }
}

impl Iterator for QueryResult {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().ok()
    }
}
