//! A single row of a query result.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::error::{DriverError, DriverResult};
use super::types::{Node, Path, Relationship, Value};

static NULL_VALUE: Value = Value::Null;

/// One record: the result's column names plus this row's values.
///
/// The column-name-to-index map is computed once per result and shared by
/// every record, so keyed lookups are O(1).
#[derive(Debug, Clone)]
pub struct Record {
    keys: Arc<Vec<String>>,
    key_index: Arc<HashMap<String, usize>>,
    values: Vec<Value>,
}

impl Record {
    pub(crate) fn new(
        keys: Arc<Vec<String>>,
        key_index: Arc<HashMap<String, usize>>,
        values: Vec<Value>,
    ) -> Self {
        Self {
            keys,
            key_index,
            values,
        }
    }

    /// Build a free-standing record. Intended for tests and adapters.
    pub fn from_pairs(keys: Vec<String>, values: Vec<Value>) -> Self {
        let key_index = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), i))
            .collect();
        Self::new(Arc::new(keys), Arc::new(key_index), values)
    }

    /// Column names, in wire order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Values, in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.key_index.contains_key(key)
    }

    /// Value under `key`; a null value when the key is unknown.
    pub fn get(&self, key: &str) -> &Value {
        self.key_index
            .get(key)
            .and_then(|&i| self.values.get(i))
            .unwrap_or(&NULL_VALUE)
    }

    /// Column index of `key`; unknown keys are an error.
    pub fn index(&self, key: &str) -> DriverResult<usize> {
        self.key_index
            .get(key)
            .copied()
            .ok_or_else(|| DriverError::no_such_record(format!("Key does not exist: {}", key)))
    }

    /// Value at a column index; out-of-range indexes are an error.
    pub fn get_index(&self, index: usize) -> DriverResult<&Value> {
        self.values.get(index).ok_or_else(|| {
            DriverError::no_such_record(format!(
                "Index {} out of range for {} columns",
                index,
                self.values.len()
            ))
        })
    }

    /// Value under `key` converted to `T`.
    pub fn get_as<T>(&self, key: &str) -> DriverResult<T>
    where
        T: TryFrom<Value, Error = DriverError>,
    {
        T::try_from(self.get(key).clone())
    }

    pub fn get_bool(&self, key: &str) -> DriverResult<bool> {
        self.get_as(key)
    }

    pub fn get_int(&self, key: &str) -> DriverResult<i64> {
        self.get_as(key)
    }

    pub fn get_float(&self, key: &str) -> DriverResult<f64> {
        self.get_as(key)
    }

    pub fn get_string(&self, key: &str) -> DriverResult<String> {
        self.get_as(key)
    }

    pub fn get_node(&self, key: &str) -> DriverResult<Node> {
        self.get_as(key)
    }

    pub fn get_relationship(&self, key: &str) -> DriverResult<Relationship> {
        self.get_as(key)
    }

    pub fn get_path(&self, key: &str) -> DriverResult<Path> {
        self.get_as(key)
    }

    /// Value under `key` as `Option<T>`; null and unknown keys are `None`.
    pub fn get_optional<T>(&self, key: &str) -> DriverResult<Option<T>>
    where
        T: TryFrom<Value, Error = DriverError>,
    {
        match self.get(key) {
            Value::Null => Ok(None),
            v => T::try_from(v.clone()).map(Some),
        }
    }

    /// The record as a key-to-value map.
    pub fn to_map(&self) -> HashMap<String, Value> {
        self.keys
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self
            .keys
            .iter()
            .zip(self.values.iter())
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = std::iter::Zip<std::slice::Iter<'a, String>, std::slice::Iter<'a, Value>>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.iter().zip(self.values.iter())
    }
}
