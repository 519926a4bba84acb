//! Public value model.
//!
//! These are the types query results expose to callers. Wire values are
//! converted into this model by [`crate::driver::convert`].

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime as ChronoDateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::error::{DriverError, DriverResult};

/// Identity assigned to every relationship.
///
/// The store has no edge-id concept, so all relationships share this
/// sentinel. Consumers must not rely on relationship identity being unique.
pub const RELATIONSHIP_ID: i64 = i64::MAX;

// ============================================================================
// Value
// ============================================================================

/// A wall-clock time with a fixed UTC offset in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetTime {
    pub time: NaiveTime,
    pub offset_seconds: i32,
}

impl OffsetTime {
    pub fn new(time: NaiveTime, offset_seconds: i32) -> Self {
        Self {
            time,
            offset_seconds,
        }
    }

    /// The offset as a chrono [`FixedOffset`].
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.offset_seconds).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
    }
}

impl fmt::Display for OffsetTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.time, self.offset())
    }
}

/// A calendar-aware duration.
///
/// Months stay separate from days: a month has no fixed day length, so the
/// conversion layer never folds one into the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duration {
    pub months: i64,
    pub days: i64,
    pub seconds: i64,
    pub nanoseconds: i32,
}

impl Duration {
    pub fn new(months: i64, days: i64, seconds: i64, nanoseconds: i32) -> Self {
        Self {
            months,
            days,
            seconds,
            nanoseconds,
        }
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P{}M{}DT{}S",
            self.months,
            self.days,
            self.seconds as f64 + self.nanoseconds as f64 / 1_000_000_000.0
        )
    }
}

/// A value in a query result or parameter map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    Node(Node),
    Relationship(Relationship),
    Path(Path),
    Date(NaiveDate),
    Time(OffsetTime),
    DateTime(ChronoDateTime<FixedOffset>),
    Duration(Duration),
}

impl Value {
    /// Whether this is the null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this is a zero-length collection.
    ///
    /// The wire protocol has an "empty" tag distinct from null; it converts
    /// to an empty list, so `is_empty` and `is_null` never agree on it.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::List(l) => l.is_empty(),
            Value::Map(m) => m.is_empty(),
            _ => false,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Value::Relationship(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Value::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<OffsetTime> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<ChronoDateTime<FixedOffset>> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Value::Duration(d) => Some(*d),
            _ => None,
        }
    }

    /// Type name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Node(_) => "Node",
            Value::Relationship(_) => "Relationship",
            Value::Path(_) => "Path",
            Value::Date(_) => "Date",
            Value::Time(_) => "Time",
            Value::DateTime(_) => "DateTime",
            Value::Duration(_) => "Duration",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::List(l) => write!(f, "[{} items]", l.len()),
            Value::Map(m) => write!(f, "{{{} entries}}", m.len()),
            Value::Node(n) => write!(f, "{}", n),
            Value::Relationship(r) => write!(f, "{}", r),
            Value::Path(p) => write!(f, "{}", p),
            Value::Date(d) => write!(f, "{}", d),
            Value::Time(t) => write!(f, "{}", t),
            Value::DateTime(dt) => write!(f, "{}", dt),
            Value::Duration(d) => write!(f, "{}", d),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<ChronoDateTime<FixedOffset>> for Value {
    fn from(v: ChronoDateTime<FixedOffset>) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

// ============================================================================
// Node
// ============================================================================

/// A graph node: identity, labels in wire order, merged properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    pub labels: Vec<String>,
    pub properties: HashMap<String, Value>,
}

impl Node {
    pub fn new(id: i64, labels: Vec<String>, properties: HashMap<String, Value>) -> Self {
        Self {
            id,
            labels,
            properties,
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = if self.labels.is_empty() {
            String::new()
        } else {
            format!(":{}", self.labels.join(":"))
        };
        write!(f, "({}{})", self.id, labels)
    }
}

// ============================================================================
// Relationship
// ============================================================================

/// A directed, typed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Always [`RELATIONSHIP_ID`]; the wire model carries no edge identity.
    pub id: i64,
    pub start_node_id: i64,
    pub end_node_id: i64,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub properties: HashMap<String, Value>,
}

impl Relationship {
    pub fn new(
        start_node_id: i64,
        end_node_id: i64,
        rel_type: String,
        properties: HashMap<String, Value>,
    ) -> Self {
        Self {
            id: RELATIONSHIP_ID,
            start_node_id,
            end_node_id,
            rel_type,
            properties,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({})-[:{}]->({})",
            self.start_node_id, self.rel_type, self.end_node_id
        )
    }
}

// ============================================================================
// Path
// ============================================================================

/// One step of a path: a start node, the relationship traversed, and the
/// end node.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment<'a> {
    pub start: &'a Node,
    pub relationship: &'a Relationship,
    pub end: &'a Node,
}

/// An ordered walk through the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

impl Path {
    pub fn new(nodes: Vec<Node>, relationships: Vec<Relationship>) -> Self {
        Self {
            nodes,
            relationships,
        }
    }

    /// Path length in relationships.
    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    pub fn start(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn end(&self) -> Option<&Node> {
        self.nodes.last()
    }

    /// Segments in order, pairing each relationship with the nodes around
    /// it.
    pub fn segments(&self) -> impl Iterator<Item = Segment<'_>> {
        self.relationships.iter().enumerate().map(move |(i, rel)| Segment {
            start: &self.nodes[i],
            relationship: rel,
            end: &self.nodes[i + 1],
        })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Path: {} nodes, {} rels>",
            self.nodes.len(),
            self.relationships.len()
        )
    }
}

// ============================================================================
// TryFrom implementations
// ============================================================================

macro_rules! impl_try_from_value {
    ($target:ty, $variant:ident, $name:expr) => {
        impl TryFrom<Value> for $target {
            type Error = DriverError;

            fn try_from(value: Value) -> DriverResult<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => Err(DriverError::type_conversion(format!(
                        "Cannot convert {} to {}",
                        other.type_name(),
                        $name
                    ))),
                }
            }
        }
    };
}

impl_try_from_value!(bool, Boolean, "bool");
impl_try_from_value!(i64, Integer, "i64");
impl_try_from_value!(String, String, "String");
impl_try_from_value!(Node, Node, "Node");
impl_try_from_value!(Relationship, Relationship, "Relationship");
impl_try_from_value!(Path, Path, "Path");
impl_try_from_value!(NaiveDate, Date, "NaiveDate");
impl_try_from_value!(OffsetTime, Time, "OffsetTime");
impl_try_from_value!(Duration, Duration, "Duration");
impl_try_from_value!(Vec<Value>, List, "List");
impl_try_from_value!(HashMap<String, Value>, Map, "Map");

impl TryFrom<Value> for f64 {
    type Error = DriverError;

    fn try_from(value: Value) -> DriverResult<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Integer(i) => Ok(i as f64),
            other => Err(DriverError::type_conversion(format!(
                "Cannot convert {} to f64",
                other.type_name()
            ))),
        }
    }
}

impl TryFrom<Value> for ChronoDateTime<FixedOffset> {
    type Error = DriverError;

    fn try_from(value: Value) -> DriverResult<Self> {
        match value {
            Value::DateTime(dt) => Ok(dt),
            other => Err(DriverError::type_conversion(format!(
                "Cannot convert {} to DateTime",
                other.type_name()
            ))),
        }
    }
}
