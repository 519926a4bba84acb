//! Wire value model for the graph service protocol.
//!
//! Values travel as a tagged union; exactly one variant is populated per
//! cell. The `Empty` tag is a zero-length collection placeholder and is
//! distinct from `Null`, which is the absence of a value.

use std::collections::HashMap;

// ============================================================================
// Temporal wire types
// ============================================================================

/// Calendar date as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    pub year: i16,
    pub month: i8,
    pub day: i8,
}

/// Wall-clock time as carried on the wire. The timezone offset is not part
/// of the value; it is the per-session offset captured at authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Time {
    pub hour: i8,
    pub minute: i8,
    pub sec: i8,
    pub microsec: i32,
}

/// Date and time as carried on the wire, field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub year: i16,
    pub month: i8,
    pub day: i8,
    pub hour: i8,
    pub minute: i8,
    pub sec: i8,
    pub microsec: i32,
}

/// Calendar-aware duration. Months are kept separate because a month has
/// no fixed length in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    pub seconds: i64,
    pub microseconds: i32,
    pub months: i8,
}

// ============================================================================
// Graph wire types
// ============================================================================

/// One named property schema attached to a vertex, with its values.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: String,
    pub props: HashMap<String, NebulaValue>,
}

/// A vertex: an id plus one or more tags.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub vid: Box<NebulaValue>,
    pub tags: Vec<Tag>,
}

/// A directed, typed edge between two vertex ids. Edges carry no identity
/// of their own on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub src: Box<NebulaValue>,
    pub dst: Box<NebulaValue>,
    pub name: String,
    pub ranking: i64,
    pub props: HashMap<String, NebulaValue>,
}

/// One traversal step in a path: the edge taken and the vertex it lands on.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub dst: Vertex,
    pub name: String,
    pub ranking: i64,
    pub props: HashMap<String, NebulaValue>,
}

/// A path: a source vertex and the steps walked from it, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub src: Vertex,
    pub steps: Vec<Step>,
}

// ============================================================================
// NebulaValue - the tagged union
// ============================================================================

/// The wire value tagged union.
#[derive(Debug, Clone, PartialEq)]
pub enum NebulaValue {
    /// Zero-length collection placeholder. Not the same as `Null`.
    Empty,
    /// Absence of a value.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Byte-string; statement results are UTF-8 in practice.
    Str(Vec<u8>),
    Date(Date),
    Time(Time),
    DateTime(DateTime),
    List(Vec<NebulaValue>),
    /// Order of a set is whatever the server sent; it is not guaranteed.
    Set(Vec<NebulaValue>),
    Map(HashMap<String, NebulaValue>),
    Duration(Duration),
    Vertex(Vertex),
    Edge(Edge),
    Path(Path),
    /// Opaque geography payload. Not supported by the conversion layer.
    Geography(Vec<u8>),
}

impl NebulaValue {
    /// Build a byte-string value from UTF-8 text.
    pub fn string(s: impl Into<String>) -> Self {
        NebulaValue::Str(s.into().into_bytes())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            NebulaValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NebulaValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&[u8]> {
        match self {
            NebulaValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Wire tag name, for diagnostics.
    pub fn tag_name(&self) -> &'static str {
        match self {
            NebulaValue::Empty => "Empty",
            NebulaValue::Null => "Null",
            NebulaValue::Bool(_) => "Bool",
            NebulaValue::Int(_) => "Int",
            NebulaValue::Float(_) => "Float",
            NebulaValue::Str(_) => "Str",
            NebulaValue::Date(_) => "Date",
            NebulaValue::Time(_) => "Time",
            NebulaValue::DateTime(_) => "DateTime",
            NebulaValue::List(_) => "List",
            NebulaValue::Set(_) => "Set",
            NebulaValue::Map(_) => "Map",
            NebulaValue::Duration(_) => "Duration",
            NebulaValue::Vertex(_) => "Vertex",
            NebulaValue::Edge(_) => "Edge",
            NebulaValue::Path(_) => "Path",
            NebulaValue::Geography(_) => "Geography",
        }
    }
}

// ============================================================================
// Result set wire types
// ============================================================================

/// One row of a result set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub values: Vec<NebulaValue>,
}

/// A fully materialized result set: column names in wire order plus rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSet {
    pub column_names: Vec<String>,
    pub rows: Vec<Row>,
}

impl DataSet {
    pub fn new(column_names: Vec<String>) -> Self {
        Self {
            column_names,
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
