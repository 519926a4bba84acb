//! Conversion between wire values and the public value model.
//!
//! `to_value` is total over every wire tag except geography, which has no
//! supported representation. Temporal conversions take the wire fields as
//! given and attach the session timezone offset captured at
//! authentication; nothing here infers a timezone.

use std::collections::HashMap;

use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeZone};

use crate::graph::value as wire;
use crate::graph::value::NebulaValue;

use super::error::{DriverError, DriverResult};
use super::types::{Duration, Node, OffsetTime, Path, Relationship, Value};

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SECOND;

/// Convert one wire value into the public model.
///
/// `timezone_offset` is the session offset in seconds east of UTC.
pub fn to_value(value: &NebulaValue, timezone_offset: i32) -> DriverResult<Value> {
    match value {
        // Empty marks a zero-length collection placeholder; it converts to
        // an empty list and must not collapse into null.
        NebulaValue::Empty => Ok(Value::List(Vec::new())),
        NebulaValue::Null => Ok(Value::Null),
        NebulaValue::Bool(b) => Ok(Value::Boolean(*b)),
        NebulaValue::Int(i) => Ok(Value::Integer(*i)),
        NebulaValue::Float(f) => Ok(Value::Float(*f)),
        NebulaValue::Str(s) => Ok(Value::String(String::from_utf8_lossy(s).into_owned())),
        NebulaValue::Date(d) => Ok(Value::Date(to_date(d)?)),
        NebulaValue::Time(t) => Ok(Value::Time(to_time(t, timezone_offset)?)),
        NebulaValue::DateTime(dt) => Ok(Value::DateTime(to_datetime(dt, timezone_offset)?)),
        NebulaValue::List(items) | NebulaValue::Set(items) => {
            let converted = items
                .iter()
                .map(|item| to_value(item, timezone_offset))
                .collect::<DriverResult<Vec<_>>>()?;
            Ok(Value::List(converted))
        }
        NebulaValue::Map(map) => Ok(Value::Map(to_value_map(map, timezone_offset)?)),
        NebulaValue::Duration(d) => Ok(Value::Duration(to_duration(d))),
        NebulaValue::Vertex(v) => Ok(Value::Node(to_node(v, timezone_offset)?)),
        NebulaValue::Edge(e) => Ok(Value::Relationship(to_relationship(e, timezone_offset)?)),
        NebulaValue::Path(p) => Ok(Value::Path(to_path(p, timezone_offset)?)),
        NebulaValue::Geography(_) => Err(DriverError::unsupported(
            "geography values have no supported representation",
        )),
    }
}

fn to_value_map(
    map: &HashMap<String, NebulaValue>,
    timezone_offset: i32,
) -> DriverResult<HashMap<String, Value>> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), to_value(v, timezone_offset)?)))
        .collect()
}

fn to_date(d: &wire::Date) -> DriverResult<NaiveDate> {
    NaiveDate::from_ymd_opt(d.year as i32, d.month as u32, d.day as u32)
        .ok_or_else(|| DriverError::type_conversion(format!("invalid date {:?}", d)))
}

fn to_time(t: &wire::Time, timezone_offset: i32) -> DriverResult<OffsetTime> {
    let time = NaiveTime::from_hms_micro_opt(
        t.hour as u32,
        t.minute as u32,
        t.sec as u32,
        t.microsec as u32,
    )
    .ok_or_else(|| DriverError::type_conversion(format!("invalid time {:?}", t)))?;
    Ok(OffsetTime::new(time, timezone_offset))
}

fn to_datetime(
    dt: &wire::DateTime,
    timezone_offset: i32,
) -> DriverResult<chrono::DateTime<FixedOffset>> {
    let naive = NaiveDate::from_ymd_opt(dt.year as i32, dt.month as u32, dt.day as u32)
        .and_then(|d| {
            d.and_hms_micro_opt(
                dt.hour as u32,
                dt.minute as u32,
                dt.sec as u32,
                dt.microsec as u32,
            )
        })
        .ok_or_else(|| DriverError::type_conversion(format!("invalid datetime {:?}", dt)))?;
    let offset = FixedOffset::east_opt(timezone_offset)
        .ok_or_else(|| DriverError::type_conversion(format!("invalid offset {}", timezone_offset)))?;
    offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| DriverError::type_conversion(format!("ambiguous datetime {:?}", dt)))
}

/// Normalize a wire duration into month/day/second/nanosecond parts.
///
/// Months pass through untouched; a calendar month has no fixed length in
/// days.
fn to_duration(d: &wire::Duration) -> Duration {
    let total_micros = d.seconds * MICROS_PER_SECOND + d.microseconds as i64;
    let days = total_micros.div_euclid(MICROS_PER_DAY);
    let in_day = total_micros.rem_euclid(MICROS_PER_DAY);
    let seconds = in_day / MICROS_PER_SECOND;
    let nanoseconds = ((in_day % MICROS_PER_SECOND) * 1_000) as i32;
    Duration::new(d.months as i64, days, seconds, nanoseconds)
}

/// The node identity is the vertex id reinterpreted as a 64-bit integer.
fn vertex_id(vid: &NebulaValue) -> DriverResult<i64> {
    match vid {
        NebulaValue::Int(i) => Ok(*i),
        NebulaValue::Str(s) => {
            let text = std::str::from_utf8(s)
                .map_err(|_| DriverError::type_conversion("vertex id is not UTF-8"))?;
            text.parse::<i64>().map_err(|_| {
                DriverError::type_conversion(format!("vertex id {:?} is not an integer", text))
            })
        }
        other => Err(DriverError::type_conversion(format!(
            "vertex id tag {} cannot become an integer identity",
            other.tag_name()
        ))),
    }
}

/// Convert a vertex: tag names become labels in wire order, and all tag
/// property maps flatten into one map with last-tag-wins on collisions.
pub fn to_node(vertex: &wire::Vertex, timezone_offset: i32) -> DriverResult<Node> {
    let id = vertex_id(&vertex.vid)?;
    let labels: Vec<String> = vertex.tags.iter().map(|t| t.name.clone()).collect();

    let mut properties = HashMap::new();
    for tag in &vertex.tags {
        for (key, value) in &tag.props {
            properties.insert(key.clone(), to_value(value, timezone_offset)?);
        }
    }

    Ok(Node::new(id, labels, properties))
}

/// Convert an edge. The wire model has no edge identity, so every
/// relationship gets the fixed sentinel id.
pub fn to_relationship(edge: &wire::Edge, timezone_offset: i32) -> DriverResult<Relationship> {
    let start = vertex_id(&edge.src)?;
    let end = vertex_id(&edge.dst)?;
    let properties = to_value_map(&edge.props, timezone_offset)?;
    Ok(Relationship::new(start, end, edge.name.clone(), properties))
}

/// Convert a path by pairing consecutive step vertices: step `i` runs from
/// the previous vertex to its own destination vertex.
pub fn to_path(path: &wire::Path, timezone_offset: i32) -> DriverResult<Path> {
    let mut nodes = Vec::with_capacity(path.steps.len() + 1);
    nodes.push(to_node(&path.src, timezone_offset)?);

    let mut relationships = Vec::with_capacity(path.steps.len());
    for step in &path.steps {
        let start_id = nodes.last().map(|n: &Node| n.id).unwrap_or_default();
        let end_node = to_node(&step.dst, timezone_offset)?;
        let properties = to_value_map(&step.props, timezone_offset)?;
        relationships.push(Relationship::new(
            start_id,
            end_node.id,
            step.name.clone(),
            properties,
        ));
        nodes.push(end_node);
    }

    Ok(Path::new(nodes, relationships))
}

// ============================================================================
// Parameter direction
// ============================================================================

/// Convert a public value into its wire form for parameter binding.
///
/// Graph entities cannot travel as parameters.
pub fn to_wire_value(value: &Value) -> DriverResult<NebulaValue> {
    match value {
        Value::Null => Ok(NebulaValue::Null),
        Value::Boolean(b) => Ok(NebulaValue::Bool(*b)),
        Value::Integer(i) => Ok(NebulaValue::Int(*i)),
        Value::Float(f) => Ok(NebulaValue::Float(*f)),
        Value::String(s) => Ok(NebulaValue::Str(s.clone().into_bytes())),
        Value::Bytes(b) => Ok(NebulaValue::Str(b.clone())),
        Value::List(items) => Ok(NebulaValue::List(
            items.iter().map(to_wire_value).collect::<DriverResult<_>>()?,
        )),
        Value::Map(map) => Ok(NebulaValue::Map(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), to_wire_value(v)?)))
                .collect::<DriverResult<_>>()?,
        )),
        Value::Date(d) => {
            use chrono::Datelike;
            Ok(NebulaValue::Date(wire::Date {
                year: d.year() as i16,
                month: d.month() as i8,
                day: d.day() as i8,
            }))
        }
        Value::Time(t) => {
            use chrono::Timelike;
            Ok(NebulaValue::Time(wire::Time {
                hour: t.time.hour() as i8,
                minute: t.time.minute() as i8,
                sec: t.time.second() as i8,
                microsec: (t.time.nanosecond() / 1_000) as i32,
            }))
        }
        Value::DateTime(dt) => {
            use chrono::{Datelike, Timelike};
            let local = dt.naive_local();
            Ok(NebulaValue::DateTime(wire::DateTime {
                year: local.year() as i16,
                month: local.month() as i8,
                day: local.day() as i8,
                hour: local.hour() as i8,
                minute: local.minute() as i8,
                sec: local.second() as i8,
                microsec: (local.nanosecond() / 1_000) as i32,
            }))
        }
        Value::Duration(d) => Ok(NebulaValue::Duration(wire::Duration {
            seconds: d.days * 86_400 + d.seconds,
            microseconds: d.nanoseconds / 1_000,
            months: d.months as i8,
        })),
        Value::Node(_) | Value::Relationship(_) | Value::Path(_) => {
            Err(DriverError::type_conversion(format!(
                "{} values cannot be bound as parameters",
                value.type_name()
            )))
        }
    }
}

/// Build the wire parameter map: UTF-8 key bytes to wire values.
pub fn to_parameter_map(
    parameters: &HashMap<String, Value>,
) -> DriverResult<HashMap<Vec<u8>, NebulaValue>> {
    parameters
        .iter()
        .map(|(k, v)| Ok((k.clone().into_bytes(), to_wire_value(v)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(entries: &[(&str, NebulaValue)]) -> HashMap<String, NebulaValue> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_empty_is_not_null() {
        let empty = to_value(&NebulaValue::Empty, 0).unwrap();
        assert!(empty.is_empty());
        assert!(!empty.is_null());

        let null = to_value(&NebulaValue::Null, 0).unwrap();
        assert!(null.is_null());
        assert!(!null.is_empty());
    }

    #[test]
    fn test_date_conversion() {
        let date = to_value(
            &NebulaValue::Date(wire::Date {
                year: 2020,
                month: 10,
                day: 10,
            }),
            0,
        )
        .unwrap();
        assert_eq!(date.as_date(), NaiveDate::from_ymd_opt(2020, 10, 10));
    }

    #[test]
    fn test_time_carries_session_offset() {
        let time = to_value(
            &NebulaValue::Time(wire::Time {
                hour: 10,
                minute: 30,
                sec: 0,
                microsec: 250,
            }),
            3600,
        )
        .unwrap();
        let t = time.as_time().unwrap();
        assert_eq!(t.offset_seconds, 3600);
        assert_eq!(t.time, NaiveTime::from_hms_micro_opt(10, 30, 0, 250).unwrap());
    }

    #[test]
    fn test_datetime_conversion() {
        let dt = to_value(
            &NebulaValue::DateTime(wire::DateTime {
                year: 2022,
                month: 3,
                day: 14,
                hour: 9,
                minute: 26,
                sec: 53,
                microsec: 589_793,
            }),
            7200,
        )
        .unwrap();
        let dt = dt.as_datetime().unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 7200);
        assert_eq!(dt.naive_local().to_string(), "2022-03-14 09:26:53.589793");
    }

    #[test]
    fn test_duration_normalization() {
        // One day, one hour, one minute, one second, plus 500 microseconds.
        let d = to_duration(&wire::Duration {
            seconds: 90_061,
            microseconds: 500,
            months: 2,
        });
        assert_eq!(d.months, 2);
        assert_eq!(d.days, 1);
        assert_eq!(d.seconds, 3_661);
        assert_eq!(d.nanoseconds, 500_000);
    }

    #[test]
    fn test_duration_months_stay_months() {
        let d = to_duration(&wire::Duration {
            seconds: 0,
            microseconds: 0,
            months: 14,
        });
        assert_eq!(d.months, 14);
        assert_eq!(d.days, 0);
    }

    #[test]
    fn test_set_becomes_list() {
        let set = NebulaValue::Set(vec![NebulaValue::Int(3), NebulaValue::Int(1)]);
        let converted = to_value(&set, 0).unwrap();
        assert_eq!(
            converted.as_list().unwrap(),
            &[Value::Integer(3), Value::Integer(1)]
        );
    }

    #[test]
    fn test_vertex_merges_tags_last_wins() {
        let vertex = wire::Vertex {
            vid: Box::new(NebulaValue::Int(42)),
            tags: vec![
                wire::Tag {
                    name: "host".into(),
                    props: props(&[
                        ("name", NebulaValue::string("early")),
                        ("os", NebulaValue::string("linux")),
                    ]),
                },
                wire::Tag {
                    name: "asset".into(),
                    props: props(&[("name", NebulaValue::string("late"))]),
                },
            ],
        };
        let node = to_node(&vertex, 0).unwrap();
        assert_eq!(node.id, 42);
        assert_eq!(node.labels, vec!["host".to_string(), "asset".to_string()]);
        assert_eq!(node.get("name"), Some(&Value::String("late".into())));
        assert_eq!(node.get("os"), Some(&Value::String("linux".into())));
    }

    #[test]
    fn test_string_vertex_id_reinterpreted() {
        let vertex = wire::Vertex {
            vid: Box::new(NebulaValue::string("12345")),
            tags: vec![],
        };
        assert_eq!(to_node(&vertex, 0).unwrap().id, 12345);

        let bad = wire::Vertex {
            vid: Box::new(NebulaValue::string("not-a-number")),
            tags: vec![],
        };
        assert!(to_node(&bad, 0).is_err());
    }

    #[test]
    fn test_edge_uses_sentinel_identity() {
        let edge = wire::Edge {
            src: Box::new(NebulaValue::Int(1)),
            dst: Box::new(NebulaValue::Int(2)),
            name: "knows".into(),
            ranking: 0,
            props: props(&[("since", NebulaValue::Int(2019))]),
        };
        let rel = to_relationship(&edge, 0).unwrap();
        assert_eq!(rel.id, super::super::types::RELATIONSHIP_ID);
        assert_eq!(rel.start_node_id, 1);
        assert_eq!(rel.end_node_id, 2);
        assert_eq!(rel.rel_type, "knows");
        assert_eq!(rel.get("since"), Some(&Value::Integer(2019)));
    }

    #[test]
    fn test_path_pairs_consecutive_steps() {
        let v = |id: i64| wire::Vertex {
            vid: Box::new(NebulaValue::Int(id)),
            tags: vec![],
        };
        let path = wire::Path {
            src: v(1),
            steps: vec![
                wire::Step {
                    dst: v(2),
                    name: "hop".into(),
                    ranking: 0,
                    props: HashMap::new(),
                },
                wire::Step {
                    dst: v(3),
                    name: "hop".into(),
                    ranking: 0,
                    props: HashMap::new(),
                },
            ],
        };
        let path = to_path(&path, 0).unwrap();
        assert_eq!(path.len(), 2);
        let segments: Vec<_> = path.segments().collect();
        assert_eq!(segments[0].start.id, 1);
        assert_eq!(segments[0].end.id, 2);
        assert_eq!(segments[1].start.id, 2);
        assert_eq!(segments[1].end.id, 3);
    }

    #[test]
    fn test_geography_is_unsupported() {
        let err = to_value(&NebulaValue::Geography(vec![1, 2, 3]), 0).unwrap_err();
        assert!(matches!(err, DriverError::Unsupported(_)));
    }

    #[test]
    fn test_parameter_map() {
        let mut params = HashMap::new();
        params.insert("id".to_string(), Value::Integer(123));
        params.insert("name".to_string(), Value::String("n1".into()));

        let wire_map = to_parameter_map(&params).unwrap();
        assert_eq!(wire_map.get(&b"id".to_vec()), Some(&NebulaValue::Int(123)));
        assert_eq!(
            wire_map.get(&b"name".to_vec()),
            Some(&NebulaValue::string("n1"))
        );
    }

    #[test]
    fn test_entities_rejected_as_parameters() {
        let node = Value::Node(Node::new(1, vec![], HashMap::new()));
        assert!(to_wire_value(&node).is_err());
    }

    #[test]
    fn test_wire_duration_roundtrip() {
        let original = Duration::new(2, 1, 3_661, 500_000);
        let wire_form = to_wire_value(&Value::Duration(original)).unwrap();
        let back = to_value(&wire_form, 0).unwrap();
        assert_eq!(back.as_duration(), Some(original));
    }
}
