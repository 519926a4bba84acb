//! Statement text substitution.
//!
//! Fallback for protocol revisions without native parameter binding:
//! `$name` and `${name}` placeholders are replaced with rendered literals
//! in the statement text. The primary execution path binds parameters
//! natively and never goes through here.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::{NoExpand, Regex};

use super::session::Query;
use super::types::Value;

const PATTERN_CACHE_CAPACITY: usize = 256;

/// Compiled-pattern cache keyed by pattern text.
static PATTERN_CACHE: Lazy<Mutex<HashMap<String, Regex>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn cached_pattern(pattern: &str) -> Regex {
    let mut cache = PATTERN_CACHE.lock();
    if let Some(re) = cache.get(pattern) {
        return re.clone();
    }
    let re = Regex::new(pattern).expect("parameter pattern is valid after escaping");
    if cache.len() >= PATTERN_CACHE_CAPACITY {
        cache.clear();
    }
    cache.insert(pattern.to_string(), re.clone());
    re
}

/// Substitute every named parameter into the statement text.
pub fn render(query: &Query) -> String {
    let mut text = query.text.clone();
    for (name, value) in &query.parameters {
        let rendered = render_value(value);
        let escaped = regex::escape(name);
        for pattern in [
            format!(r"\$\{{{}\}}", escaped),
            format!(r"\${}\b", escaped),
        ] {
            let re = cached_pattern(&pattern);
            text = re.replace_all(&text, NoExpand(&rendered)).into_owned();
        }
    }
    text
}

/// Render one parameter value as a statement literal.
///
/// Numbers render bare, strings quoted, date/datetime values as a
/// `datetime("...")` literal; everything else renders as `NULL`.
fn render_value(value: &Value) -> String {
    match value {
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => format!("\"{}\"", s),
        Value::DateTime(dt) => format!(
            "datetime(\"{}\")",
            dt.naive_local().format("%Y-%m-%dT%H:%M:%S%.3f")
        ),
        Value::Date(d) => format!("datetime(\"{}T00:00:00.000\")", d.format("%Y-%m-%d")),
        _ => "NULL".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    #[test]
    fn test_no_parameters_is_identity() {
        let query = Query::new("MATCH (n:Host) RETURN n");
        assert_eq!(render(&query), "MATCH (n:Host) RETURN n");
    }

    #[test]
    fn test_integer_substitution() {
        let query = Query::new("MATCH (n) WHERE n.id = $id RETURN n").with_param("id", 123i64);
        assert_eq!(render(&query), "MATCH (n) WHERE n.id = 123 RETURN n");
    }

    #[test]
    fn test_braced_form() {
        let query = Query::new("MATCH (n {name: ${name}}) RETURN n").with_param("name", "alice");
        assert_eq!(render(&query), "MATCH (n {name: \"alice\"}) RETURN n");
    }

    #[test]
    fn test_string_is_quoted() {
        let query = Query::new("RETURN $s").with_param("s", "x");
        assert_eq!(render(&query), "RETURN \"x\"");
    }

    #[test]
    fn test_shorter_name_does_not_clobber_longer() {
        let query = Query::new("RETURN $id, $idx")
            .with_param("id", 1i64)
            .with_param("idx", 2i64);
        assert_eq!(render(&query), "RETURN 1, 2");
    }

    #[test]
    fn test_datetime_renders_as_literal() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let dt = offset.with_ymd_and_hms(2022, 3, 14, 9, 26, 53).unwrap();
        let query = Query::new("RETURN $at").with_param("at", Value::DateTime(dt));
        assert_eq!(
            render(&query),
            "RETURN datetime(\"2022-03-14T09:26:53.000\")"
        );
    }

    #[test]
    fn test_date_renders_as_literal() {
        let d = NaiveDate::from_ymd_opt(2020, 10, 10).unwrap();
        let query = Query::new("RETURN $on").with_param("on", Value::Date(d));
        assert_eq!(render(&query), "RETURN datetime(\"2020-10-10T00:00:00.000\")");
    }

    #[test]
    fn test_unrenderable_values_become_null() {
        let query = Query::new("RETURN $flag").with_param("flag", true);
        assert_eq!(render(&query), "RETURN NULL");
    }

    #[test]
    fn test_repeated_renders_reuse_cached_patterns() {
        let query = Query::new("RETURN $n").with_param("n", 1i64);
        assert_eq!(render(&query), "RETURN 1");
        assert_eq!(render(&query), "RETURN 1");
    }
}
