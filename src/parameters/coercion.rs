// Type-directed value coercion
//
// Turns raw user input into a value of the schema's declared data type.
// `None` means the input cannot be expressed in that type (the "undefined"
// outcome the report compiler treats as a missing value).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde_json::{Number, Value};

use crate::schema::{DataType, ScalarShape, Schema};
use crate::store::StoredValue;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
const DATE_TIME_ONLY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// String form of a value, the way it appears on the wire.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(to_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Collapses a stored entry into one scalar input; list entries are
/// comma-joined, skipping unfilled slots.
pub fn flatten(value: &StoredValue) -> Value {
    match value {
        StoredValue::Single(v) => v.clone(),
        StoredValue::List(items) => Value::String(
            items
                .iter()
                .flatten()
                .map(to_text)
                .collect::<Vec<_>>()
                .join(","),
        ),
    }
}

/// Coerces `value` to the data type declared by `shape`.
pub fn coerce_scalar(value: &Value, shape: &ScalarShape) -> Option<Value> {
    if shape.data_type == DataType::Nil {
        return coerce_nil(value);
    }
    if value.is_null() {
        return Some(Value::Null);
    }
    match shape.data_type {
        DataType::String => Some(Value::String(to_text(value))),
        DataType::Number => parse_number(value).and_then(number_value),
        DataType::Integer => parse_number(value)
            .filter(|n| n.fract() == 0.0)
            .and_then(number_value),
        DataType::Boolean => parse_boolean(value).map(Value::Bool),
        DataType::Date => parse_date(value).map(|d| Value::String(d.format(DATE_FORMAT).to_string())),
        DataType::Time => parse_time(value).map(|t| Value::String(t.format(TIME_FORMAT).to_string())),
        DataType::DateTimeOnly => parse_date_time_only(value)
            .map(|dt| Value::String(dt.format(DATE_TIME_ONLY_FORMAT).to_string())),
        DataType::DateTime => {
            let parsed = parse_date_time(value)?;
            let text = match shape.format.as_deref() {
                Some(f) if f.eq_ignore_ascii_case("rfc2616") => {
                    parsed.with_timezone(&Utc).format(HTTP_DATE_FORMAT).to_string()
                }
                _ => parsed.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            };
            Some(Value::String(text))
        }
        DataType::Nil => coerce_nil(value),
    }
}

/// Coercion of a single array item against an optional `items` schema.
pub fn coerce_item(value: &Value, items: Option<&Schema>) -> Option<Value> {
    let shape = items.and_then(|s| s.as_value_scalar().or_else(|| s.nillable_scalar()));
    match shape {
        Some(shape) => coerce_scalar(value, shape),
        None => Some(Value::String(to_text(value))),
    }
}

/// Coercion for parameters that carry no schema at all.
///
/// List items become strings (unfilled slots stay null), objects and nulls pass
/// through, everything else is stringified.
pub fn coerce_ad_hoc(value: &StoredValue) -> Value {
    match value {
        StoredValue::List(items) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Some(v) => Value::String(to_text(v)),
                    None => Value::Null,
                })
                .collect(),
        ),
        StoredValue::Single(v @ (Value::Null | Value::Object(_))) => v.clone(),
        StoredValue::Single(v) => Value::String(to_text(v)),
    }
}

fn coerce_nil(value: &Value) -> Option<Value> {
    match value {
        Value::Null => Some(Value::Null),
        Value::String(s) if s.is_empty() || s == "null" => Some(Value::Null),
        _ => None,
    }
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
        }
        _ => None,
    }
}

fn number_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Some(Value::Number(Number::from(n as i64)));
    }
    Number::from_f64(n).map(Value::Number)
}

fn parse_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn parse_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .ok()
        .or_else(|| parse_date_time_only(value).map(|dt| dt.date()))
}

fn parse_time(value: &Value) -> Option<NaiveTime> {
    let text = value.as_str()?.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

fn parse_date_time_only(value: &Value) -> Option<NaiveDateTime> {
    let text = value.as_str()?.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_local()))
}

fn parse_date_time(value: &Value) -> Option<DateTime<chrono::FixedOffset>> {
    let text = value.as_str()?.trim();
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_rfc2822(text))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc().fixed_offset())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shape(data_type: DataType) -> ScalarShape {
        ScalarShape::new(data_type)
    }

    #[test]
    fn numbers_from_text() {
        assert_eq!(coerce_scalar(&json!("42"), &shape(DataType::Number)), Some(json!(42)));
        assert_eq!(coerce_scalar(&json!(" 1.5 "), &shape(DataType::Number)), Some(json!(1.5)));
        assert_eq!(coerce_scalar(&json!("abc"), &shape(DataType::Number)), None);
        assert_eq!(coerce_scalar(&json!(""), &shape(DataType::Number)), None);
        assert_eq!(coerce_scalar(&json!("1.5"), &shape(DataType::Integer)), None);
        assert_eq!(coerce_scalar(&json!("7"), &shape(DataType::Integer)), Some(json!(7)));
    }

    #[test]
    fn booleans_are_case_insensitive() {
        assert_eq!(coerce_scalar(&json!("TRUE"), &shape(DataType::Boolean)), Some(json!(true)));
        assert_eq!(coerce_scalar(&json!(false), &shape(DataType::Boolean)), Some(json!(false)));
        assert_eq!(coerce_scalar(&json!("yes"), &shape(DataType::Boolean)), None);
    }

    #[test]
    fn strings_stringify_anything() {
        assert_eq!(coerce_scalar(&json!(3), &shape(DataType::String)), Some(json!("3")));
        assert_eq!(coerce_scalar(&json!(true), &shape(DataType::String)), Some(json!("true")));
        assert_eq!(coerce_scalar(&Value::Null, &shape(DataType::String)), Some(Value::Null));
    }

    #[test]
    fn dates_and_times() {
        assert_eq!(
            coerce_scalar(&json!("2024-02-29"), &shape(DataType::Date)),
            Some(json!("2024-02-29"))
        );
        assert_eq!(coerce_scalar(&json!("2023-02-29"), &shape(DataType::Date)), None);
        assert_eq!(coerce_scalar(&json!("09:30"), &shape(DataType::Time)), Some(json!("09:30:00")));
        assert_eq!(
            coerce_scalar(&json!("2024-01-02T03:04"), &shape(DataType::DateTimeOnly)),
            Some(json!("2024-01-02T03:04:00"))
        );
        assert_eq!(
            coerce_scalar(&json!("2024-01-02T03:04:05Z"), &shape(DataType::DateTime)),
            Some(json!("2024-01-02T03:04:05Z"))
        );
        assert_eq!(
            coerce_scalar(
                &json!("2024-01-02T03:04:05+02:00"),
                &shape(DataType::DateTime).with_format("rfc2616")
            ),
            Some(json!("Tue, 02 Jan 2024 01:04:05 GMT"))
        );
        assert_eq!(coerce_scalar(&json!("soon"), &shape(DataType::DateTime)), None);
    }

    #[test]
    fn nil_only_matches_empty_input() {
        assert_eq!(coerce_scalar(&json!(""), &shape(DataType::Nil)), Some(Value::Null));
        assert_eq!(coerce_scalar(&json!("x"), &shape(DataType::Nil)), None);
    }

    #[test]
    fn ad_hoc_keeps_holes_and_objects() {
        let list = StoredValue::List(vec![Some(json!(1)), None]);
        assert_eq!(coerce_ad_hoc(&list), json!(["1", null]));
        let obj = StoredValue::Single(json!({"a": 1}));
        assert_eq!(coerce_ad_hoc(&obj), json!({"a": 1}));
        assert_eq!(coerce_ad_hoc(&StoredValue::Single(json!(false))), json!("false"));
    }

    #[test]
    fn to_text_joins_nested_lists() {
        assert_eq!(to_text(&json!(["a", ["b", "c"]])), "a,b,c");
        assert_eq!(to_text(&Value::Null), "");
    }
}
