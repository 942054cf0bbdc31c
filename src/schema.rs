// Type schemas attached to operation parameters
// Immutable; sourced from the API model and only ever read by the compiler

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParseError;

/// Declared data type of a scalar shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    String,
    Number,
    Integer,
    Boolean,
    /// Calendar date, `YYYY-MM-DD`
    Date,
    /// Time of day, `HH:MM:SS`
    Time,
    /// Local date-time without offset
    DateTimeOnly,
    /// Date-time with offset
    DateTime,
    /// Literal nil type; only meaningful as a union member
    Nil,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Integer => "integer",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::Time => "time",
            DataType::DateTimeOnly => "dateTimeOnly",
            DataType::DateTime => "dateTime",
            DataType::Nil => "nil",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Number | DataType::Integer)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Model graphs emit both short names and XSD fragments (`...#dateTime`)
        let name = s.rsplit('#').next().unwrap_or(s);
        match name.to_lowercase().as_str() {
            "string" | "anyuri" | "byte" | "base64binary" | "password" => Ok(DataType::String),
            "number" | "float" | "double" | "decimal" => Ok(DataType::Number),
            "integer" | "int" | "long" | "short" => Ok(DataType::Integer),
            "boolean" | "bool" => Ok(DataType::Boolean),
            "date" | "date-only" | "dateonly" => Ok(DataType::Date),
            "time" | "time-only" | "timeonly" => Ok(DataType::Time),
            "datetime-only" | "datetimeonly" => Ok(DataType::DateTimeOnly),
            "datetime" | "date-time" => Ok(DataType::DateTime),
            "nil" | "null" => Ok(DataType::Nil),
            _ => Err(ParseError::DataType(s.to_string())),
        }
    }
}

impl TryFrom<String> for DataType {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataType> for String {
    fn from(data_type: DataType) -> Self {
        data_type.as_str().to_string()
    }
}

/// Scalar shape with the constraints the model graph exposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalarShape {
    pub data_type: DataType,
    /// Serialization format, e.g. `rfc2616` / `rfc3339` for date-times
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Value>,
}

impl ScalarShape {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            format: None,
            pattern: None,
            minimum: None,
            maximum: None,
            multiple_of: None,
            values: Vec::new(),
            default_value: None,
            examples: Vec::new(),
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_examples(mut self, examples: Vec<Value>) -> Self {
        self.examples = examples;
        self
    }

    pub fn with_values(mut self, values: Vec<Value>) -> Self {
        self.values = values;
        self
    }

    /// Value to fill in when a required parameter was left empty.
    ///
    /// Tries the declared default, then the first example, then the first enum member.
    pub fn synthesize(&self) -> Option<Value> {
        self.default_value
            .iter()
            .chain(self.examples.first())
            .chain(self.values.first())
            .find(|v| !v.is_null())
            .cloned()
    }
}

/// Shape of a parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Schema {
    Scalar(ScalarShape),
    Array {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        items: Option<Box<Schema>>,
    },
    Union {
        #[serde(rename = "anyOf")]
        any_of: Vec<Schema>,
    },
    /// Object / node shape
    Node,
    File,
    Any,
}

impl Schema {
    pub fn scalar(data_type: DataType) -> Self {
        Schema::Scalar(ScalarShape::new(data_type))
    }

    pub fn array_of(items: Schema) -> Self {
        Schema::Array {
            items: Some(Box::new(items)),
        }
    }

    pub fn union_of(any_of: Vec<Schema>) -> Self {
        Schema::Union { any_of }
    }

    /// Scalar shape that is not the nil type
    pub fn as_value_scalar(&self) -> Option<&ScalarShape> {
        match self {
            Schema::Scalar(shape) if shape.data_type != DataType::Nil => Some(shape),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Schema::Scalar(shape) if shape.data_type == DataType::Nil)
    }

    /// The `{scalar, nil}` convention: returns the non-nil scalar alternative.
    pub fn nillable_scalar(&self) -> Option<&ScalarShape> {
        match self {
            Schema::Union { any_of } if any_of.len() == 2 => {
                match (&any_of[0], &any_of[1]) {
                    (a, b) if b.is_nil() => a.as_value_scalar(),
                    (a, b) if a.is_nil() => b.as_value_scalar(),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn data_type_accepts_xsd_fragments() {
        assert_eq!(
            "http://www.w3.org/2001/XMLSchema#dateTime".parse::<DataType>(),
            Ok(DataType::DateTime)
        );
        assert_eq!("long".parse::<DataType>(), Ok(DataType::Integer));
        assert!("tuple".parse::<DataType>().is_err());
    }

    #[test]
    fn nillable_scalar_in_either_order() {
        let a = Schema::union_of(vec![Schema::scalar(DataType::String), Schema::scalar(DataType::Nil)]);
        let b = Schema::union_of(vec![Schema::scalar(DataType::Nil), Schema::scalar(DataType::Integer)]);
        let c = Schema::union_of(vec![Schema::scalar(DataType::String), Schema::scalar(DataType::Integer)]);
        assert_eq!(a.nillable_scalar().map(|s| s.data_type), Some(DataType::String));
        assert_eq!(b.nillable_scalar().map(|s| s.data_type), Some(DataType::Integer));
        assert!(c.nillable_scalar().is_none());
    }

    #[test]
    fn synthesize_prefers_default_then_example_then_enum() {
        let shape = ScalarShape::new(DataType::String)
            .with_values(vec![json!("a"), json!("b")])
            .with_examples(vec![json!("ex")]);
        assert_eq!(shape.synthesize(), Some(json!("ex")));
        assert_eq!(shape.clone().with_default(json!("d")).synthesize(), Some(json!("d")));
        assert_eq!(ScalarShape::new(DataType::String).synthesize(), None);
    }

    #[test]
    fn schema_deserializes_from_tagged_json() {
        let schema: Schema = serde_json::from_value(json!({
            "kind": "array",
            "items": { "kind": "scalar", "dataType": "integer" }
        }))
        .unwrap();
        assert_eq!(schema, Schema::array_of(Schema::scalar(DataType::Integer)));

        let unknown = serde_json::from_value::<Schema>(json!({"kind": "scalar", "dataType": "tuple"}));
        assert!(unknown.is_err());
    }
}
