// Parameter report compiler
//
// Reads operation parameters plus the value store and produces a fresh
// SerializationReport: coerced values per binding, in parameter order.
// Never mutates parameters or schemas, never short-circuits on a bad value.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use super::coercion::{coerce_ad_hoc, coerce_item, coerce_scalar, flatten};
use crate::models::{Binding, Parameter};
use crate::schema::{ScalarShape, Schema};
use crate::store::{StoredValue, ValueStore};

/// Coerced values keyed by serialized name, in parameter order
pub type ValueMap = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializationReport {
    pub valid: bool,
    pub invalid: Vec<String>,
    pub header: ValueMap,
    pub query: ValueMap,
    pub path: ValueMap,
    pub cookie: ValueMap,
}

impl Default for SerializationReport {
    fn default() -> Self {
        Self {
            valid: true,
            invalid: Vec::new(),
            header: ValueMap::new(),
            query: ValueMap::new(),
            path: ValueMap::new(),
            cookie: ValueMap::new(),
        }
    }
}

impl SerializationReport {
    pub fn binding(&self, binding: Binding) -> &ValueMap {
        match binding {
            Binding::Header => &self.header,
            Binding::Query => &self.query,
            Binding::Path => &self.path,
            Binding::Cookie => &self.cookie,
        }
    }

    fn binding_mut(&mut self, binding: Binding) -> &mut ValueMap {
        match binding {
            Binding::Header => &mut self.header,
            Binding::Query => &mut self.query,
            Binding::Path => &mut self.path,
            Binding::Cookie => &mut self.cookie,
        }
    }

    fn insert(&mut self, binding: Binding, key: &str, value: Value) {
        self.binding_mut(binding).insert(key.to_string(), value);
    }

    fn reject(&mut self, id: &str) {
        debug!(id, "parameter failed validation");
        self.valid = false;
        self.invalid.push(id.to_string());
    }
}

/// Outcome of serializing one parameter
enum Outcome {
    Value(Value),
    /// Nothing to send; not an error
    Skip,
    Invalid,
}

/// Compiles a report with `null` as the value for nil-marked parameters.
pub fn compile<S>(parameters: &[Parameter], store: &S, nil_ids: &HashSet<String>) -> SerializationReport
where
    S: ValueStore + ?Sized,
{
    compile_with(parameters, store, nil_ids, &Value::Null)
}

/// Compiles a report, writing `default_nil` for every parameter in `nil_ids`.
pub fn compile_with<S>(
    parameters: &[Parameter],
    store: &S,
    nil_ids: &HashSet<String>,
    default_nil: &Value,
) -> SerializationReport
where
    S: ValueStore + ?Sized,
{
    let mut report = SerializationReport::default();

    for param in parameters {
        // nil marks need a key too, so a nameless parameter is skipped either way
        let Some(key) = param.key() else {
            trace!(id = %param.id, "parameter has no usable name, skipped");
            continue;
        };

        if nil_ids.contains(&param.id) {
            report.insert(param.binding, key, default_nil.clone());
            continue;
        }

        match serialize_parameter(param, store.get(&param.id)) {
            Outcome::Value(value) => report.insert(param.binding, key, value),
            Outcome::Skip => {}
            Outcome::Invalid => report.reject(&param.id),
        }
    }

    report
}

fn serialize_parameter(param: &Parameter, stored: Option<StoredValue>) -> Outcome {
    let stored = match (stored, &param.schema) {
        (Some(v), _) => Some(v),
        (None, _) if !param.required => return Outcome::Skip,
        (None, Some(Schema::Scalar(shape))) => shape.synthesize().map(StoredValue::Single),
        (None, _) => None,
    };

    let outcome = match &param.schema {
        None | Some(Schema::Any) => match stored {
            Some(value) => Outcome::Value(coerce_ad_hoc(&value)),
            None => Outcome::Invalid,
        },
        Some(Schema::Scalar(shape)) => scalar_outcome(param, stored.as_ref(), shape),
        Some(Schema::Array { items }) => array_outcome(param, stored.as_ref(), items.as_deref()),
        Some(schema @ Schema::Union { any_of }) => match schema.nillable_scalar() {
            Some(shape) => scalar_outcome(param, stored.as_ref(), shape),
            None => union_outcome(param, stored.as_ref(), any_of),
        },
        Some(Schema::Node | Schema::File) => {
            trace!(id = %param.id, "no wire mapping for shape, parameter dropped");
            Outcome::Skip
        }
    };
    empty_value_rule(param, outcome)
}

fn scalar_outcome(param: &Parameter, stored: Option<&StoredValue>, shape: &ScalarShape) -> Outcome {
    let coerced = stored.and_then(|v| coerce_scalar(&flatten(v), shape));
    missing_or_value(param, coerced)
}

fn array_outcome(param: &Parameter, stored: Option<&StoredValue>, items: Option<&Schema>) -> Outcome {
    let Some(StoredValue::List(values)) = stored else {
        return missing_or_value(param, None);
    };
    let coerced: Vec<Value> = values
        .iter()
        .flatten()
        .filter_map(|v| coerce_item(v, items))
        .collect();
    if coerced.is_empty() {
        return missing_or_value(param, None);
    }
    Outcome::Value(Value::Array(coerced))
}

fn union_outcome(param: &Parameter, stored: Option<&StoredValue>, any_of: &[Schema]) -> Outcome {
    let scalars: Vec<&ScalarShape> = any_of
        .iter()
        .filter_map(|s| match s {
            Schema::Scalar(shape) => Some(shape),
            _ => None,
        })
        .collect();
    if scalars.is_empty() && !any_of.is_empty() {
        trace!(id = %param.id, "union without scalar members, parameter dropped");
        return Outcome::Skip;
    }
    let input = stored.map(flatten);
    let coerced = input
        .as_ref()
        .and_then(|value| scalars.iter().find_map(|shape| coerce_scalar(value, shape)));
    missing_or_value(param, coerced)
}

fn missing_or_value(param: &Parameter, value: Option<Value>) -> Outcome {
    match value {
        Some(v) => Outcome::Value(v),
        None if param.required => Outcome::Invalid,
        None => Outcome::Skip,
    }
}

/// Optional parameters left as an empty string are only sent when the model allows it.
fn empty_value_rule(param: &Parameter, outcome: Outcome) -> Outcome {
    match outcome {
        Outcome::Value(Value::String(s)) if s.is_empty() && !param.required && !param.allow_empty_value => {
            Outcome::Skip
        }
        other => other,
    }
}
