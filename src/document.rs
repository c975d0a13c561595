//! Canonical structured documents
//!
//! Free-form payloads (the Verrazzano spec carried by fleets and bindings, the
//! rendered chart values, and objects read back from workload clusters) are
//! held as a [`Document`]. Equality is structural and order-independent, and
//! numbers compare by value so `1`, `1.0` and `1e0` are the same document even
//! after a round trip through YAML or the installer's own storage.

use std::fmt;

use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema extension that keeps the API server from pruning unknown fields
const PRESERVE_UNKNOWN_FIELDS: &str = "x-kubernetes-preserve-unknown-fields";

/// A generic key-value document with value semantics
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Value);

impl Document {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// An empty object document
    pub fn object() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml).map(Self)
    }

    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.0)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// True for `null` and for objects or arrays with no entries
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Look up a nested value by object keys
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(&self.0, |current, key| current.as_object()?.get(*key))
    }

    /// Look up a nested string; non-string leaves yield `None`
    pub fn get_str(&self, path: &[&str]) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Set a nested value, creating intermediate objects as needed.
    ///
    /// Non-object values found along the path are replaced.
    pub fn set(&mut self, path: &[&str], value: Value) {
        let Some((last, parents)) = path.split_last() else {
            self.0 = value;
            return;
        };

        let mut current = &mut self.0;
        for key in parents {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            if let Value::Object(map) = current {
                current = map
                    .entry((*key).to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
            }
        }

        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        if let Value::Object(map) = current {
            map.insert((*last).to_string(), value);
        }
    }

    /// The workload version requested by this document (`.version`), if any
    pub fn requested_version(&self) -> Option<&str> {
        self.get_str(&["version"]).filter(|v| !v.trim().is_empty())
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        deep_equal(&self.0, &other.0)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Document({})", self.0)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl JsonSchema for Document {
    fn schema_name() -> String {
        "Document".to_string()
    }

    fn is_referenceable() -> bool {
        false
    }

    fn json_schema(_: &mut SchemaGenerator) -> Schema {
        let mut schema = SchemaObject {
            instance_type: Some(InstanceType::Object.into()),
            ..Default::default()
        };
        schema
            .extensions
            .insert(PRESERVE_UNKNOWN_FIELDS.to_string(), Value::Bool(true));
        Schema::Object(schema)
    }
}

/// Structural equality with numeric values compared as `f64`
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| deep_equal(x, y)))
        }
        _ => false,
    }
}
