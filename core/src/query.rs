//! The query shape the racks consume.
//!
//! This is deliberately the minimal contract the core needs: a filter
//! object, an optional field projection, and the `_id ∈ set` conjunction
//! used for delta-set batching. Building richer queries is the caller's
//! concern.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A query against a collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// Filter object; each key constrains a field by equality or by an
    /// operator object such as `{"$in": [...]}`
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub filter: Value,
    /// Field projection; empty means all fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl Query {
    /// Create an empty query matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a query with the given filter object.
    pub fn with_filter(filter: Value) -> Self {
        Self {
            filter,
            fields: Vec::new(),
        }
    }

    /// Restrict returned entities to the given fields.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Constrain `field` to the given set of values, keeping any other
    /// filter conditions.
    pub fn contained_in<S: Into<Value>>(mut self, field: &str, values: Vec<S>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let condition = Value::Object(Map::from_iter([(
            "$in".to_string(),
            Value::Array(values),
        )]));

        match &mut self.filter {
            Value::Object(map) => {
                map.insert(field.to_string(), condition);
            }
            _ => {
                self.filter =
                    Value::Object(Map::from_iter([(field.to_string(), condition)]));
            }
        }
        self
    }

    /// Whether an entity satisfies every filter condition.
    pub fn matches(&self, entity: &Value) -> bool {
        let Value::Object(conditions) = &self.filter else {
            return true;
        };

        conditions.iter().all(|(field, condition)| {
            let actual = entity.get(field).unwrap_or(&Value::Null);
            match condition.get("$in").and_then(Value::as_array) {
                Some(allowed) => allowed.contains(actual),
                None => actual == condition,
            }
        })
    }

    /// Apply the field projection to an entity. With no projection the
    /// entity is returned unchanged.
    pub fn project(&self, entity: &Value) -> Value {
        if self.fields.is_empty() {
            return entity.clone();
        }
        let Value::Object(source) = entity else {
            return entity.clone();
        };

        let mut projected = Map::new();
        for field in &self.fields {
            if let Some(value) = source.get(field) {
                projected.insert(field.clone(), value.clone());
            }
        }
        Value::Object(projected)
    }
}
