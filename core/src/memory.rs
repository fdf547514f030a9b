//! In-memory cache rack.
//!
//! A reference implementation of the rack contract over per-collection maps
//! of JSON entities. It backs the integration tests and is a reasonable
//! cache for short-lived processes; durable caches plug in their own rack.

use crate::entity::{self, ID_FIELD};
use crate::error::{Error, Result};
use crate::headers::HeaderMap;
use crate::path::ResourcePath;
use crate::query::Query;
use crate::rack::Rack;
use crate::request::{Method, RequestDescriptor};
use crate::response::Response;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A rack holding all data in process memory.
#[derive(Debug, Default)]
pub struct MemoryRack {
    // "{namespace}/{appId}/{collection}" -> id -> entity
    collections: Mutex<HashMap<String, BTreeMap<String, Value>>>,
    id_counter: AtomicU64,
}

impl MemoryRack {
    /// Create an empty rack.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> String {
        format!("local-{}", self.id_counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn get_entity(&self, key: &str, id: &str, query: Option<&Query>) -> Result<Response> {
        let collections = self.collections.lock().unwrap();
        let entity = collections
            .get(key)
            .and_then(|collection| collection.get(id))
            .ok_or_else(|| Error::NotFound(format!("{}/{}", key, id)))?;

        let data = match query {
            Some(query) => query.project(entity),
            None => entity.clone(),
        };
        Ok(Response::ok(data))
    }

    fn get_collection(&self, key: &str, query: Option<&Query>) -> Result<Response> {
        let collections = self.collections.lock().unwrap();
        let collection = collections
            .get(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;

        let matched: Vec<Value> = collection
            .values()
            .filter(|entity| query.map_or(true, |q| q.matches(entity)))
            .map(|entity| query.map_or_else(|| entity.clone(), |q| q.project(entity)))
            .collect();
        Ok(Response::ok(Value::Array(matched)))
    }

    fn upsert(&self, key: &str, id: Option<&str>, data: Value, created: bool) -> Result<Response> {
        let mut collections = self.collections.lock().unwrap();
        let collection = collections.entry(key.to_string()).or_default();

        let mut stored = Vec::new();
        for mut item in normalize_body(data) {
            let item_id = match id
                .map(str::to_string)
                .or_else(|| entity::entity_id(&item).map(str::to_string))
            {
                Some(existing) => existing,
                None => self.next_id(),
            };
            if let Value::Object(fields) = &mut item {
                fields.insert(ID_FIELD.to_string(), Value::String(item_id.clone()));
            }
            collection.insert(item_id, item.clone());
            stored.push(item);
        }

        let status = if created { 201 } else { 200 };
        let data = match stored.len() {
            1 => stored.into_iter().next().unwrap(),
            _ => Value::Array(stored),
        };
        Ok(Response::new(status, HeaderMap::new(), data))
    }

    fn merge(&self, key: &str, id: &str, data: Value) -> Result<Response> {
        let mut collections = self.collections.lock().unwrap();
        let entity = collections
            .get_mut(key)
            .and_then(|collection| collection.get_mut(id))
            .ok_or_else(|| Error::NotFound(format!("{}/{}", key, id)))?;

        if let (Value::Object(target), Value::Object(patch)) = (&mut *entity, data) {
            for (field, value) in patch {
                target.insert(field, value);
            }
        }
        Ok(Response::ok(entity.clone()))
    }

    fn delete(&self, key: &str, id: Option<&str>, query: Option<&Query>) -> Result<Response> {
        let mut collections = self.collections.lock().unwrap();
        let collection = collections
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;

        let count = match id {
            Some(id) => {
                collection
                    .remove(id)
                    .ok_or_else(|| Error::NotFound(format!("{}/{}", key, id)))?;
                1
            }
            None => {
                let doomed: Vec<String> = collection
                    .iter()
                    .filter(|(_, entity)| query.map_or(true, |q| q.matches(entity)))
                    .map(|(id, _)| id.clone())
                    .collect();
                for id in &doomed {
                    collection.remove(id);
                }
                doomed.len()
            }
        };
        Ok(Response::ok(json!({ "count": count })))
    }
}

// PUT bodies may carry one entity or a batch of them.
fn normalize_body(data: Value) -> Vec<Value> {
    match data {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

#[async_trait]
impl Rack for MemoryRack {
    async fn execute(&self, request: RequestDescriptor) -> Result<Response> {
        let path = ResourcePath::parse(&request.pathname)?;
        let key = format!("{}/{}/{}", path.namespace, path.app_id, path.collection);
        let id = path.entity_id.as_deref();
        let query = request.query.as_ref();

        match request.method {
            Method::Get => match id {
                Some(id) => self.get_entity(&key, id, query),
                None => self.get_collection(&key, query),
            },
            Method::Put => self.upsert(&key, id, request.data.unwrap_or(Value::Null), false),
            Method::Post => self.upsert(&key, id, request.data.unwrap_or(Value::Null), true),
            Method::Patch => match id {
                Some(id) => self.merge(&key, id, request.data.unwrap_or(Value::Null)),
                None => Err(Error::InvalidInput(
                    "PATCH requires an entity pathname".into(),
                )),
            },
            Method::Delete => self.delete(&key, id, query),
        }
    }
}
