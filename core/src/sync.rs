//! Sync queue: per-collection documents recording local mutations that
//! still need to replay against the backend.
//!
//! After a successful local mutation, the mutating request is serialized
//! into the collection's sync document keyed by entity id. Later operations
//! on the same entity overwrite the earlier entry; replay is last-writer-
//! wins by the entity's last-modified time.

use crate::entity;
use crate::error::{Error, Result};
use crate::path::ResourcePath;
use crate::policy::DataPolicy;
use crate::request::{Method, Request, RequestDescriptor};
use crate::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One pending operation for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEntry {
    /// The serialized mutating request, ready for replay
    pub request: RequestDescriptor,
    /// The entity's last-modified time at record time, if it had one
    pub lmt: Option<String>,
}

/// The per-collection pending-operations document persisted in the local
/// store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncDocument {
    /// Collection name; doubles as the document id
    #[serde(rename = "_id")]
    pub id: String,
    /// Pending operations keyed by entity id
    #[serde(default)]
    pub documents: BTreeMap<EntityId, SyncEntry>,
    /// Cardinality of `documents`
    #[serde(default)]
    pub size: u64,
}

impl SyncDocument {
    /// An empty document for a collection with no pending operations.
    pub fn empty(collection: impl Into<String>) -> Self {
        Self {
            id: collection.into(),
            documents: BTreeMap::new(),
            size: 0,
        }
    }

    /// Record a pending operation for an entity. A later operation on the
    /// same entity overwrites the earlier one without growing `size`.
    pub fn record(&mut self, entity_id: EntityId, entry: SyncEntry) {
        if self.documents.insert(entity_id, entry).is_none() {
            self.size += 1;
        }
    }
}

// Mutation response bodies may hold one entity or a batch of them.
fn items(data: &Value) -> Vec<&Value> {
    match data {
        Value::Array(entries) => entries.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Record `request` in its collection's sync document for every entity in
/// `data` that carries an id.
///
/// The document is read and written through the cache rack; the write runs
/// with skip-sync so it cannot queue itself.
pub(crate) async fn notify(request: &Request, data: &Value) -> Result<()> {
    let path = ResourcePath::parse(request.pathname())?;
    let client = request.client().clone();
    let sync_pathname = format!(
        "/{}/{}/{}/{}",
        path.namespace,
        path.app_id,
        client.config().sync_collection,
        path.collection
    );

    let read = Request::new(client.clone())
        .with_pathname(&sync_pathname)
        .with_policy(DataPolicy::ForceLocal);
    let mut document = match read.execute().await {
        Ok(response) => serde_json::from_value(response.data)?,
        Err(Error::NotFound(_)) => SyncDocument::empty(&path.collection),
        Err(err) => return Err(err),
    };

    let descriptor = request.descriptor();
    for item in items(data) {
        if let Some(id) = entity::entity_id(item) {
            document.record(
                id.to_string(),
                SyncEntry {
                    request: descriptor.clone(),
                    lmt: entity::lmt(item).map(str::to_string),
                },
            );
        }
    }

    tracing::debug!(
        "sync queue for collection {} now holds {} entity(ies)",
        path.collection,
        document.size
    );

    let write = Request::new(client)
        .with_pathname(&sync_pathname)
        .with_method(Method::Put)
        .with_policy(DataPolicy::ForceLocal)
        .with_skip_sync(true)
        .with_data(serde_json::to_value(&document)?);
    write.execute().await?;

    Ok(())
}
