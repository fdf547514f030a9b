//! Entity metadata accessors.
//!
//! Entities are untyped JSON objects; the core only ever reads the id and
//! the backend-assigned `_kmd` metadata block.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field holding an entity's unique id.
pub const ID_FIELD: &str = "_id";

/// Field holding the backend-assigned metadata block.
pub const KMD_FIELD: &str = "_kmd";

/// Backend-assigned entity metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kmd {
    /// Entity creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ect: Option<String>,
    /// Last-modified time, opaque but lexicographically comparable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lmt: Option<String>,
}

/// The entity's id, if present and non-empty.
pub fn entity_id(entity: &Value) -> Option<&str> {
    entity
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// The entity's last-modified time, if its `_kmd` block carries one.
pub fn lmt(entity: &Value) -> Option<&str> {
    entity
        .get(KMD_FIELD)
        .and_then(|kmd| kmd.get("lmt"))
        .and_then(Value::as_str)
}
