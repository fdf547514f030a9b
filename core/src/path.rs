//! Resource pathname grammar: `/:namespace/:appId/:collection(/:id)?`.

use crate::error::{Error, Result};

/// A parsed resource pathname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePath {
    /// API namespace, e.g. `appdata`
    pub namespace: String,
    /// Application id
    pub app_id: String,
    /// Logical collection name, used for sync-queue keying
    pub collection: String,
    /// Entity id, when the path addresses a single entity
    pub entity_id: Option<String>,
}

impl ResourcePath {
    /// Parse a pathname. A trailing slash is accepted; anything other than
    /// three or four non-empty segments is rejected.
    pub fn parse(pathname: &str) -> Result<Self> {
        let segments: Vec<&str> = pathname.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [namespace, app_id, collection] => Ok(Self {
                namespace: namespace.to_string(),
                app_id: app_id.to_string(),
                collection: collection.to_string(),
                entity_id: None,
            }),
            [namespace, app_id, collection, entity_id] => Ok(Self {
                namespace: namespace.to_string(),
                app_id: app_id.to_string(),
                collection: collection.to_string(),
                entity_id: Some(entity_id.to_string()),
            }),
            _ => Err(Error::InvalidInput(format!(
                "pathname does not match /:namespace/:appId/:collection(/:id)?: {}",
                pathname
            ))),
        }
    }
}
