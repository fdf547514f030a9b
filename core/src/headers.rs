//! Case-insensitive header store and the header names the core produces.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

pub const ACCEPT: &str = "Accept";
pub const AUTHORIZATION: &str = "Authorization";
pub const CONTENT_TYPE: &str = "Content-Type";

pub const API_VERSION: &str = "X-Kinvey-Api-Version";
pub const DEVICE_INFORMATION: &str = "X-Kinvey-Device-Information";
pub const CONTENT_TYPE_OVERRIDE: &str = "X-Kinvey-Content-Type";
pub const SKIP_BUSINESS_LOGIC: &str = "X-Kinvey-Skip-Business-Logic";
pub const INCLUDE_HEADERS_IN_RESPONSE: &str = "X-Kinvey-Include-Headers-In-Response";
pub const REQUEST_ID: &str = "X-Kinvey-Request-Id";
pub const RESPONSE_WRAPPER: &str = "X-Kinvey-ResponseWrapper";
pub const CLIENT_APP_VERSION: &str = "X-Kinvey-Client-App-Version";
pub const CUSTOM_REQUEST_PROPERTIES: &str = "X-Kinvey-Custom-Request-Properties";

/// Default body content type applied when a request gains data without an
/// explicit override.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// A case-insensitive header map.
///
/// Lookup, removal, and replacement ignore case; the spelling used on the
/// most recent `set` is preserved for serialization. Serializes as a plain
/// name→value JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    // lowercased name -> (original spelling, value)
    entries: BTreeMap<String, (String, String)>,
}

impl HeaderMap {
    /// Create an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any existing value under the same name
    /// regardless of case.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries
            .insert(name.to_ascii_lowercase(), (name, value.into()));
    }

    /// Get a header value by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|(_, value)| value.as_str())
    }

    /// Remove a header by name, ignoring case. Returns the removed value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries
            .remove(&name.to_ascii_lowercase())
            .map(|(_, value)| value)
    }

    /// Whether a header is present, ignoring case.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Remove all headers.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(name, value)` pairs in the stored spelling.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Copy every header from `other` into this map, overwriting collisions.
    pub fn extend(&mut self, other: &HeaderMap) {
        for (name, value) in other.iter() {
            self.set(name, value);
        }
    }
}

impl Serialize for HeaderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for HeaderMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeaderMapVisitor;

        impl<'de> Visitor<'de> for HeaderMapVisitor {
            type Value = HeaderMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of header names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut headers = HeaderMap::new();
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    headers.set(name, value);
                }
                Ok(headers)
            }
        }

        deserializer.deserialize_map(HeaderMapVisitor)
    }
}
