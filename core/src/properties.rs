//! Custom per-request metadata forwarded to the backend in a header.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// Custom request properties.
///
/// The app version travels in its own header; everything else is serialized
/// to JSON and shipped in the custom-request-properties header, subject to a
/// configurable byte cap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestProperties {
    app_version: Option<String>,
    values: BTreeMap<String, Value>,
}

impl RequestProperties {
    /// Create empty request properties.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client app version.
    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = Some(version.into());
        self
    }

    /// Add a custom property.
    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// The client app version, if set.
    pub fn app_version(&self) -> Option<&str> {
        self.app_version.as_deref()
    }

    /// Look up a custom property.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Serialize the custom properties (app version excluded) for the
    /// header, failing if the UTF-8 byte length reaches `max_bytes`.
    pub fn to_header_json(&self, max_bytes: usize) -> Result<String> {
        let json = serde_json::to_string(&self.values)?;
        if json.len() >= max_bytes {
            return Err(Error::InvalidInput(format!(
                "custom request properties are {} bytes; the limit is {} bytes",
                json.len(),
                max_bytes
            )));
        }
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_properties_serialize() {
        let props = RequestProperties::new();
        assert_eq!(props.to_header_json(2000).unwrap(), "{}");
    }

    #[test]
    fn app_version_is_excluded_from_header_json() {
        let props = RequestProperties::new()
            .with_app_version("1.2.3")
            .with_value("tenant", json!("acme"));

        let json = props.to_header_json(2000).unwrap();
        assert_eq!(json, r#"{"tenant":"acme"}"#);
        assert_eq!(props.app_version(), Some("1.2.3"));
    }

    #[test]
    fn byte_count_is_utf8_length() {
        // "héllo" is 6 bytes in UTF-8, serialized as "\"héllo\"" within the map
        let props = RequestProperties::new().with_value("k", json!("héllo"));
        let json = props.to_header_json(2000).unwrap();
        assert_eq!(json.len(), json.as_bytes().len());
    }

    #[test]
    fn cap_boundary() {
        // {"k":"aaa...a"} has 8 bytes of framing around the run of 'a's
        let framing = r#"{"k":""}"#.len();

        let just_under = RequestProperties::new()
            .with_value("k", json!("a".repeat(1999 - framing)));
        assert!(just_under.to_header_json(2000).is_ok());

        let at_cap = RequestProperties::new()
            .with_value("k", json!("a".repeat(2000 - framing)));
        assert!(matches!(
            at_cap.to_header_json(2000),
            Err(Error::InvalidInput(_))
        ));
    }
}
