//! Transport envelope: a single-key JSON object around a compressed document.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// `{ "<field_name>": "<base64 payload>" }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEnvelope {
    field_name: String,
    payload: String,
}

impl TransportEnvelope {
    #[must_use]
    pub fn new(field_name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// JSON value ready to be posted.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::with_capacity(1);
        map.insert(
            self.field_name.clone(),
            serde_json::Value::String(self.payload.clone()),
        );
        serde_json::Value::Object(map)
    }
}

impl Serialize for TransportEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.field_name, &self.payload)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_single_key_object() {
        let env = TransportEnvelope::new("dpsXmlGZipB64", "H4sI");
        assert_eq!(
            serde_json::to_string(&env).unwrap(),
            r#"{"dpsXmlGZipB64":"H4sI"}"#
        );
        assert_eq!(env.to_json()["dpsXmlGZipB64"], "H4sI");
        assert_eq!(env.to_json().as_object().unwrap().len(), 1);
    }
}
