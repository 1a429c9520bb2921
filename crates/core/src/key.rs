//! Key encoding
//!
//! Keys take two shapes on disk:
//! - **bytes** for the embedded engines, produced by the namespace codec
//! - **canonical ids** for the document cluster: a `{t, v}` envelope where
//!   `t` is a type tag and `v` the key's JSON form, base64url encoded so the
//!   id is safe in URLs and query strings
//!
//! JSON objects serialize with sorted field names, so the canonical id of a
//! structured key does not depend on field insertion order.

use crate::codec::ObjectCodec;
use crate::error::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Separator between namespace and encoded key in a document id
pub const ID_SEPARATOR: char = ':';

/// Converts keys to bytes and to canonical namespaced identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyEncoder {
    codec: ObjectCodec,
}

impl KeyEncoder {
    /// Create an encoder using `codec` for the byte form.
    pub fn new(codec: ObjectCodec) -> Self {
        Self { codec }
    }

    /// Codec used for the byte form
    pub fn codec(&self) -> ObjectCodec {
        self.codec
    }

    /// Encode a key into bytes.
    pub fn to_bytes<K: Serialize>(&self, key: &K) -> Result<Vec<u8>> {
        self.codec.encode(key)
    }

    /// Decode a key from bytes.
    pub fn from_bytes<K: DeserializeOwned>(&self, bytes: &[u8]) -> Result<K> {
        self.codec.decode(bytes)
    }

    /// Encode a key as a canonical, URL-safe identifier.
    pub fn encode_id<K: Serialize>(&self, key: &K) -> Result<String> {
        let value = serde_json::to_value(key).map_err(Error::codec)?;
        let mut envelope = serde_json::Map::new();
        envelope.insert("t".to_string(), JsonValue::from(type_tag(&value)));
        envelope.insert("v".to_string(), value);
        let text = serde_json::to_string(&JsonValue::Object(envelope)).map_err(Error::codec)?;
        Ok(URL_SAFE_NO_PAD.encode(text.as_bytes()))
    }

    /// Decode an identifier produced by [`KeyEncoder::encode_id`].
    pub fn decode_id<K: DeserializeOwned>(&self, id: &str) -> Result<K> {
        let raw = URL_SAFE_NO_PAD.decode(id).map_err(Error::codec)?;
        let envelope: JsonValue = serde_json::from_slice(&raw).map_err(Error::codec)?;
        let tag = envelope
            .get("t")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| Error::Codec(format!("key id '{}' has no type tag", id)))?;
        let value = envelope
            .get("v")
            .ok_or_else(|| Error::Codec(format!("key id '{}' has no value", id)))?;
        if type_tag(value) != tag {
            return Err(Error::Codec(format!(
                "key id '{}' tagged {} but holds {}",
                id,
                tag,
                type_tag(value)
            )));
        }
        serde_json::from_value(value.clone()).map_err(Error::codec)
    }

    /// Document id of `key` inside `namespace`: `"<namespace>:<encoded key>"`.
    pub fn document_id<K: Serialize>(&self, namespace: &str, key: &K) -> Result<String> {
        Ok(format!("{}{}{}", namespace, ID_SEPARATOR, self.encode_id(key)?))
    }

    /// Recover the key from a document id of `namespace`.
    pub fn key_from_document_id<K: DeserializeOwned>(&self, namespace: &str, id: &str) -> Result<K> {
        let encoded = id
            .strip_prefix(namespace)
            .and_then(|rest| rest.strip_prefix(ID_SEPARATOR))
            .ok_or_else(|| {
                Error::Codec(format!("document id '{}' is outside namespace '{}'", id, namespace))
            })?;
        self.decode_id(encoded)
    }
}

fn type_tag(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(n) if n.is_i64() => "int",
        JsonValue::Number(n) if n.is_u64() => "uint",
        JsonValue::Number(_) => "float",
        JsonValue::String(_) => "str",
        JsonValue::Array(_) => "seq",
        JsonValue::Object(_) => "map",
    }
}
