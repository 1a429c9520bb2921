//! Value serialization
//!
//! [`ObjectCodec`] turns any serde value into the opaque byte payload stored
//! by a backend and back. MessagePack is the default; JSON and Bincode are
//! available for namespaces shared with other tooling.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Serialization format for stored keys and values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectCodec {
    /// MessagePack via `rmp-serde` (struct fields encoded by name)
    #[default]
    MessagePack,
    /// JSON via `serde_json`
    Json,
    /// Bincode
    Bincode,
}

impl ObjectCodec {
    /// Encode a value into bytes.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            ObjectCodec::MessagePack => rmp_serde::to_vec_named(value).map_err(Error::codec),
            ObjectCodec::Json => serde_json::to_vec(value).map_err(Error::codec),
            ObjectCodec::Bincode => bincode::serialize(value).map_err(Error::codec),
        }
    }

    /// Decode bytes produced by [`ObjectCodec::encode`].
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            ObjectCodec::MessagePack => rmp_serde::from_slice(bytes).map_err(Error::codec),
            ObjectCodec::Json => serde_json::from_slice(bytes).map_err(Error::codec),
            ObjectCodec::Bincode => bincode::deserialize(bytes).map_err(Error::codec),
        }
    }

    /// Parse a codec name as used in property bags.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "messagepack" | "msgpack" => Ok(ObjectCodec::MessagePack),
            "json" => Ok(ObjectCodec::Json),
            "bincode" => Ok(ObjectCodec::Bincode),
            other => Err(Error::Configuration(format!("unknown codec '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Session {
        user: String,
        hits: u32,
        tags: Vec<String>,
    }

    fn sample() -> Session {
        Session {
            user: "alice".to_string(),
            hits: 7,
            tags: vec!["a".to_string(), "b".to_string()],
        }
    }

    #[test]
    fn test_all_codecs_preserve_structs() {
        for codec in [ObjectCodec::MessagePack, ObjectCodec::Json, ObjectCodec::Bincode] {
            let bytes = codec.encode(&sample()).unwrap();
            let back: Session = codec.decode(&bytes).unwrap();
            assert_eq!(back, sample(), "codec {:?}", codec);
        }
    }

    #[test]
    fn test_decode_garbage_is_codec_error() {
        let err = ObjectCodec::Json.decode::<Session>(b"not json").unwrap_err();
        assert!(err.is_codec());
    }

    #[test]
    fn test_default_is_messagepack() {
        assert_eq!(ObjectCodec::default(), ObjectCodec::MessagePack);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(ObjectCodec::parse("msgpack").unwrap(), ObjectCodec::MessagePack);
        assert_eq!(ObjectCodec::parse(" JSON ").unwrap(), ObjectCodec::Json);
        assert!(ObjectCodec::parse("kryo").unwrap_err().is_configuration());
    }
}
