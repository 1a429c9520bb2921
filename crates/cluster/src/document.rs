//! Stored document layout
//!
//! | Field | Content |
//! |-------|---------|
//! | `id` | `<namespace>:<encoded key>` |
//! | `_version_` | always 0 (unconditional overwrite) |
//! | `HZ_CTIME` | creation time, UTC, millisecond precision |
//! | `HZ_CLASS` | value type name |
//! | `HZ_DATA` | codec bytes, standard base64 |

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use gridstore_core::{Error, Result};
use serde_json::{json, Value as JsonValue};

/// Document id field
pub const F_ID: &str = "id";
/// Optimistic-concurrency field
pub const F_VERSION: &str = "_version_";
/// Creation time field
pub const F_CTIME: &str = "HZ_CTIME";
/// Value type field
pub const F_CLASS: &str = "HZ_CLASS";
/// Payload field
pub const F_DATA: &str = "HZ_DATA";

/// Format of `HZ_CTIME`
pub const CTIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Render a creation time.
pub fn format_ctime(at: DateTime<Utc>) -> String {
    at.format(CTIME_FORMAT).to_string()
}

/// Parse a creation time as written by [`format_ctime`] or returned by the
/// cluster (which may drop the milliseconds).
pub fn parse_ctime(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Build the document for one entry.
pub fn build(id: &str, created_at: DateTime<Utc>, class: &str, data: &[u8]) -> JsonValue {
    json!({
        F_ID: id,
        F_VERSION: 0,
        F_CTIME: format_ctime(created_at),
        F_CLASS: class,
        F_DATA: STANDARD.encode(data),
    })
}

/// Read a string field; single values may come back as a one-element array.
fn scalar<'a>(doc: &'a JsonValue, field: &str) -> Option<&'a str> {
    match doc.get(field)? {
        JsonValue::String(s) => Some(s),
        JsonValue::Array(items) => items.first().and_then(JsonValue::as_str),
        _ => None,
    }
}

/// A document read back from the cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Document id
    pub id: String,
    /// Creation time, if recorded and parseable
    pub created_at: Option<DateTime<Utc>>,
    /// Value type name, if recorded
    pub class: Option<String>,
    /// Decoded payload bytes, if present
    pub data: Option<Vec<u8>>,
}

impl StoredDocument {
    /// Extract the reserved fields from a returned document.
    pub fn from_json(doc: &JsonValue) -> Result<Self> {
        let id = scalar(doc, F_ID)
            .ok_or_else(|| Error::codec("document without id"))?
            .to_string();
        let data = scalar(doc, F_DATA)
            .map(|text| STANDARD.decode(text).map_err(Error::codec))
            .transpose()?;
        Ok(Self {
            id,
            created_at: scalar(doc, F_CTIME).and_then(parse_ctime),
            class: scalar(doc, F_CLASS).map(str::to_string),
            data,
        })
    }
}

/// Escape query-syntax characters so `text` matches literally.
pub fn escape_query(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '+' | '-' | '!' | '(' | ')' | ':' | '^' | '[' | ']' | '"' | '{' | '}' | '~'
                | '*' | '?' | '|' | '&' | ';' | '/'
        ) || c.is_whitespace()
        {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Fail unless `responseHeader.status` is absent or zero.
pub fn check_status(endpoint: &str, response: &JsonValue) -> Result<()> {
    let status = response
        .get("responseHeader")
        .and_then(|header| header.get("status"))
        .and_then(JsonValue::as_i64)
        .unwrap_or(0);
    if status == 0 {
        Ok(())
    } else {
        Err(Error::transient(
            endpoint,
            format!("cluster returned status {status}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_build_and_read_back() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        let doc = build("orders:abc", at, "alloc::string::String", b"\x01\x02");
        assert_eq!(doc[F_VERSION], 0);
        assert_eq!(doc[F_CTIME], "2024-03-01T12:30:05.000Z");

        let stored = StoredDocument::from_json(&doc).unwrap();
        assert_eq!(stored.id, "orders:abc");
        assert_eq!(stored.created_at, Some(at));
        assert_eq!(stored.class.as_deref(), Some("alloc::string::String"));
        assert_eq!(stored.data, Some(vec![1, 2]));
    }

    #[test]
    fn test_multivalued_fields_and_short_dates() {
        let doc = json!({"id": ["q:1"], "HZ_CTIME": "2024-03-01T00:00:00Z"});
        let stored = StoredDocument::from_json(&doc).unwrap();
        assert_eq!(stored.id, "q:1");
        assert!(stored.created_at.is_some());
        assert_eq!(stored.data, None);
    }

    #[test]
    fn test_bad_payload_is_codec_error() {
        let doc = json!({"id": "q:1", "HZ_DATA": "%%%"});
        assert!(StoredDocument::from_json(&doc).unwrap_err().is_codec());
        assert!(StoredDocument::from_json(&json!({})).unwrap_err().is_codec());
    }

    #[test]
    fn test_escape_query() {
        assert_eq!(escape_query("orders"), "orders");
        assert_eq!(escape_query("a:b c"), "a\\:b\\ c");
        assert_eq!(escape_query("x-y/z*"), "x\\-y\\/z\\*");
    }

    #[test]
    fn test_check_status() {
        assert!(check_status("e", &json!({"doc": null})).is_ok());
        assert!(check_status("e", &json!({"responseHeader": {"status": 0}})).is_ok());
        let err = check_status("e", &json!({"responseHeader": {"status": 500}})).unwrap_err();
        assert!(err.is_retryable());
    }
}
