//! Canonical record encoding
//!
//! Every replica of a shard must write byte-identical state for the same
//! logical record, or the shards' state hashes diverge. Records are encoded
//! as RFC 8785 (JCS) canonical JSON: object keys sorted lexicographically at
//! every nesting level, deterministic number formatting, no whitespace.
//! Struct field declaration order never reaches the byte stream.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{MeshError, Result};

/// JSON field holding the schema discriminator stamped by the store.
pub const DOC_TYPE_FIELD: &str = "docType";

/// Encode a value as canonical JSON bytes.
///
/// Idempotent: encoding the decoded output of a prior encoding yields the
/// same bytes.
pub fn to_canonical_vec<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_jcs::to_vec(value)?)
}

/// Stamp `doc_type` into the record's JSON object representation.
///
/// The discriminator is written unconditionally; a caller-supplied value is
/// overwritten. Fails for records that do not encode to a JSON object.
pub fn stamp_value<T: Serialize>(doc_type: &str, record: &T) -> Result<Value> {
    let mut value = serde_json::to_value(record)?;
    match value.as_object_mut() {
        Some(map) => {
            map.insert(DOC_TYPE_FIELD.to_string(), Value::String(doc_type.to_string()));
        }
        None => {
            return Err(MeshError::InvalidArgument(
                "record must encode to a JSON object".to_string(),
            ));
        }
    }
    Ok(value)
}

/// Stamp `doc_type` into the record's JSON object, then canonically encode.
pub fn stamp_and_encode<T: Serialize>(doc_type: &str, record: &T) -> Result<Vec<u8>> {
    to_canonical_vec(&stamp_value(doc_type, record)?)
}

/// Decode stored bytes as a record of the given schema.
///
/// The stamped discriminator must match `doc_type` before the typed decode
/// is attempted; any failure is reported as a decode failure so scans can
/// degrade per record.
pub fn decode_stamped<T: DeserializeOwned>(doc_type: &str, bytes: &[u8]) -> Result<T> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| MeshError::Decode(format!("invalid JSON: {e}")))?;
    match value.get(DOC_TYPE_FIELD).and_then(Value::as_str) {
        Some(stamped) if stamped == doc_type => {}
        Some(stamped) => {
            return Err(MeshError::Decode(format!(
                "schema mismatch: expected {doc_type}, found {stamped}"
            )));
        }
        None => {
            return Err(MeshError::Decode(format!(
                "record carries no {DOC_TYPE_FIELD} discriminator"
            )));
        }
    }
    serde_json::from_value(value).map_err(|e| MeshError::Decode(e.to_string()))
}

/// SHA-256 content fingerprint, hex-encoded.
///
/// Used for model payload hashes; the store treats the result as opaque.
pub fn content_fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize)]
    struct Forward {
        id: String,
        channel: String,
        min_peers: u32,
    }

    #[derive(Serialize)]
    struct Reverse {
        min_peers: u32,
        channel: String,
        id: String,
    }

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Sample {
        id: String,
        round: u32,
    }

    #[test]
    fn field_declaration_order_does_not_change_bytes() {
        let a = Forward {
            id: "1".to_string(),
            channel: "CIFAR1".to_string(),
            min_peers: 0,
        };
        let b = Reverse {
            min_peers: 0,
            channel: "CIFAR1".to_string(),
            id: "1".to_string(),
        };
        assert_eq!(to_canonical_vec(&a).unwrap(), to_canonical_vec(&b).unwrap());
    }

    #[test]
    fn encoding_is_idempotent() {
        let first = stamp_and_encode("sample", &Sample { id: "m1".to_string(), round: 3 }).unwrap();
        let reparsed: Value = serde_json::from_slice(&first).unwrap();
        let second = to_canonical_vec(&reparsed).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn nested_keys_are_sorted_at_every_level() {
        let value: Value = serde_json::from_str(r#"{"z":{"b":1,"a":2},"a":0}"#).unwrap();
        let encoded = to_canonical_vec(&value).unwrap();
        assert_eq!(String::from_utf8(encoded).unwrap(), r#"{"a":0,"z":{"a":2,"b":1}}"#);
    }

    #[test]
    fn stamp_overwrites_caller_supplied_discriminator() {
        let sneaky = serde_json::json!({"docType": "bogus", "id": "x"});
        let bytes = stamp_and_encode("shard", &sneaky).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value[DOC_TYPE_FIELD], "shard");
    }

    #[test]
    fn stamp_rejects_non_object_records() {
        let err = stamp_and_encode("shard", &42u32).unwrap_err();
        assert!(matches!(err, MeshError::InvalidArgument(_)));
    }

    #[test]
    fn decode_checks_discriminator_before_typed_decode() {
        let bytes = stamp_and_encode("sample", &Sample { id: "m1".to_string(), round: 1 }).unwrap();
        let decoded: Sample = decode_stamped("sample", &bytes).unwrap();
        assert_eq!(decoded, Sample { id: "m1".to_string(), round: 1 });

        let err = decode_stamped::<Sample>("other", &bytes).unwrap_err();
        assert!(matches!(err, MeshError::Decode(_)));

        let unstamped = to_canonical_vec(&Sample { id: "m1".to_string(), round: 1 }).unwrap();
        let err = decode_stamped::<Sample>("sample", &unstamped).unwrap_err();
        assert!(matches!(err, MeshError::Decode(_)));
    }

    #[test]
    fn fingerprint_matches_known_digest() {
        assert_eq!(
            content_fingerprint(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
