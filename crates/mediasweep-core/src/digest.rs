use serde_json::Value;
use sha2::{Digest, Sha256};

/// Canonical JSON bytes: object keys sorted at every depth, arrays in order, no whitespace.
pub fn canonical_json_bytes(value: &Value) -> Vec<u8> {
    serde_json::to_vec(&sorted(value)).expect("canonical JSON serialization should not fail")
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Value::Object(
                keys.into_iter()
                    .map(|k| (k.clone(), sorted(&map[k])))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Lowercase hex SHA-256.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 over the canonical form of `value`. Key order in the input never matters.
pub fn value_digest(value: &Value) -> String {
    sha256_hex(&canonical_json_bytes(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_keys_sorted() {
        let v = json!({"b": {"z": 1, "a": [3, {"y": 0, "x": 1}]}, "a": 1});
        let out = String::from_utf8(canonical_json_bytes(&v)).unwrap();
        assert_eq!(out, r#"{"a":1,"b":{"a":[3,{"x":1,"y":0}],"z":1}}"#);
    }

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn digest_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"mode":"retention","deleted":5}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"deleted":5,"mode":"retention"}"#).unwrap();
        assert_eq!(value_digest(&a), value_digest(&b));
        assert_eq!(value_digest(&a).len(), 64);
    }
}
