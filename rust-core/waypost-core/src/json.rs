//! # JSON Body Decoding
//!
//! High-performance JSON parsing using simd-json, producing `serde_json`
//! values so the rest of the crate deals with a single JSON type.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Parse JSON bytes to a typed value using simd-json
///
/// simd-json parses in place, so the input is copied first.
///
/// # Errors
///
/// Returns `Error::MalformedJsonBody` if parsing fails
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut owned = bytes.to_vec();
    simd_json::from_slice(&mut owned).map_err(|e| Error::MalformedJsonBody {
        reason: e.to_string(),
    })
}

/// Parse a request body into body parameters
///
/// An empty body yields an empty map. A top-level value that is not an
/// object is wrapped under the key `_body` so it is still reachable.
///
/// # Errors
///
/// Returns `Error::MalformedJsonBody` if the body is not valid JSON
pub fn parse_body_params(bytes: &[u8]) -> Result<Map<String, Value>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match parse_json_bytes::<Value>(bytes)? {
        Value::Object(map) => Ok(map),
        other => {
            let mut map = Map::new();
            map.insert("_body".to_string(), other);
            Ok(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestData {
        name: String,
        age: i32,
    }

    #[test]
    fn test_parse_json_bytes() {
        let data: TestData = parse_json_bytes(br#"{"name": "Jane", "age": 25}"#).unwrap();
        assert_eq!(data.name, "Jane");
        assert_eq!(data.age, 25);
    }

    #[test]
    fn test_body_params_object() {
        let map = parse_body_params(br#"{"title": "hello", "count": 3}"#).unwrap();
        assert_eq!(map.get("title"), Some(&Value::from("hello")));
        assert_eq!(map.get("count"), Some(&Value::from(3)));
    }

    #[test]
    fn test_body_params_empty() {
        assert!(parse_body_params(b"  \n").unwrap().is_empty());
    }

    #[test]
    fn test_body_params_array_wrapped() {
        let map = parse_body_params(b"[1, 2]").unwrap();
        assert_eq!(map.get("_body"), Some(&serde_json::json!([1, 2])));
    }

    #[test]
    fn test_invalid_json() {
        let result = parse_body_params(b"not valid json");
        assert!(matches!(result, Err(Error::MalformedJsonBody { .. })));
    }
}
