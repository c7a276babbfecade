//! # Form Decoding
//!
//! `application/x-www-form-urlencoded` decoding, shared by query strings,
//! PUT form bodies and the multipart fallback path.

use std::collections::HashMap;

/// Parse an urlencoded string into a map
///
/// Handles URL decoding and duplicate keys (last value wins). Pairs with an
/// empty key are dropped.
#[must_use]
pub fn parse_urlencoded(input: &str) -> HashMap<String, String> {
    input
        .split('&')
        .filter_map(|pair| {
            if pair.is_empty() {
                return None;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = url_decode(key);
            if key.is_empty() {
                return None;
            }
            Some((key, url_decode(value)))
        })
        .collect()
}

/// Parse an urlencoded request body
///
/// Invalid UTF-8 sequences are replaced rather than rejected.
#[must_use]
pub fn parse_urlencoded_bytes(body: &[u8]) -> HashMap<String, String> {
    parse_urlencoded(&String::from_utf8_lossy(body))
}

/// Percent-decoding with `+` as space
#[must_use]
pub fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let decoded = bytes
                    .get(i + 1..i + 3)
                    .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                if let Some(byte) = decoded {
                    out.push(byte);
                    i += 2;
                } else {
                    out.push(b'%');
                }
            }
            other => out.push(other),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let result = parse_urlencoded("page=1&limit=10");
        assert_eq!(result.get("page"), Some(&"1".to_string()));
        assert_eq!(result.get("limit"), Some(&"10".to_string()));
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_urlencoded("").is_empty());
        assert!(parse_urlencoded("&&=x").is_empty());
    }

    #[test]
    fn test_parse_url_encoded() {
        let result = parse_urlencoded("name=John+Doe&city=New%20York&flag");
        assert_eq!(result.get("name"), Some(&"John Doe".to_string()));
        assert_eq!(result.get("city"), Some(&"New York".to_string()));
        assert_eq!(result.get("flag"), Some(&String::new()));
    }

    #[test]
    fn test_duplicate_last_wins() {
        let result = parse_urlencoded("a=1&a=2");
        assert_eq!(result.get("a"), Some(&"2".to_string()));
    }

    #[test]
    fn test_url_decode() {
        assert_eq!(url_decode("hello+world"), "hello world");
        assert_eq!(url_decode("hello%20world"), "hello world");
        assert_eq!(url_decode("100%25"), "100%");
        assert_eq!(url_decode("caf%C3%A9"), "café");
        assert_eq!(url_decode("bad%zz"), "bad%zz");
        assert_eq!(url_decode("tail%4"), "tail%4");
    }
}
