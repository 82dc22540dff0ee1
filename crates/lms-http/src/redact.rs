//! Header redaction for logging

use http::header::HeaderMap;
use std::collections::BTreeMap;

/// Header names whose values never reach logs
pub const SENSITIVE_HEADERS: [&str; 3] = ["authorization", "cookie", "x-api-key"];

pub const REDACTED: &str = "[REDACTED]";

/// Case-insensitive check against [`SENSITIVE_HEADERS`]
pub fn is_sensitive(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|s| s.eq_ignore_ascii_case(name))
}

/// Render headers for logging with sensitive values masked
pub fn redact_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let rendered = if is_sensitive(name.as_str()) {
                REDACTED.to_string()
            } else {
                value.to_str().unwrap_or("<binary>").to_string()
            };
            (name.as_str().to_string(), rendered)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::HeaderValue;

    #[test]
    fn test_sensitive_headers_are_masked() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        headers.insert("cookie", HeaderValue::from_static("sid=1"));
        headers.insert("x-api-key", HeaderValue::from_static("k"));
        headers.insert("x-request-id", HeaderValue::from_static("req_1_2"));

        let redacted = redact_headers(&headers);
        assert_eq!(redacted["authorization"], REDACTED);
        assert_eq!(redacted["cookie"], REDACTED);
        assert_eq!(redacted["x-api-key"], REDACTED);
        assert_eq!(redacted["x-request-id"], "req_1_2");
    }

    #[test]
    fn test_is_sensitive_ignores_case() {
        assert!(is_sensitive("Authorization"));
        assert!(is_sensitive("X-API-KEY"));
        assert!(!is_sensitive("content-type"));
    }
}
