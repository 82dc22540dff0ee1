//! Request types and URL construction

use http::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::error::HttpError;

/// Query parameters; the `BTreeMap` keeps serialization order stable.
pub type QueryParams = BTreeMap<String, Value>;

/// Supported HTTP verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Whether a JSON body is attached for this verb
    pub fn has_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => http::Method::GET,
            Method::Post => http::Method::POST,
            Method::Put => http::Method::PUT,
            Method::Patch => http::Method::PATCH,
            Method::Delete => http::Method::DELETE,
        }
    }
}

/// A logical request as seen by callers and request interceptors.
///
/// `url` may be relative; it is resolved against the client's base URL
/// on every attempt, after request interceptors have run.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub params: QueryParams,
    pub data: Option<Value>,
    /// Overrides the client's per-attempt timeout
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            params: QueryParams::new(),
            data: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>, data: Value) -> Self {
        Self::new(Method::Post, url).with_data(data)
    }

    pub fn put(url: impl Into<String>, data: Value) -> Self {
        Self::new(Method::Put, url).with_data(data)
    }

    pub fn patch(url: impl Into<String>, data: Value) -> Self {
        Self::new(Method::Patch, url).with_data(data)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, HttpError> {
        self.set_header(name, value)?;
        Ok(self)
    }

    /// Insert or replace a header, validating name and value
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), HttpError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| HttpError::InvalidRequest(format!("invalid header name: {}", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| HttpError::InvalidRequest(format!("invalid value for header {}", name)))?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A fully resolved request handed to the transport
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

/// Resolve `path` against `base` and append the serialized query params.
///
/// Absolute URLs are used as-is. Relative paths are appended to the base
/// URL, so a base of `https://host/rest/v1` and a path of `/courses`
/// yield `https://host/rest/v1/courses`.
pub fn build_url(base: Option<&Url>, path: &str, params: &QueryParams) -> Result<Url, HttpError> {
    let mut url = if path.starts_with("http://") || path.starts_with("https://") {
        Url::parse(path).map_err(|e| HttpError::InvalidRequest(format!("{}: {}", path, e)))?
    } else {
        let base = base.ok_or_else(|| {
            HttpError::InvalidRequest(format!("relative url {} without a base url", path))
        })?;
        let joined = format!(
            "{}/{}",
            base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| HttpError::InvalidRequest(format!("{}: {}", joined, e)))?
    };

    let pairs = serialize_params(params);
    if !pairs.is_empty() {
        let mut query = url.query_pairs_mut();
        for (key, value) in &pairs {
            query.append_pair(key, value);
        }
    }

    Ok(url)
}

/// Flatten query params into key/value pairs, skipping nulls.
///
/// Arrays become repeated keys; objects are sent as compact JSON.
pub fn serialize_params(params: &QueryParams) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in params {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    if let Some(s) = scalar_to_string(item) {
                        pairs.push((key.clone(), s));
                    }
                }
            }
            other => {
                if let Some(s) = scalar_to_string(other) {
                    pairs.push((key.clone(), s));
                }
            }
        }
    }
    pairs
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Url {
        Url::parse("https://api.example.com/rest/v1").unwrap()
    }

    #[test]
    fn test_relative_path_joins_base() {
        let url = build_url(Some(&base()), "/video_courses", &QueryParams::new()).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/rest/v1/video_courses");

        let url = build_url(Some(&base()), "video_courses/12", &QueryParams::new()).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/rest/v1/video_courses/12");
    }

    #[test]
    fn test_absolute_url_ignores_base() {
        let url = build_url(Some(&base()), "https://cdn.example.com/a", &QueryParams::new()).unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/a");
    }

    #[test]
    fn test_relative_without_base_is_rejected() {
        assert!(matches!(
            build_url(None, "/courses", &QueryParams::new()),
            Err(HttpError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_null_params_are_skipped() {
        let mut params = QueryParams::new();
        params.insert("page".into(), json!(2));
        params.insert("search".into(), Value::Null);
        params.insert("published".into(), json!(true));
        params.insert("tag".into(), json!(["rust", null, "async"]));

        let url = build_url(Some(&base()), "/courses", &params).unwrap();
        assert_eq!(
            url.query(),
            Some("page=2&published=true&tag=rust&tag=async")
        );
    }

    #[test]
    fn test_set_header_validates() {
        let mut request = HttpRequest::get("/courses");
        request.set_header("X-Client-Name", "lms-web").unwrap();
        assert_eq!(request.header("x-client-name"), Some("lms-web"));

        assert!(request.set_header("bad header", "x").is_err());
        assert!(request.set_header("x-ok", "line\nbreak").is_err());
    }

    #[test]
    fn test_method_body_rules() {
        assert!(Method::Post.has_body());
        assert!(Method::Put.has_body());
        assert!(Method::Patch.has_body());
        assert!(!Method::Get.has_body());
        assert!(!Method::Delete.has_body());
    }
}
