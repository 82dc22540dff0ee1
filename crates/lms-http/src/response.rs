//! Response types

use http::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::HttpError;

/// Parsed response body
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Empty,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn new(status: u16, body: ResponseBody) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn json_body(status: u16, body: Value) -> Self {
        Self::new(status, ResponseBody::Json(body))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Deserialize the body into `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        match &self.body {
            ResponseBody::Json(value) => Ok(serde_json::from_value(value.clone())?),
            ResponseBody::Text(text) => Ok(serde_json::from_str(text)?),
            ResponseBody::Empty => Ok(serde_json::from_value(Value::Null)?),
        }
    }

    /// Body as a JSON value; text bodies become JSON strings
    pub fn into_value(self) -> Value {
        match self.body {
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => Value::String(text),
            ResponseBody::Empty => Value::Null,
        }
    }

    /// Best-effort human readable error message for a failed response
    pub fn error_message(&self) -> String {
        let from_body = match &self.body {
            ResponseBody::Json(Value::Object(map)) => ["message", "error", "msg", "hint"]
                .iter()
                .find_map(|k| map.get(*k).and_then(|v| v.as_str()))
                .map(|s| s.to_string()),
            ResponseBody::Text(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            _ => None,
        };

        from_body.unwrap_or_else(|| {
            http::StatusCode::from_u16(self.status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown status")
                .to_string()
        })
    }

    /// Convert a non-success response into the matching error
    pub fn to_error(&self) -> HttpError {
        HttpError::from_status(self.status, self.error_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Course {
        id: u32,
        title: String,
    }

    #[test]
    fn test_json_decoding() {
        let response = HttpResponse::json_body(200, json!({"id": 1, "title": "Rust"}));
        let course: Course = response.json().unwrap();
        assert_eq!(
            course,
            Course {
                id: 1,
                title: "Rust".into()
            }
        );

        let wrong: Result<Vec<Course>, _> = response.json();
        assert!(matches!(wrong, Err(HttpError::Decode(_))));
    }

    #[test]
    fn test_error_message_sources() {
        let response = HttpResponse::json_body(400, json!({"message": "title is required"}));
        assert_eq!(response.error_message(), "title is required");

        let response = HttpResponse::new(502, ResponseBody::Text("upstream down\n".into()));
        assert_eq!(response.error_message(), "upstream down");

        let response = HttpResponse::new(404, ResponseBody::Empty);
        assert_eq!(response.error_message(), "Not Found");
        assert_eq!(response.to_error().status(), Some(404));
    }
}
