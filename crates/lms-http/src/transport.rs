//! Network transport seam

use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::debug;

use crate::error::HttpError;
use crate::request::PreparedRequest;
use crate::response::{HttpResponse, ResponseBody};

/// Sends one fully prepared request.
///
/// Implementations return `Ok` for any HTTP status; status classification
/// and retries belong to the client.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: PreparedRequest) -> Result<HttpResponse, HttpError>;
}

/// [`Transport`] backed by `reqwest`
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, HttpError> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: PreparedRequest) -> Result<HttpResponse, HttpError> {
        let mut builder = self
            .client
            .request(request.method.into(), request.url)
            .headers(request.headers);

        if request.method.has_body()
            && let Some(body) = &request.body
        {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();

        let is_json = headers
            .get(CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .map(|ct| ct.contains("json"))
            .unwrap_or(false);

        let bytes = response.bytes().await?;

        let body = if bytes.is_empty() {
            ResponseBody::Empty
        } else if is_json {
            match serde_json::from_slice(&bytes) {
                Ok(value) => ResponseBody::Json(value),
                Err(e) => {
                    debug!("Response declared JSON but failed to parse: {}", e);
                    ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned())
                }
            }
        } else {
            ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned())
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
