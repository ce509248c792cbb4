//! Outbound HTTP client for the chat engine.
//!
//! No business logic lives here: requests are forwarded as given, minus the
//! `Host` header, redirects are handed back to the caller untouched, and
//! nothing is retried.

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, StatusCode};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine unreachable: {0}")]
    Unreachable(String),
    #[error("engine returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid engine response: {0}")]
    Decode(String),
    #[error("engine response missing {0}")]
    MissingField(&'static str),
}

/// Engine reply with the body fully buffered.
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    fn into_json(self) -> Result<Value, EngineError> {
        if !self.status.is_success() {
            return Err(EngineError::Status {
                status: self.status.as_u16(),
                body: String::from_utf8_lossy(&self.body).into_owned(),
            });
        }
        serde_json::from_slice(&self.body).map_err(|e| EngineError::Decode(e.to_string()))
    }
}

pub struct EngineClient {
    base_url: String,
    client: reqwest::Client,
}

impl EngineClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Forward one request to `{base_url}{path}?{query}`.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        headers: &HeaderMap,
        body: Bytes,
        query: Option<&str>,
    ) -> Result<RawResponse, EngineError> {
        let mut url = format!("{}{}", self.base_url, path);
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }

        let mut forwarded = headers.clone();
        forwarded.remove(header::HOST);

        tracing::debug!(%method, %url, "engine call");

        let resp = self
            .client
            .request(method, &url)
            .headers(forwarded)
            .body(body)
            .send()
            .await
            .map_err(|e| EngineError::Unreachable(e.to_string()))?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp
            .bytes()
            .await
            .map_err(|e| EngineError::Unreachable(e.to_string()))?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }

    pub async fn get_json(&self, path: &str) -> Result<Value, EngineError> {
        self.call(Method::GET, path, &HeaderMap::new(), Bytes::new(), None)
            .await?
            .into_json()
    }

    pub async fn post_json(&self, path: &str, payload: &Value) -> Result<Value, EngineError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let body = serde_json::to_vec(payload).map_err(|e| EngineError::Decode(e.to_string()))?;
        self.call(Method::POST, path, &headers, Bytes::from(body), None)
            .await?
            .into_json()
    }
}
