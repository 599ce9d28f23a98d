use std::time::Duration;

use http::header::{ACCEPT, CONTENT_TYPE};
use protocol::codec::{Encoding, JSON_MIME};
use tracing::debug;

use crate::{ClientConfig, Transport, TransportError, TransportResponse};

/// reqwest-backed transport rooted at a base URL. Bodies are sent as JSON.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let base_url = base_url.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| TransportError::Request {
                path: base_url.clone(),
                source,
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        Self::new(config.base_url.clone(), config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn finish(path: &str, response: reqwest::Response) -> Result<TransportResponse, TransportError> {
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|source| TransportError::Request {
            path: path.to_string(),
            source,
        })?;
        debug!(path, status, bytes = body.len(), "response received");
        Ok(TransportResponse {
            status,
            content_type,
            body,
        })
    }
}

impl Transport for HttpTransport {
    async fn post(&self, path: &str, body: Vec<u8>, accept: Encoding) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(self.url(path))
            .header(CONTENT_TYPE, JSON_MIME)
            .header(ACCEPT, accept.mime())
            .body(body)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                path: path.to_string(),
                source,
            })?;
        Self::finish(path, response).await
    }

    async fn get(&self, path: &str) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|source| TransportError::Request {
                path: path.to_string(),
                source,
            })?;
        Self::finish(path, response).await
    }
}
