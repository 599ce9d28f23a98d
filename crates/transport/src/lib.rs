//! The only network boundary of the client.
//!
//! Stores talk to the backend through the [`Transport`] trait. The reqwest
//! implementation is used in production; `mock::MockTransport` replays
//! scripted responses in tests and is only built with the `mock` feature.

pub mod config;
pub mod error;
pub mod http_client;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

use std::future::Future;

use bytes::Bytes;
use protocol::codec::{self, Encoding};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use config::ClientConfig;
pub use error::TransportError;
pub use http_client::HttpTransport;

/// Raw response: status, content type and body bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Decodes the body with the codec named by the content type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        Ok(codec::decode_response(&self.body, self.content_type.as_deref())?)
    }
}

pub trait Transport: Send + Sync + 'static {
    /// POSTs a JSON body, asking for the given response encoding.
    fn post(
        &self,
        path: &str,
        body: Vec<u8>,
        accept: Encoding,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;

    fn get(&self, path: &str) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// POSTs `body` as JSON and decodes a successful JSON response.
pub async fn post_json<T, B, R>(transport: &T, path: &str, body: &B) -> Result<R, TransportError>
where
    T: Transport,
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let bytes = serde_json::to_vec(body).map_err(protocol::CodecError::from)?;
    let response = transport.post(path, bytes, Encoding::Json).await?;
    if !response.is_success() {
        return Err(TransportError::Status {
            path: path.to_string(),
            status: response.status,
        });
    }
    response.decode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use protocol::MapCreated;
    use serde_json::json;

    #[tokio::test]
    async fn post_json_decodes_success_and_reports_status() {
        let transport = MockTransport::new();
        transport.push_json("/data_backend/map", 200, &json!({"map_id": "m1"}));
        transport.push_status("/data_backend/map", 500);

        let created: MapCreated = post_json(&transport, "/data_backend/map?ignore_cache=false", &json!({}))
            .await
            .unwrap();
        assert_eq!(created.map_id.as_str(), "m1");

        let failed: Result<MapCreated, _> = post_json(&transport, "/data_backend/map", &json!({})).await;
        assert!(matches!(failed, Err(TransportError::Status { status: 500, .. })));
        assert_eq!(transport.requests_to("/data_backend/map").len(), 2);
    }

    #[test]
    fn response_status_helpers() {
        let response = TransportResponse::new(404, None, Vec::new());
        assert!(response.is_not_found());
        assert!(!response.is_success());
        assert!(TransportResponse::new(204, None, Vec::new()).is_success());
    }
}
