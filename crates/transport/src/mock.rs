//! Scripted transport for tests.
//!
//! Responses are queued per path (query string ignored) and handed out in
//! order. Every request is recorded, so tests can assert on what was sent.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use protocol::codec::{self, Encoding};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Transport, TransportError, TransportResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Vec<u8>,
    pub accept: Option<Encoding>,
}

impl RecordedRequest {
    pub fn json<T: DeserializeOwned>(&self) -> T {
        match serde_json::from_slice(&self.body) {
            Ok(value) => value,
            Err(e) => panic!("request body to {} is not the expected JSON: {e}", self.path),
        }
    }
}

#[derive(Debug)]
enum Reply {
    Respond(TransportResponse),
    Fail(String),
}

#[derive(Debug)]
struct Scripted {
    delay: Option<Duration>,
    reply: Reply,
}

#[derive(Debug, Default)]
struct Inner {
    routes: HashMap<String, VecDeque<Scripted>>,
    requests: Vec<RecordedRequest>,
}

#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Mutex<Inner>,
}

fn route_of(path: &str) -> &str {
    path.split('?').next().unwrap_or(path)
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, path: &str, delay: Option<Duration>, reply: Reply) {
        self.inner
            .lock()
            .routes
            .entry(route_of(path).to_string())
            .or_default()
            .push_back(Scripted { delay, reply });
    }

    pub fn push_response(&self, path: &str, response: TransportResponse) {
        self.push(path, None, Reply::Respond(response));
    }

    pub fn push_json<T: Serialize + ?Sized>(&self, path: &str, status: u16, body: &T) {
        self.push_encoded(path, status, body, Encoding::Json, None);
    }

    pub fn push_cbor<T: Serialize + ?Sized>(&self, path: &str, status: u16, body: &T) {
        self.push_encoded(path, status, body, Encoding::Cbor, None);
    }

    /// Queues a JSON response that is only delivered after `delay`.
    pub fn push_json_delayed<T: Serialize + ?Sized>(&self, path: &str, body: &T, delay: Duration) {
        self.push_encoded(path, 200, body, Encoding::Json, Some(delay));
    }

    fn push_encoded<T: Serialize + ?Sized>(
        &self,
        path: &str,
        status: u16,
        body: &T,
        encoding: Encoding,
        delay: Option<Duration>,
    ) {
        let bytes = match codec::encode(body, encoding) {
            Ok(bytes) => bytes,
            Err(e) => panic!("cannot encode scripted body for {path}: {e}"),
        };
        let response = TransportResponse::new(status, Some(encoding.mime()), bytes);
        self.push(path, delay, Reply::Respond(response));
    }

    pub fn push_status(&self, path: &str, status: u16) {
        self.push_response(path, TransportResponse::new(status, None, Vec::new()));
    }

    pub fn push_error(&self, path: &str, message: &str) {
        self.push(path, None, Reply::Fail(message.to_string()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.lock().requests.clone()
    }

    /// Requests whose path (without query) equals `path`.
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        let route = route_of(path);
        self.inner
            .lock()
            .requests
            .iter()
            .filter(|r| route_of(&r.path) == route)
            .cloned()
            .collect()
    }

    pub fn pending(&self, path: &str) -> usize {
        self.inner.lock().routes.get(route_of(path)).map_or(0, VecDeque::len)
    }

    fn take(&self, request: RecordedRequest) -> Option<Scripted> {
        let mut inner = self.inner.lock();
        let route = route_of(&request.path).to_string();
        inner.requests.push(request);
        inner.routes.get_mut(&route).and_then(VecDeque::pop_front)
    }

    async fn answer(&self, request: RecordedRequest) -> Result<TransportResponse, TransportError> {
        let path = request.path.clone();
        let Some(scripted) = self.take(request) else {
            return Err(TransportError::Unscripted(path));
        };
        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }
        match scripted.reply {
            Reply::Respond(response) => Ok(response),
            Reply::Fail(message) => Err(TransportError::Simulated(message)),
        }
    }
}

impl Transport for MockTransport {
    async fn post(&self, path: &str, body: Vec<u8>, accept: Encoding) -> Result<TransportResponse, TransportError> {
        self.answer(RecordedRequest {
            method: Method::Post,
            path: path.to_string(),
            body,
            accept: Some(accept),
        })
        .await
    }

    async fn get(&self, path: &str) -> Result<TransportResponse, TransportError> {
        self.answer(RecordedRequest {
            method: Method::Get,
            path: path.to_string(),
            body: Vec::new(),
            accept: None,
        })
        .await
    }
}
