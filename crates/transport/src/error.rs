use protocol::CodecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {path} failed: {source}")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} returned status {status}")]
    Status { path: String, status: u16 },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("no scripted response for {0}")]
    Unscripted(String),
    #[error("simulated failure: {0}")]
    Simulated(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
