//! JSON/CBOR body encoding, selected by `Accept` and `Content-Type` headers.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const JSON_MIME: &str = "application/json";
pub const CBOR_MIME: &str = "application/cbor";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cbor decode: {0}")]
    CborDecode(String),
    #[error("cbor encode: {0}")]
    CborEncode(String),
    #[error("unknown encoding '{0}'")]
    UnknownEncoding(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Compact binary encoding for the poll endpoint.
    #[default]
    Cbor,
    Json,
}

impl Encoding {
    pub fn mime(self) -> &'static str {
        match self {
            Encoding::Cbor => CBOR_MIME,
            Encoding::Json => JSON_MIME,
        }
    }

    /// Maps a `Content-Type` header to an encoding, ignoring parameters.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        if essence.eq_ignore_ascii_case(CBOR_MIME) {
            Some(Encoding::Cbor)
        } else if essence.eq_ignore_ascii_case(JSON_MIME) {
            Some(Encoding::Json)
        } else {
            None
        }
    }

    /// Server-side negotiation: CBOR only when the client asks for it.
    pub fn negotiate(accept: Option<&str>) -> Self {
        match accept {
            Some(accept) if accept.to_ascii_lowercase().contains(CBOR_MIME) => Encoding::Cbor,
            _ => Encoding::Json,
        }
    }
}

impl FromStr for Encoding {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cbor" => Ok(Encoding::Cbor),
            "json" => Ok(Encoding::Json),
            other => Err(CodecError::UnknownEncoding(other.to_string())),
        }
    }
}

pub fn encode<T: Serialize + ?Sized>(value: &T, encoding: Encoding) -> Result<Vec<u8>, CodecError> {
    match encoding {
        Encoding::Json => Ok(serde_json::to_vec(value)?),
        Encoding::Cbor => {
            let mut out = Vec::new();
            ciborium::into_writer(value, &mut out).map_err(|e| CodecError::CborEncode(e.to_string()))?;
            Ok(out)
        }
    }
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8], encoding: Encoding) -> Result<T, CodecError> {
    match encoding {
        Encoding::Json => Ok(serde_json::from_slice(bytes)?),
        Encoding::Cbor => ciborium::from_reader(bytes).map_err(|e| CodecError::CborDecode(e.to_string())),
    }
}

/// Decodes a response body using its content type; anything not CBOR is read as JSON.
pub fn decode_response<T: DeserializeOwned>(bytes: &[u8], content_type: Option<&str>) -> Result<T, CodecError> {
    let encoding = content_type
        .and_then(Encoding::from_content_type)
        .unwrap_or(Encoding::Json);
    decode(bytes, encoding)
}
