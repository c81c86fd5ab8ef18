// ── Resolved request ──
//
// Everything an executor needs to put one request on the wire. Built by
// the core crate from a materialized command; executors never look back
// at the command itself.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Payload {
    Json(Value),
    Text(String),
    Bytes(Bytes),
}

impl Payload {
    /// Encode the body and report the content type it implies.
    pub fn encode(&self) -> (Bytes, &'static str) {
        match self {
            Self::Json(value) => (
                Bytes::from(serde_json::to_vec(value).unwrap_or_default()),
                "application/json",
            ),
            Self::Text(text) => (Bytes::from(text.clone()), "text/plain; charset=utf-8"),
            Self::Bytes(bytes) => (bytes.clone(), "application/octet-stream"),
        }
    }

    /// Body as a JSON value, for transports that only speak JSON.
    pub fn as_json(&self) -> Option<Value> {
        match self {
            Self::Json(value) => Some(value.clone()),
            Self::Text(text) => Some(Value::String(text.clone())),
            Self::Bytes(_) => None,
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Transport-specific knobs carried on a command.
///
/// Unknown keys land in `extra` and are handed to realtime backends
/// untouched (e.g. `merge` for document writes).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportOptions {
    #[serde(with = "crate::serde_ms::option", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,

    /// Upload chunk size for the streaming executor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One fully resolved HTTP request.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    pub full_url: Url,
    pub method: reqwest::Method,
    pub headers: HeaderMap,
    pub payload: Option<Payload>,
    pub timeout: Duration,
    pub chunk_size: Option<usize>,
}

impl ResolvedRequest {
    pub fn new(method: reqwest::Method, full_url: Url, timeout: Duration) -> Self {
        Self {
            full_url,
            method,
            headers: HeaderMap::new(),
            payload: None,
            timeout,
            chunk_size: None,
        }
    }

    pub(crate) fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}
