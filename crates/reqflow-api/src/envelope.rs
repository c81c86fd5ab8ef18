// ── Response envelope ──
//
// Normalized outcome of one request attempt. Exactly one of `data` and
// `error` is populated; the constructors are the only way in.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RequestError;

/// Synthetic status for outcomes that never reached a server response:
/// connection failures, timeouts, and aborts.
pub const STATUS_NO_RESPONSE: u16 = 0;

/// `true` for statuses treated as success. Redirect statuses that reach
/// the caller count as success.
pub fn is_success_status(status: u16) -> bool {
    (200..400).contains(&status)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub struct Envelope {
    data: Option<Value>,
    error: Option<RequestError>,
    status: u16,
}

impl Envelope {
    pub fn success(data: Value, status: u16) -> Self {
        Self {
            data: Some(data),
            error: None,
            status,
        }
    }

    pub fn failure(error: RequestError, status: u16) -> Self {
        Self {
            data: None,
            error: Some(error),
            status,
        }
    }

    pub fn aborted() -> Self {
        Self::failure(RequestError::Aborted, STATUS_NO_RESPONSE)
    }

    pub fn timed_out(timeout_ms: u64) -> Self {
        Self::failure(RequestError::Timeout { timeout_ms }, STATUS_NO_RESPONSE)
    }

    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::failure(
            RequestError::Connection {
                message: message.into(),
            },
            STATUS_NO_RESPONSE,
        )
    }

    /// Classify a completed HTTP exchange by status.
    pub fn from_http(status: u16, body: Value) -> Self {
        if is_success_status(status) {
            Self::success(body, status)
        } else {
            Self::failure(RequestError::Http { status, body }, status)
        }
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&RequestError> {
        self.error.as_ref()
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_aborted(&self) -> bool {
        self.error.as_ref().is_some_and(RequestError::is_aborted)
    }

    pub fn into_result(self) -> Result<Value, RequestError> {
        match (self.data, self.error) {
            (_, Some(error)) => Err(error),
            (Some(data), None) => Ok(data),
            (None, None) => Ok(Value::Null),
        }
    }
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<RequestError>,
    status: u16,
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = String;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        match (raw.data, raw.error) {
            (Some(_), Some(_)) => Err("envelope carries both data and error".into()),
            (data, None) => Ok(Self::success(data.unwrap_or(Value::Null), raw.status)),
            (None, Some(error)) => Ok(Self::failure(error, raw.status)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redirects_and_2xx_are_success() {
        assert!(is_success_status(200));
        assert!(is_success_status(204));
        assert!(is_success_status(304));
        assert!(is_success_status(399));
        assert!(!is_success_status(199));
        assert!(!is_success_status(400));
        assert!(!is_success_status(503));
        assert!(!is_success_status(STATUS_NO_RESPONSE));
    }

    #[test]
    fn http_failure_keeps_body_as_error() {
        let env = Envelope::from_http(422, json!({"field": "name"}));
        assert!(!env.is_success());
        assert!(env.data().is_none());
        assert_eq!(env.status(), 422);
        assert_eq!(
            env.error(),
            Some(&RequestError::Http {
                status: 422,
                body: json!({"field": "name"}),
            })
        );
    }

    #[test]
    fn deserialize_rejects_both_sides() {
        let raw = json!({"data": 1, "error": {"kind": "aborted"}, "status": 0});
        assert!(serde_json::from_value::<Envelope>(raw).is_err());

        let ok = json!({"data": {"id": 1}, "error": null, "status": 200});
        let env: Envelope = serde_json::from_value(ok).unwrap();
        assert_eq!(env.data(), Some(&json!({"id": 1})));
    }
}
