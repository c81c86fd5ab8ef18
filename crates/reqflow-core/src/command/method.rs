use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Request method name.
///
/// HTTP verbs for the HTTP adapter, operation names (`getDoc`, `onValue`,
/// ...) for realtime adapters. Stored verbatim; keys embed it as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Method(Cow<'static, str>);

impl Method {
    pub const GET: Self = Self(Cow::Borrowed("GET"));
    pub const POST: Self = Self(Cow::Borrowed("POST"));
    pub const PUT: Self = Self(Cow::Borrowed("PUT"));
    pub const PATCH: Self = Self(Cow::Borrowed("PATCH"));
    pub const DELETE: Self = Self(Cow::Borrowed("DELETE"));
    pub const HEAD: Self = Self(Cow::Borrowed("HEAD"));
    pub const OPTIONS: Self = Self(Cow::Borrowed("OPTIONS"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn to_http(&self) -> Result<reqwest::Method, CoreError> {
        reqwest::Method::from_bytes(self.0.as_bytes()).map_err(|_| CoreError::InvalidMethod {
            method: self.0.to_string(),
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Method {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for Method {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}
