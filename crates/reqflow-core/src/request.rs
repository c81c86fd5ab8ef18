// ── Materialized request ──
//
// A command bound to concrete params, query, and body at call time. Built
// once per `fetch`, shared as `Arc` between the dispatcher's pending table,
// its queues, and the offline buffer. Never mutated after construction.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use reqflow_api::Payload;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapter::Target;
use crate::command::{CommandConfig, Method, Mock};
use crate::endpoint::{Params, QueryParams};
use crate::keys::DispatchKeys;

/// Correlates every event of one `fetch`, retries included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub struct MaterializedRequest {
    pub id: RequestId,
    pub method: Method,
    /// Endpoint with every placeholder resolved.
    pub endpoint: String,
    pub params: Params,
    pub query_params: QueryParams,
    pub data: Option<Payload>,
    pub headers: BTreeMap<String, String>,
    pub keys: Arc<DispatchKeys>,
    pub config: CommandConfig,
    pub(crate) target: Target,
    pub(crate) mock: Option<Mock>,
}

impl MaterializedRequest {
    pub fn is_subscription(&self) -> bool {
        self.target.is_subscription()
    }
}
