// ── Adapter ──
//
// The transport a client talks through, fixed at build time. Validation
// (`target`) runs during materialization so configuration errors surface
// before anything is dispatched; `execute` then only has to run the
// prepared target.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqflow_api::transport::header_map;
use reqflow_api::{Envelope, EventSink, HttpExecutor, Payload, RequestError, ResolvedRequest};
use reqwest::header::HeaderMap;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::command::Method;
use crate::endpoint::{QueryParams, encode_query};
use crate::error::CoreError;
use crate::interceptor::Interceptors;
use crate::realtime::{Constraint, Emissions, Operation, RealtimeAdapter, RealtimeRequest};
use crate::request::MaterializedRequest;

/// Validated, adapter-specific form of a request.
#[derive(Debug, Clone)]
pub(crate) enum Target {
    Http {
        method: reqwest::Method,
        url: Url,
        headers: HeaderMap,
    },
    Realtime {
        operation: Operation,
        constraints: Vec<Constraint>,
        data: Option<Value>,
    },
}

impl Target {
    pub(crate) fn is_subscription(&self) -> bool {
        match self {
            Self::Http { .. } => false,
            Self::Realtime { operation, .. } => operation.is_subscription(),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Adapter {
    Http {
        executor: HttpExecutor,
        base_url: Option<Url>,
        timeout: Duration,
    },
    Realtime(RealtimeAdapter),
}

impl Adapter {
    pub(crate) fn default_method(&self) -> Method {
        match self {
            Self::Http { .. } => Method::GET,
            Self::Realtime(adapter) => adapter.default_method(),
        }
    }

    pub(crate) fn target(
        &self,
        method: &Method,
        endpoint: &str,
        query: &QueryParams,
        headers: &BTreeMap<String, String>,
        data: Option<&Payload>,
    ) -> Result<Target, CoreError> {
        match self {
            Self::Http { base_url, .. } => Ok(Target::Http {
                method: method.to_http()?,
                url: request_url(base_url.as_ref(), endpoint, query)?,
                headers: header_map(headers)?,
            }),
            Self::Realtime(adapter) => {
                let operation = adapter.operation(method)?;
                let constraints = match query.get("constraints") {
                    None | Some(Value::Null) => Vec::new(),
                    Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| {
                        CoreError::InvalidQuery {
                            message: format!("constraints: {e}"),
                        }
                    })?,
                };
                let data = match data {
                    None => None,
                    Some(payload) => Some(payload.as_json().ok_or_else(|| CoreError::Config {
                        message: "realtime backends accept JSON or text payloads only".into(),
                    })?),
                };
                if operation.requires_data() && data.is_none() {
                    return Err(CoreError::Config {
                        message: format!("'{method}' requires a data payload"),
                    });
                }
                Ok(Target::Realtime {
                    operation,
                    constraints,
                    data,
                })
            }
        }
    }

    /// Run the prepared target. Realtime subscriptions also return the
    /// tail of their stream.
    pub(crate) async fn execute(
        &self,
        request: &MaterializedRequest,
        sink: Arc<dyn EventSink>,
        cancel: &CancellationToken,
        interceptors: &Interceptors,
    ) -> (Envelope, Option<Emissions>) {
        match (self, &request.target) {
            (
                Self::Http {
                    executor, timeout, ..
                },
                Target::Http {
                    method,
                    url,
                    headers,
                },
            ) => {
                let mut resolved = ResolvedRequest::new(
                    method.clone(),
                    url.clone(),
                    request.config.options.timeout.unwrap_or(*timeout),
                );
                resolved.headers = headers.clone();
                resolved.payload = request.data.clone();
                resolved.chunk_size = request.config.options.chunk_size;
                interceptors.prepare(&mut resolved, &request.config);
                let envelope = executor.execute(&resolved, sink.as_ref(), cancel).await;
                (envelope, None)
            }
            (
                Self::Realtime(adapter),
                Target::Realtime {
                    operation,
                    constraints,
                    data,
                },
            ) => {
                let realtime = RealtimeRequest {
                    method: request.method.clone(),
                    path: request.endpoint.clone(),
                    constraints: constraints.clone(),
                    data: data.clone(),
                    options: request.config.options.clone(),
                };
                adapter.execute(*operation, realtime, sink, cancel).await
            }
            _ => (
                Envelope::failure(
                    RequestError::Connection {
                        message: "request was prepared for a different adapter".into(),
                    },
                    reqflow_api::STATUS_NO_RESPONSE,
                ),
                None,
            ),
        }
    }
}

/// Join the base URL and a resolved endpoint, then attach the query.
/// Absolute endpoints bypass the base URL.
fn request_url(
    base_url: Option<&Url>,
    endpoint: &str,
    query: &QueryParams,
) -> Result<Url, CoreError> {
    let raw = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_owned()
    } else {
        let Some(base_url) = base_url else {
            return Err(CoreError::Config {
                message: format!("relative endpoint '{endpoint}' needs a base URL"),
            });
        };
        let base = base_url.as_str().trim_end_matches('/');
        let path = endpoint.trim_start_matches('/');
        format!("{base}/{path}")
    };

    let mut url = Url::parse(&raw).map_err(|e| CoreError::InvalidUrl {
        url: raw.clone(),
        reason: e.to_string(),
    })?;
    let encoded = encode_query(query);
    if !encoded.is_empty() {
        url.set_query(Some(&encoded));
    }
    Ok(url)
}
