// ── Interceptors ──
//
// Hooks registered on the client. Request hooks edit the wire-level
// request right before each HTTP attempt; they cannot touch dispatch keys.
// Response hooks rewrite the envelope after every attempt, for any adapter.

use std::fmt;
use std::sync::Arc;

use reqflow_api::{Envelope, ResolvedRequest};

use crate::command::CommandConfig;

pub type RequestHook = Arc<dyn Fn(&mut ResolvedRequest) + Send + Sync>;
pub type ResponseHook = Arc<dyn Fn(Envelope) -> Envelope + Send + Sync>;

#[derive(Clone, Default)]
pub struct Interceptors {
    auth: Option<RequestHook>,
    request: Vec<RequestHook>,
    response: Vec<ResponseHook>,
}

impl Interceptors {
    /// Credential injection, applied only to commands with `auth` set.
    pub fn on_auth(&mut self, hook: impl Fn(&mut ResolvedRequest) + Send + Sync + 'static) {
        self.auth = Some(Arc::new(hook));
    }

    pub fn on_request(&mut self, hook: impl Fn(&mut ResolvedRequest) + Send + Sync + 'static) {
        self.request.push(Arc::new(hook));
    }

    pub fn on_response(&mut self, hook: impl Fn(Envelope) -> Envelope + Send + Sync + 'static) {
        self.response.push(Arc::new(hook));
    }

    pub(crate) fn prepare(&self, request: &mut ResolvedRequest, config: &CommandConfig) {
        if config.auth {
            if let Some(ref auth) = self.auth {
                auth(request);
            }
        }
        if !config.disable_request_interceptors {
            for hook in &self.request {
                hook(request);
            }
        }
    }

    pub(crate) fn finish(&self, envelope: Envelope, config: &CommandConfig) -> Envelope {
        if config.disable_response_interceptors {
            return envelope;
        }
        self.response
            .iter()
            .fold(envelope, |envelope, hook| hook(envelope))
    }
}

impl fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptors")
            .field("auth", &self.auth.is_some())
            .field("request", &self.request.len())
            .field("response", &self.response.len())
            .finish()
    }
}
