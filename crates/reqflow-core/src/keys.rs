// ── Dispatch keys ──
//
// Four independent identities per request. All are pure functions of the
// endpoint template, method, params, and query; any of them can be
// overridden on a command, in which case it is never recomputed.
//
//   abort   METHOD_resolved            cancels everything sharing it
//   cache   METHOD_resolved?query      cache slot and dedupe identity
//   queue   METHOD_resolved?query      serialization lane
//   effect  METHOD_template            side-effect correlation

use serde::{Deserialize, Serialize};

use crate::command::Method;
use crate::endpoint::{Params, QueryParams, encode_query, fill_endpoint};

/// Base key: method plus the endpoint with known params substituted.
/// Missing params stay as `:name` so derivation never fails.
pub fn derive_key(template: &str, method: &Method, params: &Params) -> String {
    format!("{method}_{}", fill_endpoint(template, params))
}

/// Base key plus the canonical query string, when there is one.
pub fn derive_cache_key(
    template: &str,
    method: &Method,
    params: &Params,
    query: &QueryParams,
) -> String {
    let base = derive_key(template, method, params);
    let encoded = encode_query(query);
    if encoded.is_empty() {
        base
    } else {
        format!("{base}?{encoded}")
    }
}

pub fn derive_effect_key(template: &str, method: &Method) -> String {
    format!("{method}_{template}")
}

/// The four keys carried by every command and materialized request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchKeys {
    pub abort: String,
    pub cache: String,
    pub queue: String,
    pub effect: String,
}

impl DispatchKeys {
    pub fn derive(template: &str, method: &Method, params: &Params, query: &QueryParams) -> Self {
        let cache = derive_cache_key(template, method, params, query);
        Self {
            abort: derive_key(template, method, params),
            queue: cache.clone(),
            cache,
            effect: derive_effect_key(template, method),
        }
    }

    /// Recompute every key not marked as overridden.
    pub(crate) fn refresh(
        &mut self,
        overrides: KeyOverrides,
        template: &str,
        method: &Method,
        params: &Params,
        query: &QueryParams,
    ) {
        let derived = Self::derive(template, method, params, query);
        if !overrides.abort {
            self.abort = derived.abort;
        }
        if !overrides.cache {
            self.cache = derived.cache;
        }
        if !overrides.queue {
            self.queue = derived.queue;
        }
        if !overrides.effect {
            self.effect = derived.effect;
        }
    }
}

/// Which keys were set explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct KeyOverrides {
    pub abort: bool,
    pub cache: bool,
    pub queue: bool,
    pub effect: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(id: &str) -> Params {
        Params::from([("id".to_string(), id.to_string())])
    }

    #[test]
    fn same_inputs_same_keys() {
        let a = DispatchKeys::derive("/users/:id", &Method::GET, &params("1"), &QueryParams::new());
        let b = DispatchKeys::derive("/users/:id", &Method::GET, &params("1"), &QueryParams::new());
        assert_eq!(a, b);
        assert_eq!(a.abort, "GET_/users/1");
        assert_eq!(a.effect, "GET_/users/:id");
    }

    #[test]
    fn different_params_different_keys() {
        let a = DispatchKeys::derive("/users/:id", &Method::GET, &params("1"), &QueryParams::new());
        let b = DispatchKeys::derive("/users/:id", &Method::GET, &params("2"), &QueryParams::new());
        assert_ne!(a.abort, b.abort);
        assert_ne!(a.cache, b.cache);
        assert_ne!(a.queue, b.queue);
        assert_eq!(a.effect, b.effect);
    }

    #[test]
    fn method_is_part_of_identity() {
        let get = derive_key("/health", &Method::GET, &Params::new());
        let post = derive_key("/health", &Method::POST, &Params::new());
        assert_eq!(get, "GET_/health");
        assert_ne!(get, post);
    }

    #[test]
    fn query_lands_in_cache_key_only() {
        let query = json!({"page": 2}).as_object().unwrap().clone();
        let keys = DispatchKeys::derive("/posts", &Method::GET, &Params::new(), &query);
        assert_eq!(keys.cache, "GET_/posts?page=2");
        assert_eq!(keys.queue, keys.cache);
        assert_eq!(keys.abort, "GET_/posts");
    }

    #[test]
    fn refresh_respects_overrides() {
        let mut keys = DispatchKeys::derive("/users/:id", &Method::GET, &Params::new(), &QueryParams::new());
        keys.cache = "custom".into();
        let overrides = KeyOverrides {
            cache: true,
            ..KeyOverrides::default()
        };
        keys.refresh(overrides, "/users/:id", &Method::GET, &params("9"), &QueryParams::new());
        assert_eq!(keys.cache, "custom");
        assert_eq!(keys.abort, "GET_/users/9");
    }
}
