// ── Endpoint templates ──
//
// Route templates use `:name` placeholders (`/users/:id/posts/:postId`).
// Names are ASCII alphanumerics and underscores and never start with a
// digit; a colon not followed by a name is literal text, so `http://` and
// `host:8080` survive untouched. Values are percent-encoded as single path
// segments, so `/`, `?` and `#` inside a value never reshape the URL.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::CoreError;

/// Route parameter values by placeholder name.
pub type Params = BTreeMap<String, String>;

/// Query parameters. Scalars encode as `k=v`, arrays repeat the key,
/// `null` is skipped, nested objects encode as JSON text.
pub type QueryParams = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Param(&'a str),
}

fn parse(template: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = template;
    let mut cursor = 0;

    while let Some(found) = rest[cursor..].find(':') {
        let colon = cursor + found;
        let after = &rest[colon + 1..];
        let name_len = if after.starts_with(|c: char| c.is_ascii_digit()) {
            0
        } else {
            after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len())
        };

        if name_len == 0 {
            cursor = colon + 1;
            continue;
        }
        if colon > 0 {
            segments.push(Segment::Literal(&rest[..colon]));
        }
        segments.push(Segment::Param(&after[..name_len]));
        rest = &after[name_len..];
        cursor = 0;
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    segments
}

/// Placeholder names in order of appearance.
pub fn route_params(template: &str) -> Vec<&str> {
    parse(template)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Param(name) => Some(name),
            Segment::Literal(_) => None,
        })
        .collect()
}

/// Substitute known params, leaving unknown placeholders as written.
pub fn fill_endpoint(template: &str, params: &Params) -> String {
    let mut out = String::with_capacity(template.len());
    for segment in parse(template) {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Param(name) => match params.get(name) {
                Some(value) => out.push_str(&encode_segment(value)),
                None => {
                    out.push(':');
                    out.push_str(name);
                }
            },
        }
    }
    out
}

/// Percent-encode everything but unreserved characters. Spaces become
/// `%20`: `+` is only a space in form bodies and query strings.
fn encode_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Substitute every placeholder, failing on the first one without a value.
pub fn resolve_endpoint(template: &str, params: &Params) -> Result<String, CoreError> {
    if let Some(missing) = route_params(template)
        .into_iter()
        .find(|name| !params.contains_key(*name))
    {
        return Err(CoreError::MissingParam {
            param: missing.to_owned(),
            endpoint: template.to_owned(),
        });
    }
    Ok(fill_endpoint(template, params))
}

/// Canonical `application/x-www-form-urlencoded` rendering, keys sorted.
pub fn encode_query(query: &QueryParams) -> String {
    let mut keys: Vec<&String> = query.keys().collect();
    keys.sort();

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for key in keys {
        match &query[key.as_str()] {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter(|item| !item.is_null()) {
                    serializer.append_pair(key, &scalar(item));
                }
            }
            other => {
                serializer.append_pair(key, &scalar(other));
            }
        }
    }
    serializer.finish()
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn finds_placeholders_in_order() {
        assert_eq!(
            route_params("/users/:userId/posts/:post_id"),
            vec!["userId", "post_id"]
        );
        assert!(route_params("/health").is_empty());
        assert!(route_params("http://host/x").is_empty());
        assert_eq!(route_params("http://127.0.0.1:8080/u/:id"), vec!["id"]);
    }

    #[test]
    fn fill_leaves_unknown_placeholders() {
        let filled = fill_endpoint("/users/:id/posts/:postId", &params(&[("id", "7")]));
        assert_eq!(filled, "/users/7/posts/:postId");
    }

    #[test]
    fn param_values_are_encoded_as_one_segment() {
        let filled = fill_endpoint("/files/:name", &params(&[("name", "a/b?x=2#frag")]));
        assert_eq!(filled, "/files/a%2Fb%3Fx%3D2%23frag");
        assert_eq!(
            fill_endpoint("/users/:id", &params(&[("id", "jo doe+1")])),
            "/users/jo%20doe%2B1"
        );
        assert_ne!(
            fill_endpoint("/:a/:b", &params(&[("a", "x/y"), ("b", "z")])),
            fill_endpoint("/:a/:b", &params(&[("a", "x"), ("b", "y/z")])),
        );
    }

    #[test]
    fn resolve_reports_missing_param() {
        let err = resolve_endpoint("/users/:id", &Params::new()).unwrap_err();
        assert!(matches!(err, CoreError::MissingParam { ref param, .. } if param == "id"));
        assert_eq!(
            resolve_endpoint("/users/:id.json", &params(&[("id", "3")])).unwrap(),
            "/users/3.json"
        );
    }

    #[test]
    fn query_encoding_is_sorted_and_flattened() {
        let query = json!({"z": 1, "a": "x y", "tags": ["p", "q"], "skip": null})
            .as_object()
            .unwrap()
            .clone();
        assert_eq!(encode_query(&query), "a=x+y&tags=p&tags=q&z=1");
    }
}
