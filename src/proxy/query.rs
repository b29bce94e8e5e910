//! Query string and header value rendering for loosely typed JSON scalars.

use serde_json::{Map, Value};
use url::form_urlencoded;

/// Render a JSON value the way it appears in a query string or header.
///
/// Returns `None` for `null`, which callers skip entirely.
pub fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .map(|item| render_scalar(item).unwrap_or_default())
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}

/// Encode `params` as `application/x-www-form-urlencoded` pairs in map order.
///
/// Null entries are dropped. Returns `None` when no pair remains, so the
/// caller knows not to append a `?`.
pub fn encode_query(params: &Map<String, Value>) -> Option<String> {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut pairs = 0;

    for (key, value) in params {
        if let Some(rendered) = render_scalar(value) {
            serializer.append_pair(key, &rendered);
            pairs += 1;
        }
    }

    (pairs > 0).then(|| serializer.finish())
}
