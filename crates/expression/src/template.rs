//! `{{ path }}` template interpolation.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::path::resolve_path;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("token regex is valid"));

/// Replace every `{{ path }}` token with the stringified resolution of the
/// path against `record`.
///
/// A token whose path does not resolve is left in the output verbatim, so a
/// partially-resolvable template is visibly incomplete rather than silently
/// corrupted.
pub fn interpolate(template: &str, record: &Value) -> String {
    TOKEN
        .replace_all(template, |caps: &Captures<'_>| {
            let path = caps[1].trim();
            match resolve_path(record, path) {
                Some(value) => stringify(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Apply [`interpolate`] recursively through arrays and objects.
///
/// Strings are interpolated; every other scalar passes through untouched.
pub fn interpolate_deep(value: &Value, record: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate(s, record)),
        Value::Array(items) => Value::Array(
            items.iter().map(|item| interpolate_deep(item, record)).collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate_deep(v, record)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Strings render without surrounding quotes; everything else renders as
/// compact JSON.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replaces_resolvable_tokens() {
        let record = json!({ "name": "Ada" });
        assert_eq!(interpolate("Hello {{name}}", &record), "Hello Ada");
        assert_eq!(interpolate("Hello {{ name }}", &record), "Hello Ada");
    }

    #[test]
    fn unresolvable_token_is_left_verbatim() {
        assert_eq!(interpolate("{{missing}}", &json!({})), "{{missing}}");
        assert_eq!(
            interpolate("hi {{name}}, {{missing}}", &json!({ "name": "Ada" })),
            "hi Ada, {{missing}}"
        );
    }

    #[test]
    fn non_string_values_render_as_json() {
        let record = json!({ "n": 3, "flag": true, "obj": { "k": 1 } });
        assert_eq!(interpolate("n={{n}}", &record), "n=3");
        assert_eq!(interpolate("{{flag}}", &record), "true");
        assert_eq!(interpolate("{{obj}}", &record), r#"{"k":1}"#);
    }

    #[test]
    fn deep_interpolation_walks_arrays_and_objects() {
        let record = json!({ "user": "ada" });
        let template = json!({
            "greeting": "hi {{user}}",
            "nested": { "list": ["{{user}}", 7, false] }
        });
        assert_eq!(
            interpolate_deep(&template, &record),
            json!({
                "greeting": "hi ada",
                "nested": { "list": ["ada", 7, false] }
            })
        );
    }
}
