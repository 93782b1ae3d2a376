//! Dotted-path lookup into a JSON record.

use serde_json::Value;

/// Resolve a dotted path (`"a.b.0"`) against a JSON value.
///
/// Walks object keys and numeric array indices segment by segment and
/// short-circuits to `None` on the first missing step.  Never panics.
pub fn resolve_path<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = record;

    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }

    Some(current)
}
