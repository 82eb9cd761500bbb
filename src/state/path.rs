//! Dot-separated path access into a state document.

use serde_json::{Map, Value};

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '.';

/// Resolve `path` inside `doc`.
///
/// Returns `None` if any segment is missing or an intermediate value is
/// not a mapping. Never panics.
pub fn get_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split(PATH_SEPARATOR)
        .try_fold(doc, |current, segment| current.as_object()?.get(segment))
}

/// Assign `value` at `path` inside `doc`, creating intermediate mappings.
///
/// An intermediate that exists but is not a mapping is replaced by an
/// empty mapping. A single-segment path is a plain key assignment.
pub fn set_path(doc: &mut Value, path: &str, value: Value) {
    let mut segments = path.split(PATH_SEPARATOR).peekable();
    let mut current = doc;

    while let Some(segment) = segments.next() {
        let map = ensure_object(current);
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Whether `path` names a nested location rather than a top-level key.
pub fn is_nested(path: &str) -> bool {
    path.contains(PATH_SEPARATOR)
}

/// Whether a write at `written` can change the value at `watched`.
///
/// True when one path is the other or a prefix of it on segment
/// boundaries.
pub fn paths_overlap(written: &str, watched: &str) -> bool {
    fn is_prefix(prefix: &str, path: &str) -> bool {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(PATH_SEPARATOR))
    }
    is_prefix(written, watched) || is_prefix(watched, written)
}

/// The mapping at `value`, replacing a non-mapping with an empty one.
fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            *other = Value::Object(Map::new());
            ensure_object(other)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_top_level() {
        let doc = json!({"count": 3});
        assert_eq!(get_path(&doc, "count"), Some(&json!(3)));
    }

    #[test]
    fn test_get_nested() {
        let doc = json!({"user": {"profile": {"name": "ada"}}});
        assert_eq!(get_path(&doc, "user.profile.name"), Some(&json!("ada")));
        assert_eq!(
            get_path(&doc, "user.profile"),
            Some(&json!({"name": "ada"}))
        );
    }

    #[test]
    fn test_get_missing_is_none() {
        let doc = json!({"user": {"name": "ada"}});
        assert_eq!(get_path(&doc, "user.age"), None);
        assert_eq!(get_path(&doc, "account.id"), None);
    }

    #[test]
    fn test_get_through_scalar_is_none() {
        let doc = json!({"user": "ada", "items": [1, 2]});
        assert_eq!(get_path(&doc, "user.name"), None);
        assert_eq!(get_path(&doc, "items.0"), None);
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut doc = json!({});
        set_path(&mut doc, "a.b.c", json!(1));
        assert_eq!(doc, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn test_set_keeps_siblings() {
        let mut doc = json!({"a": {"x": 1, "y": 2}, "z": 3});
        set_path(&mut doc, "a.x", json!(10));
        assert_eq!(doc, json!({"a": {"x": 10, "y": 2}, "z": 3}));
    }

    #[test]
    fn test_set_single_segment() {
        let mut doc = json!({"a": 1});
        set_path(&mut doc, "b", json!(2));
        assert_eq!(doc, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_set_replaces_scalar_intermediate() {
        let mut doc = json!({"a": 5});
        set_path(&mut doc, "a.b", json!(true));
        assert_eq!(doc, json!({"a": {"b": true}}));
    }

    #[test]
    fn test_set_replaces_array_and_null() {
        let mut doc = json!({"list": [1, 2], "empty": null});
        set_path(&mut doc, "list.first", json!(1));
        set_path(&mut doc, "empty.x.y", json!("z"));
        assert_eq!(
            doc,
            json!({"list": {"first": 1}, "empty": {"x": {"y": "z"}}})
        );

        let mut root = json!([1]);
        set_path(&mut root, "k", json!(0));
        assert_eq!(root, json!({"k": 0}));
    }

    #[test]
    fn test_paths_overlap() {
        assert!(paths_overlap("a", "a"));
        assert!(paths_overlap("a", "a.b"));
        assert!(paths_overlap("a.b.c", "a.b"));
        assert!(!paths_overlap("a.b", "a.c"));
        assert!(!paths_overlap("ab", "a"));
    }
}
