//! # Payloads and Field Resolution
//!
//! A payload is any JSON-shaped tree. Rules address into it with dot-paths:
//! `user.email` descends map keys, `items.0.sku` uses a decimal index into a
//! sequence.
//!
//! Resolution is total. A segment that is absent, or a container that cannot
//! be indexed by that segment, yields [`Resolved::Missing`]; a present JSON
//! `null` is [`Resolved::Found`].

use serde_json::Value;

/// Tree of scalars, maps and sequences evaluated by the engine.
pub type Payload = Value;

/// Result of resolving a dot-path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    /// The path addresses this value.
    Found(&'a Value),
    /// Some segment of the path does not exist.
    Missing,
}

impl<'a> Resolved<'a> {
    /// The value, if found.
    pub fn value(self) -> Option<&'a Value> {
        match self {
            Self::Found(v) => Some(v),
            Self::Missing => None,
        }
    }

    /// True unless [`Resolved::Missing`].
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Resolve `path` against `payload`. The empty path addresses the root.
pub fn resolve<'a>(payload: &'a Value, path: &str) -> Resolved<'a> {
    if path.is_empty() {
        return Resolved::Found(payload);
    }
    let mut current = payload;
    for segment in path.split('.') {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => parse_index(segment).and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return Resolved::Missing,
        }
    }
    Resolved::Found(current)
}

/// Mutable counterpart of [`resolve`], used to mask a field in place on a
/// caller-owned copy.
pub fn resolve_mut<'a>(payload: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    if path.is_empty() {
        return Some(payload);
    }
    let mut current = payload;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(parse_index(segment)?)?,
            _ => return None,
        };
    }
    Some(current)
}

// Plain decimal only: "+1" and "01" are map-key style segments, not indices.
fn parse_index(segment: &str) -> Option<usize> {
    let canonical = !segment.is_empty()
        && segment.bytes().all(|b| b.is_ascii_digit())
        && (segment == "0" || !segment.starts_with('0'));
    if canonical {
        segment.parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_keys() {
        let p = json!({"user": {"profile": {"email": "a@b.co"}}});
        assert_eq!(
            resolve(&p, "user.profile.email"),
            Resolved::Found(&json!("a@b.co"))
        );
    }

    #[test]
    fn resolves_list_indices() {
        let p = json!({"items": [{"sku": "x"}, {"sku": "y"}]});
        assert_eq!(resolve(&p, "items.1.sku").value(), Some(&json!("y")));
        assert_eq!(resolve(&p, "items.2.sku"), Resolved::Missing);
        assert_eq!(resolve(&p, "items.01.sku"), Resolved::Missing);
    }

    #[test]
    fn missing_segments() {
        let p = json!({"a": {"b": 1}});
        assert_eq!(resolve(&p, "a.c"), Resolved::Missing);
        assert_eq!(resolve(&p, "a.b.c"), Resolved::Missing);
        assert_eq!(resolve(&p, "z"), Resolved::Missing);
    }

    #[test]
    fn null_is_found() {
        let p = json!({"a": null});
        assert!(resolve(&p, "a").is_found());
    }

    #[test]
    fn empty_path_is_root() {
        let p = json!([1, 2]);
        assert_eq!(resolve(&p, ""), Resolved::Found(&p));
    }

    #[test]
    fn digit_keys_in_maps() {
        let p = json!({"2024": {"total": 3}});
        assert_eq!(resolve(&p, "2024.total").value(), Some(&json!(3)));
    }

    #[test]
    fn resolve_mut_replaces_in_place() {
        let mut p = json!({"a": [{"b": "secret"}]});
        if let Some(slot) = resolve_mut(&mut p, "a.0.b") {
            *slot = json!("[REDACTED]");
        }
        assert_eq!(p, json!({"a": [{"b": "[REDACTED]"}]}));
        assert!(resolve_mut(&mut p, "a.1.b").is_none());
    }
}
