//! Field ownership on update
//!
//! An update may only touch paths covered by an allow-list. Patterns are
//! sequences of field names; a trailing `*` opens everything beneath it, and a
//! changed path that ends before its pattern does is treated as replacing the
//! whole subtree the pattern names.

use serde_json::Value;

use super::FieldError;

/// Segment that opens the rest of a pattern
pub const WILDCARD: &str = "*";

/// One allow-list entry, e.g. `["spec", "image", "tag"]`
pub type PathPattern = &'static [&'static str];

/// Paths of a fleet or binding that may change after creation.
///
/// A path shorter than a pattern matches it, so removing `spec.image` or all
/// of `spec` passes here even though `spec.image.repository` is the narrowest
/// entry. Required-field validation rejects what such a removal leaves behind.
pub const ALLOWED_UPDATES: &[PathPattern] = &[
    &["metadata", WILDCARD],
    &["spec", "image", "repository"],
    &["spec", "image", "pullPolicy"],
    &["spec", "image", "tag"],
    &["spec", "privateRegistry", "enabled"],
    &["spec", "imagePullSecrets", WILDCARD],
    &["spec", "verrazzano"],
    &["spec", "verrazzano", "spec"],
    &["spec", "verrazzano", "spec", WILDCARD],
    &["spec", "clusterSelector"],
    &["spec", "clusterSelector", "name"],
];

/// Every path a merge patch from `old` to `new` would touch.
///
/// Objects are compared key by key; any other value that differs counts as a
/// leaf, so a changed array is reported once at its own path.
pub fn changed_paths(old: &Value, new: &Value) -> Vec<Vec<String>> {
    let mut paths = Vec::new();
    collect(&mut Vec::new(), old, new, &mut paths);
    paths.retain(|p| !p.is_empty());
    paths.sort();
    paths
}

fn collect(prefix: &mut Vec<String>, old: &Value, new: &Value, out: &mut Vec<Vec<String>>) {
    match (old, new) {
        (Value::Object(old), Value::Object(new)) => {
            for (key, old_value) in old {
                prefix.push(key.clone());
                match new.get(key) {
                    Some(new_value) => collect(prefix, old_value, new_value, out),
                    None => out.push(prefix.clone()),
                }
                prefix.pop();
            }
            for key in new.keys().filter(|k| !old.contains_key(*k)) {
                prefix.push(key.clone());
                // An added object contributes its own leaves
                collect(prefix, &Value::Object(Default::default()), &new[key.as_str()], out);
                prefix.pop();
            }
        }
        (old, new) if old != new => out.push(prefix.clone()),
        _ => {}
    }
}

/// Whether `pattern` covers `path`
pub fn pattern_matches(pattern: &[&str], path: &[String]) -> bool {
    if pattern.is_empty() || path.is_empty() {
        return false;
    }
    for (i, segment) in path.iter().enumerate() {
        match pattern.get(i) {
            None => return false,
            Some(&WILDCARD) => return true,
            Some(expected) if *expected != segment.as_str() => return false,
            Some(_) => {}
        }
    }
    true
}

/// Changed paths not covered by any pattern in `allow`, one error each
pub fn violations(old: &Value, new: &Value, allow: &[PathPattern]) -> Vec<FieldError> {
    changed_paths(old, new)
        .into_iter()
        .filter(|path| !allow.iter().any(|pattern| pattern_matches(pattern, path)))
        .map(|path| FieldError::forbidden(&path.join("."), "cannot be modified"))
        .collect()
}
