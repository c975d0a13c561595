//! Defaulting for fleets and bindings

use json_patch::Patch;
use serde_json::{Value, json};

use crate::crd::DEFAULT_PULL_POLICY;

/// JSON patch setting `spec.image.pullPolicy` when an image is given without one
pub fn default_pull_policy_patch(object: &Value) -> Result<Option<Patch>, serde_json::Error> {
    let Some(image) = object.pointer("/spec/image").and_then(Value::as_object) else {
        return Ok(None);
    };
    let unset = image
        .get("pullPolicy")
        .is_none_or(|p| p.as_str().is_none_or(str::is_empty));
    if !unset {
        return Ok(None);
    }
    let patch = serde_json::from_value(json!([{
        "op": "add",
        "path": "/spec/image/pullPolicy",
        "value": DEFAULT_PULL_POLICY,
    }]))?;
    Ok(Some(patch))
}
