//! Version policy for fleet updates
//!
//! A fleet may only pin the Verrazzano version active on the admin cluster.

use super::ValidationResult;
use crate::crd::VerrazzanoFleetSpec;
use crate::release::version::{parse_version, versions_match};

pub const INVALID_VERSION_MESSAGE: &str = "Invalid version: Verrazzano version on the workload cluster can only be upgraded to match the Verrazzano version in the admin cluster.";

/// Check the version a fleet requests against the admin cluster's.
///
/// A fleet without a requested version always passes. With one, an unknown
/// admin version or an unparseable version on either side is rejected.
pub fn validate_fleet_version(spec: &VerrazzanoFleetSpec, admin: Option<&str>) -> ValidationResult {
    let Some(requested) = spec
        .verrazzano
        .as_ref()
        .and_then(|v| v.spec.as_ref())
        .and_then(|s| s.requested_version())
    else {
        return ValidationResult::allowed();
    };

    let Some(admin) = admin.filter(|v| !v.trim().is_empty()) else {
        return ValidationResult::denied("BadRequest", INVALID_VERSION_MESSAGE);
    };

    let requested = match parse_version(requested) {
        Ok(v) => v,
        Err(e) => return ValidationResult::denied("InternalError", &e.to_string()),
    };
    let admin = match parse_version(admin) {
        Ok(v) => v,
        Err(e) => return ValidationResult::denied("InternalError", &e.to_string()),
    };

    if versions_match(&requested, &admin) {
        ValidationResult::allowed()
    } else {
        ValidationResult::denied("BadRequest", INVALID_VERSION_MESSAGE)
    }
}
