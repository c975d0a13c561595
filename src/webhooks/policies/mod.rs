//! Admission webhook policies
//!
//! Each policy module reports field errors or a single verdict. The server
//! combines them; every policy must pass for a request to be admitted.

pub mod defaults;
pub mod path_guard;
pub mod required;
pub mod version;

pub use defaults::default_pull_policy_patch;
pub use path_guard::{ALLOWED_UPDATES, PathPattern, changed_paths, pattern_matches, violations};
pub use required::{validate_binding, validate_fleet};
pub use version::{INVALID_VERSION_MESSAGE, validate_fleet_version};

use std::fmt;

/// Kind of a field-level admission error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldErrorKind {
    Required,
    Forbidden,
}

impl fmt::Display for FieldErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldErrorKind::Required => write!(f, "Required value"),
            FieldErrorKind::Forbidden => write!(f, "Forbidden"),
        }
    }
}

/// A rejected field, rendered as `<path>: <kind>: <detail>`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub kind: FieldErrorKind,
    pub detail: String,
}

impl FieldError {
    pub fn required(path: &str, detail: &str) -> Self {
        Self {
            path: path.to_string(),
            kind: FieldErrorKind::Required,
            detail: detail.to_string(),
        }
    }

    pub fn forbidden(path: &str, detail: &str) -> Self {
        Self {
            path: path.to_string(),
            kind: FieldErrorKind::Forbidden,
            detail: detail.to_string(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.path, self.kind, self.detail)
    }
}

/// Result of a policy validation
#[derive(Debug, PartialEq, Eq)]
pub struct ValidationResult {
    pub allowed: bool,
    pub reason: Option<String>,
    pub message: Option<String>,
}

impl ValidationResult {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            message: None,
        }
    }

    pub fn denied(reason: &str, message: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }
    }

    /// Deny with every field error of `object`, or allow when there are none
    pub fn from_field_errors(kind: &str, name: &str, errors: &[FieldError]) -> Self {
        if errors.is_empty() {
            return Self::allowed();
        }
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        Self::denied(
            "Invalid",
            &format!(
                "{kind}.{} {name:?} is invalid: [{}]",
                crate::crd::GROUP,
                details.join(", ")
            ),
        )
    }
}
