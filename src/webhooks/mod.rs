//! Admission webhooks for VerrazzanoFleet and VerrazzanoFleetBinding
//!
//! Validation runs two independent checks on every create and update:
//! required fields, and on update the field ownership allow-list. Fleet
//! updates are also held to the admin cluster's Verrazzano version. The
//! mutating endpoints default the image pull policy.

pub mod policies;
mod server;

pub use policies::{FieldError, ValidationResult};
pub use server::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError, WebhookState,
    create_webhook_router, mutate, review_binding, review_fleet, run_webhook_server,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
