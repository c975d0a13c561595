//! Webhook HTTP server handlers
//!
//! Validating and mutating admission endpoints for VerrazzanoFleet and
//! VerrazzanoFleetBinding.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};
use axum_server::tls_rustls::RustlsConfig;
use kube::Client;
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::policies::{
    ALLOWED_UPDATES, FieldError, ValidationResult, default_pull_policy_patch, validate_binding,
    validate_fleet, validate_fleet_version, violations,
};
use crate::crd::{VerrazzanoFleet, VerrazzanoFleetBinding};
use crate::remote::{AdminVersionReader, KubeAdminVersionReader};

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 8443;

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("Webhook server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Shared state for webhook handlers
pub struct WebhookState {
    pub admin: Arc<dyn AdminVersionReader>,
}

impl WebhookState {
    pub fn new(admin: Arc<dyn AdminVersionReader>) -> Self {
        Self { admin }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/validate-fleet", post(validate_fleet_handler))
        .route("/validate-binding", post(validate_binding_handler))
        .route("/mutate-fleet", post(mutate_handler))
        .route("/mutate-binding", post(mutate_handler))
        .with_state(state)
}

type Review = AdmissionReview<DynamicObject>;
type Request = AdmissionRequest<DynamicObject>;

fn into_request(review: Review) -> Result<Request, Json<Review>> {
    review.try_into().map_err(|e: kube::core::admission::ConvertAdmissionReviewError| {
        error!(error = %e, "Admission review missing request");
        Json(AdmissionResponse::invalid(e.to_string()).into_review())
    })
}

async fn validate_fleet_handler(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<Review>,
) -> Json<Review> {
    let request = match into_request(review) {
        Ok(request) => request,
        Err(invalid) => return invalid,
    };
    let result = review_fleet(&state, &request).await;
    Json(respond(&request, result).into_review())
}

async fn validate_binding_handler(Json(review): Json<Review>) -> Json<Review> {
    let request = match into_request(review) {
        Ok(request) => request,
        Err(invalid) => return invalid,
    };
    let result = review_binding(&request);
    Json(respond(&request, result).into_review())
}

async fn mutate_handler(Json(review): Json<Review>) -> Json<Review> {
    let request = match into_request(review) {
        Ok(request) => request,
        Err(invalid) => return invalid,
    };
    Json(mutate(&request).into_review())
}

/// Validate a fleet create or update
pub async fn review_fleet(state: &WebhookState, request: &Request) -> ValidationResult {
    info!(
        uid = %request.uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = %request.name,
        "Processing VerrazzanoFleet admission request"
    );
    if matches!(request.operation, Operation::Delete | Operation::Connect) {
        return ValidationResult::allowed();
    }
    let Some(object) = &request.object else {
        return ValidationResult::denied("BadRequest", "Missing object in request");
    };
    let fleet: VerrazzanoFleet = match typed(object) {
        Ok(fleet) => fleet,
        Err(e) => {
            return ValidationResult::denied("BadRequest", &format!("Failed to parse object: {e}"));
        }
    };

    let mut errors = validate_fleet(&fleet.spec);
    if request.operation == Operation::Update {
        let admin = match state.admin.admin_version().await {
            Ok(admin) => admin,
            Err(e) => {
                warn!(error = %e, "Failed to read the admin cluster Verrazzano version");
                return ValidationResult::denied("InternalError", &e.to_string());
            }
        };
        let version = validate_fleet_version(&fleet.spec, admin.as_deref());
        if !version.allowed {
            return version;
        }
        match update_violations(request) {
            Ok(found) => errors.extend(found),
            Err(denied) => return denied,
        }
    }
    ValidationResult::from_field_errors("VerrazzanoFleet", &request.name, &errors)
}

/// Validate a binding create or update
pub fn review_binding(request: &Request) -> ValidationResult {
    info!(
        uid = %request.uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = %request.name,
        "Processing VerrazzanoFleetBinding admission request"
    );
    if matches!(request.operation, Operation::Delete | Operation::Connect) {
        return ValidationResult::allowed();
    }
    let Some(object) = &request.object else {
        return ValidationResult::denied("BadRequest", "Missing object in request");
    };
    let binding: VerrazzanoFleetBinding = match typed(object) {
        Ok(binding) => binding,
        Err(e) => {
            return ValidationResult::denied("BadRequest", &format!("Failed to parse object: {e}"));
        }
    };
    let namespace = request
        .namespace
        .as_deref()
        .or(binding.metadata.namespace.as_deref())
        .unwrap_or_default();

    let mut errors = validate_binding(&binding.spec, namespace);
    if request.operation == Operation::Update {
        match update_violations(request) {
            Ok(found) => errors.extend(found),
            Err(denied) => return denied,
        }
    }
    ValidationResult::from_field_errors("VerrazzanoFleetBinding", &request.name, &errors)
}

/// Default a fleet or binding
pub fn mutate(request: &Request) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);
    let Some(object) = &request.object else {
        return response;
    };
    let patch = serde_json::to_value(object).and_then(|value| default_pull_policy_patch(&value));
    match patch {
        Ok(None) => response,
        Ok(Some(patch)) => {
            debug!(uid = %request.uid, name = %request.name, "Defaulting image pull policy");
            match response.with_patch(patch) {
                Ok(response) => response,
                Err(e) => {
                    error!(uid = %request.uid, error = %e, "Failed to serialize patch");
                    AdmissionResponse::from(request).deny(format!("patch serialization error: {e}"))
                }
            }
        }
        Err(e) => AdmissionResponse::from(request).deny(format!("Failed to parse object: {e}")),
    }
}

/// Paths changed between the old and new object that are not owned by the user.
///
/// A request without both objects fails closed.
fn update_violations(request: &Request) -> Result<Vec<FieldError>, ValidationResult> {
    let (Some(old), Some(new)) = (&request.old_object, &request.object) else {
        return Err(ValidationResult::denied(
            "BadRequest",
            "Update request without both old and new objects",
        ));
    };
    let old = serde_json::to_value(old);
    let new = serde_json::to_value(new);
    match (old, new) {
        (Ok(old), Ok(new)) => Ok(violations(&old, &new, ALLOWED_UPDATES)),
        (Err(e), _) | (_, Err(e)) => Err(ValidationResult::denied("InternalError", &e.to_string())),
    }
}

fn typed<K: DeserializeOwned>(object: &DynamicObject) -> Result<K, serde_json::Error> {
    serde_json::from_value(serde_json::to_value(object)?)
}

fn respond(request: &Request, result: ValidationResult) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);
    if result.allowed {
        info!(uid = %request.uid, "Admission request allowed");
        return response;
    }
    let reason = result
        .reason
        .unwrap_or_else(|| "ValidationFailed".to_string());
    let message = result
        .message
        .unwrap_or_else(|| "Validation failed".to_string());
    warn!(uid = %request.uid, reason = %reason, message = %message, "Admission request denied");
    response.deny(message)
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0:8443. TLS certificates are loaded from the given paths.
pub async fn run_webhook_server(
    client: Client,
    cert_path: &str,
    key_path: &str,
) -> Result<(), WebhookError> {
    let state = Arc::new(WebhookState::new(Arc::new(KubeAdminVersionReader::new(
        client,
    ))));
    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], WEBHOOK_PORT));
    info!("Webhook server listening on {} with TLS", addr);

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
