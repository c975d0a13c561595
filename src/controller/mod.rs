pub mod binding_reconciler;
pub mod context;
pub mod deletion;
pub mod error;
pub mod fleet_reconciler;
pub mod orphans;
pub mod projection;
pub mod registry;
pub mod state_machine;
pub mod status;

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use tracing::{error, warn};

pub use binding_reconciler::{
    BINDING_KIND, OperatorReadiness, operator_readiness, reconcile_binding,
};
pub use context::{Context, ContextBuilder};
pub use deletion::{DeletionWait, DeletionWaitPolicy};
pub use error::{BackoffConfig, Error, ErrorContext, Result};
pub use fleet_reconciler::{FLEET_KIND, reconcile_fleet};
pub use orphans::orphans;
pub use projection::{FleetField, Projection, changed_fields, project, should_reinstall};
pub use registry::{KubeRegistry, Registry};
pub use state_machine::{BindingEvent, BindingPhase, BindingStateMachine, TransitionResult};
pub use status::{ConditionBuilder, Severity, condition_types, reasons};

/// Key identifying one object in error tracking and metrics
pub(crate) fn object_key(kind: &str, namespace: &str, name: &str) -> String {
    format!("{kind}/{namespace}/{name}")
}

/// Error policy shared by both controllers.
///
/// Consecutive failures of the same object back off exponentially;
/// non-retryable errors wait the maximum delay.
pub fn error_policy<K>(object: Arc<K>, error: &Error, ctx: Arc<Context>) -> Action
where
    K: Resource<DynamicType = ()>,
{
    let name = object.name_any();
    let namespace = object.namespace().unwrap_or_default();
    let key = object_key(&K::kind(&()), &namespace, &name);
    let attempt = ctx.record_error(&key, error);
    let delay = ctx
        .backoff
        .delay_for_error(error, attempt.saturating_sub(1));

    if error.is_retryable() {
        warn!(
            "Retryable error for {}: {}, requeuing in {:?} (attempt {})",
            key, error, delay, attempt
        );
    } else {
        error!(
            "Non-retryable error for {}: {}, requeuing in {:?} for manual intervention",
            key, error, delay
        );
    }

    Action::requeue(delay)
}
