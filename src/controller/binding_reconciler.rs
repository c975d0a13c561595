//! Reconciler for VerrazzanoFleetBinding
//!
//! A binding pass installs or upgrades the platform operator on its workload
//! cluster, applies the Verrazzano resource and reports what it observed. On
//! deletion it removes Verrazzano, then the platform operator, then the
//! finalizer. Status is written once at the end of every pass.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kube::ResourceExt;
use kube::runtime::controller::Action;
use tracing::{debug, error, info, instrument, warn};

use super::context::Context;
use super::deletion::DeletionWait;
use super::error::{Error, Result};
use super::object_key;
use super::registry::{with_finalizer, without_finalizer};
use super::state_machine::{BindingEvent, BindingPhase, TransitionContext, TransitionResult};
use super::status::{ConditionBuilder, Severity, condition_types, reasons};
use crate::crd::{
    BINDING_FINALIZER, VerrazzanoFleetBinding, VerrazzanoFleetBindingStatus, VerrazzanoStatus,
};
use crate::release::values::render_values;
use crate::release::{
    PLATFORM_OPERATOR, PLATFORM_OPERATOR_NAMESPACE, ReleaseAction, ReleaseError, ReleaseOutcome,
    ReleaseSpec, ReleaseStatus,
};
use crate::remote::{ClusterCredentials, PodHealth, RemoteCluster};

pub const BINDING_KIND: &str = "VerrazzanoFleetBinding";

/// Requeue after a successful pass
pub const REQUEUE_INTERVAL: Duration = Duration::from_secs(30);

/// Requeue while the release is pending
pub const PENDING_RECHECK: Duration = Duration::from_secs(10);

/// Lifecycle state the remote Verrazzano reports once installed
const VERRAZZANO_READY_STATE: &str = "Ready";

/// Readiness of the platform operator pods on a workload cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorReadiness {
    /// No pods in the operator namespace
    NotUp,
    /// A pod is not running; `webhook` when it is the webhook pod
    NotRunning { webhook: bool },
    /// All pods run but at least one is not ready
    NotReady,
    Ready,
}

/// Classify the platform operator pods.
///
/// The last pod that is not running decides which component is reported.
pub fn operator_readiness(pods: &[PodHealth]) -> OperatorReadiness {
    if pods.is_empty() {
        return OperatorReadiness::NotUp;
    }
    if let Some(pod) = pods.iter().rev().find(|p| !p.running) {
        return OperatorReadiness::NotRunning {
            webhook: pod.name.contains("webhook"),
        };
    }
    if pods.iter().any(|p| !p.ready) {
        OperatorReadiness::NotReady
    } else {
        OperatorReadiness::Ready
    }
}

/// Main reconciliation function for VerrazzanoFleetBinding
#[instrument(
    skip(binding, ctx),
    fields(name = %binding.name_any(), namespace = binding.namespace().unwrap_or_default())
)]
pub async fn reconcile_binding(
    binding: Arc<VerrazzanoFleetBinding>,
    ctx: Arc<Context>,
) -> Result<Action> {
    let start = Instant::now();
    info!("Reconciling VerrazzanoFleetBinding");

    let mut pass = BindingPass::new(&binding, &ctx)?;
    let deadline = ctx.config.reconcile_timeout;
    let result = match tokio::time::timeout(deadline, pass.run()).await {
        Ok(result) => result,
        Err(_) => Err(Error::TransientError(format!(
            "binding pass exceeded {deadline:?}"
        ))),
    };
    let result = match pass.flush_status().await {
        Ok(()) => result,
        Err(e) if result.is_ok() => Err(e),
        Err(e) => {
            warn!(error = %e, "failed to patch VerrazzanoFleetBinding status");
            result
        }
    };
    debug!(phase = %pass.phase, "binding pass finished");

    let key = object_key(BINDING_KIND, &pass.namespace, &pass.name);
    match &result {
        Ok(_) => {
            ctx.reset_errors(&key);
            ctx.record_reconcile(
                BINDING_KIND,
                &pass.namespace,
                &pass.name,
                start.elapsed().as_secs_f64(),
            );
        }
        Err(_) => ctx.record_failure(BINDING_KIND, &pass.namespace, &pass.name),
    }
    result
}

/// One reconcile pass over a binding
struct BindingPass<'a> {
    binding: &'a VerrazzanoFleetBinding,
    ctx: &'a Context,
    namespace: String,
    name: String,
    phase: BindingPhase,
    conditions: ConditionBuilder,
    status: VerrazzanoFleetBindingStatus,
    /// Status needs no write, either already written or the object is going away
    flushed: bool,
}

impl<'a> BindingPass<'a> {
    fn new(binding: &'a VerrazzanoFleetBinding, ctx: &'a Context) -> Result<Self> {
        let namespace = binding
            .namespace()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
        let status = binding.status.clone().unwrap_or_default();
        Ok(Self {
            binding,
            ctx,
            namespace,
            name: binding.name_any(),
            phase: BindingPhase::observe(binding),
            conditions: ConditionBuilder::from_existing(status.conditions.clone()),
            status,
            flushed: false,
        })
    }

    async fn run(&mut self) -> Result<Action> {
        if self.binding.metadata.deletion_timestamp.is_some() {
            return self.run_deletion().await;
        }

        self.conditions.init_false(
            condition_types::VERRAZZANO_OPERATOR_READY,
            reasons::PREPARING_TO_HELM_INSTALL,
            Severity::Info,
            "Preparing to install Helm chart",
        );

        if let Some(finalizers) = with_finalizer(self.binding.finalizers(), BINDING_FINALIZER) {
            self.ctx
                .registry
                .set_binding_finalizers(
                    &self.namespace,
                    &self.name,
                    finalizers,
                    self.binding.resource_version(),
                )
                .await?;
            info!("Added finalizer to {}", self.name);
            return Ok(Action::requeue(Duration::from_secs(1)));
        }

        self.run_normal().await
    }

    async fn run_normal(&mut self) -> Result<Action> {
        let credentials = match self.resolve_cluster().await {
            Ok(Some(credentials)) => {
                self.fire(BindingEvent::ClusterResolved, TransitionContext::default());
                credentials
            }
            Ok(None) => {
                let key = self.binding.spec.cluster_ref.key();
                self.conditions.mark_false(
                    condition_types::CLUSTER_AVAILABLE,
                    reasons::GET_CLUSTER_FAILED,
                    Severity::Error,
                    &format!("cluster {key} not found"),
                );
                self.fire(BindingEvent::ClusterLookupFailed, TransitionContext::default());
                return Err(Error::NotFound(format!("cluster {key}")));
            }
            Err(e) => {
                self.fire(BindingEvent::ClusterLookupFailed, TransitionContext::default());
                return Err(e);
            }
        };

        let outcome = match self.install_or_upgrade(&credentials).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    error = %e,
                    cluster = %credentials.cluster,
                    "Failed to install or upgrade the platform operator"
                );
                self.conditions.mark_false(
                    condition_types::VERRAZZANO_OPERATOR_READY,
                    reasons::HELM_INSTALL_OR_UPGRADE_FAILED,
                    Severity::Error,
                    &e.to_string(),
                );
                return Err(e.into());
            }
        };

        if let Some(action) = outcome.action {
            info!(
                action = action.as_str(),
                revision = outcome.release.revision,
                "Platform operator release changed"
            );
            self.ctx.record_release(action);
        }
        let release = outcome.release;
        self.status.revision = Some(release.revision);
        self.status.status = Some(release.status.to_string());

        if release.status.is_pending() {
            self.conditions.mark_false(
                condition_types::VERRAZZANO_OPERATOR_READY,
                reasons::HELM_RELEASE_PENDING,
                Severity::Info,
                &format!("Helm release is in a pending state: {}", release.status),
            );
            return Ok(Action::requeue(PENDING_RECHECK));
        }
        if release.status == ReleaseStatus::Failed {
            warn!(release = %release.name, "Helm release failed without an installer error");
            self.conditions.mark_false(
                condition_types::VERRAZZANO_OPERATOR_READY,
                reasons::HELM_INSTALL_OR_UPGRADE_FAILED,
                Severity::Error,
                &format!("Helm release failed: {}", release.status),
            );
            return Err(Error::TransientError(format!(
                "release {} is in a failed state",
                release.name
            )));
        }

        let remote = self.ctx.remote.connect(&credentials).await?;
        self.check_operator_pods(remote.as_ref()).await?;

        if let Some(spec) = self.binding.spec.workload_spec() {
            remote.apply_workload(spec).await?;
            if let Some(object) = remote.get_workload().await? {
                self.status.verrazzano = Some(VerrazzanoStatus::from_object(&object.document));
            }
        }

        Ok(Action::requeue(REQUEUE_INTERVAL))
    }

    async fn install_or_upgrade(
        &self,
        credentials: &ClusterCredentials,
    ) -> Result<ReleaseOutcome, ReleaseError> {
        let chart = self.ctx.charts.prepare().await?;
        let values = render_values(&self.binding.spec, &chart.default_image)?;
        let spec = ReleaseSpec::platform_operator(chart.source.clone());
        self.ctx
            .releases
            .install_or_upgrade(credentials, &values, &spec, self.binding)
            .await
    }

    async fn check_operator_pods(&mut self, remote: &dyn RemoteCluster) -> Result<()> {
        let pods = match remote.operator_pods().await {
            Ok(pods) => pods,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        match operator_readiness(&pods) {
            OperatorReadiness::NotUp => {
                self.conditions.mark_false(
                    condition_types::VERRAZZANO_OPERATOR_READY,
                    reasons::OPERATOR_NOT_UP,
                    Severity::Error,
                    "Verrazzano Platform Operator pods are not running",
                );
                Ok(())
            }
            OperatorReadiness::NotRunning { webhook } => {
                let (reason, message) = if webhook {
                    (
                        reasons::OPERATOR_WEBHOOK_NOT_RUNNING,
                        "Verrazzano Platform Operator Webhook pods are not running",
                    )
                } else {
                    (
                        reasons::OPERATOR_NOT_RUNNING,
                        "Verrazzano Platform Operator pods are not running",
                    )
                };
                self.conditions.mark_false(
                    condition_types::VERRAZZANO_OPERATOR_READY,
                    reason,
                    Severity::Error,
                    message,
                );
                Err(Error::TransientError(message.to_string()))
            }
            OperatorReadiness::NotReady => Err(Error::TransientError(
                "not all Verrazzano platform operator pods are ready".to_string(),
            )),
            OperatorReadiness::Ready => {
                self.conditions
                    .mark_true(condition_types::VERRAZZANO_OPERATOR_READY);
                Ok(())
            }
        }
    }

    async fn run_deletion(&mut self) -> Result<Action> {
        if !self.binding.finalizers().iter().any(|f| f == BINDING_FINALIZER) {
            debug!("Finalizer already removed");
            self.flushed = true;
            return Ok(Action::await_change());
        }

        let Some(credentials) = self.resolve_cluster().await? else {
            info!(
                cluster = %self.binding.spec.cluster_ref.key(),
                "Cluster not found, nothing to clean up on the workload cluster"
            );
            self.fire(BindingEvent::ClusterGone, TransitionContext::default());
            return self.remove_finalizer().await;
        };

        let remote = self.ctx.remote.connect(&credentials).await?;
        match remote.get_workload().await? {
            Some(workload) => {
                if !workload.deleting {
                    info!(name = %workload.name, "Deleting Verrazzano from the workload cluster");
                    remote.delete_workload(&workload).await?;
                }
                if let Some(delay) = self.wait_for_workload_removal() {
                    return Ok(Action::requeue(delay));
                }
            }
            None => {
                debug!("No Verrazzano on the workload cluster");
                self.fire(BindingEvent::WorkloadRemoved, TransitionContext::default());
            }
        }

        self.uninstall_release(&credentials).await?;
        self.remove_finalizer().await
    }

    /// Delay before the next check, or `None` once the wait budget is spent
    fn wait_for_workload_removal(&mut self) -> Option<Duration> {
        let policy = self.ctx.config.deletion_wait();
        let now = chrono::Utc::now();
        let deleted_at = self
            .binding
            .metadata
            .deletion_timestamp
            .as_ref()
            .map_or(now, |t| t.0);

        match policy.next(deleted_at, now, policy.jitter()) {
            DeletionWait::Recheck(delay) => {
                debug!(?delay, "Verrazzano still present on the workload cluster");
                self.conditions.mark_false(
                    condition_types::VERRAZZANO_OPERATOR_READY,
                    reasons::VERRAZZANO_DELETION_PENDING,
                    Severity::Info,
                    "Waiting for Verrazzano to be removed from the workload cluster",
                );
                Some(delay)
            }
            DeletionWait::Expired => {
                error!(
                    timeout = ?policy.timeout,
                    "Timed out waiting for Verrazzano removal, uninstalling the platform operator"
                );
                self.fire(
                    BindingEvent::DeletionWaitExpired,
                    TransitionContext {
                        workload_present: true,
                        wait_budget_exhausted: true,
                    },
                );
                None
            }
        }
    }

    async fn uninstall_release(&mut self, credentials: &ClusterCredentials) -> Result<()> {
        match self
            .ctx
            .releases
            .uninstall(credentials, PLATFORM_OPERATOR, PLATFORM_OPERATOR_NAMESPACE)
            .await
        {
            Ok(()) => {
                info!(cluster = %credentials.cluster, "Uninstalled the platform operator");
                self.ctx.record_release(ReleaseAction::Uninstall);
            }
            Err(ReleaseError::NotFound(_)) => {
                debug!("Platform operator release not found, nothing to uninstall");
            }
            Err(e) => {
                self.conditions.mark_false(
                    condition_types::VERRAZZANO_OPERATOR_READY,
                    reasons::HELM_RELEASE_DELETION_FAILED,
                    Severity::Error,
                    &e.to_string(),
                );
                return Err(e.into());
            }
        }

        self.conditions.mark_false(
            condition_types::VERRAZZANO_OPERATOR_READY,
            reasons::HELM_RELEASE_DELETED,
            Severity::Info,
            "",
        );
        self.fire(BindingEvent::ReleaseRemoved, TransitionContext::default());
        Ok(())
    }

    /// Drop the finalizer; the status is not written since the object is going away
    async fn remove_finalizer(&mut self) -> Result<Action> {
        self.flushed = true;
        if let Some(finalizers) = without_finalizer(self.binding.finalizers(), BINDING_FINALIZER) {
            match self
                .ctx
                .registry
                .set_binding_finalizers(
                    &self.namespace,
                    &self.name,
                    finalizers,
                    self.binding.resource_version(),
                )
                .await
            {
                Ok(()) => info!("Removed finalizer from {}", self.name),
                Err(e) if e.is_not_found() => debug!("Binding already gone"),
                Err(e) => return Err(e),
            }
        }
        Ok(Action::await_change())
    }

    /// Credentials for the binding's cluster, `None` when the cluster does not exist
    async fn resolve_cluster(&mut self) -> Result<Option<ClusterCredentials>> {
        let cluster_ref = &self.binding.spec.cluster_ref;
        let cluster = match self
            .ctx
            .registry
            .get_cluster(&cluster_ref.namespace, &cluster_ref.name)
            .await
        {
            Ok(cluster) => cluster,
            Err(e) => {
                self.conditions.mark_false(
                    condition_types::CLUSTER_AVAILABLE,
                    reasons::GET_CLUSTER_FAILED,
                    Severity::Error,
                    &format!("failed to get cluster {}: {e}", cluster_ref.key()),
                );
                return Err(e);
            }
        };
        if cluster.is_none() {
            return Ok(None);
        }

        debug!(cluster = %cluster_ref.key(), "Getting kubeconfig for cluster");
        match self.ctx.credentials.credentials(cluster_ref).await {
            Ok(credentials) => {
                self.conditions
                    .mark_true(condition_types::CLUSTER_AVAILABLE);
                Ok(Some(credentials))
            }
            Err(e) => {
                self.conditions.mark_false(
                    condition_types::CLUSTER_AVAILABLE,
                    reasons::GET_KUBECONFIG_FAILED,
                    Severity::Error,
                    &format!("failed to get kubeconfig for cluster: {e}"),
                );
                Err(e.into())
            }
        }
    }

    fn fire(&mut self, event: BindingEvent, guard: TransitionContext) {
        match self.ctx.state_machine.transition(&self.phase, event, &guard) {
            TransitionResult::Success {
                from,
                to,
                description,
                ..
            } => {
                debug!(%from, %to, %event, description, "Binding phase transition");
                self.phase = to;
            }
            TransitionResult::InvalidTransition { current, event } => {
                warn!(%current, %event, "Unexpected event for binding phase");
            }
            TransitionResult::GuardFailed { from, to, reason, .. } => {
                debug!(%from, %to, %event, %reason, "Binding transition blocked");
            }
        }
    }

    /// Write the status if it changed, summarising Ready once Verrazzano is up
    async fn flush_status(&mut self) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;

        let verrazzano_ready = self
            .status
            .verrazzano
            .as_ref()
            .and_then(|v| v.state.as_deref())
            == Some(VERRAZZANO_READY_STATE);
        if verrazzano_ready {
            self.conditions.summarize(&[
                condition_types::CLUSTER_AVAILABLE,
                condition_types::VERRAZZANO_OPERATOR_READY,
            ]);
        }

        let mut status = self.status.clone();
        status.conditions = std::mem::take(&mut self.conditions).build();
        status.observed_generation = self.binding.metadata.generation;

        if self.binding.status.as_ref() == Some(&status) {
            debug!("Status unchanged");
            return Ok(());
        }

        match self
            .ctx
            .registry
            .patch_binding_status(&self.namespace, &self.name, &status)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!("Binding no longer exists, status not written");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
