//! Reconciler for VerrazzanoFleet
//!
//! A fleet owns one binding per selected cluster. The reconciler keeps that
//! binding in step with the fleet, deletes bindings for clusters the fleet no
//! longer selects and reports the binding's readiness on the fleet.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kube::ResourceExt;
use kube::runtime::controller::Action;
use tracing::{debug, info, instrument, warn};

use super::context::Context;
use super::error::{Error, Result};
use super::object_key;
use super::orphans::orphans;
use super::projection::{Projection, binding_selector, fleet_selector, project};
use super::registry::{with_finalizer, without_finalizer};
use super::status::{ConditionBuilder, Severity, condition_types, reasons};
use crate::crd::{
    ClusterReference, FLEET_FINALIZER, VerrazzanoFleet, VerrazzanoFleetBinding,
    VerrazzanoFleetStatus, find_condition,
};

pub const FLEET_KIND: &str = "VerrazzanoFleet";

/// Requeue after a successful pass; binding changes trigger a pass sooner
pub const RESYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Main reconciliation function for VerrazzanoFleet
#[instrument(
    skip(fleet, ctx),
    fields(name = %fleet.name_any(), namespace = fleet.namespace().unwrap_or_default())
)]
pub async fn reconcile_fleet(fleet: Arc<VerrazzanoFleet>, ctx: Arc<Context>) -> Result<Action> {
    let start = Instant::now();
    info!("Reconciling VerrazzanoFleet");

    let mut pass = FleetPass::new(&fleet, &ctx)?;
    let deadline = ctx.config.reconcile_timeout;
    let run = async {
        if fleet.metadata.deletion_timestamp.is_some() {
            pass.run_deletion().await
        } else {
            pass.run().await
        }
    };
    let result = match tokio::time::timeout(deadline, run).await {
        Ok(result) => result,
        Err(_) => Err(Error::TransientError(format!(
            "fleet pass exceeded {deadline:?}"
        ))),
    };
    let result = match pass.flush_status().await {
        Ok(()) => result,
        Err(e) if result.is_ok() => Err(e),
        Err(e) => {
            warn!(error = %e, "failed to patch VerrazzanoFleet status");
            result
        }
    };

    let key = object_key(FLEET_KIND, &pass.namespace, &pass.name);
    match &result {
        Ok(_) => {
            ctx.reset_errors(&key);
            ctx.record_reconcile(
                FLEET_KIND,
                &pass.namespace,
                &pass.name,
                start.elapsed().as_secs_f64(),
            );
        }
        Err(_) => ctx.record_failure(FLEET_KIND, &pass.namespace, &pass.name),
    }
    result
}

struct FleetPass<'a> {
    fleet: &'a VerrazzanoFleet,
    ctx: &'a Context,
    namespace: String,
    name: String,
    conditions: ConditionBuilder,
    /// Ready condition of the fleet's binding, when it reported one
    binding_ready: Option<crate::crd::Condition>,
    flushed: bool,
}

impl<'a> FleetPass<'a> {
    fn new(fleet: &'a VerrazzanoFleet, ctx: &'a Context) -> Result<Self> {
        let namespace = fleet
            .namespace()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
        let conditions = fleet
            .status
            .as_ref()
            .map(|s| s.conditions.clone())
            .unwrap_or_default();
        Ok(Self {
            fleet,
            ctx,
            namespace,
            name: fleet.name_any(),
            conditions: ConditionBuilder::from_existing(conditions),
            binding_ready: None,
            flushed: false,
        })
    }

    async fn run(&mut self) -> Result<Action> {
        if let Some(finalizers) = with_finalizer(self.fleet.finalizers(), FLEET_FINALIZER) {
            self.ctx
                .registry
                .set_fleet_finalizers(
                    &self.namespace,
                    &self.name,
                    finalizers,
                    self.fleet.resource_version(),
                )
                .await?;
            info!("Added finalizer to {}", self.name);
            return Ok(Action::requeue(Duration::from_secs(1)));
        }

        let cluster_name = self.fleet.spec.cluster_selector.name.as_str();
        let Some(cluster) = self
            .ctx
            .registry
            .get_cluster(&self.namespace, cluster_name)
            .await?
        else {
            info!(cluster = cluster_name, "Selected cluster not found");
            self.conditions.mark_false(
                condition_types::FLEET_BINDING_SPECS_READY,
                reasons::CLUSTER_NOT_FOUND,
                Severity::Warning,
                &format!("cluster {}/{cluster_name} not found", self.namespace),
            );
            return Ok(Action::requeue(RESYNC_INTERVAL));
        };
        let selected = cluster.reference();

        self.reconcile_for_cluster(&selected).await?;
        self.delete_orphans(&selected).await?;

        self.conditions
            .mark_true(condition_types::FLEET_BINDING_SPECS_READY);
        Ok(Action::requeue(RESYNC_INTERVAL))
    }

    /// Create or update the binding for `cluster`
    async fn reconcile_for_cluster(&mut self, cluster: &ClusterReference) -> Result<()> {
        let existing = self
            .ctx
            .registry
            .list_bindings(&self.namespace, &binding_selector(&self.name, &cluster.name))
            .await?;
        if existing.len() > 1 {
            return Err(Error::MultipleBindings {
                fleet: self.name.clone(),
                cluster: cluster.key(),
                count: existing.len(),
            });
        }
        let existing = existing.into_iter().next();
        self.binding_ready = existing.as_ref().and_then(ready_condition);

        let projection = match project(existing.as_ref(), self.fleet, cluster) {
            Ok(projection) => projection,
            Err(e) => {
                self.creation_failed(&e);
                return Err(e);
            }
        };

        match projection {
            None => debug!(cluster = %cluster.key(), "VerrazzanoFleetBinding is up to date"),
            Some(Projection::Create(binding)) => {
                match self.ctx.registry.create_binding(&binding).await {
                    Ok(_) => info!(binding = %binding.name_any(), "Created VerrazzanoFleetBinding"),
                    Err(e) if e.is_already_exists() => {
                        debug!(
                            binding = %binding.name_any(),
                            "VerrazzanoFleetBinding already exists"
                        );
                        self.conditions.mark_true(reasons::BINDING_EXISTS);
                    }
                    Err(e) => {
                        self.creation_failed(&e);
                        return Err(e);
                    }
                }
            }
            Some(Projection::Update(binding)) => {
                if let Err(e) = self.ctx.registry.replace_binding(&binding).await {
                    self.creation_failed(&e);
                    return Err(e);
                }
                info!(binding = %binding.name_any(), "Updated VerrazzanoFleetBinding");
            }
        }
        Ok(())
    }

    /// Delete bindings for clusters the fleet no longer selects
    async fn delete_orphans(&mut self, selected: &ClusterReference) -> Result<()> {
        let bindings = self
            .ctx
            .registry
            .list_bindings(&self.namespace, &fleet_selector(&self.name))
            .await?;
        for binding in orphans(std::slice::from_ref(selected), &bindings) {
            if let Err(e) = self.delete_binding(binding).await {
                self.conditions.mark_false(
                    condition_types::FLEET_BINDING_SPECS_READY,
                    reasons::BINDING_DELETION_FAILED,
                    Severity::Error,
                    &e.to_string(),
                );
                return Err(e);
            }
        }
        Ok(())
    }

    async fn run_deletion(&mut self) -> Result<Action> {
        if !self.fleet.finalizers().iter().any(|f| f == FLEET_FINALIZER) {
            self.flushed = true;
            return Ok(Action::await_change());
        }

        let bindings = self
            .ctx
            .registry
            .list_bindings(&self.namespace, &fleet_selector(&self.name))
            .await?;
        for binding in bindings
            .iter()
            .filter(|b| b.metadata.deletion_timestamp.is_none())
        {
            if let Err(e) = self.delete_binding(binding).await {
                self.conditions.mark_false(
                    condition_types::FLEET_BINDING_SPECS_READY,
                    reasons::BINDING_DELETION_FAILED,
                    Severity::Error,
                    &e.to_string(),
                );
                return Err(e);
            }
        }

        self.flushed = true;
        if let Some(finalizers) = without_finalizer(self.fleet.finalizers(), FLEET_FINALIZER) {
            match self
                .ctx
                .registry
                .set_fleet_finalizers(
                    &self.namespace,
                    &self.name,
                    finalizers,
                    self.fleet.resource_version(),
                )
                .await
            {
                Ok(()) => info!("Removed finalizer from {}", self.name),
                Err(e) if e.is_not_found() => debug!("Fleet already gone"),
                Err(e) => return Err(e),
            }
        }
        Ok(Action::await_change())
    }

    async fn delete_binding(&self, binding: &VerrazzanoFleetBinding) -> Result<()> {
        let name = binding.name_any();
        match self.ctx.registry.delete_binding(&self.namespace, &name).await {
            Ok(()) => {
                info!(
                    binding = %name,
                    cluster = %binding.spec.cluster_ref.key(),
                    "Deleted VerrazzanoFleetBinding"
                );
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(binding = %name, "VerrazzanoFleetBinding already deleted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn creation_failed(&mut self, error: &Error) {
        self.conditions.mark_false(
            condition_types::FLEET_BINDING_SPECS_READY,
            reasons::BINDING_CREATION_FAILED,
            Severity::Error,
            &error.to_string(),
        );
    }

    /// Write the status if it changed.
    ///
    /// Ready mirrors the binding's Ready; until the binding reports one, a
    /// failing spec condition is summarised instead.
    async fn flush_status(&mut self) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;

        if let Some(ready) = &self.binding_ready {
            self.conditions.mirror(condition_types::READY, ready);
        } else if self
            .conditions
            .get(condition_types::FLEET_BINDING_SPECS_READY)
            .is_some_and(|c| !c.is_true())
        {
            self.conditions
                .summarize(&[condition_types::FLEET_BINDING_SPECS_READY]);
        }

        let status = VerrazzanoFleetStatus {
            conditions: std::mem::take(&mut self.conditions).build(),
            observed_generation: self.fleet.metadata.generation,
        };
        if self.fleet.status.as_ref() == Some(&status) {
            debug!("Status unchanged");
            return Ok(());
        }

        match self
            .ctx
            .registry
            .patch_fleet_status(&self.namespace, &self.name, &status)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn ready_condition(binding: &VerrazzanoFleetBinding) -> Option<crate::crd::Condition> {
    let status = binding.status.as_ref()?;
    find_condition(&status.conditions, condition_types::READY).cloned()
}
