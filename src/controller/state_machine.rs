//! Binding lifecycle state machine
//!
//! The phase is not persisted. Each reconcile pass derives the starting phase
//! from the binding and fires events as it makes progress, so every pass
//! leaves an auditable trail of transitions in the logs.

use std::fmt;

use crate::controller::status::condition_types;
use crate::crd::{VerrazzanoFleetBinding, find_condition};

/// Lifecycle phase of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingPhase {
    /// First observation, no conditions yet
    Initializing,
    /// The workload cluster or its credentials could not be read
    ClusterUnavailable,
    /// Installing, upgrading and watching the platform operator
    Normal,
    /// Waiting for the workload cluster to remove Verrazzano
    Deleting,
    /// Removing the platform operator release
    Uninstalling,
    /// Nothing left on the workload cluster; the finalizer can go
    Removed,
}

impl BindingPhase {
    /// Phase implied by the binding as stored
    pub fn observe(binding: &VerrazzanoFleetBinding) -> Self {
        if binding.metadata.deletion_timestamp.is_some() {
            return BindingPhase::Deleting;
        }
        let conditions = binding
            .status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default();
        if conditions.is_empty() {
            return BindingPhase::Initializing;
        }
        match find_condition(conditions, condition_types::CLUSTER_AVAILABLE) {
            Some(c) if !c.is_true() => BindingPhase::ClusterUnavailable,
            _ => BindingPhase::Normal,
        }
    }
}

impl fmt::Display for BindingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingPhase::Initializing => write!(f, "Initializing"),
            BindingPhase::ClusterUnavailable => write!(f, "ClusterUnavailable"),
            BindingPhase::Normal => write!(f, "Normal"),
            BindingPhase::Deleting => write!(f, "Deleting"),
            BindingPhase::Uninstalling => write!(f, "Uninstalling"),
            BindingPhase::Removed => write!(f, "Removed"),
        }
    }
}

/// Events raised by a binding pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingEvent {
    /// Cluster and kubeconfig were read
    ClusterResolved,
    /// Cluster or kubeconfig lookup failed
    ClusterLookupFailed,
    /// Deletion timestamp has been set on the binding
    DeletionRequested,
    /// The workload cluster no longer exists
    ClusterGone,
    /// The remote Verrazzano resource is absent
    WorkloadRemoved,
    /// The deletion wait budget ran out
    DeletionWaitExpired,
    /// The platform operator release is uninstalled or was never there
    ReleaseRemoved,
}

impl fmt::Display for BindingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingEvent::ClusterResolved => write!(f, "ClusterResolved"),
            BindingEvent::ClusterLookupFailed => write!(f, "ClusterLookupFailed"),
            BindingEvent::DeletionRequested => write!(f, "DeletionRequested"),
            BindingEvent::ClusterGone => write!(f, "ClusterGone"),
            BindingEvent::WorkloadRemoved => write!(f, "WorkloadRemoved"),
            BindingEvent::DeletionWaitExpired => write!(f, "DeletionWaitExpired"),
            BindingEvent::ReleaseRemoved => write!(f, "ReleaseRemoved"),
        }
    }
}

/// Facts the guards look at
#[derive(Debug, Clone, Default)]
pub struct TransitionContext {
    /// The remote Verrazzano resource still exists
    pub workload_present: bool,
    /// The deletion wait budget is spent
    pub wait_budget_exhausted: bool,
}

#[derive(Debug)]
pub struct Transition {
    pub from: BindingPhase,
    pub to: BindingPhase,
    pub event: BindingEvent,
    pub description: &'static str,
}

impl Transition {
    const fn new(
        from: BindingPhase,
        to: BindingPhase,
        event: BindingEvent,
        description: &'static str,
    ) -> Self {
        Self {
            from,
            to,
            event,
            description,
        }
    }
}

/// Result of attempting a state transition
#[derive(Debug)]
pub enum TransitionResult {
    Success {
        from: BindingPhase,
        to: BindingPhase,
        event: BindingEvent,
        description: &'static str,
    },
    InvalidTransition {
        current: BindingPhase,
        event: BindingEvent,
    },
    GuardFailed {
        from: BindingPhase,
        to: BindingPhase,
        event: BindingEvent,
        reason: String,
    },
}

/// Transition table for binding phases
pub struct BindingStateMachine {
    transitions: Vec<Transition>,
}

impl Default for BindingStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingStateMachine {
    pub fn new() -> Self {
        use BindingEvent as E;
        use BindingPhase as P;

        let mut transitions = Vec::new();
        for from in [P::Initializing, P::ClusterUnavailable, P::Normal] {
            transitions.push(Transition::new(
                from,
                P::Normal,
                E::ClusterResolved,
                "Workload cluster is reachable",
            ));
            transitions.push(Transition::new(
                from,
                P::ClusterUnavailable,
                E::ClusterLookupFailed,
                "Workload cluster or kubeconfig unavailable",
            ));
            transitions.push(Transition::new(
                from,
                P::Deleting,
                E::DeletionRequested,
                "Binding deletion requested",
            ));
        }
        transitions.extend([
            Transition::new(
                P::Deleting,
                P::Removed,
                E::ClusterGone,
                "Workload cluster is gone, nothing to clean up",
            ),
            Transition::new(
                P::Deleting,
                P::Uninstalling,
                E::WorkloadRemoved,
                "Verrazzano removed from the workload cluster",
            ),
            Transition::new(
                P::Deleting,
                P::Uninstalling,
                E::DeletionWaitExpired,
                "Gave up waiting for Verrazzano removal",
            ),
            Transition::new(
                P::Uninstalling,
                P::Removed,
                E::ReleaseRemoved,
                "Platform operator release removed",
            ),
        ]);

        Self { transitions }
    }

    /// Attempt a transition from `current` on `event`
    pub fn transition(
        &self,
        current: &BindingPhase,
        event: BindingEvent,
        ctx: &TransitionContext,
    ) -> TransitionResult {
        let transition = self
            .transitions
            .iter()
            .find(|t| t.from == *current && t.event == event);

        match transition {
            Some(t) => match self.check_guard(t, ctx) {
                Some(reason) => TransitionResult::GuardFailed {
                    from: t.from,
                    to: t.to,
                    event,
                    reason,
                },
                None => TransitionResult::Success {
                    from: t.from,
                    to: t.to,
                    event,
                    description: t.description,
                },
            },
            None => TransitionResult::InvalidTransition {
                current: *current,
                event,
            },
        }
    }

    /// Check if a transition is valid (ignoring guards)
    pub fn can_transition(&self, from: &BindingPhase, event: &BindingEvent) -> bool {
        self.transitions
            .iter()
            .any(|t| t.from == *from && t.event == *event)
    }

    /// Get all valid events for a given state
    pub fn valid_events(&self, state: &BindingPhase) -> Vec<&BindingEvent> {
        self.transitions
            .iter()
            .filter(|t| t.from == *state)
            .map(|t| &t.event)
            .collect()
    }

    fn check_guard(&self, transition: &Transition, ctx: &TransitionContext) -> Option<String> {
        match transition.event {
            BindingEvent::WorkloadRemoved if ctx.workload_present => {
                Some("Verrazzano resource still present on the workload cluster".to_string())
            }
            BindingEvent::DeletionWaitExpired if !ctx.wait_budget_exhausted => {
                Some("Deletion wait budget not yet spent".to_string())
            }
            _ => None,
        }
    }
}
