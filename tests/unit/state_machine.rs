//! Unit tests for binding lifecycle phases

use crate::common::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use verrazzano_fleet_operator::controller::ConditionBuilder;
use verrazzano_fleet_operator::controller::state_machine::TransitionContext;
use verrazzano_fleet_operator::controller::status::Severity;
use verrazzano_fleet_operator::controller::{
    BindingEvent, BindingPhase, BindingStateMachine, TransitionResult, condition_types, reasons,
};
use verrazzano_fleet_operator::crd::VerrazzanoFleetBindingStatus;

fn walk(events: &[(BindingEvent, TransitionContext)]) -> BindingPhase {
    let sm = BindingStateMachine::new();
    let mut phase = BindingPhase::Initializing;
    for (event, ctx) in events {
        match sm.transition(&phase, *event, ctx) {
            TransitionResult::Success { to, .. } => phase = to,
            other => panic!("{event} from {phase} failed: {other:?}"),
        }
    }
    phase
}

mod observe_tests {
    use super::*;

    #[test]
    fn test_new_binding_is_initializing() {
        let binding = BindingBuilder::new("c1", "default").build();
        assert_eq!(BindingPhase::observe(&binding), BindingPhase::Initializing);
    }

    #[test]
    fn test_unavailable_cluster() {
        let mut binding = BindingBuilder::new("c1", "default").build();
        let mut conditions = ConditionBuilder::new();
        conditions.mark_false(
            condition_types::CLUSTER_AVAILABLE,
            reasons::GET_CLUSTER_FAILED,
            Severity::Error,
            "not found",
        );
        binding.status = Some(VerrazzanoFleetBindingStatus {
            conditions: conditions.build(),
            ..Default::default()
        });
        assert_eq!(BindingPhase::observe(&binding), BindingPhase::ClusterUnavailable);
    }

    #[test]
    fn test_available_cluster_is_normal() {
        let mut binding = BindingBuilder::new("c1", "default").build();
        let mut conditions = ConditionBuilder::new();
        conditions.mark_true(condition_types::CLUSTER_AVAILABLE);
        binding.status = Some(VerrazzanoFleetBindingStatus {
            conditions: conditions.build(),
            ..Default::default()
        });
        assert_eq!(BindingPhase::observe(&binding), BindingPhase::Normal);
    }

    #[test]
    fn test_deletion_timestamp_wins() {
        let mut binding = BindingBuilder::new("c1", "default").build();
        binding.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        assert_eq!(BindingPhase::observe(&binding), BindingPhase::Deleting);
    }
}

mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_graceful_removal() {
        let phase = walk(&[
            (BindingEvent::ClusterResolved, TransitionContext::default()),
            (BindingEvent::DeletionRequested, TransitionContext::default()),
            (BindingEvent::WorkloadRemoved, TransitionContext::default()),
            (BindingEvent::ReleaseRemoved, TransitionContext::default()),
        ]);
        assert_eq!(phase, BindingPhase::Removed);
    }

    #[test]
    fn test_removal_after_wait_expires() {
        let expired = TransitionContext {
            workload_present: true,
            wait_budget_exhausted: true,
        };
        let phase = walk(&[
            (BindingEvent::ClusterLookupFailed, TransitionContext::default()),
            (BindingEvent::ClusterResolved, TransitionContext::default()),
            (BindingEvent::DeletionRequested, TransitionContext::default()),
            (BindingEvent::DeletionWaitExpired, expired),
            (BindingEvent::ReleaseRemoved, TransitionContext::default()),
        ]);
        assert_eq!(phase, BindingPhase::Removed);
    }

    #[test]
    fn test_cluster_gone_skips_cleanup() {
        let phase = walk(&[
            (BindingEvent::DeletionRequested, TransitionContext::default()),
            (BindingEvent::ClusterGone, TransitionContext::default()),
        ]);
        assert_eq!(phase, BindingPhase::Removed);
    }

    #[test]
    fn test_wait_expiry_guarded_by_budget() {
        let sm = BindingStateMachine::new();
        let result = sm.transition(
            &BindingPhase::Deleting,
            BindingEvent::DeletionWaitExpired,
            &TransitionContext::default(),
        );
        assert!(matches!(result, TransitionResult::GuardFailed { .. }));
    }

    #[test]
    fn test_release_cannot_be_removed_before_deletion() {
        let sm = BindingStateMachine::new();
        assert!(!sm.can_transition(&BindingPhase::Normal, &BindingEvent::ReleaseRemoved));
        assert!(matches!(
            sm.transition(
                &BindingPhase::Normal,
                BindingEvent::ReleaseRemoved,
                &TransitionContext::default()
            ),
            TransitionResult::InvalidTransition { .. }
        ));
    }

    #[test]
    fn test_deleting_cannot_resume() {
        let sm = BindingStateMachine::new();
        assert!(!sm.can_transition(&BindingPhase::Deleting, &BindingEvent::ClusterResolved));
        assert_eq!(sm.valid_events(&BindingPhase::Uninstalling), vec![&BindingEvent::ReleaseRemoved]);
    }
}
