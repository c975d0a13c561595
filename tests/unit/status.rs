//! Unit tests for fleet and binding conditions

use serde_json::json;
use verrazzano_fleet_operator::controller::status::{Severity, condition_status};
use verrazzano_fleet_operator::controller::{ConditionBuilder, condition_types, reasons};
use verrazzano_fleet_operator::crd::{Condition, VerrazzanoFleetBindingStatus, find_condition};

mod summary_tests {
    use super::*;

    #[test]
    fn test_fleet_ready_follows_specs_ready() {
        let mut builder = ConditionBuilder::new();
        builder
            .mark_false(
                condition_types::FLEET_BINDING_SPECS_READY,
                reasons::CLUSTER_NOT_FOUND,
                Severity::Warning,
                "cluster c1 not found",
            )
            .summarize(&[condition_types::FLEET_BINDING_SPECS_READY]);

        let ready = builder.get(condition_types::READY).unwrap();
        assert_eq!(ready.status, condition_status::FALSE);
        assert_eq!(ready.reason, reasons::CLUSTER_NOT_FOUND);
        assert_eq!(ready.severity.as_deref(), Some("Warning"));
        assert_eq!(ready.message, "cluster c1 not found");
    }

    #[test]
    fn test_first_listed_wins_severity_tie() {
        let mut builder = ConditionBuilder::new();
        builder
            .mark_false(
                condition_types::CLUSTER_AVAILABLE,
                reasons::GET_KUBECONFIG_FAILED,
                Severity::Error,
                "no kubeconfig",
            )
            .mark_false(
                condition_types::VERRAZZANO_OPERATOR_READY,
                reasons::HELM_INSTALL_OR_UPGRADE_FAILED,
                Severity::Error,
                "install failed",
            )
            .summarize(&[
                condition_types::CLUSTER_AVAILABLE,
                condition_types::VERRAZZANO_OPERATOR_READY,
            ]);
        assert_eq!(
            builder.get(condition_types::READY).unwrap().reason,
            reasons::GET_KUBECONFIG_FAILED
        );
    }

    #[test]
    fn test_recovery_clears_ready() {
        let mut builder = ConditionBuilder::new();
        builder
            .mark_false(
                condition_types::VERRAZZANO_OPERATOR_READY,
                reasons::OPERATOR_NOT_UP,
                Severity::Warning,
                "starting",
            )
            .summarize(&[condition_types::VERRAZZANO_OPERATOR_READY]);
        let conditions = builder.build();

        let mut builder = ConditionBuilder::from_existing(conditions);
        builder
            .mark_true(condition_types::VERRAZZANO_OPERATOR_READY)
            .summarize(&[condition_types::VERRAZZANO_OPERATOR_READY]);
        let conditions = builder.build();
        let ready = find_condition(&conditions, condition_types::READY).unwrap();
        assert!(ready.is_true());
        assert_eq!(ready.severity, None);
    }
}

mod serialization_tests {
    use super::*;

    #[test]
    fn test_condition_wire_format() {
        let mut builder = ConditionBuilder::new();
        builder.mark_false(
            condition_types::CLUSTER_AVAILABLE,
            reasons::GET_CLUSTER_FAILED,
            Severity::Error,
            "not found",
        );
        let value = serde_json::to_value(&builder.build()[0]).unwrap();
        assert_eq!(value["type"], "ClusterAvailable");
        assert_eq!(value["status"], "False");
        assert_eq!(value["severity"], "Error");
        assert_eq!(value["reason"], "GetClusterFailed");
        assert!(value["lastTransitionTime"].is_string());
    }

    #[test]
    fn test_binding_status_from_wire() {
        let status: VerrazzanoFleetBindingStatus = serde_json::from_value(json!({
            "conditions": [{
                "type": "Ready",
                "status": "True",
                "lastTransitionTime": "2024-01-01T00:00:00Z"
            }]
        }))
        .unwrap();
        let ready: &Condition = find_condition(&status.conditions, condition_types::READY).unwrap();
        assert!(ready.is_true());
        assert_eq!(ready.reason, "");
    }
}
