//! Unit tests for the admission policies

use crate::common::*;
use serde_json::json;
use verrazzano_fleet_operator::webhooks::policies::{
    ALLOWED_UPDATES, INVALID_VERSION_MESSAGE, default_pull_policy_patch, validate_binding,
    validate_fleet, validate_fleet_version, violations,
};
use verrazzano_fleet_operator::webhooks::{FieldError, ValidationResult};

fn as_json<T: serde::Serialize>(object: &T) -> serde_json::Value {
    serde_json::to_value(object).unwrap()
}

mod update_guard_tests {
    use super::*;

    #[test]
    fn test_workload_fields_may_change() {
        let old = FleetBuilder::new("fleet-a", "default", "c1")
            .with_image("ghcr.io/verrazzano", "v1.5.2")
            .with_version("1.5.2")
            .build();
        let new = FleetBuilder::new("fleet-a", "default", "c1")
            .with_image("ghcr.io/acme", "v1.6.0")
            .with_pull_secrets(&["regcred"])
            .with_version("1.6.0")
            .with_private_registry(true)
            .build();

        assert!(violations(&as_json(&old), &as_json(&new), ALLOWED_UPDATES).is_empty());
    }

    #[test]
    fn test_dropped_workload_spec_passes_guard_but_not_required_fields() {
        let old = FleetBuilder::new("fleet-a", "default", "c1")
            .with_workload_spec(verrazzano_fleet_operator::document::Document::new(
                json!({"profile": "dev"}),
            ))
            .build();
        let mut new = FleetBuilder::new("fleet-a", "default", "c1")
            .with_workload_spec(verrazzano_fleet_operator::document::Document::new(
                json!({"profile": "prod"}),
            ))
            .build();
        assert!(violations(&as_json(&old), &as_json(&new), ALLOWED_UPDATES).is_empty());
        assert!(validate_fleet(&new.spec).is_empty());

        new.spec.verrazzano = Some(verrazzano_fleet_operator::crd::VerrazzanoSpec { spec: None });
        assert!(violations(&as_json(&old), &as_json(&new), ALLOWED_UPDATES).is_empty());
        let errors = validate_fleet(&new.spec);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "spec.verrazzano.spec");
    }

    #[test]
    fn test_metadata_may_change() {
        let old = as_json(&FleetBuilder::new("fleet-a", "default", "c1").build());
        let mut new = old.clone();
        new["metadata"]["labels"] = json!({"team": "platform"});
        new["metadata"]["annotations"] = json!({"note": "x"});
        assert!(violations(&old, &new, ALLOWED_UPDATES).is_empty());
    }

    #[test]
    fn test_cluster_reference_is_frozen() {
        let old = as_json(&BindingBuilder::new("c1", "default").build());
        let mut new = old.clone();
        new["spec"]["clusterRef"]["name"] = json!("c2");

        let errors = violations(&old, &new, ALLOWED_UPDATES);
        assert_eq!(errors, vec![FieldError::forbidden("spec.clusterRef.name", "cannot be modified")]);
    }

    #[test]
    fn test_unknown_fields_are_frozen() {
        let old = as_json(&FleetBuilder::new("fleet-a", "default", "c1").build());
        let mut new = old.clone();
        new["spec"]["extra"] = json!(true);
        new["status"] = json!({"conditions": []});

        let paths: Vec<String> = violations(&old, &new, ALLOWED_UPDATES)
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(paths, vec!["spec.extra", "status.conditions"]);
    }
}

mod required_field_tests {
    use super::*;

    #[test]
    fn test_private_registry_requires_image_parts() {
        let spec = BindingBuilder::new("c1", "default")
            .with_private_registry(true)
            .with_image(Some("ghcr.io/acme"), None)
            .spec();
        let errors = validate_binding(&spec, "default");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "spec.image.tag");
    }

    #[test]
    fn test_cluster_must_be_in_binding_namespace() {
        let spec = BindingBuilder::new("c1", "default")
            .for_cluster(cluster_ref("c1", "other"))
            .spec();
        assert_eq!(validate_binding(&spec, "default").len(), 1);
        assert!(validate_binding(&spec, "other").is_empty());
    }

    #[test]
    fn test_denial_lists_every_error() {
        let spec = FleetBuilder::new("fleet-a", "default", "")
            .with_private_registry(true)
            .spec();
        let errors = validate_fleet(&spec);
        assert_eq!(errors.len(), 2);

        let result = ValidationResult::from_field_errors("VerrazzanoFleet", "fleet-a", &errors);
        assert!(!result.allowed);
        assert_eq!(result.reason.as_deref(), Some("Invalid"));
        let message = result.message.unwrap();
        assert!(message.starts_with(
            "VerrazzanoFleet.addons.cluster.x-k8s.io \"fleet-a\" is invalid: ["
        ));
        assert!(message.contains("spec.image: Required value"));
        assert!(message.contains("spec.clusterSelector: Required value"));
    }

    #[test]
    fn test_no_errors_is_allowed() {
        let spec = FleetBuilder::new("fleet-a", "default", "c1").with_version("1.6.0").spec();
        let errors = validate_fleet(&spec);
        assert!(ValidationResult::from_field_errors("VerrazzanoFleet", "fleet-a", &errors).allowed);
    }
}

mod version_policy_tests {
    use super::*;

    #[test]
    fn test_pinned_version_must_match_admin() {
        let spec = FleetBuilder::new("fleet-a", "default", "c1").with_version("1.6.0").spec();
        assert!(validate_fleet_version(&spec, Some("v1.6.0")).allowed);

        let result = validate_fleet_version(&spec, Some("1.7.0"));
        assert!(!result.allowed);
        assert_eq!(result.message.as_deref(), Some(INVALID_VERSION_MESSAGE));
    }

    #[test]
    fn test_unpinned_fleet_ignores_admin() {
        let spec = FleetBuilder::new("fleet-a", "default", "c1")
            .with_workload_spec(workload_spec(None))
            .spec();
        assert!(validate_fleet_version(&spec, None).allowed);
    }
}

mod defaulting_tests {
    use super::*;

    #[test]
    fn test_image_without_pull_policy_is_defaulted() {
        let fleet = FleetBuilder::new("fleet-a", "default", "c1")
            .with_image("ghcr.io/verrazzano", "v1.6.0")
            .build();
        let mut object = as_json(&fleet);
        let patch = default_pull_policy_patch(&object).unwrap().unwrap();
        json_patch::patch(&mut object, &patch).unwrap();
        assert_eq!(object["spec"]["image"]["pullPolicy"], "IfNotPresent");
    }

    #[test]
    fn test_fleet_without_image_is_untouched() {
        let fleet = FleetBuilder::new("fleet-a", "default", "c1").build();
        assert!(default_pull_policy_patch(&as_json(&fleet)).unwrap().is_none());
    }
}
