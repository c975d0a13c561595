//! Unit tests for projecting a fleet onto its binding

use crate::common::*;
use kube::ResourceExt;
use verrazzano_fleet_operator::controller::projection::{
    binding_labels, binding_selector, fleet_selector,
};
use verrazzano_fleet_operator::controller::{
    FleetField, Projection, changed_fields, project, should_reinstall,
};
use verrazzano_fleet_operator::crd::{CLUSTER_NAME_LABEL, FLEET_NAME_LABEL};

fn expect_create(projection: Option<Projection>) -> verrazzano_fleet_operator::VerrazzanoFleetBinding {
    match projection {
        Some(Projection::Create(binding)) => binding,
        other => panic!("expected a new binding, got {other:?}"),
    }
}

mod create_tests {
    use super::*;

    #[test]
    fn test_binding_named_after_cluster() {
        let fleet = FleetBuilder::new("fleet-a", "default", "c1").build();
        let binding = expect_create(project(None, &fleet, &cluster_ref("c1", "default")).unwrap());

        assert_eq!(binding.name_any(), "c1");
        assert_eq!(binding.namespace().as_deref(), Some("default"));
        assert_eq!(binding.spec.cluster_ref, cluster_ref("c1", "default"));
    }

    #[test]
    fn test_binding_labels() {
        let mut fleet = FleetBuilder::new("fleet-a", "default", "c1").build();
        fleet
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert("team".to_string(), "platform".to_string());

        let binding = expect_create(project(None, &fleet, &cluster_ref("c1", "default")).unwrap());
        let labels = binding.labels();
        assert_eq!(labels.get(CLUSTER_NAME_LABEL).map(String::as_str), Some("c1"));
        assert_eq!(labels.get(FLEET_NAME_LABEL).map(String::as_str), Some("fleet-a"));
        assert_eq!(labels.get("team").map(String::as_str), Some("platform"));
    }

    #[test]
    fn test_binding_controlled_by_fleet() {
        let fleet = FleetBuilder::new("fleet-a", "default", "c1").build();
        let binding = expect_create(project(None, &fleet, &cluster_ref("c1", "default")).unwrap());

        let owners = binding.owner_references();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "VerrazzanoFleet");
        assert_eq!(owners[0].name, "fleet-a");
        assert_eq!(owners[0].uid, TEST_UID);
        assert_eq!(owners[0].controller, Some(true));
    }

    #[test]
    fn test_fleet_fields_copied() {
        let fleet = FleetBuilder::new("fleet-a", "default", "c1")
            .with_image("ghcr.io/verrazzano", "v1.6.0")
            .with_pull_secrets(&["regcred"])
            .with_version("1.6.0")
            .with_private_registry(true)
            .build();
        let binding = expect_create(project(None, &fleet, &cluster_ref("c1", "default")).unwrap());

        assert_eq!(binding.spec.image, fleet.spec.image);
        assert_eq!(binding.spec.image_pull_secrets, fleet.spec.image_pull_secrets);
        assert_eq!(binding.spec.verrazzano, fleet.spec.verrazzano);
        assert_eq!(binding.spec.private_registry, fleet.spec.private_registry);
    }

    #[test]
    fn test_fleet_without_uid_is_an_error() {
        let mut fleet = FleetBuilder::new("fleet-a", "default", "c1").build();
        fleet.metadata.uid = None;
        assert!(project(None, &fleet, &cluster_ref("c1", "default")).is_err());
    }
}

mod update_tests {
    use super::*;

    #[test]
    fn test_matching_binding_needs_no_write() {
        let fleet = FleetBuilder::new("fleet-a", "default", "c1")
            .with_image("ghcr.io/verrazzano", "v1.6.0")
            .with_version("1.6.0")
            .build();
        let existing = expect_create(project(None, &fleet, &cluster_ref("c1", "default")).unwrap());
        assert!(project(Some(&existing), &fleet, &cluster_ref("c1", "default")).unwrap().is_none());
    }

    #[test]
    fn test_changed_version_updates_binding() {
        let fleet = FleetBuilder::new("fleet-a", "default", "c1").with_version("1.6.0").build();
        let existing = BindingBuilder::new("c1", "default").with_version("1.5.2").build();

        assert_eq!(changed_fields(&existing.spec, &fleet), vec![FleetField::Verrazzano]);
        match project(Some(&existing), &fleet, &cluster_ref("c1", "default")).unwrap() {
            Some(Projection::Update(updated)) => {
                assert_eq!(updated.spec.verrazzano, fleet.spec.verrazzano);
                assert_eq!(updated.name_any(), "c1");
            }
            other => panic!("expected an update, got {other:?}"),
        }
    }

    #[test]
    fn test_unset_fleet_fields_never_clear_binding() {
        let fleet = FleetBuilder::new("fleet-a", "default", "c1").with_version("1.6.0").build();
        let existing = BindingBuilder::new("c1", "default")
            .with_version("1.6.0")
            .with_image(Some("docker.io/acme"), Some("v1"))
            .with_private_registry(false)
            .build();

        assert!(changed_fields(&existing.spec, &fleet).is_empty());
        assert!(project(Some(&existing), &fleet, &cluster_ref("c1", "default")).unwrap().is_none());
    }

    #[test]
    fn test_every_changed_field_is_reported() {
        let fleet = FleetBuilder::new("fleet-a", "default", "c1")
            .with_image("ghcr.io/verrazzano", "v1.6.0")
            .with_pull_secrets(&["regcred"])
            .with_private_registry(true)
            .build();
        let existing = BindingBuilder::new("c1", "default").build();

        assert_eq!(
            changed_fields(&existing.spec, &fleet),
            vec![
                FleetField::Image,
                FleetField::ImagePullSecrets,
                FleetField::PrivateRegistry
            ]
        );
    }
}

mod reinstall_tests {
    use super::*;

    #[test]
    fn test_repository_change_needs_reinstall() {
        let fleet = FleetBuilder::new("fleet-a", "default", "c1")
            .with_image("docker.io", "v1.6.0")
            .with_version("1.6.0")
            .build();
        let binding = BindingBuilder::new("c1", "default")
            .with_image(Some("ghcr.io"), Some("v1.6.0"))
            .with_version("1.6.0")
            .spec();

        assert!(should_reinstall(&binding, &fleet));
        assert_eq!(changed_fields(&binding, &fleet), vec![FleetField::Image]);
    }

    #[test]
    fn test_identical_fields_need_nothing() {
        let fleet = FleetBuilder::new("fleet-a", "default", "c1")
            .with_image("ghcr.io", "v1.6.0")
            .with_pull_secrets(&["regcred"])
            .with_version("1.6.0")
            .build();
        let mut binding = BindingBuilder::new("c1", "default")
            .with_image(Some("ghcr.io"), Some("v1.6.0"))
            .with_version("1.6.0")
            .spec();
        binding.image_pull_secrets = fleet.spec.image_pull_secrets.clone();

        assert!(!should_reinstall(&binding, &fleet));
    }
}

mod selector_tests {
    use super::*;

    #[test]
    fn test_selectors_match_labels() {
        let labels = binding_labels("fleet-a", "c1");
        let selector = binding_selector("fleet-a", "c1");
        for (key, value) in &labels {
            assert!(selector.contains(&format!("{key}={value}")));
        }
        assert_eq!(fleet_selector("fleet-a"), format!("{FLEET_NAME_LABEL}=fleet-a"));
    }
}
