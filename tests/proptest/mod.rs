// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for projection, orphan detection and admission
//!
//! These tests use proptest to generate random fleets and updates and verify that:
//! 1. Projecting a fleet onto its own projection never asks for a write
//! 2. Orphans are exactly the bindings outside the selection
//! 3. Updates confined to allowed paths are never rejected
//! 4. A version gate miss never upgrades, whatever else differs

#[path = "../common/mod.rs"]
mod common;

use common::*;
use proptest::prelude::*;
use serde_json::{Value, json};

use verrazzano_fleet_operator::controller::{Projection, orphans, project};
use verrazzano_fleet_operator::document::Document;
use verrazzano_fleet_operator::release::ReleaseStatus;
use verrazzano_fleet_operator::release::version::{UpgradeInputs, decide_upgrade};
use verrazzano_fleet_operator::webhooks::policies::{ALLOWED_UPDATES, violations};

// =============================================================================
// Strategies
// =============================================================================

fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,10}[a-z0-9]"
}

fn version_strategy() -> impl Strategy<Value = String> {
    (0u64..3, 0u64..10, 0u64..5, any::<bool>())
        .prop_map(|(major, minor, patch, prefixed)| {
            let v = format!("{major}.{minor}.{patch}");
            if prefixed { format!("v{v}") } else { v }
        })
}

fn release_status_strategy() -> impl Strategy<Value = ReleaseStatus> {
    prop_oneof![
        Just(ReleaseStatus::Deployed),
        Just(ReleaseStatus::Failed),
        Just(ReleaseStatus::Superseded),
        Just(ReleaseStatus::Unknown),
    ]
}

/// A fleet with a random subset of its optional fields set
fn fleet_strategy() -> impl Strategy<Value = verrazzano_fleet_operator::VerrazzanoFleet> {
    (
        name_strategy(),
        name_strategy(),
        proptest::option::of((name_strategy(), version_strategy())),
        proptest::option::of(proptest::collection::vec(name_strategy(), 1..3)),
        proptest::option::of(version_strategy()),
        proptest::option::of(any::<bool>()),
    )
        .prop_map(|(name, cluster, image, secrets, version, registry)| {
            let mut builder = FleetBuilder::new(&name, "default", &cluster);
            if let Some((repo, tag)) = image {
                builder = builder.with_image(&format!("registry.example/{repo}"), &tag);
            }
            if let Some(secrets) = secrets {
                let names: Vec<&str> = secrets.iter().map(String::as_str).collect();
                builder = builder.with_pull_secrets(&names);
            }
            if let Some(version) = version {
                builder = builder.with_version(&version);
            }
            if let Some(enabled) = registry {
                builder = builder.with_private_registry(enabled);
            }
            builder.build()
        })
}

// =============================================================================
// Projection
// =============================================================================

proptest! {
    #[test]
    fn projection_is_idempotent(fleet in fleet_strategy()) {
        let cluster = cluster_ref(&fleet.spec.cluster_selector.name, "default");
        let created = match project(None, &fleet, &cluster).unwrap() {
            Some(Projection::Create(binding)) => binding,
            other => panic!("expected a new binding, got {other:?}"),
        };
        prop_assert!(project(Some(&created), &fleet, &cluster).unwrap().is_none());
    }

    #[test]
    fn projection_update_converges(old in fleet_strategy(), new in fleet_strategy()) {
        let cluster = cluster_ref("c1", "default");
        let created = match project(None, &old, &cluster).unwrap() {
            Some(Projection::Create(binding)) => binding,
            other => panic!("expected a new binding, got {other:?}"),
        };
        let updated = match project(Some(&created), &new, &cluster).unwrap() {
            None => created,
            Some(Projection::Update(binding)) => binding,
            Some(Projection::Create(_)) => panic!("existing binding recreated"),
        };
        prop_assert!(project(Some(&updated), &new, &cluster).unwrap().is_none());
        prop_assert_eq!(&updated.spec.cluster_ref, &cluster);
    }
}

// =============================================================================
// Orphans
// =============================================================================

proptest! {
    #[test]
    fn orphans_partition_bindings(
        clusters in proptest::collection::btree_set(name_strategy(), 0..6),
        selected in proptest::collection::vec(any::<bool>(), 6),
    ) {
        let clusters: Vec<String> = clusters.into_iter().collect();
        let bindings: Vec<_> = clusters
            .iter()
            .map(|name| BindingBuilder::new(name, "default").build())
            .collect();
        let selection: Vec<_> = clusters
            .iter()
            .zip(&selected)
            .filter(|(_, keep)| **keep)
            .map(|(name, _)| cluster_ref(name, "default"))
            .collect();

        let found = orphans(&selection, &bindings);
        prop_assert_eq!(found.len() + selection.len(), bindings.len());
        for binding in found {
            prop_assert!(!selection.contains(&binding.spec.cluster_ref));
        }
    }
}

// =============================================================================
// Admission
// =============================================================================

fn allowed_edit_strategy() -> impl Strategy<Value = (Vec<&'static str>, Value)> {
    let leaf = prop_oneof![
        name_strategy().prop_map(Value::String),
        any::<bool>().prop_map(Value::Bool),
        (0i64..100).prop_map(|n| json!(n)),
    ];
    prop_oneof![
        leaf.clone().prop_map(|v| (vec!["spec", "image", "tag"], v)),
        leaf.clone().prop_map(|v| (vec!["spec", "image", "repository"], v)),
        leaf.clone().prop_map(|v| (vec!["spec", "verrazzano", "spec", "profile"], v)),
        leaf.clone().prop_map(|v| (vec!["spec", "verrazzano", "spec", "components", "x"], v)),
        leaf.clone().prop_map(|v| (vec!["metadata", "labels", "team"], v)),
        leaf.prop_map(|v| (vec!["spec", "clusterSelector", "name"], v)),
    ]
}

fn set_path(target: &mut Value, path: &[&str], value: Value) {
    let mut current = target;
    for segment in &path[..path.len() - 1] {
        if !current[*segment].is_object() {
            current[*segment] = json!({});
        }
        current = &mut current[*segment];
    }
    current[path[path.len() - 1]] = value;
}

proptest! {
    #[test]
    fn allowed_edits_never_rejected(
        fleet in fleet_strategy(),
        edits in proptest::collection::vec(allowed_edit_strategy(), 1..5),
    ) {
        let old = serde_json::to_value(&fleet).unwrap();
        let mut new = old.clone();
        for (path, value) in edits {
            set_path(&mut new, &path, value);
        }
        prop_assert!(violations(&old, &new, ALLOWED_UPDATES).is_empty());
    }

    #[test]
    fn status_edits_always_rejected(fleet in fleet_strategy(), reason in name_strategy()) {
        let old = serde_json::to_value(&fleet).unwrap();
        let mut new = old.clone();
        new["status"] = json!({"phase": reason});
        prop_assert!(!violations(&old, &new, ALLOWED_UPDATES).is_empty());
    }
}

// =============================================================================
// Version gate
// =============================================================================

proptest! {
    #[test]
    fn gate_miss_never_upgrades(
        requested in version_strategy(),
        admin in version_strategy(),
        chart in version_strategy(),
        status in release_status_strategy(),
        changed_values in any::<bool>(),
    ) {
        let requested_core = requested.trim_start_matches('v');
        prop_assume!(requested_core != admin.trim_start_matches('v'));

        let installed = release(&chart, status, Document::object());
        let values = if changed_values {
            Document::new(json!({"image": "other"}))
        } else {
            Document::object()
        };
        let decision = decide_upgrade(&UpgradeInputs {
            requested_version: Some(&requested),
            admin_version: Some(&admin),
            observed_version: None,
            installed: &installed,
            requested_chart_version: "9.9.9",
            values: &values,
        })
        .unwrap();
        prop_assert!(!decision.should_upgrade());
    }

    #[test]
    fn failed_release_upgrades_when_gate_passes(version in version_strategy()) {
        let core = version.trim_start_matches('v').to_string();
        let installed = release(&core, ReleaseStatus::Failed, Document::object());
        let values = Document::object();
        let decision = decide_upgrade(&UpgradeInputs {
            requested_version: Some(&version),
            admin_version: Some(&core),
            observed_version: None,
            installed: &installed,
            requested_chart_version: &core,
            values: &values,
        })
        .unwrap();
        prop_assert!(decision.should_upgrade());
    }
}
