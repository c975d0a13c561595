//! Unit tests for finding bindings a fleet no longer selects

use crate::common::*;
use kube::ResourceExt;
use verrazzano_fleet_operator::controller::orphans;

#[test]
fn test_selected_cluster_is_kept() {
    let bindings = vec![BindingBuilder::new("c1", "default").build()];
    assert!(orphans(&[cluster_ref("c1", "default")], &bindings).is_empty());
}

#[test]
fn test_deselected_cluster_is_orphaned() {
    let bindings = vec![
        BindingBuilder::new("c1", "default").build(),
        BindingBuilder::new("c2", "default").build(),
    ];
    let names: Vec<String> = orphans(&[cluster_ref("c2", "default")], &bindings)
        .into_iter()
        .map(|b| b.name_any())
        .collect();
    assert_eq!(names, vec!["c1"]);
}

#[test]
fn test_same_name_other_namespace_is_orphaned() {
    let bindings = vec![
        BindingBuilder::new("c1", "default")
            .for_cluster(cluster_ref("c1", "staging"))
            .build(),
    ];
    assert_eq!(orphans(&[cluster_ref("c1", "default")], &bindings).len(), 1);
}

#[test]
fn test_nothing_selected_orphans_everything() {
    let bindings = vec![
        BindingBuilder::new("c1", "default").build(),
        BindingBuilder::new("c2", "default").build(),
    ];
    assert_eq!(orphans(&[], &bindings).len(), 2);
    assert!(orphans(&[], &[]).is_empty());
}
