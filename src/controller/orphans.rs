//! Bindings whose cluster is no longer selected by their fleet

use std::collections::BTreeSet;

use crate::crd::{ClusterReference, VerrazzanoFleetBinding};

/// Bindings whose `clusterRef` is not among `selected`, in input order
pub fn orphans<'a>(
    selected: &[ClusterReference],
    bindings: &'a [VerrazzanoFleetBinding],
) -> Vec<&'a VerrazzanoFleetBinding> {
    let keys: BTreeSet<String> = selected.iter().map(ClusterReference::key).collect();
    bindings
        .iter()
        .filter(|binding| !keys.contains(&binding.spec.cluster_ref.key()))
        .collect()
}
