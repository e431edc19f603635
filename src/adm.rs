//! C4 — ADM Generator: turns one catalogued ARM into one Aggregate
//! Delegation Model graph per distinct delegation id.
//!
//! Grounded in `original_source/fim/graph/resources/neo4j_arm.py`'s
//! `generate_adms`: collect the definite keep-set for each delegation id
//! (the union of `defined_for`/`defined_on` across both pool kinds and
//! both singleton-delegation kinds), close it under pairwise shortest
//! paths so hierarchical ancestors survive, clone the ARM under a fresh
//! graph id, then prune every node outside the closure.

use indexmap::IndexSet;
use itertools::Itertools;
use uuid::Uuid;

use crate::catalog;
use crate::error::{Result, SingleTestbedError};
use crate::graph::GraphStore;
use crate::model::fields;
use crate::options::AdmGenerationOptions;

/// One generated delegation model: the delegation id it was derived from,
/// and the graph id of the pruned clone holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adm {
    pub delegation_id: String,
    pub graph_id: String,
}

/// Derives one ADM per distinct delegation id found while cataloguing
/// `arm_graph_id`.
///
/// Fails with `EmptyArm` if the ARM has no vertices at all, and with
/// `NoDelegations` if cataloguing finds not a single pool or singleton
/// delegation — both preconditions are checked before any graph is
/// cloned, matching `generate_adms`' early exits.
pub fn generate_adms(store: &mut dyn GraphStore, arm_graph_id: &str) -> Result<Vec<Adm>> {
    generate_adms_with_options(store, arm_graph_id, &AdmGenerationOptions::default())
}

/// Like [`generate_adms`], but threads `options` through to
/// [`catalog::catalog_with_options`] — under `options.strict == false`, a
/// malformed pool is dropped rather than aborting derivation entirely.
pub fn generate_adms_with_options(
    store: &mut dyn GraphStore,
    arm_graph_id: &str,
    options: &AdmGenerationOptions,
) -> Result<Vec<Adm>> {
    let node_ids = store.list_nodes(arm_graph_id)?;
    if node_ids.is_empty() {
        return Err(SingleTestbedError::EmptyArm {
            graph_id: arm_graph_id.to_owned(),
        }
        .into());
    }

    let catalog = catalog::catalog_with_options(&*store, arm_graph_id, options)?;
    let delegation_ids = catalog.all_delegation_ids();
    if delegation_ids.is_empty() {
        return Err(SingleTestbedError::NoDelegations {
            graph_id: arm_graph_id.to_owned(),
        }
        .into());
    }
    tracing::debug!(arm_graph_id, delegation_count = delegation_ids.len(), "generating ADMs");

    let mut adms = Vec::new();
    for delegation_id in &delegation_ids {
        let keep_nodes = close_under_shortest_paths(&*store, arm_graph_id, catalog.node_ids_for(delegation_id))?;

        let adm_graph_id = Uuid::new_v4().to_string();
        store.clone_graph(arm_graph_id, &adm_graph_id)?;

        for node_id in store.list_nodes(&adm_graph_id)? {
            if !keep_nodes.contains(&node_id) {
                store.remove_node(&adm_graph_id, &node_id)?;
            }
        }

        tag_provenance(store, &adm_graph_id, &adm_graph_id)?;
        tracing::debug!(%delegation_id, %adm_graph_id, kept = keep_nodes.len(), "derived ADM");

        adms.push(Adm {
            delegation_id: delegation_id.clone(),
            graph_id: adm_graph_id,
        });
    }
    Ok(adms)
}

/// Stamps every vertex of a freshly cloned-and-pruned ADM with its
/// provenance: `adm_graph_ids = [graph_id]` (spec.md §4.4 step 5). A fresh
/// ADM has exactly one contributing graph id, unlike a CBM vertex, whose
/// provenance set grows as more ADMs are merged in.
fn tag_provenance(store: &mut dyn GraphStore, graph_id: &str, provenance_graph_id: &str) -> Result<()> {
    for node_id in store.list_nodes(graph_id)? {
        let (_, mut props) = store.node_props(graph_id, &node_id)?;
        let tagged = serde_json::to_string(&[provenance_graph_id]).expect("string array serializes");
        props.insert(fields::ADM_GRAPH_IDS.to_owned(), tagged);
        store.update_node_props(graph_id, &node_id, props)?;
    }
    Ok(())
}

/// Extends `keep_nodes` with every vertex lying on a shortest path between
/// any two of its members, so structural ancestors (switches, network
/// services) that nothing delegated directly still survive pruning.
///
/// `itertools::Itertools::combinations` mirrors `generate_adms`' own
/// `itertools.combinations(keep_nodes, 2)` pairwise enumeration.
fn close_under_shortest_paths(
    store: &dyn GraphStore,
    graph_id: &str,
    mut keep_nodes: IndexSet<String>,
) -> Result<IndexSet<String>> {
    let mut ordered: Vec<&String> = keep_nodes.iter().collect();
    ordered.sort();

    let mut closure = IndexSet::new();
    for pair in ordered.into_iter().combinations(2) {
        let [a, z] = pair[..] else { unreachable!("combinations(2) yields pairs") };
        closure.extend(store.shortest_path(graph_id, a, z)?);
    }
    keep_nodes.extend(closure);
    Ok(keep_nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryGraphStore;
    use crate::model::{NodeClass, PropertyMap, RelationKind};

    fn props(pairs: &[(&str, &str)]) -> PropertyMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    /// S4 — single delegation over a hierarchical substrate pulls in the
    /// intermediate switch even though nothing delegates it directly.
    #[test]
    fn single_delegation_pulls_in_path_ancestors() {
        let mut store = InMemoryGraphStore::new();
        store
            .add_node(
                "arm",
                "site-a",
                NodeClass::NetworkNode,
                props(&[("capacity_delegations", r#"{"delegation":"d1","core":4}"#)]),
            )
            .unwrap();
        store
            .add_node("arm", "switch", NodeClass::SwitchFabric, PropertyMap::new())
            .unwrap();
        store
            .add_node(
                "arm",
                "site-b",
                NodeClass::NetworkNode,
                props(&[("capacity_delegations", r#"{"delegation":"d1","core":8}"#)]),
            )
            .unwrap();
        store
            .add_edge("arm", "site-a", "switch", RelationKind::Connects, PropertyMap::new())
            .unwrap();
        store
            .add_edge("arm", "switch", "site-b", RelationKind::Connects, PropertyMap::new())
            .unwrap();

        let adms = generate_adms(&mut store, "arm").unwrap();
        assert_eq!(adms.len(), 1);
        assert_eq!(adms[0].delegation_id, "d1");

        let mut kept = store.list_nodes(&adms[0].graph_id).unwrap();
        kept.sort();
        assert_eq!(kept, vec!["site-a", "site-b", "switch"]);
    }

    #[test]
    fn two_delegation_ids_produce_two_adms() {
        let mut store = InMemoryGraphStore::new();
        store
            .add_node(
                "arm",
                "a",
                NodeClass::NetworkNode,
                props(&[("capacity_delegations", r#"{"delegation":"d1","core":4}"#)]),
            )
            .unwrap();
        store
            .add_node(
                "arm",
                "b",
                NodeClass::NetworkNode,
                props(&[("capacity_delegations", r#"{"delegation":"d2","core":4}"#)]),
            )
            .unwrap();

        let adms = generate_adms(&mut store, "arm").unwrap();
        let mut ids: Vec<&str> = adms.iter().map(|a| a.delegation_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["d1", "d2"]);
        // graph ids are distinct uuids
        assert_ne!(adms[0].graph_id, adms[1].graph_id);
    }

    #[test]
    fn empty_arm_is_rejected() {
        let mut store = InMemoryGraphStore::new();
        store
            .add_node("arm", "transient", NodeClass::NetworkNode, PropertyMap::new())
            .unwrap();
        store.remove_node("arm", "transient").unwrap();
        let err = generate_adms(&mut store, "arm").unwrap_err();
        assert!(matches!(err.errors()[0], SingleTestbedError::EmptyArm { .. }));
    }

    #[test]
    fn arm_with_no_delegations_is_rejected() {
        let mut store = InMemoryGraphStore::new();
        store
            .add_node("arm", "lonely", NodeClass::NetworkNode, PropertyMap::new())
            .unwrap();
        let err = generate_adms(&mut store, "arm").unwrap_err();
        assert!(matches!(err.errors()[0], SingleTestbedError::NoDelegations { .. }));
    }
}
