//! C5 — Combined Broker Model: merges Aggregate Delegation Models from many
//! sites into one union graph with per-vertex provenance, and answers
//! substrate-matching queries against it.
//!
//! Grounded in spec.md §4.5 directly (no analogous merge/query layer
//! exists in the original Python sources read for this crate); the
//! bipartite-matching routine behind `nodes_matching`'s SR-IOV rule is a
//! standard Kuhn's-algorithm augmenting-path search, the natural idiom for
//! "some assignment satisfies all requests simultaneously" once the
//! sharing rule rules out a simpler per-kind count check.

use std::collections::BTreeSet;

use crate::adm::Adm;
use crate::error::{Result, SingleTestbedError};
use crate::graph::GraphStore;
use crate::model::{fields, ComponentRequest, ComponentType, NodeClass, PropertyMap, RelationKind};

/// Resolution policy for a capacity/label property that two merged ADMs
/// disagree on for the same physical vertex (spec.md §9 Open Questions).
///
/// `Strict` is the default: a CBM is a queryable substrate view and a
/// silent overwrite would make matching queries depend on merge order.
/// `LastWriterWins` is available for callers that intentionally want the
/// most-recently-merged ADM to win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    #[default]
    Strict,
    LastWriterWins,
}

/// A single accumulating CBM graph, identified by its own `graph_id` in
/// the backing store.
#[derive(Debug, Clone)]
pub struct Cbm {
    graph_id: String,
}

impl Cbm {
    pub fn new(graph_id: impl Into<String>) -> Self {
        Self {
            graph_id: graph_id.into(),
        }
    }

    pub fn graph_id(&self) -> &str {
        &self.graph_id
    }

    /// Idempotent union of `adm` into this CBM (spec.md §4.5 `merge_adm`).
    pub fn merge_adm(&self, store: &mut dyn GraphStore, adm: &Adm, policy: MergePolicy) -> Result<()> {
        for node_id in store.list_nodes(&adm.graph_id)? {
            let (class, mut incoming_props) = store.node_props(&adm.graph_id, &node_id)?;
            incoming_props.remove(fields::ADM_GRAPH_IDS);

            match store.node_props(&self.graph_id, &node_id) {
                Ok((_, existing_props)) => {
                    let mut provenance = parse_adm_ids(existing_props.get(fields::ADM_GRAPH_IDS));
                    provenance.insert(adm.graph_id.clone());
                    let mut merged =
                        merge_scalar_props(&node_id, &adm.graph_id, existing_props, incoming_props, policy)?;
                    merged.insert(fields::ADM_GRAPH_IDS.to_owned(), serialize_ids(&provenance));
                    store.update_node_props(&self.graph_id, &node_id, merged)?;
                }
                Err(_) => {
                    let mut props = incoming_props;
                    let mut provenance = BTreeSet::new();
                    provenance.insert(adm.graph_id.clone());
                    props.insert(fields::ADM_GRAPH_IDS.to_owned(), serialize_ids(&provenance));
                    store.add_node(&self.graph_id, &node_id, class, props)?;
                }
            }
        }

        for (a, b, rel, props) in store.list_edges(&adm.graph_id)? {
            store.add_edge(&self.graph_id, &a, &b, rel, props)?;
        }
        Ok(())
    }

    /// Removes `adm_graph_id` from every vertex's provenance set, deleting
    /// any vertex whose provenance becomes empty (spec.md §4.5 `unmerge_adm`).
    pub fn unmerge_adm(&self, store: &mut dyn GraphStore, adm_graph_id: &str) -> Result<()> {
        for node_id in store.list_nodes(&self.graph_id)? {
            let (_, mut props) = store.node_props(&self.graph_id, &node_id)?;
            let mut provenance = parse_adm_ids(props.get(fields::ADM_GRAPH_IDS));
            if !provenance.remove(adm_graph_id) {
                continue;
            }
            if provenance.is_empty() {
                store.remove_node(&self.graph_id, &node_id)?;
            } else {
                props.insert(fields::ADM_GRAPH_IDS.to_owned(), serialize_ids(&provenance));
                store.update_node_props(&self.graph_id, &node_id, props)?;
            }
        }
        Ok(())
    }

    /// `NetworkNode` vertices whose scalar properties satisfy `properties`
    /// and whose `Component` children admit some assignment satisfying
    /// every entry of `required_components`.
    pub fn nodes_matching(
        &self,
        store: &dyn GraphStore,
        properties: &PropertyMap,
        required_components: &[ComponentRequest],
    ) -> Result<Vec<String>> {
        let mut node_ids = store.list_nodes(&self.graph_id)?;
        node_ids.sort();

        let mut matches = Vec::new();
        for node_id in node_ids {
            let (class, props) = store.node_props(&self.graph_id, &node_id)?;
            if class != NodeClass::NetworkNode {
                continue;
            }
            if !properties.iter().all(|(k, v)| props.get(k) == Some(v)) {
                continue;
            }
            let components = component_children(store, &self.graph_id, &node_id)?;
            if satisfies(&components, required_components) {
                matches.push(node_id);
            }
        }
        Ok(matches)
    }

    /// Every `Link` vertex whose two `connects` endpoints are owned by
    /// switches/network nodes with differing `Site` properties (spec.md
    /// §4.5 `intersite_links`). A `Link`'s immediate neighbor is typically
    /// a `ConnectionPoint`, which carries no `Site` of its own — the site
    /// lives on the nearest ancestor up the `has` hierarchy
    /// (`ConnectionPoint -> SwitchFabric -> NetworkNode`), so each
    /// endpoint is walked up to the nearest ancestor that actually has one.
    pub fn intersite_links(&self, store: &dyn GraphStore) -> Result<Vec<(String, String, String)>> {
        let edges = store.list_edges(&self.graph_id)?;
        let mut node_ids = store.list_nodes(&self.graph_id)?;
        node_ids.sort();

        let mut out = Vec::new();
        for node_id in node_ids {
            let (class, _) = store.node_props(&self.graph_id, &node_id)?;
            if class != NodeClass::Link {
                continue;
            }
            let mut endpoints: Vec<String> = edges
                .iter()
                .filter(|(a, b, rel, _)| *rel == RelationKind::Connects && (*a == node_id || *b == node_id))
                .map(|(a, b, _, _)| if *a == node_id { b.clone() } else { a.clone() })
                .collect();
            endpoints.sort();
            endpoints.dedup();
            let (endpoint_a, endpoint_z) = match endpoints.as_slice() {
                [a, z] => (a, z),
                _ => continue,
            };

            let site_a = site_of_nearest_ancestor(store, &self.graph_id, &edges, endpoint_a)?;
            let site_z = site_of_nearest_ancestor(store, &self.graph_id, &edges, endpoint_z)?;
            if let (Some(sa), Some(sz)) = (site_a, site_z) {
                if sa != sz {
                    out.push((endpoint_a.clone(), node_id.clone(), endpoint_z.clone()));
                }
            }
        }
        Ok(out)
    }

    /// Nodes on a shortest `a -> z` path that visits every id in `hops`, in
    /// order, stitched segment by segment. Empty if any segment has no
    /// path, or if the stitched path would exceed `cutoff` edges.
    pub fn path_with_hops(
        &self,
        store: &dyn GraphStore,
        a: &str,
        z: &str,
        hops: &[String],
        cutoff: Option<usize>,
    ) -> Result<Vec<String>> {
        let mut waypoints = Vec::with_capacity(hops.len() + 2);
        waypoints.push(a.to_owned());
        waypoints.extend(hops.iter().cloned());
        waypoints.push(z.to_owned());

        let mut path: Vec<String> = Vec::new();
        for pair in waypoints.windows(2) {
            let segment = store.shortest_path(&self.graph_id, &pair[0], &pair[1])?;
            if segment.is_empty() {
                return Ok(Vec::new());
            }
            if path.is_empty() {
                path.extend(segment);
            } else {
                path.extend(segment.into_iter().skip(1));
            }
        }

        if let Some(cutoff) = cutoff {
            if path.len().saturating_sub(1) > cutoff {
                return Ok(Vec::new());
            }
        }
        Ok(path)
    }
}

fn parse_adm_ids(raw: Option<&String>) -> BTreeSet<String> {
    raw.and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .unwrap_or_default()
        .into_iter()
        .collect()
}

fn serialize_ids(ids: &BTreeSet<String>) -> String {
    let ordered: Vec<&String> = ids.iter().collect();
    serde_json::to_string(&ordered).expect("string array serializes")
}

fn merge_scalar_props(
    node_id: &str,
    adm_graph_id: &str,
    existing: PropertyMap,
    incoming: PropertyMap,
    policy: MergePolicy,
) -> Result<PropertyMap> {
    let mut merged = existing;
    for (key, incoming_value) in incoming {
        match merged.get(&key) {
            Some(existing_value) if *existing_value != incoming_value => match policy {
                MergePolicy::Strict => {
                    tracing::warn!(node_id, %key, %existing_value, %incoming_value, "conflicting merge under strict policy");
                    return Err(SingleTestbedError::ConflictingMerge {
                        adm_graph_id: adm_graph_id.to_owned(),
                        node_id: node_id.to_owned(),
                        property: key,
                        existing: existing_value.clone(),
                        incoming: incoming_value,
                    }
                    .into())
                }
                MergePolicy::LastWriterWins => {
                    tracing::debug!(node_id, %key, %existing_value, %incoming_value, "last-writer-wins overwrite");
                    merged.insert(key, incoming_value);
                }
            },
            _ => {
                merged.insert(key, incoming_value);
            }
        }
    }
    Ok(merged)
}

/// Walks `node_id` up the reverse `has` hierarchy (`ConnectionPoint ->
/// SwitchFabric -> NetworkNode`, the mirror of `component_children`'s
/// forward walk) until it finds a vertex carrying a `Site` property, or
/// runs out of parents.
fn site_of_nearest_ancestor(
    store: &dyn GraphStore,
    graph_id: &str,
    edges: &[(String, String, RelationKind, PropertyMap)],
    node_id: &str,
) -> Result<Option<String>> {
    let mut current = node_id.to_owned();
    loop {
        let (_, props) = store.node_props(graph_id, &current)?;
        if let Some(site) = props.get(fields::SITE) {
            return Ok(Some(site.clone()));
        }
        let parent = edges
            .iter()
            .find(|(_, child, rel, _)| child == &current && *rel == RelationKind::Has)
            .map(|(parent, _, _, _)| parent.clone());
        match parent {
            Some(parent) => current = parent,
            None => return Ok(None),
        }
    }
}

fn component_children(
    store: &dyn GraphStore,
    graph_id: &str,
    host: &str,
) -> Result<Vec<(ComponentType, Option<String>)>> {
    let mut out = Vec::new();
    for (a, b, rel, _) in store.list_edges(graph_id)? {
        if a != host || rel != RelationKind::Has {
            continue;
        }
        let (class, props) = store.node_props(graph_id, &b)?;
        if class != NodeClass::Component {
            continue;
        }
        let Some(resource_type) = props.get(fields::RESOURCE_TYPE) else {
            continue;
        };
        let Ok(resource_type) = resource_type.parse::<ComponentType>() else {
            continue;
        };
        out.push((resource_type, props.get(fields::RESOURCE_MODEL).cloned()));
    }
    Ok(out)
}

fn model_matches(component_model: &Option<String>, requested: &Option<String>) -> bool {
    match requested {
        None => true,
        Some(requested) => component_model.as_deref() == Some(requested.as_str()),
    }
}

/// `true` if some assignment of `requests` to `components` satisfies every
/// request: shareable kinds (`SharedNIC`) only need one matching physical
/// device no matter how many requests name it; every other kind needs a
/// distinct physical device per request, found by maximum bipartite
/// matching.
fn satisfies(components: &[(ComponentType, Option<String>)], requests: &[ComponentRequest]) -> bool {
    let mut seen_shareable: std::collections::HashSet<(ComponentType, Option<String>)> = std::collections::HashSet::new();
    let mut exclusive_requests = Vec::new();

    for request in requests {
        if request.resource_type.is_shareable() {
            let key = (request.resource_type, request.resource_model.clone());
            if seen_shareable.insert(key.clone()) {
                let available = components
                    .iter()
                    .any(|(ct, model)| *ct == key.0 && model_matches(model, &key.1));
                if !available {
                    return false;
                }
            }
        } else {
            exclusive_requests.push(request);
        }
    }

    if exclusive_requests.is_empty() {
        return true;
    }

    let exclusive_components: Vec<&(ComponentType, Option<String>)> =
        components.iter().filter(|(ct, _)| !ct.is_shareable()).collect();
    bipartite_match(&exclusive_requests, &exclusive_components)
}

fn bipartite_match(requests: &[&ComponentRequest], components: &[&(ComponentType, Option<String>)]) -> bool {
    let adjacency: Vec<Vec<usize>> = requests
        .iter()
        .map(|request| {
            components
                .iter()
                .enumerate()
                .filter(|(_, (ct, model))| *ct == request.resource_type && model_matches(model, &request.resource_model))
                .map(|(idx, _)| idx)
                .collect()
        })
        .collect();

    let mut assigned_to: Vec<Option<usize>> = vec![None; components.len()];
    let mut matched = 0;
    for request_idx in 0..requests.len() {
        let mut visited = vec![false; components.len()];
        if augment(request_idx, &adjacency, &mut visited, &mut assigned_to) {
            matched += 1;
        }
    }
    matched == requests.len()
}

fn augment(
    request_idx: usize,
    adjacency: &[Vec<usize>],
    visited: &mut [bool],
    assigned_to: &mut [Option<usize>],
) -> bool {
    for &component_idx in &adjacency[request_idx] {
        if visited[component_idx] {
            continue;
        }
        visited[component_idx] = true;
        let free = match assigned_to[component_idx] {
            None => true,
            Some(other_request) => augment(other_request, adjacency, visited, assigned_to),
        };
        if free {
            assigned_to[component_idx] = Some(request_idx);
            return true;
        }
    }
    false
}
