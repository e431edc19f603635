//! C3 — ARM Catalog: walks an ARM graph, parses delegation annotations on
//! every node, populates the pool/delegation indices of C2.
//!
//! Grounded in `original_source/fim/graph/resources/neo4j_arm.py`'s
//! `_catalog_delegations`/`_process_single_delegation`: two-phase
//! population (accumulate while walking, validate once at the end) so
//! that a pool mentioned before its definition still resolves.

use serde_json::Value;

use crate::delegation::{
    details_without_delegation_field, Delegation, DelegationKind, Delegations, Pools,
};
use crate::error::{Result, SingleTestbedError, TestbedModelError};
use crate::graph::GraphStore;
use crate::model::{fields, is_present, PropertyMap};
use crate::options::AdmGenerationOptions;

/// The populated, validated catalog of a single ARM: pools and singleton
/// delegations for both the label and capacity kinds, plus a cache of
/// every node's raw properties collected while walking (supplemental:
/// avoids a second store round-trip for callers like `nodes_matching`).
#[derive(Debug, Default)]
pub struct ArmCatalog {
    label_pools: Pools,
    capacity_pools: Pools,
    label_delegations: Delegations,
    capacity_delegations: Delegations,
    node_props: indexmap::IndexMap<String, PropertyMap>,
}

impl ArmCatalog {
    pub fn pools(&self, kind: DelegationKind) -> &Pools {
        match kind {
            DelegationKind::Label => &self.label_pools,
            DelegationKind::Capacity => &self.capacity_pools,
        }
    }

    fn pools_mut(&mut self, kind: DelegationKind) -> &mut Pools {
        match kind {
            DelegationKind::Label => &mut self.label_pools,
            DelegationKind::Capacity => &mut self.capacity_pools,
        }
    }

    pub fn delegations(&self, kind: DelegationKind) -> &Delegations {
        match kind {
            DelegationKind::Label => &self.label_delegations,
            DelegationKind::Capacity => &self.capacity_delegations,
        }
    }

    fn delegations_mut(&mut self, kind: DelegationKind) -> &mut Delegations {
        match kind {
            DelegationKind::Label => &mut self.label_delegations,
            DelegationKind::Capacity => &mut self.capacity_delegations,
        }
    }

    pub fn node_properties(&self, node_id: &str) -> Option<&PropertyMap> {
        self.node_props.get(node_id)
    }

    /// All delegation ids contributed by either kind, across pools and
    /// singleton delegations (spec.md §4.4 step 1).
    pub fn all_delegation_ids(&self) -> indexmap::IndexSet<String> {
        self.label_pools
            .delegation_ids()
            .chain(self.capacity_pools.delegation_ids())
            .chain(self.label_delegations.delegation_ids())
            .chain(self.capacity_delegations.delegation_ids())
            .map(str::to_owned)
            .collect()
    }

    /// Union, for `delegation_id`, of `defined_for` over both pool kinds
    /// and `defined_on` over both singleton-delegation kinds.
    pub fn node_ids_for(&self, delegation_id: &str) -> indexmap::IndexSet<String> {
        let mut ids = self.label_pools.node_ids_for(delegation_id);
        ids.extend(self.capacity_pools.node_ids_for(delegation_id));
        ids.extend(self.label_delegations.node_ids_for(delegation_id));
        ids.extend(self.capacity_delegations.node_ids_for(delegation_id));
        ids
    }

    fn property_name(kind: DelegationKind) -> &'static str {
        match kind {
            DelegationKind::Label => fields::LABEL_DELEGATIONS,
            DelegationKind::Capacity => fields::CAPACITY_DELEGATIONS,
        }
    }

    fn pool_field_name(kind: DelegationKind) -> &'static str {
        match kind {
            DelegationKind::Label => fields::LABEL_POOL,
            DelegationKind::Capacity => fields::CAPACITY_POOL,
        }
    }
}

/// Walks every vertex of `graph_id` in `store`, classifying each
/// delegation annotation as a pool definition, pool mention, or singleton
/// delegation, then builds the label/capacity indices.
///
/// Errors accumulate: every vertex is inspected before the first error is
/// returned, so a caller sees every malformed annotation from one pass
/// (spec.md §7's "catalog errors are raised at build_index time"). Walk
/// order does not affect the result — forward references to
/// not-yet-defined pools resolve once the whole ARM has been seen.
pub fn catalog(store: &dyn GraphStore, graph_id: &str) -> Result<ArmCatalog> {
    catalog_with_options(store, graph_id, &AdmGenerationOptions::default())
}

/// Like [`catalog`], but under `options.strict == false` a malformed pool
/// is dropped (with a `tracing::warn!`) instead of failing the whole
/// catalog. Malformed JSON/annotation shapes still always abort the walk
/// immediately — there is no well-formed delegation to fall back to.
pub fn catalog_with_options(
    store: &dyn GraphStore,
    graph_id: &str,
    options: &AdmGenerationOptions,
) -> Result<ArmCatalog> {
    let mut catalog = ArmCatalog::default();
    let mut errors: Vec<SingleTestbedError> = Vec::new();

    let mut node_ids = store.list_nodes(graph_id)?;
    node_ids.sort();
    tracing::debug!(graph_id, node_count = node_ids.len(), "cataloguing ARM");

    for node_id in &node_ids {
        let (_, props) = store.node_props(graph_id, node_id)?;
        catalog.node_props.insert(node_id.clone(), props.clone());

        for kind in [DelegationKind::Label, DelegationKind::Capacity] {
            let prop_name = ArmCatalog::property_name(kind);
            let Some(raw) = props.get(prop_name) else {
                continue;
            };
            if !is_present(Some(raw.as_str())) {
                continue;
            }
            if let Err(e) = process_node_property(&mut catalog, kind, node_id, raw) {
                errors.extend(e.errors().iter().cloned());
            }
        }
    }

    if !errors.is_empty() {
        return Err(TestbedModelError::Many(errors));
    }

    for kind in [DelegationKind::Label, DelegationKind::Capacity] {
        if options.strict {
            catalog.pools_mut(kind).build_index()?;
        } else {
            catalog.pools_mut(kind).build_index_lenient();
        }
    }

    Ok(catalog)
}

fn process_node_property(
    catalog: &mut ArmCatalog,
    kind: DelegationKind,
    node_id: &str,
    raw: &str,
) -> Result<()> {
    let decoded: Value = serde_json::from_str(raw).map_err(|e| SingleTestbedError::MalformedDelegation {
        node_id: node_id.to_owned(),
        reason: format!("invalid JSON: {e}"),
    })?;

    let annotations: Vec<Value> = match decoded {
        Value::Object(obj) => vec![Value::Object(obj)],
        Value::Array(items) => items,
        other => {
            return Err(SingleTestbedError::MalformedDelegation {
                node_id: node_id.to_owned(),
                reason: format!(
                    "expected an object or a list of objects, found {}",
                    value_kind(&other)
                ),
            }
            .into())
        }
    };

    for annotation in annotations {
        process_single_annotation(catalog, kind, node_id, annotation)?;
    }
    Ok(())
}

fn process_single_annotation(
    catalog: &mut ArmCatalog,
    kind: DelegationKind,
    node_id: &str,
    annotation: Value,
) -> Result<()> {
    let Value::Object(obj) = annotation else {
        return Err(SingleTestbedError::MalformedDelegation {
            node_id: node_id.to_owned(),
            reason: format!("annotation must be an object, found {}", value_kind(&annotation)),
        }
        .into());
    };

    let delegation_id = match obj.get(fields::DELEGATION).and_then(Value::as_str) {
        Some(id) => id.to_owned(),
        None => {
            tracing::debug!(node_id, "annotation has no delegation id, defaulting");
            fields::DEFAULT_DELEGATION.to_owned()
        }
    };

    let pool_field = ArmCatalog::pool_field_name(kind);
    let pool_definition = obj.get(pool_field).and_then(Value::as_str).map(str::to_owned);
    let pool_mentions: Vec<String> = match obj.get(fields::POOL) {
        None => Vec::new(),
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect(),
        Some(other) => {
            return Err(SingleTestbedError::MalformedDelegation {
                node_id: node_id.to_owned(),
                reason: format!("'pool' must be a string or list of strings, found {}", value_kind(other)),
            }
            .into())
        }
    };

    let mut had_pool_effect = false;

    if let Some(pool_id) = pool_definition {
        let details = details_without_delegation_field(obj.clone());
        catalog
            .pools_mut(kind)
            .define(kind, &pool_id, node_id.to_owned(), delegation_id.clone(), details)?;
        had_pool_effect = true;
    }

    for pool_id in &pool_mentions {
        catalog.pools_mut(kind).mention(kind, pool_id, node_id.to_owned());
        had_pool_effect = true;
    }

    if !had_pool_effect {
        let details = details_without_delegation_field(obj);
        catalog.delegations_mut(kind).add_singleton(Delegation::new(
            kind,
            node_id.to_owned(),
            delegation_id,
            details,
        ));
    }

    Ok(())
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
