//! C2 — Delegation & Pool model.
//!
//! Grounded in `original_source/fim/graph/delegations.py`
//! (`Delegation`/`Delegations`/`Pool`/`Pools`): a singleton delegation
//! pledges the resources on one vertex; a pool is a named reservoir
//! defined on one vertex but spanning a set of member vertices, created
//! lazily on first mention and validated once, after the whole ARM has
//! been walked, so forward references resolve correctly.

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};

use crate::error::{Result, SingleTestbedError};
use crate::model::fields;

/// Which delegation index (label or capacity) an entity belongs to.
///
/// Two independent instances of `Pools`/`Delegations` are kept per kind
/// rather than one generic container parameterized at runtime — matching
/// the design note in spec.md §9 and the original's
/// `self.pools = {LABEL: Pools(...), CAPACITY: Pools(...)}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum DelegationKind {
    Label,
    Capacity,
}

pub type DelegationId = String;
pub type PoolId = String;
pub type NodeId = String;
/// The annotation object minus the `delegation` field: free-form resource
/// fields such as `vlan_range`, `bw`, `core`.
pub type Details = Map<String, Value>;

/// A pledge of the resources on exactly one vertex, under one delegation id.
#[derive(Debug, Clone, PartialEq)]
pub struct Delegation {
    kind: DelegationKind,
    defined_on: NodeId,
    delegation_id: DelegationId,
    details: Details,
}

impl Delegation {
    pub fn new(kind: DelegationKind, defined_on: NodeId, delegation_id: DelegationId, details: Details) -> Self {
        Self {
            kind,
            defined_on,
            delegation_id,
            details,
        }
    }

    pub fn kind(&self) -> DelegationKind {
        self.kind
    }

    pub fn defined_on(&self) -> &str {
        &self.defined_on
    }

    pub fn delegation_id(&self) -> &str {
        &self.delegation_id
    }

    pub fn details(&self) -> &Details {
        &self.details
    }
}

/// A named reservoir of labels/capacities defined on one vertex and
/// spanning a set of member vertices.
#[derive(Debug, Clone)]
pub struct Pool {
    kind: DelegationKind,
    pool_id: PoolId,
    delegation_id: Option<DelegationId>,
    defined_on: Option<NodeId>,
    defined_for: IndexSet<NodeId>,
    details: Option<Details>,
}

impl Pool {
    fn new_empty(kind: DelegationKind, pool_id: PoolId) -> Self {
        Self {
            kind,
            pool_id,
            delegation_id: None,
            defined_on: None,
            defined_for: IndexSet::new(),
            details: None,
        }
    }

    pub fn kind(&self) -> DelegationKind {
        self.kind
    }

    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }

    pub fn delegation_id(&self) -> Option<&str> {
        self.delegation_id.as_deref()
    }

    pub fn defined_on(&self) -> Option<&str> {
        self.defined_on.as_deref()
    }

    pub fn defined_for(&self) -> &IndexSet<NodeId> {
        &self.defined_for
    }

    pub fn details(&self) -> Option<&Details> {
        self.details.as_ref()
    }

    fn set_definition(&mut self, defined_on: NodeId, delegation_id: DelegationId, details: Details) {
        self.defined_on = Some(defined_on.clone());
        self.delegation_id = Some(delegation_id);
        self.details = Some(details);
        self.defined_for.insert(defined_on);
    }

    fn add_member(&mut self, node_id: NodeId) {
        self.defined_for.insert(node_id);
    }

    /// Validates the four invariants from spec.md §3: non-null
    /// `delegation_id`, non-null `defined_on` with `defined_on ∈
    /// defined_for`, non-empty `defined_for`, non-null `details`.
    ///
    /// A pool that was only ever mentioned, never defined, is reported as
    /// `OrphanMention` rather than the generic `MalformedPool` (spec.md
    /// §4.3 edge cases / §7): `defined_on`, `delegation_id` and `details`
    /// are always set together by `set_definition`, so `defined_on.is_none()`
    /// identifies exactly that case.
    fn validate(&self) -> Result<()> {
        if self.defined_on.is_none() {
            return Err(SingleTestbedError::OrphanMention {
                pool_id: self.pool_id.clone(),
            }
            .into());
        }

        let reason = if self.delegation_id.is_none() {
            Some("missing delegation id".to_owned())
        } else if self.defined_for.is_empty() {
            Some("not mentioned on any nodes".to_owned())
        } else if !self
            .defined_for
            .contains(self.defined_on.as_ref().expect("checked above"))
        {
            Some("defining node is not among the nodes the pool is mentioned on".to_owned())
        } else if self.details.is_none() {
            Some("has no resource details".to_owned())
        } else {
            None
        };

        match reason {
            None => Ok(()),
            Some(reason) => Err(SingleTestbedError::MalformedPool {
                pool_id: self.pool_id.clone(),
                reason,
            }
            .into()),
        }
    }
}

/// All singleton delegations of one kind, indexed by delegation id.
#[derive(Debug, Clone, Default)]
pub struct Delegations {
    by_id: IndexMap<DelegationId, Vec<Delegation>>,
}

impl Delegations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_singleton(&mut self, delegation: Delegation) {
        self.by_id
            .entry(delegation.delegation_id.clone())
            .or_default()
            .push(delegation);
    }

    pub fn delegation_ids(&self) -> impl Iterator<Item = &str> {
        self.by_id.keys().map(String::as_str)
    }

    pub fn by_delegation_id(&self, delegation_id: &str) -> &[Delegation] {
        self.by_id.get(delegation_id).map_or(&[], Vec::as_slice)
    }

    /// Union of `defined_on` across every singleton delegation with this id.
    pub fn node_ids_for(&self, delegation_id: &str) -> IndexSet<NodeId> {
        self.by_delegation_id(delegation_id)
            .iter()
            .map(|d| d.defined_on.clone())
            .collect()
    }
}

/// All pools of one kind, indexed first by pool id and, after
/// `build_index`, by delegation id.
#[derive(Debug, Clone, Default)]
pub struct Pools {
    by_pool_id: IndexMap<PoolId, Pool>,
    by_delegation_id: Option<IndexMap<DelegationId, Vec<PoolId>>>,
}

impl Pools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup-or-create: the first call with an unknown id returns a fresh
    /// pool with empty `defined_for` and no `details`.
    pub fn pool_mut(&mut self, kind: DelegationKind, pool_id: &str) -> &mut Pool {
        self.by_pool_id.entry(pool_id.to_owned()).or_insert_with(|| {
            tracing::debug!(%kind, pool_id, "creating pool");
            Pool::new_empty(kind, pool_id.to_owned())
        })
    }

    pub fn pool(&self, pool_id: &str) -> Option<&Pool> {
        self.by_pool_id.get(pool_id)
    }

    /// Marks `node_id` as the definition site of `pool_id`, filling in its
    /// delegation id and details.
    pub fn define(
        &mut self,
        kind: DelegationKind,
        pool_id: &str,
        defined_on: NodeId,
        delegation_id: DelegationId,
        details: Details,
    ) -> Result<()> {
        let pool = self.pool_mut(kind, pool_id);
        if let Some(existing_site) = pool.defined_on.clone() {
            if existing_site != defined_on {
                return Err(SingleTestbedError::DuplicatePoolDefinition {
                    pool_id: pool_id.to_owned(),
                    first_node: existing_site,
                    second_node: defined_on,
                }
                .into());
            }
        }
        pool.set_definition(defined_on, delegation_id, details);
        Ok(())
    }

    /// Marks `node_id` as a member (mention site) of `pool_id`.
    pub fn mention(&mut self, kind: DelegationKind, pool_id: &str, node_id: NodeId) {
        self.pool_mut(kind, pool_id).add_member(node_id);
    }

    /// Validates every pool (raising on the first failure) and builds the
    /// `delegation_id -> [Pool]` index. Must be called once after the full
    /// ARM has been walked.
    pub fn build_index(&mut self) -> Result<()> {
        for pool in self.by_pool_id.values() {
            pool.validate()?;
        }
        self.index_validated_pools(self.by_pool_id.keys().cloned().collect());
        Ok(())
    }

    /// Like [`Self::build_index`], but a pool that fails validation is
    /// dropped (logged via `tracing::warn!`) rather than aborting the
    /// whole index build. Returns every dropped pool's error, in pool-id
    /// order, for a caller that wants to surface them without failing.
    pub fn build_index_lenient(&mut self) -> Vec<SingleTestbedError> {
        let mut dropped = Vec::new();
        let mut keep = Vec::new();
        for (pool_id, pool) in &self.by_pool_id {
            match pool.validate() {
                Ok(()) => keep.push(pool_id.clone()),
                Err(e) => {
                    for leaf in e.errors() {
                        tracing::warn!(%pool_id, error = %leaf, "dropping malformed pool");
                        dropped.push(leaf.clone());
                    }
                }
            }
        }
        self.by_pool_id.retain(|id, _| keep.contains(id));
        self.index_validated_pools(keep);
        dropped
    }

    fn index_validated_pools(&mut self, pool_ids: Vec<PoolId>) {
        let mut index: IndexMap<DelegationId, Vec<PoolId>> = IndexMap::new();
        for pool_id in pool_ids {
            let Some(pool) = self.by_pool_id.get(&pool_id) else {
                continue;
            };
            let delegation_id = pool
                .delegation_id
                .clone()
                .expect("validated above: delegation_id is set");
            index.entry(delegation_id).or_default().push(pool_id);
        }
        self.by_delegation_id = Some(index);
    }

    /// All distinct delegation ids across every pool. Panics (via
    /// `ensure!`-style contract) if called before `build_index`.
    pub fn delegation_ids(&self) -> impl Iterator<Item = &str> {
        self.by_delegation_id
            .as_ref()
            .expect("build_index must run before delegation_ids")
            .keys()
            .map(String::as_str)
    }

    pub fn by_delegation_id(&self, delegation_id: &str) -> Vec<&Pool> {
        let index = self
            .by_delegation_id
            .as_ref()
            .expect("build_index must run before by_delegation_id");
        index
            .get(delegation_id)
            .into_iter()
            .flatten()
            .filter_map(|pool_id| self.by_pool_id.get(pool_id))
            .collect()
    }

    /// Union of `defined_for` across every pool with this delegation id.
    pub fn node_ids_for(&self, delegation_id: &str) -> IndexSet<NodeId> {
        self.by_delegation_id(delegation_id)
            .into_iter()
            .flat_map(|pool| pool.defined_for.iter().cloned())
            .collect()
    }
}

/// Strips the `delegation` field out of a decoded annotation object,
/// returning the remaining free-form resource fields as `Details`.
pub fn details_without_delegation_field(mut annotation: Map<String, Value>) -> Details {
    annotation.remove(fields::DELEGATION);
    annotation
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details(pairs: &[(&str, Value)]) -> Details {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn pool_round_trip_after_build_index() {
        let mut pools = Pools::new();
        pools
            .define(
                DelegationKind::Label,
                "p1",
                "A".to_owned(),
                "d1".to_owned(),
                details(&[("vlan_range", json!("100-200"))]),
            )
            .unwrap();
        pools.mention(DelegationKind::Label, "p1", "B".to_owned());
        pools.build_index().unwrap();

        let pool = pools.pool("p1").unwrap();
        assert_eq!(pool.defined_on(), Some("A"));
        assert!(pool.defined_for().contains("A"));
        assert!(pool.defined_for().contains("B"));
        assert_eq!(pool.delegation_id(), Some("d1"));
        assert!(pool.details().is_some());
    }

    #[test]
    fn orphan_mention_is_malformed_pool() {
        let mut pools = Pools::new();
        pools.mention(DelegationKind::Capacity, "never-defined", "A".to_owned());
        let err = pools.build_index().unwrap_err();
        assert!(matches!(
            err.errors()[0],
            SingleTestbedError::OrphanMention { .. }
        ));
    }

    #[test]
    fn duplicate_definition_on_different_nodes_is_rejected() {
        let mut pools = Pools::new();
        pools
            .define(
                DelegationKind::Label,
                "p1",
                "A".to_owned(),
                "d1".to_owned(),
                details(&[]),
            )
            .unwrap();
        let err = pools
            .define(
                DelegationKind::Label,
                "p1",
                "Z".to_owned(),
                "d1".to_owned(),
                details(&[]),
            )
            .unwrap_err();
        assert!(matches!(
            err.errors()[0],
            SingleTestbedError::DuplicatePoolDefinition { .. }
        ));
    }

    #[test]
    fn build_index_lenient_drops_orphan_mention_and_keeps_valid_pools() {
        let mut pools = Pools::new();
        pools
            .define(DelegationKind::Label, "p1", "A".to_owned(), "d1".to_owned(), details(&[]))
            .unwrap();
        pools.mention(DelegationKind::Capacity, "never-defined", "Z".to_owned());

        let dropped = pools.build_index_lenient();
        assert_eq!(dropped.len(), 1);
        assert!(matches!(dropped[0], SingleTestbedError::OrphanMention { .. }));

        assert!(pools.pool("p1").is_some());
        assert!(pools.pool("never-defined").is_none());
        assert_eq!(pools.delegation_ids().collect::<Vec<_>>(), vec!["d1"]);
    }

    #[test]
    fn delegations_node_ids_for_unions_defined_on() {
        let mut delegations = Delegations::new();
        delegations.add_singleton(Delegation::new(
            DelegationKind::Capacity,
            "C".to_owned(),
            "d2".to_owned(),
            details(&[("bw", json!(10))]),
        ));
        let ids = delegations.node_ids_for("d2");
        assert_eq!(ids.len(), 1);
        assert!(ids.contains("C"));
    }
}
