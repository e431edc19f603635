//! Shared substrate vocabulary: node/edge classes, component kinds, and the
//! property-map representation every `GraphStore` vertex/edge carries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// A property map is a flat string-to-string dictionary. `BTreeMap` gives
/// deterministic iteration order, which matters for GraphML round-tripping
/// and for snapshot-style test assertions.
pub type PropertyMap = BTreeMap<String, String>;

/// The store's sentinel for "property present but unset".
pub const ABSENT_SENTINEL: &str = "None";

/// Returns `true` unless `value` is `None` or the store sentinel.
pub fn is_present(value: Option<&str>) -> bool {
    matches!(value, Some(v) if v != ABSENT_SENTINEL)
}

/// Recognized GraphML / property-map field names (spec.md §6).
pub mod fields {
    pub const NAME: &str = "Name";
    pub const CLASS: &str = "Class";
    pub const TYPE: &str = "Type";
    pub const MODEL: &str = "Model";
    pub const SITE: &str = "Site";
    pub const NODE_ID: &str = "NodeID";
    pub const CAPACITIES: &str = "Capacities";
    pub const LABELS: &str = "Labels";
    pub const LABEL_DELEGATIONS: &str = "label_delegations";
    pub const CAPACITY_DELEGATIONS: &str = "capacity_delegations";
    pub const ADM_GRAPH_IDS: &str = "adm_graph_ids";

    pub const DELEGATION: &str = "delegation";
    pub const LABEL_POOL: &str = "label_pool";
    pub const CAPACITY_POOL: &str = "capacity_pool";
    pub const POOL: &str = "pool";

    pub const RESOURCE_TYPE: &str = "resource_type";
    pub const RESOURCE_MODEL: &str = "resource_model";

    pub const DEFAULT_DELEGATION: &str = "default";
}

/// The closed set of vertex classes in the substrate multigraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum NodeClass {
    NetworkNode,
    Component,
    SwitchFabric,
    ConnectionPoint,
    Link,
    NetworkService,
}

/// The closed set of edge relation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum RelationKind {
    #[strum(serialize = "has")]
    Has,
    #[strum(serialize = "connects")]
    Connects,
    #[strum(serialize = "dependsOn")]
    DependsOn,
}

/// The closed set of physical component kinds a `NetworkNode` may host.
///
/// Grounded in the original system's `ComponentType` enum
/// (GPU/SmartNIC/SharedNIC/FPGA/NVME/Storage); `SharedNIC` is the only kind
/// subject to the SR-IOV sharing rule in `Cbm::nodes_matching`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum ComponentType {
    GPU,
    SmartNIC,
    SharedNIC,
    FPGA,
    NVME,
    Storage,
}

impl ComponentType {
    /// `SharedNIC` is the only kind satisfiable via SR-IOV sharing: many
    /// logical requests for the same model may bind to one physical device.
    pub fn is_shareable(self) -> bool {
        matches!(self, ComponentType::SharedNIC)
    }
}

/// A request for a component on a candidate host in `Cbm::nodes_matching`.
#[derive(Debug, Clone)]
pub struct ComponentRequest {
    pub resource_type: ComponentType,
    pub resource_model: Option<String>,
}
