//! Aggregate Resource Model / Aggregate Delegation Model / Combined Broker
//! Model core: a property-multigraph substrate model with a delegation
//! layer for carving an ARM into per-site ADMs, and a CBM layer for
//! merging ADMs back into one queryable broker view.
//!
//! The crate is organized bottom-up, each module depending only on the
//! ones above it in this list:
//!
//! - [`dictionary`] / [`typed_value`] — closed kind vocabularies and the
//!   `kind:value` pairs validated against them (C1).
//! - [`model`] — the vertex/edge class vocabulary and property-map
//!   representation shared by every later module.
//! - [`delegation`] — the pool/singleton-delegation index (C2).
//! - [`catalog`] — walks an ARM and populates a [`delegation`] index (C3).
//! - [`adm`] — derives one ADM per delegation id from a catalogued ARM (C4).
//! - [`cbm`] — merges ADMs into a queryable Combined Broker Model (C5).
//! - [`graph`] — the `GraphStore` adapter contract and an in-memory
//!   reference implementation (C6).
//! - [`graphml`] — a minimal GraphML import/export codec.

pub mod adm;
pub mod catalog;
pub mod cbm;
pub mod delegation;
pub mod dictionary;
pub mod error;
pub mod graph;
pub mod graphml;
pub mod model;
pub mod options;
pub mod typed_value;

pub use adm::{generate_adms, generate_adms_with_options, Adm};
pub use catalog::{catalog, catalog_with_options, ArmCatalog};
pub use cbm::{Cbm, MergePolicy};
pub use delegation::{Delegation, DelegationKind, Delegations, Pool, Pools};
pub use dictionary::ValueCategory;
pub use error::{Result, SingleTestbedError, TestbedModelError};
pub use graph::{GraphStore, InMemoryGraphStore};
pub use model::{ComponentRequest, ComponentType, NodeClass, PropertyMap, RelationKind};
pub use options::{AdmGenerationOptions, GraphMlLoadOptions};
pub use typed_value::TypedValue;
