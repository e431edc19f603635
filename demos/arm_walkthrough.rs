//! Hand-builds a small two-site ARM, derives its ADMs, merges them into a
//! CBM, and runs one of each query kind — the same pipeline `tarm` drives
//! from a GraphML file, but constructed in code so it needs no fixture.

use testbed_arm::{
    generate_adms, Cbm, ComponentRequest, ComponentType, GraphStore, InMemoryGraphStore, MergePolicy, NodeClass,
    PropertyMap, RelationKind,
};

fn props(pairs: &[(&str, &str)]) -> PropertyMap {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn main() -> testbed_arm::Result<()> {
    let mut store = InMemoryGraphStore::new();

    // Two sites, each a NetworkNode, linked through a switch, each
    // delegating its capacity under its own delegation id.
    store.add_node(
        "ARM",
        "lbnl-w1",
        NodeClass::NetworkNode,
        props(&[
            ("Site", "LBNL"),
            ("capacity_delegations", r#"{"delegation":"lbnl","core":32}"#),
        ]),
    )?;
    store.add_node("ARM", "core-switch", NodeClass::SwitchFabric, props(&[("Site", "LBNL")]))?;
    store.add_node(
        "ARM",
        "renc-w1",
        NodeClass::NetworkNode,
        props(&[
            ("Site", "RENC"),
            ("capacity_delegations", r#"{"delegation":"renc","core":64}"#),
            ("label_delegations", r#"{"label_pool":"vlans","delegation":"renc","vlan_range":"100-200"}"#),
        ]),
    )?;
    store.add_node("ARM", "nic-smart", NodeClass::Component, props(&[
        ("resource_type", "SmartNIC"),
        ("resource_model", "ConnectX-5"),
    ]))?;
    store.add_edge("ARM", "lbnl-w1", "core-switch", RelationKind::Connects, PropertyMap::new())?;
    store.add_edge("ARM", "core-switch", "renc-w1", RelationKind::Connects, PropertyMap::new())?;
    store.add_edge("ARM", "renc-w1", "nic-smart", RelationKind::Has, PropertyMap::new())?;

    let adms = generate_adms(&mut store, "ARM")?;
    println!("derived {} ADM(s) from the ARM", adms.len());

    let cbm = Cbm::new("CBM");
    for adm in &adms {
        cbm.merge_adm(&mut store, adm, MergePolicy::Strict)?;
    }

    let matches = cbm.nodes_matching(
        &store,
        &props(&[("Site", "RENC")]),
        &[ComponentRequest {
            resource_type: ComponentType::SmartNIC,
            resource_model: Some("ConnectX-5".to_owned()),
        }],
    )?;
    println!("RENC nodes with a ConnectX-5 SmartNIC: {matches:?}");

    let path = cbm.path_with_hops(&store, "lbnl-w1", "renc-w1", &[], None)?;
    println!("shortest path lbnl-w1 -> renc-w1: {path:?}");

    Ok(())
}
