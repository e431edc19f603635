//! `tarm` — a smoke-test CLI: loads a GraphML ARM, catalogs it, derives
//! ADMs, merges them into a CBM, and prints a one-line summary of each
//! stage.
//!
//! Argument parsing is positional, no `clap` dependency, matching the
//! teacher's own scaffold template crate.

use std::process::ExitCode;

use testbed_arm::{generate_adms, graphml, Cbm, GraphStore, InMemoryGraphStore, MergePolicy};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: tarm <graphml-file> [graph-id]");
        return ExitCode::FAILURE;
    };
    let graph_id = args.next().unwrap_or_else(|| "ARM".to_owned());

    match run(&path, &graph_id) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(%e, "tarm run failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(path: &str, graph_id: &str) -> testbed_arm::Result<()> {
    let document = std::fs::read_to_string(path).map_err(|e| {
        testbed_arm::SingleTestbedError::Store {
            message: format!("reading '{path}': {e}"),
        }
    })?;

    let mut store = InMemoryGraphStore::new();
    graphml::read_graphml(&mut store, graph_id, &document)?;

    let node_count = store.list_nodes(graph_id)?.len();
    tracing::info!(graph_id, node_count, "loaded ARM");
    println!("loaded ARM '{graph_id}' with {node_count} vertices");

    let adms = generate_adms(&mut store, graph_id)?;
    tracing::info!(adm_count = adms.len(), "derived ADMs");
    println!("derived {} ADM(s):", adms.len());
    for adm in &adms {
        let kept = store.list_nodes(&adm.graph_id)?.len();
        println!("  - delegation '{}' -> graph '{}' ({kept} vertices)", adm.delegation_id, adm.graph_id);
    }

    let cbm = Cbm::new("CBM");
    for adm in &adms {
        cbm.merge_adm(&mut store, adm, MergePolicy::Strict)?;
    }
    let cbm_node_count = store.list_nodes(cbm.graph_id())?.len();
    tracing::info!(cbm_node_count, "merged CBM");
    println!("merged CBM has {cbm_node_count} vertices");

    let intersite = cbm.intersite_links(&store)?;
    println!("found {} intersite link(s)", intersite.len());

    Ok(())
}
