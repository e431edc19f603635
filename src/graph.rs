//! C6 — Graph Adapter Contract, plus an in-memory reference implementation.
//!
//! `GraphStore` is the interface the CORE requires of the underlying graph
//! store (spec.md §4.6): labelled-node/edge CRUD, bulk clone, shortest
//! path, and delete. The nine operations named in the design are present
//! here; `list_edges` is one necessary addition — merging an ADM into a
//! CBM (C5) has to enumerate an ADM's edges, and no combination of the
//! nine listed operations can do that, so the contract is extended by
//! exactly the one read-only operation needed. See DESIGN.md.
//!
//! `InMemoryGraphStore` backs every test and the `tarm` demo binary with
//! one `petgraph::stable_graph::StableDiGraph` per `graph_id`, the way the
//! teacher crate keeps its query graph as one `petgraph::graph::DiGraph`
//! per federated schema.

use std::collections::HashMap;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};

use crate::error::{Result, SingleTestbedError};
use crate::model::{NodeClass, PropertyMap, RelationKind};

#[derive(Debug, Clone)]
struct NodeRecord {
    node_id: String,
    class: NodeClass,
    props: PropertyMap,
}

#[derive(Debug, Clone)]
struct EdgeRecord {
    rel: RelationKind,
    props: PropertyMap,
}

/// The capabilities the CORE requires of an external graph store.
///
/// All operations are synchronous and atomic per call (spec.md §5); the
/// CORE does not compose multiple calls into one transaction and treats
/// each call as a blocking point.
pub trait GraphStore {
    fn list_nodes(&self, graph_id: &str) -> Result<Vec<String>>;
    fn node_props(&self, graph_id: &str, node_id: &str) -> Result<(NodeClass, PropertyMap)>;
    fn add_node(&mut self, graph_id: &str, node_id: &str, class: NodeClass, props: PropertyMap) -> Result<()>;
    fn update_node_props(&mut self, graph_id: &str, node_id: &str, props: PropertyMap) -> Result<()>;
    fn remove_node(&mut self, graph_id: &str, node_id: &str) -> Result<()>;
    fn add_edge(
        &mut self,
        graph_id: &str,
        a: &str,
        b: &str,
        rel: RelationKind,
        props: PropertyMap,
    ) -> Result<()>;
    /// Every edge in `graph_id`, as `(a, b, rel, props)`. An addition to
    /// the nine operations named in the design — see the module doc.
    fn list_edges(&self, graph_id: &str) -> Result<Vec<(String, String, RelationKind, PropertyMap)>>;
    /// Nodes on one shortest path between `a` and `z`, treating edges as
    /// undirected (substrate connectivity runs both up and down the
    /// has/connects hierarchy). Empty if no path exists. Ties are broken
    /// lexicographically on `node_id` (spec.md §9): among neighbors at the
    /// same BFS depth, the smallest `node_id` is explored first, so the
    /// reconstructed path is the lexicographically-least among all
    /// shortest paths for a fixed store instance.
    fn shortest_path(&self, graph_id: &str, a: &str, z: &str) -> Result<Vec<String>>;
    fn clone_graph(&mut self, src_id: &str, dst_id: &str) -> Result<()>;
    fn delete_graph(&mut self, graph_id: &str) -> Result<()>;
}

/// A reference `GraphStore` backed by one `petgraph` graph per `graph_id`.
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    graphs: HashMap<String, GraphData>,
}

#[derive(Debug, Default)]
struct GraphData {
    graph: StableDiGraph<NodeRecord, EdgeRecord>,
    index: HashMap<String, NodeIndex>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn graph(&self, graph_id: &str) -> Result<&GraphData> {
        self.graphs.get(graph_id).ok_or_else(|| {
            SingleTestbedError::NotFound {
                what: "graph",
                id: graph_id.to_owned(),
            }
            .into()
        })
    }

    fn graph_mut(&mut self, graph_id: &str) -> &mut GraphData {
        self.graphs.entry(graph_id.to_owned()).or_default()
    }

    fn node_index(&self, graph_id: &str, node_id: &str) -> Result<NodeIndex> {
        self.graph(graph_id)?.index.get(node_id).copied().ok_or_else(|| {
            SingleTestbedError::NotFound {
                what: "node",
                id: node_id.to_owned(),
            }
            .into()
        })
    }
}

impl GraphStore for InMemoryGraphStore {
    fn list_nodes(&self, graph_id: &str) -> Result<Vec<String>> {
        Ok(self.graph(graph_id)?.index.keys().cloned().collect())
    }

    fn node_props(&self, graph_id: &str, node_id: &str) -> Result<(NodeClass, PropertyMap)> {
        let idx = self.node_index(graph_id, node_id)?;
        let record = &self.graph(graph_id)?.graph[idx];
        Ok((record.class, record.props.clone()))
    }

    fn add_node(&mut self, graph_id: &str, node_id: &str, class: NodeClass, props: PropertyMap) -> Result<()> {
        let data = self.graph_mut(graph_id);
        if data.index.contains_key(node_id) {
            crate::bail!("node '{node_id}' already exists in graph '{graph_id}'");
        }
        let idx = data.graph.add_node(NodeRecord {
            node_id: node_id.to_owned(),
            class,
            props,
        });
        data.index.insert(node_id.to_owned(), idx);
        Ok(())
    }

    fn update_node_props(&mut self, graph_id: &str, node_id: &str, props: PropertyMap) -> Result<()> {
        let idx = self.node_index(graph_id, node_id)?;
        self.graph_mut(graph_id).graph[idx].props = props;
        Ok(())
    }

    fn remove_node(&mut self, graph_id: &str, node_id: &str) -> Result<()> {
        let idx = self.node_index(graph_id, node_id)?;
        let data = self.graph_mut(graph_id);
        data.graph.remove_node(idx);
        data.index.remove(node_id);
        Ok(())
    }

    fn add_edge(
        &mut self,
        graph_id: &str,
        a: &str,
        b: &str,
        rel: RelationKind,
        props: PropertyMap,
    ) -> Result<()> {
        let a_idx = self.node_index(graph_id, a)?;
        let z_idx = self.node_index(graph_id, b)?;
        let data = self.graph_mut(graph_id);
        let already = data
            .graph
            .edges_connecting(a_idx, z_idx)
            .any(|e| e.weight().rel == rel);
        if !already {
            data.graph.add_edge(a_idx, z_idx, EdgeRecord { rel, props });
        }
        Ok(())
    }

    fn list_edges(&self, graph_id: &str) -> Result<Vec<(String, String, RelationKind, PropertyMap)>> {
        let data = self.graph(graph_id)?;
        Ok(data
            .graph
            .edge_references()
            .map(|e| {
                let a = data.graph[e.source()].node_id.clone();
                let b = data.graph[e.target()].node_id.clone();
                (a, b, e.weight().rel, e.weight().props.clone())
            })
            .collect())
    }

    fn shortest_path(&self, graph_id: &str, a: &str, z: &str) -> Result<Vec<String>> {
        let data = self.graph(graph_id)?;
        let Some(&start) = data.index.get(a) else {
            return Ok(Vec::new());
        };
        let Some(&goal) = data.index.get(z) else {
            return Ok(Vec::new());
        };
        if start == goal {
            return Ok(vec![a.to_owned()]);
        }

        use std::collections::VecDeque;
        let mut predecessor: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut visited: std::collections::HashSet<NodeIndex> = std::collections::HashSet::new();
        visited.insert(start);
        let mut queue = VecDeque::new();
        queue.push_back(start);

        'bfs: while let Some(current) = queue.pop_front() {
            let mut neighbors: Vec<NodeIndex> =
                data.graph.neighbors_undirected(current).collect();
            neighbors.sort_by_key(|idx| data.graph[*idx].node_id.clone());
            neighbors.dedup();
            for next in neighbors {
                if visited.insert(next) {
                    predecessor.insert(next, current);
                    if next == goal {
                        break 'bfs;
                    }
                    queue.push_back(next);
                }
            }
        }

        if !visited.contains(&goal) {
            return Ok(Vec::new());
        }

        let mut path = vec![goal];
        let mut current = goal;
        while current != start {
            current = predecessor[&current];
            path.push(current);
        }
        path.reverse();
        Ok(path.into_iter().map(|idx| data.graph[idx].node_id.clone()).collect())
    }

    fn clone_graph(&mut self, src_id: &str, dst_id: &str) -> Result<()> {
        let src = self.graph(src_id)?;
        let mut new_data = GraphData::default();
        let mut remap: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        for node_idx in src.graph.node_indices() {
            let record = src.graph[node_idx].clone();
            let new_idx = new_data.graph.add_node(record.clone());
            new_data.index.insert(record.node_id, new_idx);
            remap.insert(node_idx, new_idx);
        }
        for edge_idx in src.graph.edge_indices() {
            let (a, z) = src.graph.edge_endpoints(edge_idx).expect("edge index is valid");
            let weight = src.graph[edge_idx].clone();
            new_data.graph.add_edge(remap[&a], remap[&z], weight);
        }
        self.graphs.insert(dst_id.to_owned(), new_data);
        Ok(())
    }

    fn delete_graph(&mut self, graph_id: &str) -> Result<()> {
        self.graphs.remove(graph_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeClass;

    fn linear_store() -> InMemoryGraphStore {
        let mut store = InMemoryGraphStore::new();
        for n in ["lbnl", "net_sw", "renc", "net_sw2", "uky"] {
            store
                .add_node("g", n, NodeClass::NetworkNode, PropertyMap::new())
                .unwrap();
        }
        for (a, b) in [("lbnl", "net_sw"), ("net_sw", "renc"), ("renc", "net_sw2"), ("net_sw2", "uky")] {
            store.add_edge("g", a, b, RelationKind::Connects, PropertyMap::new()).unwrap();
        }
        store
    }

    #[test]
    fn shortest_path_linear_chain() {
        let store = linear_store();
        let path = store.shortest_path("g", "lbnl", "uky").unwrap();
        assert_eq!(path, vec!["lbnl", "net_sw", "renc", "net_sw2", "uky"]);
    }

    #[test]
    fn shortest_path_missing_node_is_empty() {
        let store = linear_store();
        assert!(store.shortest_path("g", "lbnl", "nowhere").unwrap().is_empty());
    }

    #[test]
    fn clone_then_remove_preserves_remaining_edges() {
        let mut store = linear_store();
        store.clone_graph("g", "g2").unwrap();
        store.remove_node("g2", "renc").unwrap();
        assert_eq!(store.shortest_path("g2", "lbnl", "uky").unwrap(), Vec::<String>::new());
        // original graph is untouched
        assert_eq!(
            store.shortest_path("g", "lbnl", "uky").unwrap(),
            vec!["lbnl", "net_sw", "renc", "net_sw2", "uky"]
        );
    }
}
