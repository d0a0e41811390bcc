//! # Graph Concept
//!
//! Nodes and directed edges over entity ids, with bounded-depth neighbor
//! discovery.
//!
//! Edges are stored directed (`source -> target`) but traversal treats them
//! as undirected: any edge touching a frontier node contributes its other
//! endpoint.

use crate::concept::{Concept, TypedRecord, VariantOutput, text_field, variant};
use crate::primitives::{GRAPH_EDGE, GRAPH_NODE, MAX_TRAVERSAL_DEPTH};
use crate::storage::RelationStore;
use crate::{Criteria, Key, KernelError, Record};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// RECORDS
// =============================================================================

/// A node in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub entity_id: String,
}

impl TypedRecord for GraphNode {
    const RELATION: &'static str = GRAPH_NODE;

    fn key(&self) -> Key {
        Key::single(&self.entity_id)
    }

    fn to_record(&self) -> Result<Record, KernelError> {
        Ok(Record::new().with("entity_id", self.entity_id.as_str()))
    }

    fn from_record(key: &Key, record: &Record) -> Result<Self, KernelError> {
        Ok(Self {
            entity_id: text_field(Self::RELATION, key, record, "entity_id")?,
        })
    }
}

/// A directed edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source_id: String,
    pub target_id: String,
}

impl GraphEdge {
    #[must_use]
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
        }
    }
}

impl TypedRecord for GraphEdge {
    const RELATION: &'static str = GRAPH_EDGE;

    fn key(&self) -> Key {
        Key::pair(&self.source_id, &self.target_id)
    }

    fn to_record(&self) -> Result<Record, KernelError> {
        Ok(Record::new()
            .with("source_id", self.source_id.as_str())
            .with("target_id", self.target_id.as_str()))
    }

    fn from_record(key: &Key, record: &Record) -> Result<Self, KernelError> {
        Ok(Self {
            source_id: text_field(Self::RELATION, key, record, "source_id")?,
            target_id: text_field(Self::RELATION, key, record, "target_id")?,
        })
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddNodeInput {
    pub entity_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum AddNodeOutput {
    #[serde(rename = "ok")]
    Ok { entity_id: String },
    #[serde(rename = "alreadyExists")]
    AlreadyExists { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveNodeInput {
    pub entity_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum RemoveNodeOutput {
    #[serde(rename = "ok")]
    Ok {
        entity_id: String,
        removed_edges: usize,
    },
    #[serde(rename = "notfound")]
    NotFound { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddEdgeInput {
    pub source_id: String,
    pub target_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum AddEdgeOutput {
    #[serde(rename = "ok")]
    Ok {
        source_id: String,
        target_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveEdgeInput {
    pub source_id: String,
    pub target_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum RemoveEdgeOutput {
    #[serde(rename = "ok")]
    Ok {
        source_id: String,
        target_id: String,
    },
    #[serde(rename = "notfound")]
    NotFound { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetNeighborsInput {
    pub entity_id: String,
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum GetNeighborsOutput {
    #[serde(rename = "ok")]
    Ok {
        entity_id: String,
        /// Sorted, deduplicated, never contains `entity_id`.
        neighbors: Vec<String>,
        /// Depth actually traversed, after clamping to `MAX_TRAVERSAL_DEPTH`.
        depth: u32,
    },
}

impl VariantOutput for AddNodeOutput {
    fn variant(&self) -> &'static str {
        match self {
            Self::Ok { .. } => variant::OK,
            Self::AlreadyExists { .. } => variant::ALREADY_EXISTS,
        }
    }

    fn message(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::AlreadyExists { message } => Some(message),
        }
    }
}

impl VariantOutput for RemoveNodeOutput {
    fn variant(&self) -> &'static str {
        match self {
            Self::Ok { .. } => variant::OK,
            Self::NotFound { .. } => variant::NOT_FOUND,
        }
    }

    fn message(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::NotFound { message } => Some(message),
        }
    }
}

impl VariantOutput for AddEdgeOutput {
    fn variant(&self) -> &'static str {
        variant::OK
    }

    fn message(&self) -> Option<&str> {
        None
    }
}

impl VariantOutput for RemoveEdgeOutput {
    fn variant(&self) -> &'static str {
        match self {
            Self::Ok { .. } => variant::OK,
            Self::NotFound { .. } => variant::NOT_FOUND,
        }
    }

    fn message(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::NotFound { message } => Some(message),
        }
    }
}

impl VariantOutput for GetNeighborsOutput {
    fn variant(&self) -> &'static str {
        variant::OK
    }

    fn message(&self) -> Option<&str> {
        None
    }
}

// =============================================================================
// HANDLER
// =============================================================================

/// Handler for the graph concept.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphHandler;

impl Concept for GraphHandler {
    const NAME: &'static str = "graph";
    const RELATIONS: &'static [&'static str] = &[GRAPH_NODE, GRAPH_EDGE];
}

impl GraphHandler {
    pub fn add_node(
        &self,
        input: AddNodeInput,
        store: &dyn RelationStore,
    ) -> Result<AddNodeOutput, KernelError> {
        let node = GraphNode {
            entity_id: input.entity_id,
        };
        let key = node.key();

        let mut batch = store.batch();
        if batch.get(GRAPH_NODE, &key).is_some() {
            return Ok(AddNodeOutput::AlreadyExists {
                message: format!("Graph node '{}' already exists", node.entity_id),
            });
        }
        batch.put(GRAPH_NODE, key, node.to_record()?);

        Ok(AddNodeOutput::Ok {
            entity_id: node.entity_id,
        })
    }

    /// Remove a node and every edge touching it, in one batch.
    pub fn remove_node(
        &self,
        input: RemoveNodeInput,
        store: &dyn RelationStore,
    ) -> Result<RemoveNodeOutput, KernelError> {
        let key = Key::single(&input.entity_id);

        let mut batch = store.batch();
        if batch.get(GRAPH_NODE, &key).is_none() {
            return Ok(RemoveNodeOutput::NotFound {
                message: format!("Graph node '{}' not found", input.entity_id),
            });
        }
        batch.del(GRAPH_NODE, &key);

        let outgoing = batch.del_many(
            GRAPH_EDGE,
            &Criteria::field("source_id", input.entity_id.as_str()),
        );
        let incoming = batch.del_many(
            GRAPH_EDGE,
            &Criteria::field("target_id", input.entity_id.as_str()),
        );
        let removed_edges = outgoing + incoming;

        tracing::debug!(entity_id = %input.entity_id, removed_edges, "graph node removed");

        Ok(RemoveNodeOutput::Ok {
            entity_id: input.entity_id,
            removed_edges,
        })
    }

    pub fn add_edge(
        &self,
        input: AddEdgeInput,
        store: &dyn RelationStore,
    ) -> Result<AddEdgeOutput, KernelError> {
        let edge = GraphEdge::new(input.source_id, input.target_id);
        store.put(GRAPH_EDGE, edge.key(), edge.to_record()?);

        Ok(AddEdgeOutput::Ok {
            source_id: edge.source_id,
            target_id: edge.target_id,
        })
    }

    pub fn remove_edge(
        &self,
        input: RemoveEdgeInput,
        store: &dyn RelationStore,
    ) -> Result<RemoveEdgeOutput, KernelError> {
        let edge = GraphEdge::new(input.source_id, input.target_id);
        let key = edge.key();

        let mut batch = store.batch();
        if batch.get(GRAPH_EDGE, &key).is_none() {
            return Ok(RemoveEdgeOutput::NotFound {
                message: format!(
                    "Edge from '{}' to '{}' not found",
                    edge.source_id, edge.target_id
                ),
            });
        }
        batch.del(GRAPH_EDGE, &key);

        Ok(RemoveEdgeOutput::Ok {
            source_id: edge.source_id,
            target_id: edge.target_id,
        })
    }

    /// Entity ids within `depth` hops of `entity_id`, start excluded.
    ///
    /// Reads the edge relation once. Depth is clamped to `MAX_TRAVERSAL_DEPTH`
    /// and the clamped value is reported back in the output.
    pub fn get_neighbors(
        &self,
        input: GetNeighborsInput,
        store: &dyn RelationStore,
    ) -> Result<GetNeighborsOutput, KernelError> {
        let depth = input.depth.min(MAX_TRAVERSAL_DEPTH);
        if depth < input.depth {
            tracing::warn!(
                requested = input.depth,
                depth,
                "traversal depth clamped"
            );
        }

        let edges = store
            .find(GRAPH_EDGE, &Criteria::all())
            .iter()
            .map(|record| {
                // Keys are not returned by find; rebuild one for error reporting.
                let key = Key::pair(
                    record.get("source_id").map(|v| v.render()).unwrap_or_default(),
                    record.get("target_id").map(|v| v.render()).unwrap_or_default(),
                );
                GraphEdge::from_record(&key, record)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let neighbors = neighbors_within(&edges, &input.entity_id, depth);

        Ok(GetNeighborsOutput::Ok {
            entity_id: input.entity_id,
            neighbors,
            depth,
        })
    }
}

// =============================================================================
// TRAVERSAL
// =============================================================================

/// Breadth-first expansion over an undirected view of `edges`.
///
/// `visited` starts empty and `frontier` starts at `{start}`. Each hop adds
/// every unvisited endpoint adjacent to the frontier (never `start`), folds
/// the frontier into `visited`, and stops early once nothing new is reached.
/// Nodes are never re-added once visited, so cycles terminate.
fn neighbors_within(edges: &[GraphEdge], start: &str, depth: u32) -> Vec<String> {
    let mut adjacency: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for edge in edges {
        adjacency
            .entry(edge.source_id.as_str())
            .or_default()
            .insert(edge.target_id.as_str());
        adjacency
            .entry(edge.target_id.as_str())
            .or_default()
            .insert(edge.source_id.as_str());
    }

    let mut visited: BTreeSet<&str> = BTreeSet::new();
    let mut frontier: BTreeSet<&str> = BTreeSet::from([start]);

    for _ in 0..depth {
        let mut next_frontier = BTreeSet::new();
        for node in &frontier {
            for &other in adjacency.get(node).into_iter().flatten() {
                if other != start && !visited.contains(other) {
                    next_frontier.insert(other);
                }
            }
        }

        visited.append(&mut frontier);
        frontier = next_frontier.difference(&visited).copied().collect();
        if frontier.is_empty() {
            break;
        }
    }

    visited.append(&mut frontier);
    visited.remove(start);
    visited.into_iter().map(str::to_string).collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;

    fn link(store: &InMemoryStore, source: &str, target: &str) {
        GraphHandler
            .add_edge(
                AddEdgeInput {
                    source_id: source.into(),
                    target_id: target.into(),
                },
                store,
            )
            .expect("add edge");
    }

    fn neighbors(store: &InMemoryStore, start: &str, depth: u32) -> Vec<String> {
        let GetNeighborsOutput::Ok { neighbors, .. } = GraphHandler
            .get_neighbors(
                GetNeighborsInput {
                    entity_id: start.into(),
                    depth,
                },
                store,
            )
            .expect("neighbors");
        neighbors
    }

    fn chain() -> InMemoryStore {
        let store = InMemoryStore::new();
        link(&store, "A", "B");
        link(&store, "B", "C");
        link(&store, "C", "D");
        store
    }

    #[test]
    fn chain_respects_depth() {
        let store = chain();
        assert!(neighbors(&store, "A", 0).is_empty());
        assert_eq!(neighbors(&store, "A", 1), vec!["B"]);
        assert_eq!(neighbors(&store, "A", 2), vec!["B", "C"]);
        assert_eq!(neighbors(&store, "A", 3), vec!["B", "C", "D"]);
        assert_eq!(neighbors(&store, "A", 50), vec!["B", "C", "D"]);
    }

    #[test]
    fn edges_are_traversed_both_ways() {
        let store = chain();
        // D only appears as a target, yet reaches back along the chain.
        assert_eq!(neighbors(&store, "D", 1), vec!["C"]);
        assert_eq!(neighbors(&store, "C", 1), vec!["B", "D"]);
    }

    #[test]
    fn cycle_terminates_and_excludes_start() {
        let store = chain();
        link(&store, "D", "A");
        let result = neighbors(&store, "A", 10);
        assert_eq!(result, vec!["B", "C", "D"]);
        assert!(!result.contains(&"A".to_string()));
    }

    #[test]
    fn self_loop_never_contributes() {
        let store = InMemoryStore::new();
        link(&store, "A", "A");
        assert!(neighbors(&store, "A", 3).is_empty());
    }

    #[test]
    fn unknown_start_has_no_neighbors() {
        let store = chain();
        assert!(neighbors(&store, "Z", 5).is_empty());
    }

    #[test]
    fn add_node_rejects_duplicate() {
        let store = InMemoryStore::new();
        let first = GraphHandler
            .add_node(AddNodeInput { entity_id: "n".into() }, &store)
            .expect("add");
        assert!(first.is_ok());

        let second = GraphHandler
            .add_node(AddNodeInput { entity_id: "n".into() }, &store)
            .expect("add");
        assert_eq!(second.variant(), variant::ALREADY_EXISTS);
        assert!(second.message().is_some());
    }

    #[test]
    fn remove_node_cascades_edges() {
        let store = chain();
        GraphHandler
            .add_node(AddNodeInput { entity_id: "B".into() }, &store)
            .expect("add");
        link(&store, "B", "B");

        let out = GraphHandler
            .remove_node(RemoveNodeInput { entity_id: "B".into() }, &store)
            .expect("remove");
        assert_eq!(
            out,
            RemoveNodeOutput::Ok {
                entity_id: "B".into(),
                removed_edges: 3,
            }
        );

        let remaining = store.find(GRAPH_EDGE, &Criteria::all());
        assert_eq!(remaining.len(), 1);
        assert_eq!(neighbors(&store, "A", 5), Vec::<String>::new());
    }

    #[test]
    fn remove_missing_node_is_not_found() {
        let store = InMemoryStore::new();
        let out = GraphHandler
            .remove_node(RemoveNodeInput { entity_id: "ghost".into() }, &store)
            .expect("remove");
        assert_eq!(out.variant(), variant::NOT_FOUND);
    }

    #[test]
    fn remove_edge_checks_existence() {
        let store = chain();
        let input = RemoveEdgeInput {
            source_id: "A".into(),
            target_id: "B".into(),
        };
        assert!(GraphHandler.remove_edge(input.clone(), &store).expect("rm").is_ok());
        let again = GraphHandler.remove_edge(input, &store).expect("rm");
        assert_eq!(again.variant(), variant::NOT_FOUND);
        assert!(neighbors(&store, "A", 3).is_empty());
    }

    #[test]
    fn edge_ids_with_delimiters_stay_distinct() {
        let store = InMemoryStore::new();
        link(&store, "a:b", "c");
        link(&store, "a", "b:c");
        assert_eq!(store.find(GRAPH_EDGE, &Criteria::all()).len(), 2);
    }

    #[test]
    fn corrupted_edge_aborts_traversal() {
        let store = InMemoryStore::new();
        store.put(
            GRAPH_EDGE,
            Key::pair("a", "b"),
            Record::new().with("source_id", "a"),
        );
        let result = GraphHandler.get_neighbors(
            GetNeighborsInput {
                entity_id: "a".into(),
                depth: 1,
            },
            &store,
        );
        assert!(matches!(result, Err(KernelError::Corrupted { .. })));
    }

    #[test]
    fn depth_beyond_limit_is_clamped_and_reported() {
        let store = InMemoryStore::new();
        let hops = MAX_TRAVERSAL_DEPTH + 50;
        for i in 0..hops {
            link(&store, &format!("n{i}"), &format!("n{}", i + 1));
        }

        let at_limit = neighbors(&store, "n0", MAX_TRAVERSAL_DEPTH);
        assert_eq!(at_limit.len(), MAX_TRAVERSAL_DEPTH as usize);

        let GetNeighborsOutput::Ok { neighbors, depth, .. } = GraphHandler
            .get_neighbors(
                GetNeighborsInput {
                    entity_id: "n0".into(),
                    depth: hops,
                },
                &store,
            )
            .expect("neighbors");
        assert_eq!(depth, MAX_TRAVERSAL_DEPTH);
        assert_eq!(neighbors, at_limit);
    }

    #[test]
    fn output_wire_format_is_tagged() {
        let out = GetNeighborsOutput::Ok {
            entity_id: "A".into(),
            neighbors: vec!["B".into()],
            depth: 1,
        };
        let json = serde_json::to_value(&out).expect("encode");
        assert_eq!(json["variant"], "ok");
        assert_eq!(json["neighbors"][0], "B");
    }
}
