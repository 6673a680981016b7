//! SKG Graph - Knowledge graph assembly
//!
//! Builds a directed multigraph from extracted triples: one node per
//! distinct entity string, one labelled edge per triple. Parallel edges
//! between the same pair of entities are kept.
//!
//! Author: hephaex@gmail.com

use std::collections::HashMap;

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use skg_core::{Edge, Triple};
use tracing::debug;

pub mod analytics;
pub mod community;

pub use analytics::{
    betweenness_centrality, degree_centrality, AnalyticsOutcome, AnalyticsReport, GraphAnalytics,
    NodeCentrality,
};
pub use community::{CommunityError, Louvain, Partition, WeightedGraph};

/// Data stored on every graph edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeData {
    /// Predicate of the triple that produced the edge
    pub label: String,
}

impl From<&Triple> for EdgeData {
    fn from(t: &Triple) -> Self {
        Self {
            label: t.predicate.clone(),
        }
    }
}

/// Directed multigraph of entities
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    graph: DiGraph<String, EdgeData>,
    index: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a graph from triples in order
    pub fn from_triples<'a, I>(triples: I) -> Self
    where
        I: IntoIterator<Item = &'a Triple>,
    {
        let mut graph = Self::new();
        for triple in triples {
            graph.add_triple(triple);
        }
        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "assembled knowledge graph"
        );
        graph
    }

    /// Add a node, returning the existing index if the entity is known
    pub fn add_node(&mut self, entity: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(entity) {
            return idx;
        }
        let idx = self.graph.add_node(entity.to_string());
        self.index.insert(entity.to_string(), idx);
        idx
    }

    /// Add the subject -> object edge for a triple
    pub fn add_triple(&mut self, triple: &Triple) -> EdgeIndex {
        let source = self.add_node(&triple.subject);
        let target = self.add_node(&triple.object);
        self.graph.add_edge(source, target, EdgeData::from(triple))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Entities in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &str> + '_ {
        self.graph.node_indices().map(move |i| self.graph[i].as_str())
    }

    /// All edges in insertion order
    pub fn edges(&self) -> Vec<Edge> {
        self.graph
            .edge_indices()
            .filter_map(|e| self.edge_record(e))
            .collect()
    }

    pub fn contains_node(&self, entity: &str) -> bool {
        self.index.contains_key(entity)
    }

    pub fn node_index(&self, entity: &str) -> Option<NodeIndex> {
        self.index.get(entity).copied()
    }

    /// Outgoing edges of an entity in insertion order
    ///
    /// Unknown entities have no edges.
    pub fn out_edges(&self, entity: &str) -> Vec<Edge> {
        let Some(idx) = self.node_index(entity) else {
            return Vec::new();
        };
        let mut ids: Vec<EdgeIndex> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        // petgraph walks adjacency lists newest first
        ids.sort();
        ids.into_iter().filter_map(|e| self.edge_record(e)).collect()
    }

    /// In-degree plus out-degree, counting parallel edges
    pub fn degree(&self, entity: &str) -> usize {
        self.node_index(entity)
            .map(|idx| self.degree_of(idx))
            .unwrap_or(0)
    }

    /// Underlying petgraph graph
    pub fn graph(&self) -> &DiGraph<String, EdgeData> {
        &self.graph
    }

    pub(crate) fn degree_of(&self, idx: NodeIndex) -> usize {
        self.graph.edges_directed(idx, Direction::Outgoing).count()
            + self.graph.edges_directed(idx, Direction::Incoming).count()
    }

    fn edge_record(&self, e: EdgeIndex) -> Option<Edge> {
        let (source, target) = self.graph.edge_endpoints(e)?;
        let data = self.graph.edge_weight(e)?;
        Some(Edge {
            source: self.graph[source].clone(),
            target: self.graph[target].clone(),
            label: data.label.clone(),
        })
    }
}
