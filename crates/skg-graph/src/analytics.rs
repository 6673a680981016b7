//! Graph analytics
//!
//! Degree and betweenness centrality over the directed knowledge graph,
//! plus community detection, bundled into a single report.

use std::collections::VecDeque;

use petgraph::graph::NodeIndex;
use petgraph::Direction;
use skg_core::{AnalyticsConfig, CommunityAlgorithm, Table};
use tracing::{info, warn};

use crate::community::{self, WeightedGraph};
use crate::KnowledgeGraph;

/// Degree centrality per node, in node insertion order
///
/// `(in + out) / (n - 1)` with parallel edges counted. A single node has
/// centrality 1.0.
pub fn degree_centrality(graph: &KnowledgeGraph) -> Vec<f64> {
    let n = graph.node_count();
    if n == 1 {
        return vec![1.0];
    }
    let scale = 1.0 / (n as f64 - 1.0);
    graph
        .graph()
        .node_indices()
        .map(|idx| graph.degree_of(idx) as f64 * scale)
        .collect()
}

/// Betweenness centrality per node, in node insertion order
///
/// Brandes' algorithm over unweighted directed shortest paths. Parallel
/// edges count as a single hop. Values are normalized by
/// `1 / ((n - 1)(n - 2))` when `n > 2`.
pub fn betweenness_centrality(graph: &KnowledgeGraph) -> Vec<f64> {
    let inner = graph.graph();
    let n = inner.node_count();
    let successors: Vec<Vec<usize>> = inner
        .node_indices()
        .map(|idx| {
            let mut next: Vec<usize> = inner
                .neighbors_directed(idx, Direction::Outgoing)
                .map(NodeIndex::index)
                .filter(|&w| w != idx.index())
                .collect();
            next.sort_unstable();
            next.dedup();
            next
        })
        .collect();

    let mut betweenness = vec![0.0; n];
    for s in 0..n {
        let mut stack = Vec::with_capacity(n);
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0_f64; n];
        let mut distance: Vec<Option<usize>> = vec![None; n];
        sigma[s] = 1.0;
        distance[s] = Some(0);

        let mut queue = VecDeque::from([s]);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            let dv = distance[v].unwrap_or(0);
            for &w in &successors[v] {
                if distance[w].is_none() {
                    distance[w] = Some(dv + 1);
                    queue.push_back(w);
                }
                if distance[w] == Some(dv + 1) {
                    sigma[w] += sigma[v];
                    predecessors[w].push(v);
                }
            }
        }

        let mut delta = vec![0.0_f64; n];
        while let Some(w) = stack.pop() {
            for &v in &predecessors[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                betweenness[w] += delta[w];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n as f64 - 1.0) * (n as f64 - 2.0));
        for b in &mut betweenness {
            *b *= scale;
        }
    }
    betweenness
}

/// Centrality scores of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct NodeCentrality {
    pub node: String,
    pub degree: f64,
    pub betweenness: f64,
}

/// Result of a full analytics pass
#[derive(Debug, Clone)]
pub struct AnalyticsReport {
    /// Every node, highest degree centrality first
    pub centralities: Vec<NodeCentrality>,
    /// Leading entries of `centralities`
    pub top_nodes: Vec<NodeCentrality>,
    /// Algorithm used for community detection
    pub algorithm: CommunityAlgorithm,
    /// Community members, largest community first
    pub communities: Vec<Vec<String>>,
    /// Modularity of the detected partition
    pub modularity: Option<f64>,
    /// Members shown per community when rendering
    pub display_limit: usize,
    /// Non-fatal problems encountered during the pass
    pub warnings: Vec<String>,
}

impl AnalyticsReport {
    /// Centrality table with one row per node
    pub fn centrality_table(&self) -> Table {
        let mut table = Table::new()
            .with_headers(vec![
                "Node".to_string(),
                "Degree Centrality".to_string(),
                "Betweenness Centrality".to_string(),
            ])
            .with_caption("Centrality");
        for c in &self.centralities {
            table.add_row(vec![
                Some(c.node.clone()),
                Some(format!("{:.4}", c.degree)),
                Some(format!("{:.4}", c.betweenness)),
            ]);
        }
        table
    }

    /// One line per community, members truncated to the display limit
    pub fn community_lines(&self) -> Vec<String> {
        self.communities
            .iter()
            .enumerate()
            .map(|(i, members)| {
                let shown: Vec<&str> = members
                    .iter()
                    .take(self.display_limit)
                    .map(String::as_str)
                    .collect();
                let more = if members.len() > self.display_limit {
                    ", ..."
                } else {
                    ""
                };
                format!("Community {}: {}{}", i + 1, shown.join(", "), more)
            })
            .collect()
    }
}

/// Outcome of [`GraphAnalytics::analyze`]
#[derive(Debug, Clone)]
pub enum AnalyticsOutcome {
    /// Nothing to analyze
    EmptyGraph,
    Report(AnalyticsReport),
}

/// Centrality and community analysis of a knowledge graph
#[derive(Debug, Clone)]
pub struct GraphAnalytics {
    algorithm: CommunityAlgorithm,
    top_n: usize,
    display_limit: usize,
}

impl Default for GraphAnalytics {
    fn default() -> Self {
        Self::new(&AnalyticsConfig::default())
    }
}

impl GraphAnalytics {
    pub fn new(config: &AnalyticsConfig) -> Self {
        Self {
            algorithm: config.algorithm,
            top_n: config.top_n,
            display_limit: config.display_limit,
        }
    }

    pub fn with_algorithm(mut self, algorithm: CommunityAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Run every measure
    ///
    /// Community detection failures become warnings; centralities are
    /// still reported.
    pub fn analyze(&self, graph: &KnowledgeGraph) -> AnalyticsOutcome {
        if graph.is_empty() {
            warn!("no nodes available for centrality or community analysis");
            return AnalyticsOutcome::EmptyGraph;
        }

        let degree = degree_centrality(graph);
        let betweenness = betweenness_centrality(graph);
        let mut centralities: Vec<NodeCentrality> = graph
            .nodes()
            .zip(degree.iter().zip(&betweenness))
            .map(|(node, (&degree, &betweenness))| NodeCentrality {
                node: node.to_string(),
                degree,
                betweenness,
            })
            .collect();
        // Stable: equal scores keep insertion order
        centralities.sort_by(|a, b| b.degree.total_cmp(&a.degree));
        let top_nodes = centralities.iter().take(self.top_n).cloned().collect();

        let mut warnings = Vec::new();
        let detected = community::detect(graph, self.algorithm).and_then(|partition| {
            let modularity =
                WeightedGraph::from_knowledge_graph(graph).modularity(&partition.assignment)?;
            Ok((partition, modularity))
        });
        let (communities, modularity) = match detected {
            Ok((partition, modularity)) => {
                let nodes: Vec<&str> = graph.nodes().collect();
                let named = partition
                    .communities
                    .iter()
                    .map(|members| members.iter().map(|&i| nodes[i].to_string()).collect())
                    .collect();
                (named, Some(modularity))
            }
            Err(e) => {
                let message = format!("Community detection skipped: {e}");
                warn!(algorithm = %self.algorithm, error = %e, "community detection failed");
                warnings.push(message);
                (Vec::new(), None)
            }
        };

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            communities = communities.len(),
            "graph analytics finished"
        );

        AnalyticsOutcome::Report(AnalyticsReport {
            centralities,
            top_nodes,
            algorithm: self.algorithm,
            communities,
            modularity,
            display_limit: self.display_limit,
            warnings,
        })
    }
}
