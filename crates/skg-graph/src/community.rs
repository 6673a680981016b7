//! Community detection
//!
//! Both algorithms run on the undirected projection of the knowledge graph:
//! an A -> B edge and a B -> A edge both add weight to the same undirected
//! pair, so the pair weight is the number of triples linking the two
//! entities in either direction.
//!
//! Adjacency follows the usual modularity convention: a self-loop of weight
//! `w` contributes `2w` to its node's degree.

use std::collections::BTreeMap;

use skg_core::{CommunityAlgorithm, SkgError};
use thiserror::Error;
use tracing::debug;

use crate::KnowledgeGraph;

/// Upper bound on Louvain aggregation levels
pub const DEFAULT_MAX_LEVELS: usize = 64;

/// Upper bound on local-moving sweeps within one Louvain level
pub const DEFAULT_MAX_SWEEPS: usize = 256;

const GAIN_EPSILON: f64 = 1e-12;

/// Community detection errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommunityError {
    #[error("Louvain did not converge within {0} passes")]
    DidNotConverge(usize),

    #[error("Invalid edge weight {weight} between {source_node} and {target_node}")]
    InvalidWeight {
        source_node: usize,
        target_node: usize,
        weight: f64,
    },

    #[error("Assignment covers {actual} nodes, graph has {expected}")]
    AssignmentLength { expected: usize, actual: usize },
}

impl From<CommunityError> for SkgError {
    fn from(err: CommunityError) -> Self {
        SkgError::Analytics(err.to_string())
    }
}

/// Weighted undirected graph over dense node ids
#[derive(Debug, Clone, Default)]
pub struct WeightedGraph {
    adjacency: Vec<BTreeMap<usize, f64>>,
}

impl WeightedGraph {
    pub fn new(node_count: usize) -> Self {
        Self {
            adjacency: vec![BTreeMap::new(); node_count],
        }
    }

    /// Undirected projection of a knowledge graph, weighted by multiplicity
    pub fn from_knowledge_graph(graph: &KnowledgeGraph) -> Self {
        let inner = graph.graph();
        let mut projection = Self::new(inner.node_count());
        for edge in inner.raw_edges() {
            projection.accumulate(edge.source().index(), edge.target().index(), 1.0);
        }
        projection
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Add weight to an undirected pair
    pub fn add_edge(&mut self, u: usize, v: usize, weight: f64) -> Result<(), CommunityError> {
        if !weight.is_finite() || weight <= 0.0 {
            return Err(CommunityError::InvalidWeight {
                source_node: u,
                target_node: v,
                weight,
            });
        }
        let needed = u.max(v) + 1;
        if self.adjacency.len() < needed {
            self.adjacency.resize(needed, BTreeMap::new());
        }
        self.accumulate(u, v, weight);
        Ok(())
    }

    fn accumulate(&mut self, u: usize, v: usize, weight: f64) {
        if u == v {
            *self.adjacency[u].entry(u).or_insert(0.0) += 2.0 * weight;
        } else {
            *self.adjacency[u].entry(v).or_insert(0.0) += weight;
            *self.adjacency[v].entry(u).or_insert(0.0) += weight;
        }
    }

    fn degree(&self, u: usize) -> f64 {
        self.adjacency[u].values().sum()
    }

    /// Sum of all degrees (twice the total edge weight)
    fn total_degree(&self) -> f64 {
        (0..self.node_count()).map(|u| self.degree(u)).sum()
    }

    /// Newman modularity of an assignment of nodes to communities
    pub fn modularity(&self, assignment: &[usize]) -> Result<f64, CommunityError> {
        if assignment.len() != self.node_count() {
            return Err(CommunityError::AssignmentLength {
                expected: self.node_count(),
                actual: assignment.len(),
            });
        }
        let two_m = self.total_degree();
        if two_m == 0.0 {
            return Ok(0.0);
        }

        let mut internal: BTreeMap<usize, f64> = BTreeMap::new();
        let mut totals: BTreeMap<usize, f64> = BTreeMap::new();
        for (u, neighbors) in self.adjacency.iter().enumerate() {
            let cu = assignment[u];
            *totals.entry(cu).or_insert(0.0) += self.degree(u);
            for (&v, &w) in neighbors {
                if assignment[v] == cu {
                    *internal.entry(cu).or_insert(0.0) += w;
                }
            }
        }

        Ok(totals
            .iter()
            .map(|(c, tot)| {
                let inside = internal.get(c).copied().unwrap_or(0.0);
                inside / two_m - (tot / two_m).powi(2)
            })
            .sum())
    }
}

/// A partition of graph nodes into communities
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Community id per node id
    pub assignment: Vec<usize>,
    /// Node ids per community, largest community first
    pub communities: Vec<Vec<usize>>,
}

impl Partition {
    /// Build from an arbitrary labelling, renumbering communities by size
    ///
    /// Ties in size are broken by the smallest member id, so the numbering
    /// only depends on the labelling.
    fn from_labels(labels: &[usize]) -> Self {
        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (node, &label) in labels.iter().enumerate() {
            groups.entry(label).or_default().push(node);
        }

        let mut communities: Vec<Vec<usize>> = groups.into_values().collect();
        communities.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));

        let mut assignment = vec![0; labels.len()];
        for (id, members) in communities.iter().enumerate() {
            for &node in members {
                assignment[node] = id;
            }
        }

        Self {
            assignment,
            communities,
        }
    }

    pub fn len(&self) -> usize {
        self.communities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.communities.is_empty()
    }
}

/// Run the configured algorithm on a knowledge graph
pub fn detect(
    graph: &KnowledgeGraph,
    algorithm: CommunityAlgorithm,
) -> Result<Partition, CommunityError> {
    let projection = WeightedGraph::from_knowledge_graph(graph);
    let partition = match algorithm {
        CommunityAlgorithm::GreedyModularity => greedy_modularity(&projection),
        CommunityAlgorithm::Louvain => Louvain::default().run(&projection)?,
    };
    debug!(
        %algorithm,
        communities = partition.len(),
        "community detection finished"
    );
    Ok(partition)
}

// ============================================================================
// Greedy modularity (Clauset-Newman-Moore)
// ============================================================================

/// Agglomerate communities while a merge increases modularity
///
/// Starts from singletons and repeatedly merges the connected pair with the
/// largest gain `2 (e_ij - a_i a_j)`. Equal gains resolve to the pair with
/// the smallest ids.
pub fn greedy_modularity(graph: &WeightedGraph) -> Partition {
    let n = graph.node_count();
    let two_m = graph.total_degree();
    if n == 0 || two_m == 0.0 {
        return Partition::from_labels(&(0..n).collect::<Vec<_>>());
    }

    // Fraction of edge ends between communities (off-diagonal only)
    let mut links: Vec<BTreeMap<usize, f64>> = graph
        .adjacency
        .iter()
        .enumerate()
        .map(|(u, neighbors)| {
            neighbors
                .iter()
                .filter(|(&v, _)| v != u)
                .map(|(&v, &w)| (v, w / two_m))
                .collect()
        })
        .collect();
    let mut share: Vec<f64> = (0..n).map(|u| graph.degree(u) / two_m).collect();
    let mut alive = vec![true; n];
    let mut labels: Vec<usize> = (0..n).collect();

    loop {
        let mut best: Option<(f64, usize, usize)> = None;
        for i in (0..n).filter(|&i| alive[i]) {
            for (&j, &e_ij) in links[i].range(i + 1..) {
                let gain = 2.0 * (e_ij - share[i] * share[j]);
                if best.map_or(true, |(g, _, _)| gain > g + GAIN_EPSILON) {
                    best = Some((gain, i, j));
                }
            }
        }

        let Some((gain, i, j)) = best else { break };
        if gain <= GAIN_EPSILON {
            break;
        }

        // Fold j into i
        let absorbed = std::mem::take(&mut links[j]);
        for (k, e_jk) in absorbed {
            if k == i {
                continue;
            }
            *links[i].entry(k).or_insert(0.0) += e_jk;
            if let Some(e_kj) = links[k].remove(&j) {
                *links[k].entry(i).or_insert(0.0) += e_kj;
            }
        }
        links[i].remove(&j);
        share[i] += share[j];
        share[j] = 0.0;
        alive[j] = false;
        for label in labels.iter_mut().filter(|l| **l == j) {
            *label = i;
        }
    }

    Partition::from_labels(&labels)
}

// ============================================================================
// Louvain
// ============================================================================

/// Louvain modularity optimisation with a deterministic node order
#[derive(Debug, Clone)]
pub struct Louvain {
    max_levels: usize,
    max_sweeps: usize,
}

impl Default for Louvain {
    fn default() -> Self {
        Self {
            max_levels: DEFAULT_MAX_LEVELS,
            max_sweeps: DEFAULT_MAX_SWEEPS,
        }
    }
}

impl Louvain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_levels(mut self, levels: usize) -> Self {
        self.max_levels = levels;
        self
    }

    pub fn with_max_sweeps(mut self, sweeps: usize) -> Self {
        self.max_sweeps = sweeps;
        self
    }

    /// Alternate local moving and aggregation until no node moves
    pub fn run(&self, graph: &WeightedGraph) -> Result<Partition, CommunityError> {
        let n = graph.node_count();
        let mut membership: Vec<usize> = (0..n).collect();
        if n == 0 || graph.total_degree() == 0.0 {
            return Ok(Partition::from_labels(&membership));
        }

        let mut level_graph = graph.clone();
        for level in 0..self.max_levels {
            let (labels, moved) = self.local_moving(&level_graph)?;
            if !moved {
                debug!(level, "louvain converged");
                return Ok(Partition::from_labels(&membership));
            }

            let (renumbered, count) = renumber(&labels);
            for m in membership.iter_mut() {
                *m = renumbered[*m];
            }
            level_graph = aggregate(&level_graph, &renumbered, count);
        }

        Err(CommunityError::DidNotConverge(self.max_levels))
    }

    /// Move single nodes to the neighbouring community with the best gain
    fn local_moving(&self, graph: &WeightedGraph) -> Result<(Vec<usize>, bool), CommunityError> {
        let n = graph.node_count();
        let two_m = graph.total_degree();
        let degree: Vec<f64> = (0..n).map(|u| graph.degree(u)).collect();
        let mut community: Vec<usize> = (0..n).collect();
        let mut totals = degree.clone();
        let mut moved_any = false;

        for _ in 0..self.max_sweeps {
            let mut moved = false;
            for u in 0..n {
                let current = community[u];
                totals[current] -= degree[u];

                let mut weights: BTreeMap<usize, f64> = BTreeMap::new();
                for (&v, &w) in &graph.adjacency[u] {
                    if v != u {
                        *weights.entry(community[v]).or_insert(0.0) += w;
                    }
                }

                let gain = |c: usize, w: f64| w - totals[c] * degree[u] / two_m;
                let mut best = current;
                let mut best_gain = gain(current, weights.get(&current).copied().unwrap_or(0.0));
                for (&c, &w) in &weights {
                    let g = gain(c, w);
                    if g > best_gain + GAIN_EPSILON {
                        best = c;
                        best_gain = g;
                    }
                }

                totals[best] += degree[u];
                if best != current {
                    community[u] = best;
                    moved = true;
                }
            }

            if !moved {
                return Ok((community, moved_any));
            }
            moved_any = true;
        }

        Err(CommunityError::DidNotConverge(self.max_sweeps))
    }
}

/// Map labels to 0..count in order of first appearance
fn renumber(labels: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping: BTreeMap<usize, usize> = BTreeMap::new();
    let renumbered = labels
        .iter()
        .map(|l| {
            let next = mapping.len();
            *mapping.entry(*l).or_insert(next)
        })
        .collect();
    (renumbered, mapping.len())
}

/// Collapse each community into a single node
fn aggregate(graph: &WeightedGraph, labels: &[usize], count: usize) -> WeightedGraph {
    let mut collapsed = WeightedGraph::new(count);
    for (u, neighbors) in graph.adjacency.iter().enumerate() {
        for (&v, &w) in neighbors {
            *collapsed.adjacency[labels[u]].entry(labels[v]).or_insert(0.0) += w;
        }
    }
    collapsed
}
