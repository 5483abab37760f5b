//! Weighted random edge sampling for training batches.
//!
//! Each draw picks an edge index from the edge distribution (probability
//! proportional to edge weight), independently and with replacement. Hub
//! edges therefore show up repeatedly within one batch, which is exactly
//! what the gradient kernel has to reduce safely.
//!
//! # Example
//!
//! ```rust
//! use smore::{EdgeSampler, WeightedGraph};
//!
//! let mut graph = WeightedGraph::new();
//! graph.add_edge(1, 2, 0.1).unwrap();
//! graph.add_edge(1, 3, 0.3).unwrap();
//! graph.add_edge(2, 4, 0.2).unwrap();
//! graph.add_edge(3, 4, 0.4).unwrap();
//!
//! let mut sampler = EdgeSampler::with_seed(&graph, 42).unwrap();
//! let batch = sampler.sample_edges(100, true);
//!
//! assert_eq!(batch.len(), 100);
//! assert!(batch.iter().all(|e| graph.contains_edge(e.source, e.target)));
//! assert_eq!(batch.to_array().dim(), (100, 3));
//! ```

use crate::distribution::{build_distributions, Distributions};
use crate::error::{Error, Result};
use crate::graph::{node_id_from_f64, DirectedWeightedGraph, WeightedEdge, WeightedGraph, DEFAULT_WEIGHT};
use ndarray::{Array2, ArrayView2};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;

/// A batch of `(source, target, weight)` triples over dense node indices.
///
/// Rows are kept in draw order and need not be unique. A batch sampled
/// without weights carries unit weights and renders as two columns.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeBatch {
    edges: Vec<WeightedEdge>,
    include_weight: bool,
}

impl Default for EdgeBatch {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl EdgeBatch {
    /// Weighted batch from explicit triples.
    pub fn new(edges: Vec<WeightedEdge>) -> Self {
        Self {
            edges,
            include_weight: true,
        }
    }

    /// Parse a `size × 3` (`[source, target, weight]`) or `size × 2` array.
    ///
    /// Node columns hold dense indices; two-column input gets unit weights.
    pub fn from_array(rows: ArrayView2<'_, f64>) -> Result<Self> {
        let columns = rows.ncols();
        if !(2..=3).contains(&columns) {
            return Err(Error::InvalidInput(format!(
                "edge batch must have 2 or 3 columns, got {columns}"
            )));
        }

        let parse_index = |value: f64, row: usize, what: &str| -> Result<usize> {
            node_id_from_f64(value)
                .and_then(|id| usize::try_from(id).ok())
                .ok_or_else(|| Error::InvalidInput(format!("row {row}: invalid {what} index {value}")))
        };

        let mut edges = Vec::with_capacity(rows.nrows());
        for (i, row) in rows.rows().into_iter().enumerate() {
            let source = parse_index(row[0], i, "source")?;
            let target = parse_index(row[1], i, "target")?;
            let weight = if columns == 3 { row[2] } else { DEFAULT_WEIGHT };
            if !weight.is_finite() {
                return Err(Error::InvalidInput(format!("row {i}: non-finite weight {weight}")));
            }
            edges.push(WeightedEdge::new(source, target, weight));
        }

        Ok(Self {
            edges,
            include_weight: columns == 3,
        })
    }

    /// Number of triples.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Whether the batch renders a weight column.
    pub fn include_weight(&self) -> bool {
        self.include_weight
    }

    pub fn edges(&self) -> &[WeightedEdge] {
        &self.edges
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WeightedEdge> {
        self.edges.iter()
    }

    /// Largest node index referenced by the batch.
    pub fn max_node_index(&self) -> Option<usize> {
        self.edges.iter().map(|e| e.source.max(e.target)).max()
    }

    /// Render as a `size × 3` or `size × 2` array.
    pub fn to_array(&self) -> Array2<f64> {
        let columns = if self.include_weight { 3 } else { 2 };
        Array2::from_shape_fn((self.edges.len(), columns), |(i, j)| {
            let edge = &self.edges[i];
            match j {
                0 => edge.source as f64,
                1 => edge.target as f64,
                _ => edge.weight,
            }
        })
    }
}

impl FromIterator<WeightedEdge> for EdgeBatch {
    fn from_iter<I: IntoIterator<Item = WeightedEdge>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'b> IntoIterator for &'b EdgeBatch {
    type Item = &'b WeightedEdge;
    type IntoIter = std::slice::Iter<'b, WeightedEdge>;

    fn into_iter(self) -> Self::IntoIter {
        self.edges.iter()
    }
}

/// Draws weighted edge batches from a graph.
///
/// Holds a read-only reference to the graph and caches the node count, edge
/// count, the four sampling distributions, and a seedable generator.
pub struct EdgeSampler<'a, G: DirectedWeightedGraph = WeightedGraph> {
    graph: &'a G,
    n_nodes: usize,
    n_edges: usize,
    edges: Vec<WeightedEdge>,
    distributions: Distributions,
    edge_index: WeightedIndex<f64>,
    rng: XorShiftRng,
}

impl<G: DirectedWeightedGraph> std::fmt::Debug for EdgeSampler<'_, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeSampler")
            .field("n_nodes", &self.n_nodes)
            .field("n_edges", &self.n_edges)
            .finish()
    }
}

impl<'a, G: DirectedWeightedGraph> EdgeSampler<'a, G> {
    /// Create an unseeded sampler.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyGraph`] if the graph has no edges,
    /// [`Error::DegenerateDistribution`] if every edge weighs zero.
    pub fn new(graph: &'a G) -> Result<Self> {
        Self::build(graph, XorShiftRng::from_rng(&mut rand::rng()))
    }

    /// Create a sampler whose draws are reproducible for a given seed.
    pub fn with_seed(graph: &'a G, seed: u64) -> Result<Self> {
        Self::build(graph, XorShiftRng::seed_from_u64(seed))
    }

    fn build(graph: &'a G, rng: XorShiftRng) -> Result<Self> {
        let n_nodes = graph.node_count();
        let n_edges = graph.edge_count();
        if n_edges == 0 {
            return Err(Error::EmptyGraph(format!(
                "cannot sample edges from a graph with {n_nodes} nodes and no edges"
            )));
        }

        let distributions = build_distributions(graph, true)?;
        let edge_index = WeightedIndex::new(&distributions.edge)
            .map_err(|e| Error::DegenerateDistribution(format!("edge distribution: {e}")))?;
        let edges: Vec<WeightedEdge> = graph.weighted_edges().collect();

        tracing::debug!(n_nodes, n_edges, "edge sampler ready");

        Ok(Self {
            graph,
            n_nodes,
            n_edges,
            edges,
            distributions,
            edge_index,
            rng,
        })
    }

    /// Draw `size` edges independently, with replacement, by edge weight.
    ///
    /// `size = 0` yields an empty batch. With `include_weight = false` the
    /// batch carries unit weights and renders as two columns.
    pub fn sample_edges(&mut self, size: usize, include_weight: bool) -> EdgeBatch {
        let edges = (0..size)
            .map(|_| {
                let edge = self.edges[self.edge_index.sample(&mut self.rng)];
                if include_weight {
                    edge
                } else {
                    WeightedEdge::new(edge.source, edge.target, DEFAULT_WEIGHT)
                }
            })
            .collect();

        EdgeBatch {
            edges,
            include_weight,
        }
    }

    /// Reseed the generator.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = XorShiftRng::seed_from_u64(seed);
    }

    /// The graph being sampled.
    pub fn graph(&self) -> &'a G {
        self.graph
    }

    pub fn node_count(&self) -> usize {
        self.n_nodes
    }

    pub fn edge_count(&self) -> usize {
        self.n_edges
    }

    /// All four cached distributions.
    pub fn distributions(&self) -> &Distributions {
        &self.distributions
    }

    /// Node distribution proportional to weighted degree.
    pub fn node_distribution(&self) -> &[f64] {
        &self.distributions.degree
    }

    /// Node distribution proportional to weighted in-degree.
    pub fn negative_distribution(&self) -> &[f64] {
        &self.distributions.in_degree
    }

    pub fn out_degree_distribution(&self) -> &[f64] {
        &self.distributions.out_degree
    }

    pub fn edge_distribution(&self) -> &[f64] {
        &self.distributions.edge
    }
}
