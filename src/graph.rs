//! Weighted directed graph with dense node indices.
//!
//! The training core never sees raw node identifiers. Edge lists carry
//! arbitrary non-negative integer ids; [`WeightedGraph`] maps them to dense
//! indices `0..N` in first-seen order so embeddings can be plain `N × D`
//! arrays indexed by node.
//!
//! The sampler and distribution builder only depend on the
//! [`DirectedWeightedGraph`] trait, so any representation exposing node and
//! edge counts, degrees and weighted edge iteration can be plugged in.

use crate::error::{Error, Result};
use ndarray::ArrayView2;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// External node identifier as found in edge lists.
pub type NodeId = u64;

/// Weight given to edges listed without a weight column.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// A `(source, target, weight)` triple over dense node indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedEdge {
    pub source: usize,
    pub target: usize,
    pub weight: f64,
}

impl WeightedEdge {
    pub fn new(source: usize, target: usize, weight: f64) -> Self {
        Self {
            source,
            target,
            weight,
        }
    }
}

/// Read-only view of a weighted directed graph over dense indices `0..N`.
pub trait DirectedWeightedGraph {
    /// Number of nodes `N`.
    fn node_count(&self) -> usize;

    /// Number of edges.
    fn edge_count(&self) -> usize;

    /// Sum of outgoing edge weights (`weighted`) or number of outgoing edges.
    fn out_degree(&self, node: usize, weighted: bool) -> f64;

    /// Sum of incoming edge weights (`weighted`) or number of incoming edges.
    fn in_degree(&self, node: usize, weighted: bool) -> f64;

    /// In-degree plus out-degree. Self-loops count twice.
    fn degree(&self, node: usize, weighted: bool) -> f64 {
        self.in_degree(node, weighted) + self.out_degree(node, weighted)
    }

    /// Edges with their weights, in a stable enumeration order.
    fn weighted_edges(&self) -> impl Iterator<Item = WeightedEdge> + '_;
}

/// Simple weighted digraph backed by petgraph.
///
/// Node weights hold the external [`NodeId`]; the petgraph `NodeIndex` is the
/// dense index. Adding an edge that already exists overwrites its weight.
///
/// # Example
///
/// ```rust
/// use smore::{DirectedWeightedGraph, WeightedGraph};
///
/// let mut graph = WeightedGraph::new();
/// graph.add_edge(1, 2, 0.1).unwrap();
/// graph.add_edge(1, 3, 0.3).unwrap();
///
/// assert_eq!(graph.node_count(), 3);
/// assert_eq!(graph.node_index(3), Some(2));
/// assert!((graph.out_degree(0, true) - 0.4).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Default)]
pub struct WeightedGraph {
    graph: DiGraph<NodeId, f64>,
    index: HashMap<NodeId, NodeIndex>,
}

impl WeightedGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Create an empty graph with reserved capacity.
    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            graph: DiGraph::with_capacity(nodes, edges),
            index: HashMap::with_capacity(nodes),
        }
    }

    /// Build a graph from `[source, target]` or `[source, target, weight]` rows.
    pub fn from_edge_list(edges: ArrayView2<'_, f64>) -> Result<Self> {
        let columns = edges.ncols();
        if !(2..=3).contains(&columns) {
            return Err(Error::InvalidInput(format!(
                "edge list must have 2 or 3 columns ([source, target] or [source, target, weight]), got {columns}"
            )));
        }

        let mut graph = Self::with_capacity(edges.nrows(), edges.nrows());
        for (row_idx, row) in edges.rows().into_iter().enumerate() {
            let source = node_id_from_f64(row[0]).ok_or_else(|| {
                Error::InvalidInput(format!("row {row_idx}: invalid source node {}", row[0]))
            })?;
            let target = node_id_from_f64(row[1]).ok_or_else(|| {
                Error::InvalidInput(format!("row {row_idx}: invalid target node {}", row[1]))
            })?;
            let weight = if columns == 3 { row[2] } else { DEFAULT_WEIGHT };
            graph.add_edge(source, target, weight)?;
        }
        Ok(graph)
    }

    /// Parse an edge list from text.
    ///
    /// Each line holds `source target [weight]`, separated by whitespace or
    /// commas. Blank lines and `#` comments are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut graph = Self::new();
        for (line_idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line_no = line_idx + 1;

            let fields: Vec<&str> = line
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|f| !f.is_empty())
                .collect();
            if !(2..=3).contains(&fields.len()) {
                return Err(Error::InvalidInput(format!(
                    "line {line_no}: expected 2 or 3 fields, got {}",
                    fields.len()
                )));
            }

            let source = parse_node_id(fields[0]).ok_or_else(|| {
                Error::InvalidInput(format!("line {line_no}: invalid source node '{}'", fields[0]))
            })?;
            let target = parse_node_id(fields[1]).ok_or_else(|| {
                Error::InvalidInput(format!("line {line_no}: invalid target node '{}'", fields[1]))
            })?;
            let weight = match fields.get(2) {
                Some(raw) => raw.parse::<f64>().map_err(|_| {
                    Error::InvalidInput(format!("line {line_no}: invalid weight '{raw}'"))
                })?,
                None => DEFAULT_WEIGHT,
            };
            graph.add_edge(source, target, weight)?;
        }
        Ok(graph)
    }

    /// Load an edge-list file (see [`WeightedGraph::from_reader`]).
    pub fn from_edge_list_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Add (or re-weight) the edge `source -> target`.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId, weight: f64) -> Result<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidInput(format!(
                "edge {source} -> {target}: weight must be finite and non-negative, got {weight}"
            )));
        }
        let s = self.get_or_create_node(source);
        let t = self.get_or_create_node(target);
        self.graph.update_edge(s, t, weight);
        Ok(())
    }

    fn get_or_create_node(&mut self, id: NodeId) -> NodeIndex {
        if let Some(&idx) = self.index.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(id);
        self.index.insert(id, idx);
        idx
    }

    /// Dense index of an external node id.
    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).map(|idx| idx.index())
    }

    /// External id of a dense node index.
    pub fn node_id(&self, index: usize) -> Option<NodeId> {
        self.graph.node_weight(NodeIndex::new(index)).copied()
    }

    /// External ids in dense-index order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_weights().copied()
    }

    /// Whether `source -> target` (dense indices) is an edge.
    pub fn contains_edge(&self, source: usize, target: usize) -> bool {
        self.edge_weight(source, target).is_some()
    }

    /// Weight of `source -> target` (dense indices).
    pub fn edge_weight(&self, source: usize, target: usize) -> Option<f64> {
        if source >= self.graph.node_count() || target >= self.graph.node_count() {
            return None;
        }
        self.graph
            .find_edge(NodeIndex::new(source), NodeIndex::new(target))
            .and_then(|e| self.graph.edge_weight(e).copied())
    }

    /// Access the underlying petgraph graph.
    pub fn as_petgraph(&self) -> &DiGraph<NodeId, f64> {
        &self.graph
    }

    fn directed_degree(&self, node: usize, direction: Direction, weighted: bool) -> f64 {
        if node >= self.graph.node_count() {
            return 0.0;
        }
        let edges = self.graph.edges_directed(NodeIndex::new(node), direction);
        if weighted {
            edges.map(|e| *e.weight()).sum()
        } else {
            edges.count() as f64
        }
    }
}

impl DirectedWeightedGraph for WeightedGraph {
    fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn out_degree(&self, node: usize, weighted: bool) -> f64 {
        self.directed_degree(node, Direction::Outgoing, weighted)
    }

    fn in_degree(&self, node: usize, weighted: bool) -> f64 {
        self.directed_degree(node, Direction::Incoming, weighted)
    }

    fn weighted_edges(&self) -> impl Iterator<Item = WeightedEdge> + '_ {
        self.graph.edge_references().map(|e| {
            WeightedEdge::new(e.source().index(), e.target().index(), *e.weight())
        })
    }
}

pub(crate) fn node_id_from_f64(value: f64) -> Option<NodeId> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
        Some(value as NodeId)
    } else {
        None
    }
}

fn parse_node_id(raw: &str) -> Option<NodeId> {
    raw.parse::<NodeId>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().and_then(node_id_from_f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn fixture() -> WeightedGraph {
        WeightedGraph::from_edge_list(
            array![[1., 2., 0.1], [1., 3., 0.3], [2., 4., 0.2], [3., 4., 0.4]].view(),
        )
        .unwrap()
    }

    #[test]
    fn test_dense_indices_follow_first_seen_order() {
        let graph = fixture();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 4);
        let ids: Vec<_> = graph.node_ids().collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(graph.node_index(4), Some(3));
        assert_eq!(graph.node_id(0), Some(1));
        assert_eq!(graph.node_id(9), None);
    }

    #[test]
    fn test_degrees() {
        let graph = fixture();
        assert!((graph.out_degree(0, true) - 0.4).abs() < 1e-12);
        assert!((graph.in_degree(3, true) - 0.6).abs() < 1e-12);
        assert_eq!(graph.out_degree(0, false), 2.0);
        assert_eq!(graph.degree(3, false), 2.0);
        // Out-of-range nodes have no edges.
        assert_eq!(graph.degree(42, true), 0.0);
    }

    #[test]
    fn test_edges_keep_insertion_order() {
        let graph = fixture();
        let weights: Vec<f64> = graph.weighted_edges().map(|e| e.weight).collect();
        assert_eq!(weights, vec![0.1, 0.3, 0.2, 0.4]);
    }

    #[test]
    fn test_readding_edge_overwrites_weight() {
        let mut graph = WeightedGraph::new();
        graph.add_edge(0, 1, 1.0).unwrap();
        graph.add_edge(0, 1, 2.5).unwrap();
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.edge_weight(0, 1), Some(2.5));
    }

    #[test]
    fn test_two_column_edge_list_defaults_weight() {
        let graph = WeightedGraph::from_edge_list(array![[0., 1.], [1., 2.]].view()).unwrap();
        assert_eq!(graph.edge_weight(0, 1), Some(DEFAULT_WEIGHT));
    }

    #[test]
    fn test_invalid_edge_lists() {
        assert!(matches!(
            WeightedGraph::from_edge_list(array![[1., 2., 3., 5.]].view()),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            WeightedGraph::from_edge_list(array![[1.], [2.]].view()),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            WeightedGraph::from_edge_list(array![[1.5, 2.]].view()),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            WeightedGraph::from_edge_list(array![[1., 2., -0.5]].view()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_from_reader() {
        let text = "# comment\n1 2 0.5\n\n2,3\n3\t1\t2\n";
        let graph = WeightedGraph::from_reader(text.as_bytes()).unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.edge_weight(1, 2), Some(DEFAULT_WEIGHT));
        assert_eq!(graph.edge_weight(2, 0), Some(2.0));
    }

    #[test]
    fn test_from_reader_reports_line() {
        let err = WeightedGraph::from_reader("1 2\n1 x\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
