//! Sampling distributions derived from graph degrees and edge weights.
//!
//! | Distribution | Proportional to | Indexed by |
//! |--------------|-----------------|------------|
//! | degree       | in + out degree | node       |
//! | in-degree    | in degree       | node       |
//! | out-degree   | out degree      | node       |
//! | edge         | edge weight     | edge (graph enumeration order) |
//!
//! Each builder takes a `weighted` flag: weighted degrees sum incident edge
//! weights, unweighted degrees count incident edges, and the unweighted edge
//! distribution is uniform. Every returned vector sums to 1.

use crate::error::{Error, Result};
use crate::graph::DirectedWeightedGraph;

/// Which edges contribute to a node's degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegreeKind {
    /// Incoming edges only.
    In,
    /// Outgoing edges only.
    Out,
    /// Incoming plus outgoing edges.
    Total,
}

/// The four distributions cached by the edge sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct Distributions {
    /// Per node, proportional to total degree.
    pub degree: Vec<f64>,
    /// Per node, proportional to in-degree.
    pub in_degree: Vec<f64>,
    /// Per node, proportional to out-degree.
    pub out_degree: Vec<f64>,
    /// Per edge, proportional to edge weight.
    pub edge: Vec<f64>,
}

/// Scale a finite, non-negative sequence so that it sums to 1.
///
/// # Errors
///
/// [`Error::InvalidInput`] if the sequence is empty, has a negative or
/// non-finite entry, or sums to zero.
///
/// # Example
///
/// ```rust
/// use smore::distribution::normalize;
///
/// let p = normalize([2, 4, 4]).unwrap();
/// assert!((p[0] - 0.2).abs() < 1e-12);
/// assert!((p[1] - 0.4).abs() < 1e-12);
/// ```
pub fn normalize<I>(values: I) -> Result<Vec<f64>>
where
    I: IntoIterator,
    I::Item: Into<f64>,
{
    let values: Vec<f64> = values.into_iter().map(Into::into).collect();
    if values.is_empty() {
        return Err(Error::InvalidInput("cannot normalize an empty sequence".into()));
    }
    if let Some((i, v)) = values
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v < 0.0)
    {
        return Err(Error::InvalidInput(format!(
            "entry {i} is {v}; entries must be finite and non-negative"
        )));
    }

    let total: f64 = values.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(Error::InvalidInput(format!(
            "cannot normalize a sequence summing to {total}"
        )));
    }
    Ok(values.into_iter().map(|v| v / total).collect())
}

/// Raw (unnormalized) degree of every node, in dense-index order.
pub fn degrees<G>(graph: &G, kind: DegreeKind, weighted: bool) -> Vec<f64>
where
    G: DirectedWeightedGraph + ?Sized,
{
    (0..graph.node_count())
        .map(|node| match kind {
            DegreeKind::In => graph.in_degree(node, weighted),
            DegreeKind::Out => graph.out_degree(node, weighted),
            DegreeKind::Total => graph.degree(node, weighted),
        })
        .collect()
}

/// Node distribution proportional to total degree.
pub fn degree_distribution<G>(graph: &G, weighted: bool) -> Result<Vec<f64>>
where
    G: DirectedWeightedGraph + ?Sized,
{
    to_distribution(degrees(graph, DegreeKind::Total, weighted), "degree")
}

/// Node distribution proportional to in-degree.
pub fn in_degree_distribution<G>(graph: &G, weighted: bool) -> Result<Vec<f64>>
where
    G: DirectedWeightedGraph + ?Sized,
{
    to_distribution(degrees(graph, DegreeKind::In, weighted), "in-degree")
}

/// Node distribution proportional to out-degree.
pub fn out_degree_distribution<G>(graph: &G, weighted: bool) -> Result<Vec<f64>>
where
    G: DirectedWeightedGraph + ?Sized,
{
    to_distribution(degrees(graph, DegreeKind::Out, weighted), "out-degree")
}

/// Edge distribution proportional to edge weight (uniform when unweighted).
pub fn edge_distribution<G>(graph: &G, weighted: bool) -> Result<Vec<f64>>
where
    G: DirectedWeightedGraph + ?Sized,
{
    let raw: Vec<f64> = graph
        .weighted_edges()
        .map(|e| if weighted { e.weight } else { 1.0 })
        .collect();
    to_distribution(raw, "edge")
}

/// Build all four distributions in one pass over the graph.
pub fn build_distributions<G>(graph: &G, weighted: bool) -> Result<Distributions>
where
    G: DirectedWeightedGraph + ?Sized,
{
    Ok(Distributions {
        degree: degree_distribution(graph, weighted)?,
        in_degree: in_degree_distribution(graph, weighted)?,
        out_degree: out_degree_distribution(graph, weighted)?,
        edge: edge_distribution(graph, weighted)?,
    })
}

fn to_distribution(raw: Vec<f64>, what: &str) -> Result<Vec<f64>> {
    let total: f64 = raw.iter().sum();
    if raw.is_empty() || total <= 0.0 {
        return Err(Error::DegenerateDistribution(format!(
            "{what} distribution has zero total mass over {} entries",
            raw.len()
        )));
    }
    normalize(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::WeightedGraph;
    use ndarray::array;

    fn fixture() -> WeightedGraph {
        WeightedGraph::from_edge_list(
            array![[1., 2., 0.1], [1., 3., 0.3], [2., 4., 0.2], [3., 4., 0.4]].view(),
        )
        .unwrap()
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        let total: f64 = expected.iter().sum();
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e / total).abs() < 1e-9, "{actual:?} vs {expected:?}");
        }
    }

    #[test]
    fn test_normalize() {
        assert_close(&normalize([2, 4, 4]).unwrap(), &[0.2, 0.4, 0.4]);
        assert_close(&normalize(vec![2.0, 4.0, 4.0]).unwrap(), &[0.2, 0.4, 0.4]);
        assert_close(&normalize([0.0, 3.0]).unwrap(), &[0.0, 1.0]);
    }

    #[test]
    fn test_normalize_rejects_bad_input() {
        assert!(matches!(normalize([0.0, 0.0]), Err(Error::InvalidInput(_))));
        assert!(matches!(normalize([1.0, -1.0, 2.0]), Err(Error::InvalidInput(_))));
        assert!(matches!(normalize([1.0, f64::NAN]), Err(Error::InvalidInput(_))));
        assert!(matches!(normalize(Vec::<f64>::new()), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_out_degree_distribution() {
        let g = fixture();
        assert_close(&out_degree_distribution(&g, true).unwrap(), &[0.4, 0.2, 0.4, 0.0]);
        assert_close(&out_degree_distribution(&g, false).unwrap(), &[2., 1., 1., 0.]);
    }

    #[test]
    fn test_in_degree_distribution() {
        let g = fixture();
        assert_close(&in_degree_distribution(&g, true).unwrap(), &[0.0, 0.1, 0.3, 0.6]);
        assert_close(&in_degree_distribution(&g, false).unwrap(), &[0., 1., 1., 2.]);
    }

    #[test]
    fn test_degree_distribution() {
        let g = fixture();
        assert_close(&degree_distribution(&g, true).unwrap(), &[0.4, 0.3, 0.7, 0.6]);
        assert_close(&degree_distribution(&g, false).unwrap(), &[2., 2., 2., 2.]);
    }

    #[test]
    fn test_edge_distribution() {
        let g = fixture();
        assert_close(&edge_distribution(&g, true).unwrap(), &[0.1, 0.3, 0.2, 0.4]);
        assert_close(&edge_distribution(&g, false).unwrap(), &[1., 1., 1., 1.]);
    }

    #[test]
    fn test_raw_degrees() {
        let g = fixture();
        assert_eq!(degrees(&g, DegreeKind::Out, false), vec![2., 1., 1., 0.]);
        assert_eq!(degrees(&g, DegreeKind::Total, false), vec![2., 2., 2., 2.]);
    }

    #[test]
    fn test_zero_weight_graph_is_degenerate() {
        let mut g = WeightedGraph::new();
        g.add_edge(0, 1, 0.0).unwrap();
        g.add_edge(1, 2, 0.0).unwrap();
        assert!(matches!(
            build_distributions(&g, true),
            Err(Error::DegenerateDistribution(_))
        ));
        // Unweighted mode only counts edges.
        assert!(build_distributions(&g, false).is_ok());
    }

    #[test]
    fn test_empty_graph_is_degenerate() {
        let g = WeightedGraph::new();
        assert!(matches!(
            edge_distribution(&g, true),
            Err(Error::DegenerateDistribution(_))
        ));
    }
}
