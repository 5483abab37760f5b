//! `smore` is a small graph-embedding training kernel.
//!
//! Embeddings are learned by matrix factorization over a weighted directed
//! graph: batches of edges are drawn with probability proportional to their
//! weight, each edge's reconstruction error `w - <e_s, e_t>` is turned into a
//! gradient, and a pair optimizer applies the accumulated per-node updates
//! with an annealed learning rate.
//!
//! The pieces, bottom-up:
//!
//! - [`graph`]: [`WeightedGraph`] and the [`DirectedWeightedGraph`] trait.
//! - [`distribution`]: normalized degree and edge distributions.
//! - [`sampler`]: [`EdgeSampler`] drawing [`EdgeBatch`]es.
//! - [`kernel`]: [`GradientKernel`], the parallel scatter-reduction.
//! - [`optimizer`]: [`PairOptimizer`].
//! - [`model`]: [`MatrixFactorization`] tying it all together.
//!
//! ```rust
//! use smore::{DirectedWeightedGraph, WeightedGraph};
//!
//! let mut graph = WeightedGraph::new();
//! graph.add_edge(1, 2, 1.0).unwrap();
//! graph.add_edge(1, 3, 3.0).unwrap();
//! assert_eq!(graph.node_count(), 3);
//! assert_eq!(graph.out_degree(0, true), 4.0);
//! ```
//!
//! ```rust
//! use smore::distribution::normalize;
//!
//! assert_eq!(normalize([1.0, 3.0]).unwrap(), vec![0.25, 0.75]);
//! ```
//!
//! ```rust
//! use smore::{EdgeSampler, WeightedGraph};
//!
//! let mut graph = WeightedGraph::new();
//! graph.add_edge(1, 2, 1.0).unwrap();
//! graph.add_edge(2, 3, 3.0).unwrap();
//!
//! let mut sampler = EdgeSampler::with_seed(&graph, 42).unwrap();
//! let batch = sampler.sample_edges(10, true);
//! assert_eq!(batch.to_array().dim(), (10, 3));
//! ```

pub mod distribution;
pub mod error;
pub mod graph;
pub mod kernel;
pub mod model;
pub mod optimizer;
pub mod sampler;

pub use distribution::Distributions;
pub use error::{Error, Result};
pub use graph::{DirectedWeightedGraph, NodeId, WeightedEdge, WeightedGraph};
pub use kernel::{GradientKernel, KernelOutput, Parallelism};
pub use model::{MatrixFactorization, StepMetrics, TrainingConfig, TrainingSummary};
pub use optimizer::{OptimizerState, PairOptimizer, TrainingPhase};
pub use sampler::{EdgeBatch, EdgeSampler};

pub use ndarray;
pub use petgraph;
