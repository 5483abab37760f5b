//! Matrix-factorization lifecycle: graph, sampler and optimizer together.
//!
//! ```rust
//! use ndarray::array;
//! use smore::{MatrixFactorization, TrainingConfig};
//!
//! let edges = array![[1., 2., 0.1], [1., 3., 0.3], [2., 4., 0.2], [3., 4., 0.4]];
//! let config = TrainingConfig::default()
//!     .with_dimension(8)
//!     .with_sample_times(20)
//!     .with_sample_size(64)
//!     .with_seed(7);
//!
//! let mut model = MatrixFactorization::from_edge_list(edges.view(), config).unwrap();
//! let summary = model.train().unwrap();
//!
//! assert_eq!(summary.iterations, 20);
//! assert_eq!(model.embeddings().dim(), (4, 8));
//! assert!(model.embedding(4).is_some());
//! ```

use crate::error::{Error, Result};
use crate::graph::{DirectedWeightedGraph, NodeId, WeightedGraph};
use crate::kernel::{GradientKernel, Parallelism};
use crate::optimizer::PairOptimizer;
use crate::sampler::EdgeSampler;
use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Distribution, Uniform};
use rand_xorshift::XorShiftRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};

/// Training configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Embedding dimension (default: 64).
    pub dimension: usize,
    /// Number of sample-then-update iterations (default: 5).
    pub sample_times: usize,
    /// Edges drawn per iteration (default: 1_000_000).
    pub sample_size: usize,
    /// Initial learning rate (default: 0.025).
    pub learning_rate: f64,
    /// L2 coefficient (default: 0.01).
    pub l2_coefficient: f64,
    /// Apply L2 decay on every update (default: true).
    pub use_l2: bool,
    /// Seed for initialization and sampling (default: None, entropy-seeded).
    pub seed: Option<u64>,
    /// Kernel execution (default: rayon global pool).
    pub parallelism: Parallelism,
    /// Log the loss every this many iterations; 0 disables (default: 100).
    pub log_every: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dimension: 64,
            sample_times: 5,
            sample_size: 1_000_000,
            learning_rate: 0.025,
            l2_coefficient: 0.01,
            use_l2: true,
            seed: None,
            parallelism: Parallelism::Global,
            log_every: 100,
        }
    }
}

impl TrainingConfig {
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_sample_times(mut self, sample_times: usize) -> Self {
        self.sample_times = sample_times;
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_l2_coefficient(mut self, l2: f64) -> Self {
        self.l2_coefficient = l2;
        self
    }

    pub fn with_l2(mut self, use_l2: bool) -> Self {
        self.use_l2 = use_l2;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_log_every(mut self, log_every: usize) -> Self {
        self.log_every = log_every;
        self
    }

    /// Load a JSON config. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::InvalidInput("dimension must be at least 1".into()));
        }
        if self.sample_times == 0 {
            return Err(Error::InvalidInput("sample_times must be at least 1".into()));
        }
        if self.sample_size == 0 {
            return Err(Error::InvalidInput("sample_size must be at least 1".into()));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "learning_rate must be finite and positive, got {}",
                self.learning_rate
            )));
        }
        if !self.l2_coefficient.is_finite() || self.l2_coefficient < 0.0 {
            return Err(Error::InvalidInput(format!(
                "l2_coefficient must be finite and non-negative, got {}",
                self.l2_coefficient
            )));
        }
        if self.parallelism == Parallelism::Threads(0) {
            return Err(Error::InvalidInput("thread count must be at least 1".into()));
        }
        Ok(())
    }
}

/// Draw an `n × d` matrix uniformly from `[-1, 1)`.
pub fn init_embeddings<R: Rng + ?Sized>(n: usize, d: usize, rng: &mut R) -> Result<Array2<f64>> {
    let uniform = Uniform::new(-1.0_f64, 1.0)
        .map_err(|e| Error::InvalidInput(format!("embedding initializer: {e}")))?;
    Ok(Array2::from_shape_simple_fn((n, d), || uniform.sample(&mut *rng)))
}

/// Metrics reported after each training iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepMetrics {
    pub loss: f64,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub elapsed: Duration,
}

/// Outcome of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub iterations: usize,
    pub final_loss: f64,
    pub final_learning_rate: f64,
    pub elapsed: Duration,
}

/// Embedding model trained by sampling edges and applying pair updates.
#[derive(Debug)]
pub struct MatrixFactorization {
    graph: WeightedGraph,
    config: TrainingConfig,
    optimizer: PairOptimizer,
    seeds: XorShiftRng,
}

impl MatrixFactorization {
    /// Build the optimizer for `graph` with freshly initialized embeddings.
    ///
    /// # Errors
    ///
    /// Invalid configuration, an edgeless graph, or a graph with no positive
    /// edge weight.
    pub fn new(graph: WeightedGraph, config: TrainingConfig) -> Result<Self> {
        config.validate()?;

        let mut seeds = match config.seed {
            Some(seed) => XorShiftRng::seed_from_u64(seed),
            None => XorShiftRng::from_rng(&mut rand::rng()),
        };

        // Fail early on graphs the sampler would refuse.
        EdgeSampler::with_seed(&graph, seeds.next_u64())?;

        let embeddings = init_embeddings(graph.node_count(), config.dimension, &mut seeds)?;
        let kernel = GradientKernel::new(config.parallelism)?;
        let optimizer = PairOptimizer::new(
            embeddings,
            config.sample_times,
            config.sample_size,
            config.learning_rate,
            config.l2_coefficient,
        )?
        .with_kernel(kernel);
        optimizer.ensure_node_count(&graph)?;

        tracing::info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            dimension = config.dimension,
            "matrix factorization model ready"
        );

        Ok(Self {
            graph,
            config,
            optimizer,
            seeds,
        })
    }

    /// Build the graph from a 2- or 3-column edge list, then the model.
    pub fn from_edge_list(edges: ArrayView2<'_, f64>, config: TrainingConfig) -> Result<Self> {
        let graph = WeightedGraph::from_edge_list(edges)?;
        Self::new(graph, config)
    }

    /// Run `sample_times` iterations.
    pub fn train(&mut self) -> Result<TrainingSummary> {
        self.train_with_callback(|_, _| {})
    }

    /// Run `sample_times` iterations, calling `callback(iteration, metrics)`
    /// after each one.
    pub fn train_with_callback<F>(&mut self, mut callback: F) -> Result<TrainingSummary>
    where
        F: FnMut(usize, &StepMetrics),
    {
        let mut sampler = EdgeSampler::with_seed(&self.graph, self.seeds.next_u64())?;
        let sample_times = self.config.sample_times;
        let sample_size = self.config.sample_size;
        let use_l2 = self.config.use_l2;
        let log_every = self.config.log_every;
        let start = Instant::now();

        for iteration in 0..sample_times {
            let step_start = Instant::now();
            let batch = sampler.sample_edges(sample_size, true);
            self.optimizer.update(&batch, use_l2)?;

            let metrics = StepMetrics {
                loss: self.optimizer.loss(),
                learning_rate: self.optimizer.learning_rate(),
                batch_size: batch.len(),
                elapsed: step_start.elapsed(),
            };
            if log_every > 0 && iteration % log_every == 0 {
                tracing::info!(
                    iteration,
                    loss = metrics.loss,
                    learning_rate = metrics.learning_rate,
                    "training"
                );
            }
            callback(iteration, &metrics);
        }

        let summary = TrainingSummary {
            iterations: sample_times,
            final_loss: self.optimizer.loss(),
            final_learning_rate: self.optimizer.learning_rate(),
            elapsed: start.elapsed(),
        };
        tracing::info!(
            iterations = summary.iterations,
            loss = summary.final_loss,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "training finished"
        );
        Ok(summary)
    }

    pub fn embeddings(&self) -> ArrayView2<'_, f64> {
        self.optimizer.embeddings()
    }

    /// Embedding of an external node id.
    pub fn embedding(&self, node: NodeId) -> Option<ArrayView1<'_, f64>> {
        let index = self.graph.node_index(node)?;
        self.optimizer.embedding(index)
    }

    pub fn graph(&self) -> &WeightedGraph {
        &self.graph
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn optimizer(&self) -> &PairOptimizer {
        &self.optimizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small_config() -> TrainingConfig {
        TrainingConfig::default()
            .with_dimension(4)
            .with_sample_times(10)
            .with_sample_size(32)
            .with_seed(42)
    }

    #[test]
    fn test_config_defaults() {
        let config = TrainingConfig::default();
        assert_eq!(config.dimension, 64);
        assert_eq!(config.sample_times, 5);
        assert_eq!(config.sample_size, 1_000_000);
        assert_eq!(config.learning_rate, 0.025);
        assert_eq!(config.l2_coefficient, 0.01);
        assert!(config.use_l2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(TrainingConfig::default().with_dimension(0).validate().is_err());
        assert!(TrainingConfig::default().with_sample_times(0).validate().is_err());
        assert!(TrainingConfig::default().with_sample_size(0).validate().is_err());
        assert!(TrainingConfig::default().with_learning_rate(0.0).validate().is_err());
        assert!(TrainingConfig::default().with_learning_rate(f64::INFINITY).validate().is_err());
        assert!(TrainingConfig::default().with_l2_coefficient(-0.1).validate().is_err());
        assert!(TrainingConfig::default()
            .with_parallelism(Parallelism::Threads(0))
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_partial_json() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{"dimension": 16, "parallelism": "sequential"}"#).unwrap();
        assert_eq!(config.dimension, 16);
        assert_eq!(config.parallelism, Parallelism::Sequential);
        assert_eq!(config.sample_times, 5);
    }

    #[test]
    fn test_init_embeddings_range() {
        let mut rng = XorShiftRng::seed_from_u64(3);
        let e = init_embeddings(50, 8, &mut rng).unwrap();
        assert_eq!(e.dim(), (50, 8));
        assert!(e.iter().all(|&v| (-1.0..1.0).contains(&v)));
    }

    #[test]
    fn test_train_runs_all_iterations() {
        let edges = array![[1., 2., 0.1], [1., 3., 0.3], [2., 4., 0.2], [3., 4., 0.4]];
        let mut model = MatrixFactorization::from_edge_list(edges.view(), small_config()).unwrap();

        let mut seen = Vec::new();
        let summary = model
            .train_with_callback(|i, m| {
                assert_eq!(m.batch_size, 32);
                seen.push(i);
            })
            .unwrap();

        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert_eq!(summary.iterations, 10);
        assert_eq!(model.optimizer().n_update(), 10);
        assert!(summary.final_learning_rate < 0.025);
        assert!(model.embeddings().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_seeded_training_is_reproducible() {
        let edges = array![[0., 1.], [1., 2.], [2., 0.], [2., 3.]];
        let mut a = MatrixFactorization::from_edge_list(edges.view(), small_config()).unwrap();
        let mut b = MatrixFactorization::from_edge_list(edges.view(), small_config()).unwrap();
        a.train().unwrap();
        b.train().unwrap();
        assert_eq!(a.embeddings(), b.embeddings());
    }

    #[test]
    fn test_embedding_by_external_id() {
        let edges = array![[10., 20.], [20., 30.]];
        let model = MatrixFactorization::from_edge_list(edges.view(), small_config()).unwrap();
        assert_eq!(model.embedding(20), Some(model.embeddings().row(1)));
        assert!(model.embedding(99).is_none());
    }

    #[test]
    fn test_edgeless_graph_rejected() {
        let err = MatrixFactorization::new(WeightedGraph::new(), small_config()).unwrap_err();
        assert!(matches!(err, Error::EmptyGraph(_)));
    }

    #[test]
    fn test_bad_edge_list_rejected() {
        let edges = array![[1., 2., 3., 4.]];
        let err = MatrixFactorization::from_edge_list(edges.view(), small_config()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
