//! Pair optimizer: SGD on dot-product edge reconstruction.
//!
//! Each [`PairOptimizer::update`] runs the gradient kernel on one batch,
//! applies
//!
//! ```text
//! E += lr * (update - l2 * E)    // with L2
//! E += lr * update               // without
//! ```
//!
//! and then anneals the learning rate linearly over
//! `total_update_times * sample_size`, never dropping below
//! `0.0001 * initial_rate`.
//!
//! The optimizer owns the embedding matrix. It is not meant for concurrent
//! `update` calls; callers serialize training steps, and parallelism lives
//! inside the kernel.

use crate::error::{Error, Result};
use crate::graph::DirectedWeightedGraph;
use crate::kernel::GradientKernel;
use crate::sampler::EdgeBatch;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Zip};
use serde::Serialize;

/// Floor of the learning rate as a fraction of the initial rate.
pub const MIN_LEARNING_RATE_RATIO: f64 = 0.0001;

/// Where the optimizer is in its update schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrainingPhase {
    /// No update applied yet.
    Idle,
    /// Between the first and the scheduled last update.
    Updating,
    /// `n_update` reached `total_update_times`. Further updates stay legal.
    Converged,
}

/// Snapshot of the optimizer's scalar state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OptimizerState {
    pub learning_rate: f64,
    pub learning_rate_min: f64,
    pub l2_coefficient: f64,
    pub total_update_times: usize,
    pub sample_size: usize,
    pub n_update: usize,
    pub current_loss: f64,
}

/// SGD optimizer over an `N × D` embedding matrix.
///
/// # Example
///
/// ```rust
/// use ndarray::array;
/// use smore::{EdgeBatch, PairOptimizer, WeightedEdge};
///
/// let embeddings = array![[1., 1.], [1., 0.], [1., 2.]];
/// let mut optimizer = PairOptimizer::new(embeddings, 5, 2, 0.025, 0.01).unwrap();
///
/// let batch = EdgeBatch::new(vec![WeightedEdge::new(0, 1, 0.), WeightedEdge::new(1, 2, 1.)]);
/// optimizer.update(&batch, false).unwrap();
///
/// assert_eq!(optimizer.n_update(), 1);
/// assert_eq!(optimizer.loss(), -1.0);
/// assert!(optimizer.learning_rate() <= 0.025);
/// ```
#[derive(Debug, Clone)]
pub struct PairOptimizer {
    embeddings: Array2<f64>,
    kernel: GradientKernel,
    initial_learning_rate: f64,
    learning_rate: f64,
    learning_rate_min: f64,
    l2_coefficient: f64,
    total_update_times: usize,
    sample_size: usize,
    n_update: usize,
    loss: f64,
    node_loss: Array1<f64>,
}

impl PairOptimizer {
    /// Create an optimizer that takes ownership of `embeddings`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] if the learning rate is not finite and
    /// positive, the L2 coefficient is negative or non-finite, or either
    /// schedule length is zero.
    pub fn new(
        embeddings: Array2<f64>,
        total_update_times: usize,
        sample_size: usize,
        learning_rate: f64,
        l2_coefficient: f64,
    ) -> Result<Self> {
        if !learning_rate.is_finite() || learning_rate <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "learning rate must be finite and positive, got {learning_rate}"
            )));
        }
        if !l2_coefficient.is_finite() || l2_coefficient < 0.0 {
            return Err(Error::InvalidInput(format!(
                "L2 coefficient must be finite and non-negative, got {l2_coefficient}"
            )));
        }
        if total_update_times == 0 || sample_size == 0 {
            return Err(Error::InvalidInput(format!(
                "schedule needs total_update_times >= 1 and sample_size >= 1, got {total_update_times} and {sample_size}"
            )));
        }

        let n_nodes = embeddings.nrows();
        Ok(Self {
            embeddings,
            kernel: GradientKernel::default(),
            initial_learning_rate: learning_rate,
            learning_rate,
            learning_rate_min: learning_rate * MIN_LEARNING_RATE_RATIO,
            l2_coefficient,
            total_update_times,
            sample_size,
            n_update: 0,
            loss: 0.0,
            node_loss: Array1::zeros(n_nodes),
        })
    }

    /// Replace the gradient kernel (and with it the execution configuration).
    pub fn with_kernel(mut self, kernel: GradientKernel) -> Self {
        self.kernel = kernel;
        self
    }

    /// Check that the embedding matrix has one row per graph node.
    pub fn ensure_node_count<G: DirectedWeightedGraph>(&self, graph: &G) -> Result<()> {
        let rows = self.embeddings.nrows();
        let nodes = graph.node_count();
        if rows != nodes {
            return Err(Error::DimensionMismatch(format!(
                "embedding matrix has {rows} rows but the graph has {nodes} nodes"
            )));
        }
        Ok(())
    }

    /// Apply one SGD step for `batch`.
    ///
    /// An empty batch is a zero-gradient step: embeddings only change through
    /// L2 decay, and the update counter still advances.
    ///
    /// # Errors
    ///
    /// [`Error::DimensionMismatch`] if the batch references a node outside the
    /// embedding matrix. Embeddings, loss and counters are left untouched.
    pub fn update(&mut self, batch: &EdgeBatch, use_l2_regularization: bool) -> Result<()> {
        let output = self.kernel.compute(self.embeddings.view(), batch)?;
        if batch.is_empty() {
            tracing::warn!(n_update = self.n_update, "empty batch, applying zero-gradient step");
        }

        let lr = self.learning_rate;
        if use_l2_regularization {
            let l2 = self.l2_coefficient;
            Zip::from(&mut self.embeddings)
                .and(&output.update)
                .for_each(|e, &u| *e += lr * (u - l2 * *e));
        } else {
            Zip::from(&mut self.embeddings)
                .and(&output.update)
                .for_each(|e, &u| *e += lr * u);
        }

        self.loss = output.loss;
        self.node_loss = output.node_loss;
        self.n_update += 1;
        self.anneal();

        tracing::debug!(
            n_update = self.n_update,
            batch = batch.len(),
            loss = self.loss,
            learning_rate = self.learning_rate,
            "pair optimizer step"
        );
        Ok(())
    }

    /// Linear decay over `total_update_times * sample_size`, floored.
    fn anneal(&mut self) {
        let horizon = self.total_update_times as f64 * self.sample_size as f64;
        let remaining = 1.0 - self.n_update as f64 / horizon;
        let scheduled = (self.initial_learning_rate * remaining).max(self.learning_rate_min);
        self.learning_rate = scheduled.min(self.learning_rate);
    }

    /// Set the learning rate directly, clamped at the floor.
    pub fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate.max(self.learning_rate_min);
    }

    pub fn embeddings(&self) -> ArrayView2<'_, f64> {
        self.embeddings.view()
    }

    /// Embedding row of a dense node index.
    pub fn embedding(&self, node: usize) -> Option<ArrayView1<'_, f64>> {
        (node < self.embeddings.nrows()).then(|| self.embeddings.row(node))
    }

    /// Give up the optimizer and keep the trained embeddings.
    pub fn into_embeddings(self) -> Array2<f64> {
        self.embeddings
    }

    /// Sum of edge gradients of the last step.
    pub fn loss(&self) -> f64 {
        self.loss
    }

    /// Per-node gradient sums of the last step.
    pub fn node_loss(&self) -> ArrayView1<'_, f64> {
        self.node_loss.view()
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn learning_rate_min(&self) -> f64 {
        self.learning_rate_min
    }

    pub fn l2_coefficient(&self) -> f64 {
        self.l2_coefficient
    }

    pub fn n_update(&self) -> usize {
        self.n_update
    }

    pub fn total_update_times(&self) -> usize {
        self.total_update_times
    }

    pub fn kernel(&self) -> &GradientKernel {
        &self.kernel
    }

    pub fn phase(&self) -> TrainingPhase {
        if self.n_update == 0 {
            TrainingPhase::Idle
        } else if self.n_update < self.total_update_times {
            TrainingPhase::Updating
        } else {
            TrainingPhase::Converged
        }
    }

    pub fn state(&self) -> OptimizerState {
        OptimizerState {
            learning_rate: self.learning_rate,
            learning_rate_min: self.learning_rate_min,
            l2_coefficient: self.l2_coefficient,
            total_update_times: self.total_update_times,
            sample_size: self.sample_size,
            n_update: self.n_update,
            current_loss: self.loss,
        }
    }
}
