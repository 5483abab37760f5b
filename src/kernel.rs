//! Dot-product reconstruction gradients for a batch of weighted edges.
//!
//! For every edge `(s, t, w)` in a batch:
//!
//! ```text
//! g          = w - <E[s], E[t]>
//! update[s] += g * E[s]
//! update[t] += g * E[t]
//! loss[s]   += g,  loss[t] += g
//! ```
//!
//! # Reduction
//!
//! Sampled batches are dominated by hub nodes, so many edges in one batch
//! scatter into the same update row. Unsynchronized parallel `+=` on those
//! rows drops updates. The parallel path here never shares a row between
//! tasks:
//!
//! 1. Gradients are computed per edge in parallel. This phase only reads the
//!    embeddings.
//! 2. Edge contributions are bucketed by node with a stable counting sort, so
//!    each bucket lists edges in batch order.
//! 3. Each update row (and its loss entry) is summed by exactly one task,
//!    walking its bucket in order.
//!
//! Every row therefore adds the same terms in the same order as the
//! sequential loop, and the parallel result is bit-identical to it.

use crate::error::{Error, Result};
use crate::sampler::EdgeBatch;
use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Batches smaller than this run sequentially unless overridden.
pub const DEFAULT_MIN_PARALLEL_BATCH: usize = 256;

/// How the kernel spreads a batch over threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parallelism {
    /// Single-threaded reference loop.
    Sequential,
    /// Rayon's global thread pool.
    #[default]
    Global,
    /// A dedicated pool with this many threads, owned by the kernel.
    Threads(usize),
}

/// Result of one kernel invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelOutput {
    /// Gradient-weighted per-node update, `N × D`.
    pub update: Array2<f64>,
    /// Per-node sum of the gradients of incident batch edges.
    pub node_loss: Array1<f64>,
    /// Sum of all edge gradients in the batch.
    pub loss: f64,
}

/// Exact dot product: elementwise products summed left to right.
///
/// Embedding widths are small (tens to low hundreds), so no blocked or
/// parallel reduction is used; the summation order is fixed.
pub fn dot_product(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).fold(0.0, |acc, (x, y)| acc + x * y)
}

/// Stateless gradient routine with an explicit execution configuration.
#[derive(Clone)]
pub struct GradientKernel {
    parallelism: Parallelism,
    pool: Option<Arc<rayon::ThreadPool>>,
    min_parallel_batch: usize,
}

impl std::fmt::Debug for GradientKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradientKernel")
            .field("parallelism", &self.parallelism)
            .field("min_parallel_batch", &self.min_parallel_batch)
            .finish()
    }
}

impl Default for GradientKernel {
    fn default() -> Self {
        Self {
            parallelism: Parallelism::Global,
            pool: None,
            min_parallel_batch: DEFAULT_MIN_PARALLEL_BATCH,
        }
    }
}

impl GradientKernel {
    /// Create a kernel.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for `Threads(0)`, [`Error::ThreadPool`] if the
    /// dedicated pool cannot be built.
    pub fn new(parallelism: Parallelism) -> Result<Self> {
        let pool = match parallelism {
            Parallelism::Threads(0) => {
                return Err(Error::InvalidInput(
                    "kernel thread count must be at least 1".into(),
                ))
            }
            Parallelism::Threads(n) => Some(Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("smore-kernel-{i}"))
                    .build()?,
            )),
            Parallelism::Sequential | Parallelism::Global => None,
        };
        Ok(Self {
            parallelism,
            pool,
            min_parallel_batch: DEFAULT_MIN_PARALLEL_BATCH,
        })
    }

    /// Single-threaded kernel.
    pub fn sequential() -> Self {
        Self {
            parallelism: Parallelism::Sequential,
            ..Self::default()
        }
    }

    /// Batches shorter than `size` use the sequential loop. `0` forces the
    /// parallel path for every non-sequential kernel.
    pub fn with_min_parallel_batch(mut self, size: usize) -> Self {
        self.min_parallel_batch = size;
        self
    }

    pub fn parallelism(&self) -> Parallelism {
        self.parallelism
    }

    /// Compute the per-node update and loss for `batch`.
    ///
    /// # Errors
    ///
    /// [`Error::DimensionMismatch`] if the batch references a node index
    /// outside `embeddings`. Nothing is computed in that case.
    pub fn compute(&self, embeddings: ArrayView2<'_, f64>, batch: &EdgeBatch) -> Result<KernelOutput> {
        let n_nodes = embeddings.nrows();
        if let Some(max) = batch.max_node_index() {
            if max >= n_nodes {
                return Err(Error::DimensionMismatch(format!(
                    "batch references node {max} but embeddings have {n_nodes} rows"
                )));
            }
        }

        let parallel = self.parallelism != Parallelism::Sequential
            && batch.len() >= self.min_parallel_batch.max(1);
        if !parallel {
            return Ok(compute_sequential(embeddings, batch));
        }

        match &self.pool {
            Some(pool) => Ok(pool.install(|| compute_parallel(embeddings, batch))),
            None => Ok(compute_parallel(embeddings, batch)),
        }
    }
}

#[inline]
fn accumulate_row(mut dst: ArrayViewMut1<'_, f64>, gradient: f64, src: ArrayView1<'_, f64>) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d += gradient * s;
    }
}

fn compute_sequential(embeddings: ArrayView2<'_, f64>, batch: &EdgeBatch) -> KernelOutput {
    let mut update = Array2::<f64>::zeros(embeddings.raw_dim());
    let mut node_loss = Array1::<f64>::zeros(embeddings.nrows());
    let mut loss = 0.0;

    for edge in batch {
        let (s, t) = (edge.source, edge.target);
        let gradient = edge.weight - dot_product(embeddings.row(s), embeddings.row(t));
        loss += gradient;
        node_loss[s] += gradient;
        node_loss[t] += gradient;
        accumulate_row(update.row_mut(s), gradient, embeddings.row(s));
        accumulate_row(update.row_mut(t), gradient, embeddings.row(t));
    }

    KernelOutput {
        update,
        node_loss,
        loss,
    }
}

/// Per-node buckets of edge positions, in batch order.
///
/// `edges[offsets[v]..offsets[v + 1]]` lists every batch position touching
/// node `v`; a self-loop appears twice.
struct NodeBuckets {
    offsets: Vec<usize>,
    edges: Vec<usize>,
}

impl NodeBuckets {
    fn build(batch: &EdgeBatch, n_nodes: usize) -> Self {
        let mut offsets = vec![0usize; n_nodes + 1];
        for edge in batch {
            offsets[edge.source + 1] += 1;
            offsets[edge.target + 1] += 1;
        }
        for v in 0..n_nodes {
            offsets[v + 1] += offsets[v];
        }

        let mut cursor = offsets.clone();
        let mut edges = vec![0usize; 2 * batch.len()];
        for (i, edge) in batch.iter().enumerate() {
            for node in [edge.source, edge.target] {
                edges[cursor[node]] = i;
                cursor[node] += 1;
            }
        }
        Self { offsets, edges }
    }

    fn of(&self, node: usize) -> &[usize] {
        &self.edges[self.offsets[node]..self.offsets[node + 1]]
    }
}

fn compute_parallel(embeddings: ArrayView2<'_, f64>, batch: &EdgeBatch) -> KernelOutput {
    let n_nodes = embeddings.nrows();

    let gradients: Vec<f64> = batch
        .edges()
        .par_iter()
        .map(|e| e.weight - dot_product(embeddings.row(e.source), embeddings.row(e.target)))
        .collect();
    let loss = gradients.iter().fold(0.0, |acc, g| acc + g);

    let buckets = NodeBuckets::build(batch, n_nodes);

    let mut update = Array2::<f64>::zeros(embeddings.raw_dim());
    let mut node_loss = vec![0.0f64; n_nodes];
    update
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(node_loss.par_iter_mut())
        .enumerate()
        .for_each(|(node, (mut row, loss_entry))| {
            let own = embeddings.row(node);
            for &i in buckets.of(node) {
                let gradient = gradients[i];
                *loss_entry += gradient;
                accumulate_row(row.view_mut(), gradient, own);
            }
        });

    KernelOutput {
        update,
        node_loss: Array1::from(node_loss),
        loss,
    }
}
