//! smore CLI - train graph embeddings from edge lists.
//!
//! # Usage
//!
//! ```bash
//! # Node and edge counts of an edge list
//! smore stats edges.txt
//!
//! # Train with defaults, overriding a few knobs
//! smore train edges.txt --dimension 32 --sample-times 100 --sample-size 10000 --seed 7
//!
//! # Start from a JSON config; flags still win
//! smore train edges.txt --config train.json --threads 4
//!
//! # Time training on a random graph
//! smore bench --edges 100000 --nodes 10000
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `smore=info`).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use smore::{
    DirectedWeightedGraph, MatrixFactorization, Parallelism, TrainingConfig, TrainingSummary,
    WeightedGraph,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "smore")]
#[command(about = "Graph embedding by weighted edge sampling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show node and edge counts of an edge list
    Stats {
        /// Edge list (`source target [weight]` per line)
        input: PathBuf,
    },

    /// Train embeddings on an edge list
    Train {
        /// Edge list (`source target [weight]` per line)
        input: PathBuf,

        #[command(flatten)]
        overrides: TrainArgs,
    },

    /// Train on a random unit-weight graph and report timings
    Bench {
        /// Number of edges to draw
        #[arg(long)]
        edges: usize,

        /// Number of distinct node ids to draw from
        #[arg(long)]
        nodes: u64,

        /// Iterations
        #[arg(long, default_value = "10")]
        sample_times: usize,

        /// Edges per iteration
        #[arg(long, default_value = "100000")]
        sample_size: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Kernel threads (default: rayon global pool)
        #[arg(long)]
        threads: Option<usize>,
    },
}

#[derive(clap::Args)]
struct TrainArgs {
    /// JSON training config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Embedding dimension
    #[arg(long)]
    dimension: Option<usize>,

    /// Iterations
    #[arg(long)]
    sample_times: Option<usize>,

    /// Edges per iteration
    #[arg(long)]
    sample_size: Option<usize>,

    /// Initial learning rate
    #[arg(long)]
    learning_rate: Option<f64>,

    /// L2 coefficient
    #[arg(long)]
    l2: Option<f64>,

    /// Disable L2 decay
    #[arg(long)]
    no_l2: bool,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Kernel threads (0 runs sequentially)
    #[arg(long)]
    threads: Option<usize>,
}

impl TrainArgs {
    fn into_config(self) -> Result<TrainingConfig> {
        let mut config = match &self.config {
            Some(path) => TrainingConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => TrainingConfig::default(),
        };

        if let Some(d) = self.dimension {
            config = config.with_dimension(d);
        }
        if let Some(t) = self.sample_times {
            config = config.with_sample_times(t);
        }
        if let Some(s) = self.sample_size {
            config = config.with_sample_size(s);
        }
        if let Some(lr) = self.learning_rate {
            config = config.with_learning_rate(lr);
        }
        if let Some(l2) = self.l2 {
            config = config.with_l2_coefficient(l2);
        }
        if self.no_l2 {
            config = config.with_l2(false);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(threads) = self.threads {
            config = config.with_parallelism(parallelism_for(Some(threads)));
        }
        Ok(config)
    }
}

fn parallelism_for(threads: Option<usize>) -> Parallelism {
    match threads {
        None => Parallelism::Global,
        Some(0) => Parallelism::Sequential,
        Some(n) => Parallelism::Threads(n),
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("smore=info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Stats { input } => cmd_stats(&input),
        Commands::Train { input, overrides } => cmd_train(&input, overrides),
        Commands::Bench {
            edges,
            nodes,
            sample_times,
            sample_size,
            seed,
            threads,
        } => cmd_bench(edges, nodes, sample_times, sample_size, seed, threads),
    }
}

fn load_graph(path: &Path) -> Result<WeightedGraph> {
    let start = Instant::now();
    let graph = WeightedGraph::from_edge_list_file(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "loaded edge list"
    );
    Ok(graph)
}

fn cmd_stats(input: &Path) -> Result<()> {
    let graph = load_graph(input)?;

    let n = graph.node_count();
    let total_weight: f64 = graph.weighted_edges().map(|e| e.weight).sum();
    let avg_out = if n == 0 { 0.0 } else { graph.edge_count() as f64 / n as f64 };

    println!("Graph Statistics");
    println!("================");
    println!("Nodes:          {}", n);
    println!("Edges:          {}", graph.edge_count());
    println!("Total weight:   {:.4}", total_weight);
    println!("Avg out-degree: {:.2}", avg_out);

    Ok(())
}

fn cmd_train(input: &Path, overrides: TrainArgs) -> Result<()> {
    let config = overrides.into_config()?;
    let graph = load_graph(input)?;
    let summary = train(graph, config)?;
    print_summary(&summary);
    Ok(())
}

fn cmd_bench(
    edges: usize,
    nodes: u64,
    sample_times: usize,
    sample_size: usize,
    seed: u64,
    threads: Option<usize>,
) -> Result<()> {
    if edges == 0 || nodes == 0 {
        bail!("bench needs at least one edge and one node");
    }

    let start = Instant::now();
    let mut rng = XorShiftRng::seed_from_u64(seed);
    let mut graph = WeightedGraph::with_capacity(nodes.min(edges as u64 * 2) as usize, edges);
    for _ in 0..edges {
        let source = rng.random_range(0..nodes);
        let target = rng.random_range(0..nodes);
        graph.add_edge(source, target, 1.0)?;
    }
    println!(
        "Generated graph: {} nodes, {} edges in {:.2?}",
        graph.node_count(),
        graph.edge_count(),
        start.elapsed()
    );

    let config = TrainingConfig::default()
        .with_sample_times(sample_times)
        .with_sample_size(sample_size)
        .with_seed(seed)
        .with_parallelism(parallelism_for(threads));

    let summary = train(graph, config)?;
    print_summary(&summary);
    let per_iteration = summary.elapsed / summary.iterations.max(1) as u32;
    println!("Per iteration:  {:.2?}", per_iteration);
    Ok(())
}

fn train(graph: WeightedGraph, config: TrainingConfig) -> Result<TrainingSummary> {
    let iterations = config.sample_times as u64;
    let mut model =
        MatrixFactorization::new(graph, config).context("Failed to build model")?;

    let pb = ProgressBar::new(iterations);
    pb.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} iterations [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let summary = model
        .train_with_callback(|_, metrics| {
            pb.set_message(format!("loss {:.4}", metrics.loss));
            pb.inc(1);
        })
        .context("Training failed")?;
    pb.finish_and_clear();

    Ok(summary)
}

fn print_summary(summary: &TrainingSummary) {
    println!("Iterations:     {}", summary.iterations);
    println!("Final loss:     {:.6}", summary.final_loss);
    println!("Learning rate:  {:.6}", summary.final_learning_rate);
    println!("Elapsed:        {:.2?}", summary.elapsed);
}
