use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "rowfill",
    about = "Expand an order dataset to a target row count with recency-weighted synthetic rows",
    version,
    after_help = "Examples:\n  rowfill run --input orders.csv --rows 100000\n  rowfill run --input orders.csv --config ./rowfill.toml --seed 42 --output-dir out\n  rowfill check --input orders.csv --rows 1000000\n  rowfill check --input orders.csv --format json"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate rows, write shards, and compile the expanded dataset
    Run(RunArgs),

    /// Report order id capacity for a run without writing anything
    Check(CheckArgs),
}

/// Options shared by every command that resolves a run configuration.
#[derive(Parser, Debug)]
pub struct RunOptions {
    /// Source dataset (CSV with a header row)
    #[arg(short, long)]
    pub input: PathBuf,

    /// rowfill.toml path, or a directory containing one
    #[arg(short, long, default_value = ".")]
    pub config: PathBuf,

    /// Total rows in the expanded dataset (overrides desired_output_rows)
    #[arg(long)]
    pub rows: Option<usize>,

    /// Synthesized rows per shard file (overrides shard_size)
    #[arg(long)]
    pub shard_size: Option<usize>,

    /// Random seed for deterministic generation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Directory for shards, the compiled file, and the manifest
    #[arg(short, long, env = "ROWFILL_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub options: RunOptions,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub options: RunOptions,

    /// Output format for the capacity report
    #[arg(long, default_value = "text")]
    pub format: CheckFormat,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum CheckFormat {
    Text,
    Json,
}
