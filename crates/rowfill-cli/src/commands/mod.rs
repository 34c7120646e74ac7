pub mod check;
pub mod run;

use anyhow::{Context, Result};

use rowfill_core::config::{read_config, RowfillConfig};
use rowfill_core::dataset::csv::read_dataset;
use rowfill_core::Dataset;

use crate::args::RunOptions;

/// Load the source dataset and the effective config: `rowfill.toml` if
/// present, with command-line flags layered on top.
pub fn load_inputs(options: &RunOptions) -> Result<(Dataset, RowfillConfig)> {
    let mut config = read_config(&options.config)?.unwrap_or_default();
    apply_overrides(&mut config, options);
    config
        .validate()
        .context("Invalid configuration after applying command-line flags")?;

    let dataset = read_dataset(&options.input)
        .with_context(|| format!("Failed to load {}", options.input.display()))?;
    tracing::debug!(
        "Loaded {} rows, {} columns from {}",
        dataset.len(),
        dataset.columns.len(),
        options.input.display()
    );
    Ok((dataset, config))
}

fn apply_overrides(config: &mut RowfillConfig, options: &RunOptions) {
    if let Some(rows) = options.rows {
        config.desired_output_rows = Some(rows);
    }
    if let Some(shard_size) = options.shard_size {
        config.shard_size = Some(shard_size);
    }
    if let Some(seed) = options.seed {
        config.seed = Some(seed);
    }
    if let Some(dir) = &options.output_dir {
        config.output_dir = dir.clone();
    }
}
