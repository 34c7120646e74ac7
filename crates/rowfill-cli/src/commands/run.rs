use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use rowfill_core::interpolate;

use crate::args::RunArgs;

pub fn run(args: &RunArgs) -> Result<()> {
    // Phase 1: Load
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} [{prefix}] {msg}")
            .unwrap(),
    );
    pb.set_prefix("1/2");
    pb.set_message("Loading source dataset...");
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let (dataset, config) = super::load_inputs(&args.options)?;

    pb.finish_with_message(format!(
        "Loading source dataset... ✓ {} rows, {} columns",
        dataset.len(),
        dataset.columns.len()
    ));

    // Phase 2: Generate, shard, compile. Length is set on the first callback.
    let pb2 = ProgressBar::new(0);
    pb2.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.cyan} [2/2] Generating rows... {bar:40.cyan/dim} {pos}/{len} ({eta})",
            )
            .unwrap()
            .progress_chars("█▓░"),
    );

    let outcome = interpolate(
        &dataset,
        &config,
        Some(&|current, total| {
            pb2.set_length(total as u64);
            pb2.set_position(current as u64);
        }),
    );
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            pb2.abandon();
            return Err(e.into());
        }
    };

    pb2.finish_with_message(format!(
        "Generating rows... ✓ ({} rows)",
        outcome.generated_rows
    ));

    eprintln!(
        "Wrote {} rows ({} source + {} generated) to {}",
        outcome.dataset.len(),
        dataset.len(),
        outcome.generated_rows,
        outcome.compiled_path.display()
    );
    eprintln!(
        "{} shard(s), seed {}; manifest written to {}",
        outcome.shards.len(),
        outcome.seed,
        outcome.manifest_path.display()
    );

    Ok(())
}
