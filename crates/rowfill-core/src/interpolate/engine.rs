//! # Interpolation Engine
//!
//! Drives one run end to end. Preflight validates the source columns and
//! checks that the order id range can hold every new row, and it rejects a
//! short range before the output directory is touched. Generation then
//! samples source rows by recency, synthesizes each new row and streams
//! rows into shard files. Compilation merges the source with every shard
//! and a manifest describing the run is written beside the output.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::RowfillConfig;
use crate::dataset::{
    Dataset, Temporal, CATEGORY, ORDER_DATE, PROFIT, REQUIRED_COLUMNS, SHIP_MODE, SUB_CATEGORY,
};
use crate::error::{Result, RowfillError};
use crate::interpolate::plan::InterpolationPlan;
use crate::interpolate::sampler::{Categorical, RecencySampler};
use crate::interpolate::shard::{clear_output_dir, compile, ShardInfo, ShardWriter};
use crate::interpolate::synth::Synthesizer;
use crate::interpolate::uid::{UidAllocator, UidPool};
use crate::manifest::{write_manifest, RunManifest, MANIFEST_FILE_NAME};

/// Rows generated between progress callbacks.
const PROGRESS_BATCH_SIZE: usize = 100;

/// Stages of one interpolation run. A failed capacity check ends the run
/// in `Rejected` before anything touches the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Preflight,
    Rejected,
    Generating,
    Flushing,
    Compiling,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Preflight => "preflight",
            Phase::Rejected => "rejected",
            Phase::Generating => "generating",
            Phase::Flushing => "flushing",
            Phase::Compiling => "compiling",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Capacity figures computed before any row is generated.
#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    pub source_rows: usize,
    pub desired_output_rows: usize,
    pub rows_to_generate: usize,
    /// Smallest order id suffix in the source.
    pub uid_min: u64,
    /// One past the largest order id suffix in the source.
    pub uid_max: u64,
    /// `uid_max - uid_min`.
    pub span: u64,
    /// Distinct suffixes already in use.
    pub uids_in_use: usize,
    /// Suffixes in the range that are still free.
    pub spare: u64,
    pub shard_size: usize,
    pub shard_count: usize,
    pub seed: u64,
}

impl PreflightReport {
    /// The range must strictly exceed the rows to generate, and enough of it
    /// must be unused to hold them.
    pub fn has_capacity(&self) -> bool {
        let needed = self.rows_to_generate as u64;
        self.span > needed && self.spare >= needed
    }

    pub fn ensure_capacity(&self) -> Result<()> {
        if self.has_capacity() {
            return Ok(());
        }
        Err(RowfillError::Capacity {
            desired: self.desired_output_rows,
            current: self.source_rows,
            needed: self.rows_to_generate,
            span: self.span,
            spare: self.spare,
        })
    }
}

/// What a completed run produced.
#[derive(Debug)]
pub struct InterpolationOutcome {
    /// Source rows followed by all synthesized rows.
    pub dataset: Dataset,
    pub generated_rows: usize,
    pub shards: Vec<ShardInfo>,
    pub compiled_path: PathBuf,
    pub manifest_path: PathBuf,
    pub seed: u64,
}

/// Validated inputs of a run. Building this reads only the dataset and
/// config.
struct Prepared {
    plan: InterpolationPlan,
    pool: UidPool,
    allocator: UidAllocator,
    sampler: RecencySampler,
    ship_modes: Option<Categorical>,
    columns: Vec<String>,
    report: PreflightReport,
}

fn prepare(dataset: &Dataset, config: &RowfillConfig) -> Result<Prepared> {
    let plan = InterpolationPlan::from_config(config)?;
    dataset.require_columns(REQUIRED_COLUMNS)?;

    if plan.desired_output_rows < dataset.len() {
        return Err(RowfillError::Config {
            message: format!(
                "desired_output_rows ({}) is less than the source row count ({})",
                plan.desired_output_rows,
                dataset.len()
            ),
        });
    }

    let pool = UidPool::from_dataset(dataset)?;
    let range = pool.range().ok_or_else(|| RowfillError::Data {
        message: "dataset has no rows to interpolate from".to_string(),
    })?;
    debug!(
        "UID max: {} min: {} span: {} in use: {}",
        range.max,
        range.min,
        range.span(),
        pool.len()
    );

    let sampler = RecencySampler::new(dataset)?;

    let ship_modes = if plan.resample_ship_mode {
        let dist = Categorical::from_column(dataset, SHIP_MODE).ok_or_else(|| RowfillError::Data {
            message: format!(
                "resample_ship_mode is set but the dataset has no '{}' values",
                SHIP_MODE
            ),
        })?;
        Some(dist)
    } else {
        None
    };

    check_ship_delay_coverage(dataset, &plan)?;
    check_discount_coverage(dataset, &plan)?;

    let mut columns = dataset.columns.clone();
    if !dataset.has_column(PROFIT) {
        columns.push(PROFIT.to_string());
    }
    if config.synthesizes_ship_mode() && !dataset.has_column(SHIP_MODE) {
        columns.push(SHIP_MODE.to_string());
    }

    let rows_to_generate = plan.desired_output_rows - dataset.len();
    let report = PreflightReport {
        source_rows: dataset.len(),
        desired_output_rows: plan.desired_output_rows,
        rows_to_generate,
        uid_min: range.min,
        uid_max: range.max,
        span: range.span(),
        uids_in_use: pool.len(),
        spare: range.span() - pool.len() as u64,
        shard_size: plan.shard_size,
        shard_count: rows_to_generate.div_ceil(plan.shard_size),
        seed: plan.seed,
    };

    let allocator = UidAllocator::new(range, plan.max_uid_retries);
    Ok(Prepared {
        plan,
        pool,
        allocator,
        sampler,
        ship_modes,
        columns,
        report,
    })
}

/// Every category/sub-category pair in the source needs a ship delay.
fn check_ship_delay_coverage(dataset: &Dataset, plan: &InterpolationPlan) -> Result<()> {
    for row in &dataset.rows {
        let category = row.get(CATEGORY).and_then(|v| v.as_str()).unwrap_or_default();
        let sub = row.get(SUB_CATEGORY).and_then(|v| v.as_str()).unwrap_or_default();
        plan.ship_delays.lookup(category, sub)?;
    }
    Ok(())
}

/// Every year a shifted order date can land in needs a discount amount.
///
/// Only years reachable from some source date are required, so sparse
/// source years do not demand discounts for the gaps between them.
fn check_discount_coverage(dataset: &Dataset, plan: &InterpolationPlan) -> Result<()> {
    let overflow = || RowfillError::Data {
        message: "order date shift leaves the supported calendar".to_string(),
    };

    let mut reachable = BTreeSet::new();
    for (row_index, value) in dataset.column_values(ORDER_DATE).enumerate() {
        let date = Temporal::from_value(value).ok_or_else(|| RowfillError::InvalidDate {
            column: ORDER_DATE.to_string(),
            value: value.to_csv_string(),
            row_index,
        })?;
        let first = date
            .checked_add_days(plan.order_days.low)
            .ok_or_else(overflow)?
            .year();
        let last = date
            .checked_add_days(plan.order_days.max_offset())
            .ok_or_else(overflow)?
            .year();
        reachable.extend(first..=last);
    }

    let missing: Vec<String> = reachable
        .iter()
        .filter(|year| !plan.discounts.contains_year(**year))
        .map(|year| year.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(RowfillError::Config {
            message: format!(
                "shifted order dates can fall in years with no configured discount: {}",
                missing.join(", ")
            ),
        });
    }
    Ok(())
}

/// Compute capacity figures without generating or writing anything.
///
/// Data and configuration errors are returned; a capacity shortfall is not
/// (see [`PreflightReport::has_capacity`]).
pub fn preflight(dataset: &Dataset, config: &RowfillConfig) -> Result<PreflightReport> {
    Ok(prepare(dataset, config)?.report)
}

/// Expand `dataset` to `desired_output_rows` rows.
///
/// Runs preflight, clears the output directory, generates rows into shards,
/// compiles source plus shards into one file, and writes a run manifest.
/// The capacity check runs before the output directory is touched.
///
/// `progress_callback` receives `(generated, total_to_generate)` every
/// [`PROGRESS_BATCH_SIZE`] rows and once at the end of generation.
pub fn interpolate(
    dataset: &Dataset,
    config: &RowfillConfig,
    progress_callback: Option<&dyn Fn(usize, usize)>,
) -> Result<InterpolationOutcome> {
    let started = Instant::now();
    let mut phase = Phase::Preflight;
    debug!("Interpolation phase: {}", phase);

    let Prepared {
        plan,
        mut pool,
        allocator,
        sampler,
        ship_modes,
        columns,
        report,
    } = prepare(dataset, config)?;

    if let Err(e) = report.ensure_capacity() {
        phase = Phase::Rejected;
        debug!("Interpolation phase: {}", phase);
        return Err(e);
    }

    info!(
        "Interpolating {} source rows to {} ({} new, shard size {}, seed {})",
        report.source_rows,
        report.desired_output_rows,
        report.rows_to_generate,
        plan.shard_size,
        plan.seed
    );

    clear_output_dir(&plan.output_dir)?;

    phase = transition(phase, Phase::Generating, &started);
    let mut rng = StdRng::seed_from_u64(plan.seed);
    let synthesizer = Synthesizer::new(&plan, allocator, ship_modes);
    let mut shards = ShardWriter::new(
        &plan.output_dir,
        columns.clone(),
        plan.shard_size,
        dataset.len(),
    );

    let total = report.rows_to_generate;
    for generated in 1..=total {
        let source_index = sampler.sample(&mut rng);
        let row = synthesizer.synthesize(&dataset.rows[source_index], source_index, &mut pool, &mut rng)?;
        shards.push(row)?;

        if let Some(cb) = progress_callback {
            if generated.is_multiple_of(PROGRESS_BATCH_SIZE) || generated == total {
                cb(generated, total);
            }
        }
    }

    phase = transition(phase, Phase::Flushing, &started);
    let shard_infos = shards.finish()?;

    phase = transition(phase, Phase::Compiling, &started);
    let compiled = compile(&plan.output_dir, dataset, &columns, plan.retain_shards)?;
    if compiled.dataset.len() != plan.desired_output_rows {
        return Err(RowfillError::Data {
            message: format!(
                "compiled output has {} rows, expected {}",
                compiled.dataset.len(),
                plan.desired_output_rows
            ),
        });
    }

    let manifest_path = plan.output_dir.join(MANIFEST_FILE_NAME);
    let manifest = RunManifest::new(
        plan.seed,
        &report,
        shard_infos.clone(),
        &compiled.path,
        plan.retain_shards,
    );
    write_manifest(&manifest, &manifest_path)?;

    transition(phase, Phase::Done, &started);
    info!(
        "Processed {} records into {} in {:.2?}",
        compiled.dataset.len(),
        compiled.path.display(),
        started.elapsed()
    );

    Ok(InterpolationOutcome {
        dataset: compiled.dataset,
        generated_rows: total,
        shards: shard_infos,
        compiled_path: compiled.path,
        manifest_path,
        seed: plan.seed,
    })
}

fn transition(from: Phase, to: Phase, started: &Instant) -> Phase {
    debug!(
        "Interpolation phase: {} -> {} ({:.2?} elapsed)",
        from,
        to,
        started.elapsed()
    );
    to
}
