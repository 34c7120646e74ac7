use std::process;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table as ComfyTable};

use rowfill_core::{preflight, PreflightReport};

use crate::args::{CheckArgs, CheckFormat};

/// Run the capacity preflight for a planned run.
///
/// Exit codes:
///   0: the id range can hold every new row
///   1: capacity shortfall (or error)
pub fn run(args: &CheckArgs) -> Result<()> {
    let (dataset, config) = super::load_inputs(&args.options)?;
    let report = preflight(&dataset, &config)?;

    match args.format {
        CheckFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .context("Failed to serialize preflight report")?;
            println!("{}", json);
        }
        CheckFormat::Text => {
            println!("{}", render_report(&report));
        }
    }

    if let Err(e) = report.ensure_capacity() {
        eprintln!("{}", e);
        process::exit(1);
    }

    Ok(())
}

fn render_report(report: &PreflightReport) -> String {
    let mut t = ComfyTable::new();
    t.set_header(vec!["", "Value"]);

    let rows: [(&str, String); 10] = [
        ("Source rows", report.source_rows.to_string()),
        ("Desired rows", report.desired_output_rows.to_string()),
        ("Rows to generate", report.rows_to_generate.to_string()),
        (
            "Order id range",
            format!("[{}, {})", report.uid_min, report.uid_max),
        ),
        ("Range span", report.span.to_string()),
        ("Ids in use", report.uids_in_use.to_string()),
        ("Ids free", report.spare.to_string()),
        (
            "Shards",
            format!("{} x {} rows", report.shard_count, report.shard_size),
        ),
        ("Seed", report.seed.to_string()),
        (
            "Capacity",
            if report.has_capacity() { "OK" } else { "INSUFFICIENT" }.to_string(),
        ),
    ];
    for (label, value) in rows {
        t.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    t.to_string()
}
