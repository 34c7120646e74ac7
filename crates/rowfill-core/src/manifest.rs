//! # Run Manifest
//!
//! Every successful run leaves `rowfill.manifest.json` next to its output.
//! It records the seed and the shard layout, so a run can be reproduced by
//! feeding the same source and config back with that seed.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RowfillError};
use crate::interpolate::engine::PreflightReport;
use crate::interpolate::shard::ShardInfo;

/// Manifest file name inside the output directory.
pub const MANIFEST_FILE_NAME: &str = "rowfill.manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    /// rowfill version that produced the run.
    pub rowfill_version: String,
    /// Seed the run's random generator was built from.
    pub seed: u64,
    pub source_rows: usize,
    pub desired_output_rows: usize,
    pub generated_rows: usize,
    pub shard_size: usize,
    /// Shards in the order they were compiled.
    pub shards: Vec<ShardInfo>,
    /// File name of the compiled output, relative to the manifest.
    pub compiled_file: String,
    /// Whether the shard files were left on disk after compiling.
    pub shards_retained: bool,
    pub created_at: String,
}

impl RunManifest {
    pub fn new(
        seed: u64,
        report: &PreflightReport,
        shards: Vec<ShardInfo>,
        compiled_path: &Path,
        shards_retained: bool,
    ) -> Self {
        let compiled_file = compiled_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            rowfill_version: env!("CARGO_PKG_VERSION").to_string(),
            seed,
            source_rows: report.source_rows,
            desired_output_rows: report.desired_output_rows,
            generated_rows: report.rows_to_generate,
            shard_size: report.shard_size,
            shards,
            compiled_file,
            shards_retained,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Write the manifest atomically: a temp file in the same directory is
/// synced and then renamed over `path`.
pub fn write_manifest(manifest: &RunManifest, path: &Path) -> Result<()> {
    use std::io::Write;

    let json = serde_json::to_string_pretty(manifest).map_err(|e| RowfillError::Manifest {
        message: format!("Failed to serialize manifest: {}", e),
    })?;

    let dir = path.parent().unwrap_or(Path::new("."));
    let tmp_path = dir.join(".rowfill.manifest.json.tmp");

    let mut file = fs::File::create(&tmp_path).map_err(|e| RowfillError::Output {
        message: format!("Failed to create temp manifest at {}", tmp_path.display()),
        source: e,
    })?;
    file.write_all(json.as_bytes())
        .map_err(|e| RowfillError::Output {
            message: format!("Failed to write temp manifest at {}", tmp_path.display()),
            source: e,
        })?;
    file.sync_all().map_err(|e| RowfillError::Output {
        message: "Failed to sync manifest to disk".to_string(),
        source: e,
    })?;

    fs::rename(&tmp_path, path).map_err(|e| RowfillError::Output {
        message: format!(
            "Failed to rename {} to {}",
            tmp_path.display(),
            path.display()
        ),
        source: e,
    })?;

    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<RunManifest> {
    let content = fs::read_to_string(path).map_err(|e| RowfillError::Output {
        message: format!("Failed to read manifest from {}", path.display()),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| RowfillError::Manifest {
        message: format!("Failed to parse manifest: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn report() -> PreflightReport {
        PreflightReport {
            source_rows: 10,
            desired_output_rows: 25,
            rows_to_generate: 15,
            uid_min: 100,
            uid_max: 200,
            span: 100,
            uids_in_use: 10,
            spare: 90,
            shard_size: 10,
            shard_count: 2,
            seed: 7,
        }
    }

    fn shards() -> Vec<ShardInfo> {
        vec![
            ShardInfo {
                file_name: "bootshard_10.csv".to_string(),
                start_index: 10,
                rows: 10,
            },
            ShardInfo {
                file_name: "bootshard_20.csv".to_string(),
                start_index: 20,
                rows: 5,
            },
        ]
    }

    #[test]
    fn test_write_and_read_manifest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE_NAME);
        let manifest = RunManifest::new(
            7,
            &report(),
            shards(),
            &dir.path().join("bootshard_compiled.csv"),
            true,
        );

        write_manifest(&manifest, &path).unwrap();
        let loaded = read_manifest(&path).unwrap();

        assert_eq!(loaded, manifest);
        assert_eq!(loaded.compiled_file, "bootshard_compiled.csv");
        assert_eq!(loaded.generated_rows, 15);
        assert_eq!(loaded.rowfill_version, env!("CARGO_PKG_VERSION"));
        assert!(!dir.path().join(".rowfill.manifest.json.tmp").exists());
    }

    #[test]
    fn test_overwrite_replaces_previous_manifest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE_NAME);
        let compiled = dir.path().join("bootshard_compiled.csv");

        write_manifest(&RunManifest::new(1, &report(), shards(), &compiled, true), &path).unwrap();
        write_manifest(&RunManifest::new(2, &report(), Vec::new(), &compiled, false), &path).unwrap();

        let loaded = read_manifest(&path).unwrap();
        assert_eq!(loaded.seed, 2);
        assert!(loaded.shards.is_empty());
        assert!(!loaded.shards_retained);
    }

    #[test]
    fn test_read_garbage_is_manifest_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE_NAME);
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            read_manifest(&path),
            Err(RowfillError::Manifest { .. })
        ));
    }
}
