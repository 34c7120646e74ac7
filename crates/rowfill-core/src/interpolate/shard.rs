//! # Shards and Compilation
//!
//! Synthesized rows are buffered and written out in fixed-size shard files
//! (`bootshard_<start>.csv`, where `<start>` is the global index of the
//! first row in the shard) so only one shard's worth of rows is resident at
//! a time. Shard files have no header; their first column is the global
//! row index.
//!
//! Compilation writes the source rows with a header, then appends every
//! shard in ascending numeric order of `<start>`, and reads the result back.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::dataset::csv::{
    create_writer, read_indexed_dataset, write_indexed_header, write_indexed_rows,
};
use crate::dataset::{Dataset, Row};
use crate::error::{Result, RowfillError};

pub const SHARD_PREFIX: &str = "bootshard_";
pub const COMPILED_FILE_NAME: &str = "bootshard_compiled.csv";

/// Matches shard file names and captures the start index.
static SHARD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^bootshard_(\d+)\.csv$").expect("shard file pattern is a valid regex")
});

pub fn shard_file_name(start_index: usize) -> String {
    format!("{}{}.csv", SHARD_PREFIX, start_index)
}

/// Parse the start index out of a shard file name. `None` for anything else,
/// including the compiled file.
pub fn parse_shard_file_name(name: &str) -> Option<usize> {
    SHARD_PATTERN
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// A shard file that has been written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardInfo {
    pub file_name: String,
    pub start_index: usize,
    pub rows: usize,
}

/// Buffers synthesized rows and flushes them in shards of `shard_size`.
pub struct ShardWriter {
    dir: PathBuf,
    columns: Vec<String>,
    shard_size: usize,
    next_index: usize,
    batch_start: usize,
    buffer: Vec<Row>,
    shards: Vec<ShardInfo>,
}

impl ShardWriter {
    /// `first_index` is the global index assigned to the first pushed row,
    /// normally the source row count.
    pub fn new(dir: &Path, columns: Vec<String>, shard_size: usize, first_index: usize) -> Self {
        Self {
            dir: dir.to_path_buf(),
            columns,
            shard_size,
            next_index: first_index,
            batch_start: first_index,
            buffer: Vec::with_capacity(shard_size),
            shards: Vec::new(),
        }
    }

    /// Buffer a row under the next global index, flushing a full shard.
    ///
    /// Returns the shard written by this call, if any.
    pub fn push(&mut self, row: Row) -> Result<Option<&ShardInfo>> {
        self.buffer.push(row);
        self.next_index += 1;
        if self.buffer.len() >= self.shard_size {
            self.flush()?;
            return Ok(self.shards.last());
        }
        Ok(None)
    }

    /// Rows buffered but not yet written.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn shards(&self) -> &[ShardInfo] {
        &self.shards
    }

    /// Flush any remaining rows as a final, possibly short, shard.
    pub fn finish(mut self) -> Result<Vec<ShardInfo>> {
        if !self.buffer.is_empty() {
            self.flush()?;
        }
        Ok(self.shards)
    }

    fn flush(&mut self) -> Result<()> {
        let file_name = shard_file_name(self.batch_start);
        let path = self.dir.join(&file_name);

        let mut writer = create_writer(&path)?;
        write_indexed_rows(&mut writer, &self.columns, self.batch_start, &self.buffer)?;
        writer.flush().map_err(|e| RowfillError::Output {
            message: format!("flushing {}", path.display()),
            source: e,
        })?;

        debug!(
            "Wrote shard {} ({} rows, indices {}..{})",
            file_name,
            self.buffer.len(),
            self.batch_start,
            self.next_index
        );
        self.shards.push(ShardInfo {
            file_name,
            start_index: self.batch_start,
            rows: self.buffer.len(),
        });
        self.buffer.clear();
        self.batch_start = self.next_index;
        Ok(())
    }
}

/// Shard files in `dir`, sorted by their numeric start index.
///
/// Directory listing order is not numeric (`bootshard_1000` lists before
/// `bootshard_200`), so the sort is required for a correct concatenation.
pub fn list_shards(dir: &Path) -> Result<Vec<(usize, PathBuf)>> {
    let entries = fs::read_dir(dir).map_err(|e| RowfillError::Output {
        message: format!("listing {}", dir.display()),
        source: e,
    })?;

    let mut shards = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RowfillError::Output {
            message: format!("listing {}", dir.display()),
            source: e,
        })?;
        let name = entry.file_name();
        if let Some(start) = name.to_str().and_then(parse_shard_file_name) {
            shards.push((start, entry.path()));
        }
    }
    shards.sort_by_key(|(start, _)| *start);
    Ok(shards)
}

/// Result of folding the source and all shards into one file.
#[derive(Debug)]
pub struct CompiledOutput {
    pub path: PathBuf,
    pub dataset: Dataset,
    pub shards_compiled: usize,
}

/// Write `source` then every shard in `dir` to the compiled file, and read
/// it back as the expanded dataset.
///
/// Shard files are removed afterwards unless `retain_shards` is set.
pub fn compile(
    dir: &Path,
    source: &Dataset,
    columns: &[String],
    retain_shards: bool,
) -> Result<CompiledOutput> {
    let path = dir.join(COMPILED_FILE_NAME);
    let shards = list_shards(dir)?;

    let mut writer = create_writer(&path)?;
    write_indexed_header(&mut writer, columns)?;
    write_indexed_rows(&mut writer, columns, 0, &source.rows)?;

    let width = columns.len() + 1;
    for (start, shard_path) in &shards {
        let mut rdr = ::csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(shard_path)
            .map_err(|e| RowfillError::Csv {
                message: format!("opening {}", shard_path.display()),
                source: e,
            })?;
        for record in rdr.records() {
            let record = record.map_err(|e| RowfillError::Csv {
                message: format!("reading {}", shard_path.display()),
                source: e,
            })?;
            if record.len() != width {
                return Err(RowfillError::Data {
                    message: format!(
                        "{} has {} fields per row, expected {}",
                        shard_path.display(),
                        record.len(),
                        width
                    ),
                });
            }
            writer.write_record(&record).map_err(|e| RowfillError::Csv {
                message: format!("appending {}", shard_path.display()),
                source: e,
            })?;
        }
        debug!("Compiled shard starting at {}", start);
    }

    writer.flush().map_err(|e| RowfillError::Output {
        message: format!("flushing {}", path.display()),
        source: e,
    })?;
    drop(writer);

    if !retain_shards {
        for (_, shard_path) in &shards {
            if let Err(e) = fs::remove_file(shard_path) {
                warn!("Failed to delete shard {}: {}", shard_path.display(), e);
            }
        }
    }

    let dataset = read_indexed_dataset(&path)?;
    Ok(CompiledOutput {
        path,
        dataset,
        shards_compiled: shards.len(),
    })
}

/// Remove everything inside `dir`, creating it if absent.
///
/// Individual removal failures are logged and skipped; only failing to
/// create or list the directory is an error.
pub fn clear_output_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return fs::create_dir_all(dir).map_err(|e| RowfillError::Output {
            message: format!("creating output directory {}", dir.display()),
            source: e,
        });
    }

    let entries = fs::read_dir(dir).map_err(|e| RowfillError::Output {
        message: format!("listing {}", dir.display()),
        source: e,
    })?;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                error!("Failed to delete an entry of {}. Reason: {}", dir.display(), e);
                continue;
            }
        };
        let path = entry.path();
        let removed = match entry.file_type() {
            Ok(ft) if ft.is_dir() => fs::remove_dir_all(&path),
            Ok(_) => fs::remove_file(&path),
            Err(e) => Err(e),
        };
        if let Err(e) = removed {
            error!("Failed to delete {}. Reason: {}", path.display(), e);
        }
    }
    Ok(())
}
