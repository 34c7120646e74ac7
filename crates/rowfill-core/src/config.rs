//! # Configuration File Parser
//!
//! Reads and parses `rowfill.toml`, the configuration for one interpolation
//! run. Every key can also be supplied programmatically; CLI flags override
//! the file for the row target, shard size, seed, and output directory.
//!
//! Example `rowfill.toml`:
//!
//! ```toml
//! desired_output_rows = 100000
//! shard_size = 10000
//! order_date_low = 0
//! order_date_high = 365
//! inclusive_upper = true
//! seed = 42
//!
//! # Flat ship delay, used when a category has no entry below
//! ship_date_low = 1
//! ship_date_high = 7
//!
//! [ship_delay.Furniture]
//! Chairs = [2, 6, "Second Class"]
//! Tables = [3, 9]
//!
//! [discounts]
//! "2015" = 0.05
//! "2016" = 0.10
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, RowfillError};

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = "rowfill.toml";

/// Default directory for shards and the compiled output.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Default ceiling on consecutive order id collisions in one allocation.
pub const DEFAULT_MAX_UID_RETRIES: u64 = 10_000_000;

/// Top-level rowfill.toml structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RowfillConfig {
    /// Total row count of the expanded dataset (source rows included).
    pub desired_output_rows: Option<usize>,
    /// Number of synthesized rows per shard file.
    pub shard_size: Option<usize>,
    /// Lower day offset applied to a sampled order date.
    pub order_date_low: Option<i64>,
    /// Upper day offset applied to a sampled order date.
    pub order_date_high: Option<i64>,
    /// Whether `*_high` bounds are inclusive. When false, ranges are `[low, high)`.
    pub inclusive_upper: bool,
    /// Flat ship delay lower bound, used when no per-category entry matches.
    pub ship_date_low: Option<i64>,
    /// Flat ship delay upper bound.
    pub ship_date_high: Option<i64>,
    /// Per category, per sub-category ship delay ranges.
    pub ship_delay: BTreeMap<String, BTreeMap<String, ShipDelayEntry>>,
    /// Discount amount added per order year, keyed by the year as a string.
    pub discounts: BTreeMap<String, f64>,
    /// Fixed random seed. A fresh seed is drawn (and recorded) when absent.
    pub seed: Option<u64>,
    /// Hard ceiling on consecutive collisions when minting one order id.
    pub max_uid_retries: u64,
    /// Redraw `ship_mode` from the observed ship mode frequencies.
    pub resample_ship_mode: bool,
    /// Keep shard files after they are folded into the compiled output.
    pub retain_shards: bool,
    /// Directory that receives shards, the compiled file, and the manifest.
    pub output_dir: PathBuf,
}

impl Default for RowfillConfig {
    fn default() -> Self {
        Self {
            desired_output_rows: None,
            shard_size: None,
            order_date_low: None,
            order_date_high: None,
            inclusive_upper: true,
            ship_date_low: None,
            ship_date_high: None,
            ship_delay: BTreeMap::new(),
            discounts: BTreeMap::new(),
            seed: None,
            max_uid_retries: DEFAULT_MAX_UID_RETRIES,
            resample_ship_mode: false,
            retain_shards: true,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

/// A ship delay range as written in the config.
///
/// Accepts `[low, high]`, `[low, high, "mode"]`, or `{ low, high, mode }`.
/// A mode, when present, overwrites `ship_mode` on synthesized rows.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ShipDelayEntry {
    WithMode(i64, i64, String),
    Range(i64, i64),
    Table {
        low: i64,
        high: i64,
        #[serde(default)]
        mode: Option<String>,
    },
}

impl ShipDelayEntry {
    pub fn bounds(&self) -> (i64, i64) {
        match self {
            ShipDelayEntry::WithMode(low, high, _)
            | ShipDelayEntry::Range(low, high)
            | ShipDelayEntry::Table { low, high, .. } => (*low, *high),
        }
    }

    pub fn mode(&self) -> Option<&str> {
        match self {
            ShipDelayEntry::WithMode(_, _, mode) => Some(mode),
            ShipDelayEntry::Table { mode, .. } => mode.as_deref(),
            ShipDelayEntry::Range(..) => None,
        }
    }
}

/// Resolve `path` to a config file: a directory is joined with
/// [`CONFIG_FILE_NAME`], anything else is taken as the file itself.
pub fn config_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(CONFIG_FILE_NAME)
    } else {
        path.to_path_buf()
    }
}

/// Read and parse a rowfill.toml file from the given directory or file path.
///
/// Returns `None` if the file doesn't exist.
/// Returns an error if the file exists but can't be parsed or fails validation.
pub fn read_config(path: &Path) -> Result<Option<RowfillConfig>> {
    let path = config_path(path);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path).map_err(|e| RowfillError::Config {
        message: format!("Failed to read {}: {}", path.display(), e),
    })?;

    let config = parse_config(&content).map_err(|e| match e {
        RowfillError::Config { message } => RowfillError::Config {
            message: format!("{}: {}", path.display(), message),
        },
        other => other,
    })?;

    Ok(Some(config))
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<RowfillConfig> {
    let config: RowfillConfig = toml::from_str(content).map_err(|e| RowfillError::Config {
        message: format!("Failed to parse config: {}", e),
    })?;
    config.validate()?;
    Ok(config)
}

impl RowfillConfig {
    /// Flat ship delay pair, if both bounds are configured.
    pub fn flat_ship_delay(&self) -> Option<(i64, i64)> {
        self.ship_date_low.zip(self.ship_date_high)
    }

    /// Whether synthesized rows carry a `ship_mode` value the source may lack.
    pub fn synthesizes_ship_mode(&self) -> bool {
        self.resample_ship_mode
            || self
                .ship_delay
                .values()
                .flat_map(|subs| subs.values())
                .any(|entry| entry.mode().is_some())
    }

    /// Validate semantic constraints that serde cannot enforce.
    ///
    /// Required keys are checked by [`RowfillConfig::require_complete`] instead,
    /// so that a partial file can still be completed by CLI flags.
    pub fn validate(&self) -> Result<()> {
        if self.shard_size == Some(0) {
            return Err(config_error("shard_size must be greater than 0"));
        }
        if self.max_uid_retries == 0 {
            return Err(config_error("max_uid_retries must be greater than 0"));
        }

        if let (Some(low), Some(high)) = (self.order_date_low, self.order_date_high) {
            self.check_range("order_date", low, high)?;
        }

        match (self.ship_date_low, self.ship_date_high) {
            (Some(low), Some(high)) => self.check_range("ship_date", low, high)?,
            (None, None) => {}
            _ => {
                return Err(config_error(
                    "ship_date_low and ship_date_high must be given together",
                ))
            }
        }

        for (category, subs) in &self.ship_delay {
            for (sub_category, entry) in subs {
                let (low, high) = entry.bounds();
                self.check_range(&format!("ship_delay.{}.{}", category, sub_category), low, high)?;
            }
        }

        for (year, amount) in &self.discounts {
            if year.trim().parse::<i32>().is_err() {
                return Err(config_error(&format!(
                    "discounts key '{}' is not a year",
                    year
                )));
            }
            if !amount.is_finite() {
                return Err(config_error(&format!(
                    "discounts.{} must be a finite number",
                    year
                )));
            }
        }

        Ok(())
    }

    /// Check that every key an interpolation run needs is present.
    pub fn require_complete(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("desired_output_rows", self.desired_output_rows.is_none()),
            ("shard_size", self.shard_size.is_none()),
            ("order_date_low", self.order_date_low.is_none()),
            ("order_date_high", self.order_date_high.is_none()),
        ]
        .iter()
        .filter(|(_, absent)| *absent)
        .map(|(key, _)| *key)
        .collect();

        if !missing.is_empty() {
            return Err(config_error(&format!(
                "missing required key(s): {}",
                missing.join(", ")
            )));
        }
        if self.flat_ship_delay().is_none() && self.ship_delay.is_empty() {
            return Err(config_error(
                "no ship delay configured: set ship_date_low/ship_date_high or a [ship_delay] table",
            ));
        }
        self.validate()
    }

    fn check_range(&self, name: &str, low: i64, high: i64) -> Result<()> {
        if low > high {
            return Err(config_error(&format!(
                "{}: low ({}) is greater than high ({})",
                name, low, high
            )));
        }
        if !self.inclusive_upper && low == high {
            return Err(config_error(&format!(
                "{}: range [{}, {}) is empty with inclusive_upper = false",
                name, low, high
            )));
        }
        Ok(())
    }
}

fn config_error(message: &str) -> RowfillError {
    RowfillError::Config {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
desired_output_rows = 5000
shard_size = 500
order_date_low = 0
order_date_high = 30
inclusive_upper = false
seed = 7
ship_date_low = 1
ship_date_high = 5

[ship_delay.Furniture]
Chairs = [2, 6, "Second Class"]
Tables = [3, 9]

[ship_delay.Technology]
Phones = { low = 0, high = 2, mode = "Same Day" }

[discounts]
"2014" = 0.05
"2015" = 0.1
"#;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(FULL).unwrap();

        assert_eq!(config.desired_output_rows, Some(5000));
        assert_eq!(config.shard_size, Some(500));
        assert_eq!(config.order_date_high, Some(30));
        assert!(!config.inclusive_upper);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.flat_ship_delay(), Some((1, 5)));

        let chairs = &config.ship_delay["Furniture"]["Chairs"];
        assert_eq!(chairs.bounds(), (2, 6));
        assert_eq!(chairs.mode(), Some("Second Class"));

        let tables = &config.ship_delay["Furniture"]["Tables"];
        assert_eq!(tables.bounds(), (3, 9));
        assert_eq!(tables.mode(), None);

        let phones = &config.ship_delay["Technology"]["Phones"];
        assert_eq!(phones.mode(), Some("Same Day"));

        assert_eq!(config.discounts["2015"], 0.1);
        assert!(config.synthesizes_ship_mode());
        assert!(config.require_complete().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = parse_config("").unwrap();
        assert!(config.inclusive_upper);
        assert!(config.retain_shards);
        assert!(!config.resample_ship_mode);
        assert_eq!(config.max_uid_retries, DEFAULT_MAX_UID_RETRIES);
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert!(!config.synthesizes_ship_mode());
    }

    #[test]
    fn test_require_complete_lists_missing_keys() {
        let config = parse_config("shard_size = 10").unwrap();
        let msg = format!("{}", config.require_complete().unwrap_err());
        assert!(msg.contains("desired_output_rows"), "{}", msg);
        assert!(msg.contains("order_date_low"), "{}", msg);
        assert!(!msg.contains("shard_size"), "{}", msg);
    }

    #[test]
    fn test_require_complete_needs_ship_delay() {
        let config = parse_config(
            r#"
desired_output_rows = 10
shard_size = 5
order_date_low = 0
order_date_high = 1
"#,
        )
        .unwrap();
        let msg = format!("{}", config.require_complete().unwrap_err());
        assert!(msg.contains("ship delay"), "{}", msg);
    }

    #[test]
    fn test_zero_shard_size_rejected() {
        assert!(parse_config("shard_size = 0").is_err());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = parse_config("order_date_low = 5\norder_date_high = 1").unwrap_err();
        assert!(format!("{}", err).contains("order_date"));
    }

    #[test]
    fn test_empty_half_open_range_rejected() {
        let err = parse_config(
            r#"
inclusive_upper = false
[ship_delay.Office]
Paper = [3, 3]
"#,
        )
        .unwrap_err();
        assert!(format!("{}", err).contains("ship_delay.Office.Paper"));
    }

    #[test]
    fn test_unpaired_flat_ship_delay_rejected() {
        assert!(parse_config("ship_date_low = 1").is_err());
    }

    #[test]
    fn test_non_year_discount_key_rejected() {
        let err = parse_config("[discounts]\nlast_year = 0.1").unwrap_err();
        assert!(format!("{}", err).contains("last_year"));
    }

    #[test]
    fn test_read_config_nonexistent() {
        let result = read_config(Path::new("/nonexistent/dir"));
        assert!(result.is_ok());
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_read_config_from_dir_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, FULL).unwrap();

        let from_dir = read_config(dir.path()).unwrap().unwrap();
        let from_file = read_config(&path).unwrap().unwrap();
        assert_eq!(from_dir.desired_output_rows, Some(5000));
        assert_eq!(from_file.shard_size, Some(500));
    }

    #[test]
    fn test_read_config_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "this is not valid [[[toml").unwrap();

        let err = read_config(dir.path()).unwrap_err();
        assert!(format!("{}", err).contains(CONFIG_FILE_NAME));
    }
}
