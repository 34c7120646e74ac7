//! # Error Types
//!
//! Defines `RowfillError`, the unified error enum for every failure mode in
//! an interpolation run. Variants carry the offending value, column, or row
//! index so a failed run can be diagnosed from the message alone.

use thiserror::Error;

/// All errors that can occur in rowfill operations.
#[derive(Error, Debug)]
pub enum RowfillError {
    #[error("Unable to produce {desired} rows from {current} source rows: {needed} new order ids are required but the id range spans only {span} values ({spare} unused)\n  Lower desired_output_rows or widen the order id suffix range in the source data")]
    Capacity {
        desired: usize,
        current: usize,
        needed: usize,
        span: u64,
        spare: u64,
    },

    #[error("Failed to allocate a unique order id suffix in [{min}, {max}): {retries} consecutive collisions\n  The id pool is saturated; lower desired_output_rows or raise max_uid_retries")]
    UidExhausted { min: u64, max: u64, retries: u64 },

    #[error("Malformed order id '{value}' at row {row_index}: expected '<prefix>-<year>-<numeric suffix>'")]
    MalformedOrderId { value: String, row_index: usize },

    #[error("Invalid date in column '{column}' at row {row_index}: '{value}'")]
    InvalidDate {
        column: String,
        value: String,
        row_index: usize,
    },

    #[error("Required column '{column}' is missing from the dataset")]
    MissingColumn { column: String },

    #[error("Data error: {message}")]
    Data { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Output error: {message}: {source}")]
    Output {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {message}: {source}")]
    Csv {
        message: String,
        #[source]
        source: csv::Error,
    },

    #[error("Manifest error: {message}")]
    Manifest { message: String },
}

pub type Result<T> = std::result::Result<T, RowfillError>;
