pub mod config;
pub mod dataset;
pub mod error;
pub mod interpolate;
pub mod manifest;

// Re-export key types for convenience
pub use dataset::{Dataset, Row};
pub use error::{Result, RowfillError};
pub use interpolate::engine::{interpolate, preflight, InterpolationOutcome, PreflightReport};
