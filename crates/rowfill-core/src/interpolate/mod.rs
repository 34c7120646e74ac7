//! Recency-weighted expansion of an order dataset.
//!
//! [`engine`] drives a run; the other modules are its building blocks.

pub mod engine;
pub mod plan;
pub mod sampler;
pub mod shard;
pub mod synth;
pub mod uid;
