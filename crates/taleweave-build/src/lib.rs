//! taleweave-build: assembles the narrative knowledge graph and its tensor dataset.
//!
//! Pulls entity and relation fragments from the configured sources, merges
//! and validates them into one graph, attaches summaries and embeddings,
//! encodes the result for graph-learning pipelines, and records every run
//! in the ledger.

pub mod config;
pub mod error;
pub mod export;
pub mod ledger;
pub mod pipeline;
pub mod runner;
pub mod sources;

pub use error::{BuildError, Result};
pub use pipeline::{BuildOutput, GraphPipeline, PipelineOptions};
