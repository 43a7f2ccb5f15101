//! taleweave-tensor: Tensor encoding for the Taleweave knowledge graph.
//!
//! Assigns every surviving entity a dense index (0..N-1) in first-insertion
//! order and packs the graph into the three arrays a graph-learning model
//! consumes: node features `x` [N, D], `edge_index` [2, E], and `edge_type` [E].
//! Encoding the same validated graph with the same vectors always yields the
//! same bytes.

pub mod artifact;
pub mod encoder;
pub mod error;

pub use artifact::{checksum, IndexEntry, IndexTable, RelationCode, TensorHeader};
pub use encoder::{GraphTensors, TensorEncoder};
pub use error::{EncodeError, Result};
