//! Exploratory analysis and baseline rating models over MovieLens 10M.
//!
//! Stages run strictly in order: acquisition, ingestion, join, hold-out
//! partition, feature engineering, then charts and the Ridge / Lasso
//! baselines, both reading the engineered table.

pub mod acquisition;
pub mod config;
pub mod error;
pub mod features;
pub mod ingestion;
pub mod joiner;
pub mod modeler;
pub mod pipeline;
pub mod schema;
pub mod splitter;
pub mod visualizer;

pub use acquisition::{HttpTransport, Transport};
pub use config::{GenreMatch, ModelConfig, PipelineConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{run, PipelineReport};
