use std::io;
use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("{}:{line}: {reason}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("dataframe error: {0}")]
    Frame(#[from] PolarsError),
    #[error("model fit failed: {0}")]
    Model(String),
    #[error("plot rendering failed: {0}")]
    Plot(String),
    #[error("{0} is empty")]
    Empty(&'static str),
}
