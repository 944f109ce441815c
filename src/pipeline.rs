use std::path::PathBuf;

use polars::prelude::DataFrame;
use tracing::{info, warn};

use crate::acquisition::{acquire, Transport};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::features::engineer;
use crate::ingestion::{load_movies, load_ratings};
use crate::joiner::join_ratings_movies;
use crate::modeler::fit_baselines;
use crate::splitter::partition_holdout;
use crate::visualizer;

#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Whether this run had to fetch the archive.
    pub downloaded: bool,
    pub joined_rows: usize,
    pub working_rows: usize,
    pub holdout_rows: usize,
    pub genres: Vec<String>,
    pub preview: DataFrame,
    pub ridge_rmse: f64,
    pub lasso_rmse: f64,
    pub plots: Vec<PathBuf>,
}

/// Runs acquisition through modeling once, failing on the first error.
pub fn run(config: &PipelineConfig, transport: &dyn Transport) -> Result<PipelineReport> {
    // 1. Download (if missing) and unpack the archive
    let downloaded = acquire(
        transport,
        &config.source_url,
        &config.archive_path,
        &config.extract_dir,
    )?;

    // 2. Load both files
    let ratings = load_ratings(&config.ratings_path())?;
    let movies = load_movies(&config.movies_path())?;

    // 3. Join on movieId
    let joined = join_ratings_movies(&ratings, &movies)?;
    drop((ratings, movies));
    let joined_rows = joined.height();

    // 4. Working / held-out partition
    let partition = partition_holdout(&joined, config.holdout_fraction, config.holdout_seed)?;
    // the regressors below re-split the full table and never see this held-out set
    warn!(
        holdout = partition.holdout.height(),
        "held-out partition is not used by the baselines"
    );

    // 5. Features over the full joined table
    let table = engineer(joined, config.genre_match, config.preview_rows)?;

    // 6. Charts
    let plots = match &config.plot_dir {
        Some(dir) => visualizer::render(&visualizer::summarize(&table.frame)?, dir)?,
        None => Vec::new(),
    };

    // 7. Ridge and Lasso baselines
    let baselines = fit_baselines(&table.frame, &config.model)?;

    info!(
        joined = joined_rows,
        ridge_rmse = baselines.ridge_rmse,
        lasso_rmse = baselines.lasso_rmse,
        "pipeline finished"
    );
    Ok(PipelineReport {
        downloaded,
        joined_rows,
        working_rows: partition.working.height(),
        holdout_rows: partition.holdout.height(),
        genres: table.genres,
        preview: table.preview,
        ridge_rmse: baselines.ridge_rmse,
        lasso_rmse: baselines.lasso_rmse,
        plots,
    })
}
