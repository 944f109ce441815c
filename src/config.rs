use std::path::{Path, PathBuf};

pub const MOVIELENS_URL: &str = "https://files.grouplens.org/datasets/movielens/ml-10m.zip";

/// How a genre indicator column decides whether a row carries its genre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenreMatch {
    /// The genre token occurs anywhere in the raw `genres` field.
    #[default]
    Substring,
    /// The genre token is one of the `|`-separated entries.
    Exact,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Fraction of rows kept aside to score the regressors.
    pub test_fraction: f64,
    pub seed: u64,
    pub ridge_alpha: f64,
    pub lasso_alpha: f64,
    /// Coordinate descent iteration cap shared by both regressors.
    pub max_iterations: u32,
    pub tolerance: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            ridge_alpha: 1.0,
            lasso_alpha: 0.1,
            max_iterations: 1000,
            tolerance: 1e-4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source_url: String,
    pub archive_path: PathBuf,
    /// Directory the archive is unpacked into.
    pub extract_dir: PathBuf,
    /// Directory inside the archive holding the `.dat` files.
    pub dataset_dir: String,
    pub ratings_file: String,
    pub movies_file: String,
    pub holdout_fraction: f64,
    pub holdout_seed: u64,
    pub genre_match: GenreMatch,
    /// Where charts are written. `None` skips rendering.
    pub plot_dir: Option<PathBuf>,
    pub preview_rows: usize,
    pub model: ModelConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_url: MOVIELENS_URL.to_string(),
            archive_path: PathBuf::from("ml-10M100K.zip"),
            extract_dir: PathBuf::from("."),
            dataset_dir: "ml-10M100K".to_string(),
            ratings_file: "ratings.dat".to_string(),
            movies_file: "movies.dat".to_string(),
            holdout_fraction: 0.1,
            holdout_seed: 1,
            genre_match: GenreMatch::default(),
            plot_dir: Some(PathBuf::from("plots")),
            preview_rows: 5,
            model: ModelConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Default configuration with every path placed under `root`.
    pub fn rooted(root: &Path) -> Self {
        let defaults = Self::default();
        Self {
            archive_path: root.join(&defaults.archive_path),
            extract_dir: root.to_path_buf(),
            plot_dir: defaults.plot_dir.as_ref().map(|dir| root.join(dir)),
            ..defaults
        }
    }

    pub fn ratings_path(&self) -> PathBuf {
        self.extract_dir
            .join(&self.dataset_dir)
            .join(&self.ratings_file)
    }

    pub fn movies_path(&self) -> PathBuf {
        self.extract_dir.join(&self.dataset_dir).join(&self.movies_file)
    }
}
