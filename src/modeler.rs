use linfa::prelude::*;
use linfa::Dataset;
use linfa_elasticnet::ElasticNet;
use ndarray::{Array1, Array2, Axis, Ix1};
use polars::prelude::*;
use tracing::{debug, info};

use crate::config::ModelConfig;
use crate::error::{PipelineError, Result};
use crate::schema::{GENRES, RATING, TIMESTAMP, TITLE};
use crate::splitter::split_indices;

/// Columns never fed to the regressors: the target, free text and the raw timestamp.
pub const EXCLUDED_COLUMNS: [&str; 4] = [RATING, TITLE, GENRES, TIMESTAMP];

#[derive(Debug, Clone)]
pub struct DesignMatrix {
    pub features: Vec<String>,
    pub x: Array2<f64>,
    pub y: Array1<f64>,
}

/// Builds `X` from every remaining numeric column and `y` from `rating`.
///
/// Nulls (release years that could not be parsed) take the mean of the
/// column's present values, or 0 when none are present. Constant columns
/// are left out.
pub fn design_matrix(df: &DataFrame) -> Result<DesignMatrix> {
    let mut features = Vec::new();
    let mut columns: Vec<Vec<f64>> = Vec::new();

    for series in df.get_columns() {
        let name = series.name();
        if EXCLUDED_COLUMNS.contains(&name) || !series.dtype().is_numeric() {
            continue;
        }

        let values = series.cast(&DataType::Float64)?;
        let values = values.f64()?;
        let fill = values.mean().unwrap_or(0.0);
        let filled: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(fill)).collect();

        // a constant column is absorbed by the intercept
        if filled.windows(2).all(|w| w[0] == w[1]) {
            debug!(column = name, "dropping constant feature");
            continue;
        }
        columns.push(filled);
        features.push(name.to_string());
    }

    let rows = df.height();
    let x = Array2::from_shape_fn((rows, columns.len()), |(r, c)| columns[c][r]);

    let target = df.column(RATING)?.cast(&DataType::Float64)?;
    let y: Array1<f64> = target
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect();

    Ok(DesignMatrix { features, x, y })
}

pub fn rmse(predicted: &Array1<f64>, actual: &Array1<f64>) -> f64 {
    let diff = predicted - actual;
    diff.mapv(|e| e * e).mean().unwrap_or(f64::NAN).sqrt()
}

/// Which regularizer a baseline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Penalty {
    /// L2 on the weights.
    Ridge,
    /// L1 on the weights.
    Lasso,
}

/// A penalized linear model fitted on mean-centered data.
#[derive(Debug, Clone)]
pub struct LinearFit {
    pub weights: Array1<f64>,
    pub intercept: f64,
    x_mean: Array1<f64>,
}

impl LinearFit {
    /// `(x − x̄)·w + ȳ`
    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        (x - &self.x_mean).dot(&self.weights) + self.intercept
    }
}

/// Fits one penalized linear model with an unpenalized intercept.
///
/// The solver minimizes `1/(2n)·‖y − Xw‖² + penalty·(ρ‖w‖₁ + (1 − ρ)/2·‖w‖²)`.
/// Ridge `‖y − Xw‖² + α‖w‖²` maps to ρ = 0 and penalty = α / n; Lasso
/// `1/(2n)·‖y − Xw‖² + α‖w‖₁` maps to ρ = 1 and penalty = α.
///
/// `X` and `y` are centered on their means and the solver runs without an
/// intercept; the intercept is `ȳ`.
pub fn fit_penalized(
    penalty: Penalty,
    alpha: f64,
    x: &Array2<f64>,
    y: &Array1<f64>,
    config: &ModelConfig,
) -> Result<LinearFit> {
    let x_mean = x
        .mean_axis(Axis(0))
        .ok_or(PipelineError::Empty("training split"))?;
    let y_mean = y.mean().ok_or(PipelineError::Empty("training split"))?;

    let train: Dataset<f64, f64, Ix1> = Dataset::new(x - &x_mean, y - y_mean);
    let n = train.nsamples().max(1) as f64;
    let (l1_ratio, strength) = match penalty {
        Penalty::Ridge => (0.0, alpha / n),
        Penalty::Lasso => (1.0, alpha),
    };

    let model = ElasticNet::params()
        .l1_ratio(l1_ratio)
        .penalty(strength)
        .with_intercept(false)
        .max_iterations(config.max_iterations)
        .tolerance(config.tolerance)
        .fit(&train)
        .map_err(|e| PipelineError::Model(format!("{penalty:?}: {e}")))?;

    debug!(
        ?penalty,
        intercept = y_mean,
        weights = ?model.hyperplane(),
        "fitted penalized regression"
    );
    Ok(LinearFit {
        weights: model.hyperplane().clone(),
        intercept: y_mean,
        x_mean,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineReport {
    pub train_rows: usize,
    pub test_rows: usize,
    pub ridge_rmse: f64,
    pub lasso_rmse: f64,
}

/// Splits the engineered table, fits Ridge and Lasso, and scores both on the test slice.
pub fn fit_baselines(df: &DataFrame, config: &ModelConfig) -> Result<BaselineReport> {
    let DesignMatrix { features, x, y } = design_matrix(df)?;
    if features.is_empty() {
        return Err(PipelineError::Empty("feature matrix"));
    }

    let (train_idx, test_idx) = split_indices(x.nrows(), config.test_fraction, config.seed);
    if train_idx.is_empty() {
        return Err(PipelineError::Empty("training split"));
    }
    if test_idx.is_empty() {
        return Err(PipelineError::Empty("test split"));
    }

    let x_train = x.select(Axis(0), &train_idx);
    let y_train = y.select(Axis(0), &train_idx);
    let x_test = x.select(Axis(0), &test_idx);
    let y_test = y.select(Axis(0), &test_idx);
    debug!(features = features.len(), ?features, "design matrix");

    let ridge = fit_penalized(Penalty::Ridge, config.ridge_alpha, &x_train, &y_train, config)?;
    let ridge_rmse = rmse(&ridge.predict(&x_test), &y_test);

    let lasso = fit_penalized(Penalty::Lasso, config.lasso_alpha, &x_train, &y_train, config)?;
    let lasso_rmse = rmse(&lasso.predict(&x_test), &y_test);

    info!(
        train = train_idx.len(),
        test = test_idx.len(),
        ridge_rmse,
        lasso_rmse,
        "baselines scored"
    );
    Ok(BaselineReport {
        train_rows: train_idx.len(),
        test_rows: test_idx.len(),
        ridge_rmse,
        lasso_rmse,
    })
}
