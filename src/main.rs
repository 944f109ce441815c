use movielens_baseline::{run, HttpTransport, PipelineConfig};

// training script and entry point
// Steps
// 1. Download the MovieLens archive if missing, then extract it
// 2. Load ratings and movies
// 3. Join them and carve out the held-out set
// 4. Engineer features
// 5. Draw the charts
// 6. Fit Ridge and Lasso baselines

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = PipelineConfig::default();
    let report = run(&config, &HttpTransport)?;

    println!("{}", report.preview);
    println!("RMSE avec Ridge Regression: {}", report.ridge_rmse);
    println!("RMSE avec Lasso Regression: {}", report.lasso_rmse);

    Ok(())
}
