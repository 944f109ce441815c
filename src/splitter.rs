use std::collections::HashSet;

use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::error::Result;
use crate::schema::{MOVIE_ID, USER_ID};

/// Shuffles `0..n` with a seeded RNG and cuts off the test slice.
///
/// The test slice holds the first `ceil(n * test_fraction)` shuffled indices.
/// Returns `(train, test)`.
pub fn split_indices(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    // generate vector from 0 to n
    let mut indices: Vec<usize> = (0..n).collect();

    // same seed, same permutation on every platform
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n as f64 * test_fraction).ceil() as usize).min(n);
    let train = indices.split_off(n_test);

    (train, indices)
}

fn to_idx(indices: &[usize]) -> IdxCa {
    IdxCa::from_vec("idx", indices.iter().map(|&i| i as IdxSize).collect())
}

/// Random row split of a frame. Returns `(train, test)`.
pub fn train_test_split(
    df: &DataFrame,
    test_fraction: f64,
    seed: u64,
) -> Result<(DataFrame, DataFrame)> {
    let (train_indices, test_indices) = split_indices(df.height(), test_fraction, seed);

    // Create the training and testing DataFrames
    let train_df = df.take(&to_idx(&train_indices))?;
    let test_df = df.take(&to_idx(&test_indices))?;

    Ok((train_df, test_df))
}

/// The joined table cut into rows to learn from and rows kept for final scoring.
#[derive(Debug, Clone)]
pub struct Partition {
    pub working: DataFrame,
    pub holdout: DataFrame,
}

fn key_set(df: &DataFrame, column: &str) -> Result<HashSet<i64>> {
    Ok(df.column(column)?.i64()?.into_iter().flatten().collect())
}

/// Splits off a held-out set whose users and movies all appear in the working set.
///
/// Rows of the random test slice with an unseen user or movie go back into
/// the working set, so every input row ends up in exactly one side.
pub fn partition_holdout(joined: &DataFrame, holdout_fraction: f64, seed: u64) -> Result<Partition> {
    let (working, candidates) = train_test_split(joined, holdout_fraction, seed)?;

    let known_users = key_set(&working, USER_ID)?;
    let known_movies = key_set(&working, MOVIE_ID)?;

    let users = candidates.column(USER_ID)?.i64()?;
    let movies = candidates.column(MOVIE_ID)?.i64()?;
    let keep: Vec<bool> = users
        .into_iter()
        .zip(movies.into_iter())
        .map(|(user, movie)| {
            let seen_user = user.is_some_and(|u| known_users.contains(&u));
            let seen_movie = movie.is_some_and(|m| known_movies.contains(&m));
            seen_user && seen_movie
        })
        .collect();
    let returned: Vec<bool> = keep.iter().map(|k| !k).collect();

    let holdout = candidates.filter(&BooleanChunked::from_slice("keep", &keep))?;
    let unseen = candidates.filter(&BooleanChunked::from_slice("unseen", &returned))?;
    let working = working.vstack(&unseen)?;

    info!(
        working = working.height(),
        holdout = holdout.height(),
        returned = unseen.height(),
        "partitioned joined table"
    );
    Ok(Partition { working, holdout })
}
