use std::collections::HashMap;

use polars::prelude::*;
use tracing::info;

use crate::error::Result;
use crate::schema::MOVIE_ID;

/// Inner equi-join of ratings and movies on `movieId`.
///
/// Output rows follow the rating table order. Ratings whose movie is unknown
/// are dropped; a movie key present twice yields one row per match.
pub fn join_ratings_movies(ratings: &DataFrame, movies: &DataFrame) -> Result<DataFrame> {
    let mut movie_rows: HashMap<i64, Vec<IdxSize>> = HashMap::new();
    for (row, key) in movies.column(MOVIE_ID)?.i64()?.into_iter().enumerate() {
        if let Some(key) = key {
            movie_rows.entry(key).or_default().push(row as IdxSize);
        }
    }

    let mut left: Vec<IdxSize> = Vec::with_capacity(ratings.height());
    let mut right: Vec<IdxSize> = Vec::with_capacity(ratings.height());
    for (row, key) in ratings.column(MOVIE_ID)?.i64()?.into_iter().enumerate() {
        let Some(matches) = key.and_then(|k| movie_rows.get(&k)) else {
            continue;
        };
        for &movie_row in matches {
            left.push(row as IdxSize);
            right.push(movie_row);
        }
    }

    let left_rows = ratings.take(&IdxCa::from_vec("left", left))?;
    let right_rows = movies.drop(MOVIE_ID)?.take(&IdxCa::from_vec("right", right))?;
    let joined = left_rows.hstack(right_rows.get_columns())?;

    info!(
        ratings = ratings.height(),
        joined = joined.height(),
        dropped = ratings.height() - joined.height().min(ratings.height()),
        "joined ratings with movies"
    );
    Ok(joined)
}
