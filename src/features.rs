//! Feature engineering over the joined rating table.
//!
//! The steps run in a fixed order: release year from the title, per-user and
//! per-movie rating aggregates, one indicator column per genre, then
//! standardization of the aggregates. Each step is usable on its own.

use std::collections::{BTreeSet, HashSet};

use polars::prelude::*;
use tracing::{debug, info};

use crate::config::GenreMatch;
use crate::error::Result;
use crate::schema::{
    AGGREGATE_COLUMNS, GENRES, GENRE_SEPARATOR, MOVIE_ID, MOVIE_MEAN_RATING,
    MOVIE_RATING_COUNT, RATING, RELEASE_YEAR, TITLE, USER_ID, USER_MEAN_RATING,
    USER_RATING_COUNT,
};

/// Reads the year out of a trailing `(YYYY)` in a movie title.
///
/// The four characters before the last one must all be ASCII digits. Titles
/// shorter than five characters have no year.
pub fn extract_year(title: &str) -> Option<i32> {
    let chars: Vec<char> = title.trim().chars().collect();
    if chars.len() < 5 {
        return None;
    }

    let candidate = &chars[chars.len() - 5..chars.len() - 1];
    if !candidate.iter().all(char::is_ascii_digit) {
        return None;
    }
    candidate.iter().collect::<String>().parse().ok()
}

pub fn add_release_year(mut df: DataFrame) -> Result<DataFrame> {
    let years: Vec<Option<i32>> = df
        .column(TITLE)?
        .str()?
        .into_iter()
        .map(|title| title.and_then(extract_year))
        .collect();

    let missing = years.iter().filter(|y| y.is_none()).count();
    if missing > 0 {
        debug!(missing, "titles without a release year");
    }

    df.with_column(Series::new(RELEASE_YEAR, years))?;
    Ok(df)
}

/// Attaches mean and count of `rating` per user and per movie to every row.
pub fn add_rating_aggregates(df: DataFrame) -> Result<DataFrame> {
    let df = df
        .lazy()
        .with_columns([
            col(RATING)
                .mean()
                .over([col(USER_ID)])
                .alias(USER_MEAN_RATING),
            col(RATING)
                .count()
                .over([col(USER_ID)])
                .cast(DataType::Float64)
                .alias(USER_RATING_COUNT),
            col(RATING)
                .mean()
                .over([col(MOVIE_ID)])
                .alias(MOVIE_MEAN_RATING),
            col(RATING)
                .count()
                .over([col(MOVIE_ID)])
                .cast(DataType::Float64)
                .alias(MOVIE_RATING_COUNT),
        ])
        .collect()?;

    Ok(df)
}

/// Every distinct `|`-separated genre token, in lexical order.
pub fn distinct_genres(df: &DataFrame) -> Result<Vec<String>> {
    let mut genres: BTreeSet<String> = BTreeSet::new();
    for raw in df.column(GENRES)?.str()?.into_iter().flatten() {
        genres.extend(
            raw.split(GENRE_SEPARATOR)
                .filter(|token| !token.is_empty())
                .map(str::to_string),
        );
    }
    Ok(genres.into_iter().collect())
}

pub fn has_genre(raw: &str, genre: &str, policy: GenreMatch) -> bool {
    match policy {
        GenreMatch::Substring => raw.contains(genre),
        GenreMatch::Exact => raw.split(GENRE_SEPARATOR).any(|token| token == genre),
    }
}

/// Appends one 0/1 `Int32` column per distinct genre, named after the genre.
pub fn add_genre_indicators(
    mut df: DataFrame,
    policy: GenreMatch,
) -> Result<(DataFrame, Vec<String>)> {
    let genres = distinct_genres(&df)?;
    let raw: Vec<String> = df
        .column(GENRES)?
        .str()?
        .into_iter()
        .map(|g| g.unwrap_or_default().to_string())
        .collect();

    for genre in &genres {
        let flags: Vec<i32> = raw
            .iter()
            .map(|r| i32::from(has_genre(r, genre, policy)))
            .collect();
        df.with_column(Series::new(genre, flags))?;
    }

    info!(genres = genres.len(), ?policy, "added genre indicators");
    Ok((df, genres))
}

/// Mean and spread used to rescale one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnScale {
    pub column: String,
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
}

impl ColumnScale {
    /// Zero spread divides by one so a constant column maps to zeros.
    pub fn divisor(&self) -> f64 {
        if self.std_dev > 0.0 {
            self.std_dev
        } else {
            1.0
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        (value - self.mean) / self.divisor()
    }
}

pub fn fit_standardization(df: &DataFrame, columns: &[&str]) -> Result<Vec<ColumnScale>> {
    columns
        .iter()
        .map(|&name| -> Result<ColumnScale> {
            let values = df.column(name)?.cast(&DataType::Float64)?;
            let values = values.f64()?;
            Ok(ColumnScale {
                column: name.to_string(),
                mean: values.mean().unwrap_or(0.0),
                std_dev: values.std(0).unwrap_or(0.0),
            })
        })
        .collect()
}

pub fn apply_standardization(mut df: DataFrame, scales: &[ColumnScale]) -> Result<DataFrame> {
    for scale in scales {
        let values = df.column(&scale.column)?.cast(&DataType::Float64)?;
        let rescaled: Vec<Option<f64>> = values
            .f64()?
            .into_iter()
            .map(|v| v.map(|v| scale.apply(v)))
            .collect();
        df.with_column(Series::new(&scale.column, rescaled))?;
    }
    Ok(df)
}

/// Fits scales on `df` itself and rewrites the columns in place.
pub fn standardize(df: DataFrame, columns: &[&str]) -> Result<(DataFrame, Vec<ColumnScale>)> {
    let scales = fit_standardization(&df, columns)?;
    for scale in &scales {
        debug!(column = %scale.column, mean = scale.mean, std_dev = scale.std_dev, "column scale");
    }
    let df = apply_standardization(df, &scales)?;
    Ok((df, scales))
}

/// First `n` distinct movies with their title, raw genres and indicators.
pub fn movie_genre_preview(df: &DataFrame, genres: &[String], n: usize) -> Result<DataFrame> {
    let mut seen: HashSet<(i64, String)> = HashSet::new();
    let mut rows: Vec<IdxSize> = Vec::new();

    let ids = df.column(MOVIE_ID)?.i64()?;
    let titles = df.column(TITLE)?.str()?;
    for (row, (id, title)) in ids.into_iter().zip(titles.into_iter()).enumerate() {
        if rows.len() == n {
            break;
        }
        let key = (id.unwrap_or_default(), title.unwrap_or_default().to_string());
        if seen.insert(key) {
            rows.push(row as IdxSize);
        }
    }

    let mut columns: Vec<String> = vec![MOVIE_ID.into(), TITLE.into(), GENRES.into()];
    columns.extend(genres.iter().cloned());

    let preview = df.select(columns)?.take(&IdxCa::from_vec("rows", rows))?;
    Ok(preview)
}

/// The joined table after every engineering step.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub frame: DataFrame,
    pub genres: Vec<String>,
    pub scales: Vec<ColumnScale>,
    /// Distinct movies with genre indicators, captured before standardization.
    pub preview: DataFrame,
}

pub fn engineer(joined: DataFrame, policy: GenreMatch, preview_rows: usize) -> Result<FeatureTable> {
    let df = add_release_year(joined)?;
    let df = add_rating_aggregates(df)?;
    let (df, genres) = add_genre_indicators(df, policy)?;
    let preview = movie_genre_preview(&df, &genres, preview_rows)?;
    let (frame, scales) = standardize(df, &AGGREGATE_COLUMNS)?;

    info!(
        rows = frame.height(),
        columns = frame.width(),
        "engineered feature table"
    );
    Ok(FeatureTable {
        frame,
        genres,
        scales,
        preview,
    })
}
