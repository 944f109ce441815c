//! Readers for the `::`-separated MovieLens `.dat` files.
//!
//! Neither file has a header, quoting or escaping. Every non-blank line must
//! carry exactly the expected number of fields and every typed field must
//! parse; the first bad row aborts the whole file.

use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use polars::prelude::*;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::schema::{GENRES, MOVIE_ID, RATING, TIMESTAMP, TITLE, USER_ID};

pub const FIELD_SEPARATOR: &str = "::";

const RATING_FIELDS: usize = 4;
const MOVIE_FIELDS: usize = 3;

/// Calls `visit` with the 1-based line number and fields of every non-blank line.
fn for_each_row<F>(path: &Path, arity: usize, mut visit: F) -> Result<()>
where
    F: FnMut(usize, &[&str]) -> Result<()>,
{
    let reader = BufReader::new(File::open(path)?);

    for (index, line) in reader.split(b'\n').enumerate() {
        let line_no = index + 1;
        let text = String::from_utf8(line?).map_err(|err| PipelineError::Parse {
            path: path.to_path_buf(),
            line: line_no,
            reason: format!("invalid UTF-8: {err}"),
        })?;
        let text = text.trim_end_matches('\r');
        if text.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = text.split(FIELD_SEPARATOR).collect();
        if fields.len() != arity {
            return Err(PipelineError::Parse {
                path: path.to_path_buf(),
                line: line_no,
                reason: format!("expected {arity} fields, found {}", fields.len()),
            });
        }
        visit(line_no, &fields)?;
    }

    Ok(())
}

fn parse_field<T>(path: &Path, line: usize, column: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|err| PipelineError::Parse {
        path: path.to_path_buf(),
        line,
        reason: format!("{column}: cannot parse {raw:?}: {err}"),
    })
}

/// Loads `userId::movieId::rating::timestamp` rows.
pub fn load_ratings(path: &Path) -> Result<DataFrame> {
    let mut user_ids: Vec<i64> = Vec::new();
    let mut movie_ids: Vec<i64> = Vec::new();
    let mut ratings: Vec<f64> = Vec::new();
    let mut timestamps: Vec<i64> = Vec::new();

    for_each_row(path, RATING_FIELDS, |line, fields| {
        user_ids.push(parse_field(path, line, USER_ID, fields[0])?);
        movie_ids.push(parse_field(path, line, MOVIE_ID, fields[1])?);
        ratings.push(parse_field(path, line, RATING, fields[2])?);
        timestamps.push(parse_field(path, line, TIMESTAMP, fields[3])?);
        Ok(())
    })?;

    let df = DataFrame::new(vec![
        Series::new(USER_ID, user_ids),
        Series::new(MOVIE_ID, movie_ids),
        Series::new(RATING, ratings),
        Series::new(TIMESTAMP, timestamps),
    ])?;

    info!(rows = df.height(), path = %path.display(), "loaded ratings");
    Ok(df)
}

/// Loads `movieId::title::genres` rows.
pub fn load_movies(path: &Path) -> Result<DataFrame> {
    let mut movie_ids: Vec<i64> = Vec::new();
    let mut titles: Vec<String> = Vec::new();
    let mut genres: Vec<String> = Vec::new();

    for_each_row(path, MOVIE_FIELDS, |line, fields| {
        movie_ids.push(parse_field(path, line, MOVIE_ID, fields[0])?);
        titles.push(fields[1].to_string());
        genres.push(fields[2].to_string());
        Ok(())
    })?;

    let df = DataFrame::new(vec![
        Series::new(MOVIE_ID, movie_ids),
        Series::new(TITLE, titles),
        Series::new(GENRES, genres),
    ])?;

    info!(rows = df.height(), path = %path.display(), "loaded movies");
    Ok(df)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn ratings_are_typed_positionally() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "ratings.dat",
            "1::122::5::838985046\r\n1::185::4.5::838983525\n\n",
        );

        let df = load_ratings(&path).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.get_column_names(), vec![USER_ID, MOVIE_ID, RATING, TIMESTAMP]);
        assert_eq!(df.column(USER_ID).unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column(RATING).unwrap().dtype(), &DataType::Float64);

        let ratings: Vec<f64> = df
            .column(RATING)
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(ratings, vec![5.0, 4.5]);
    }

    #[test]
    fn movie_titles_keep_punctuation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "movies.dat",
            "1::Toy Story (1995)::Adventure|Animation|Children\n2::Se7en: Redux, The (1995)::Crime\n",
        );

        let df = load_movies(&path).unwrap();
        let titles: Vec<&str> = df
            .column(TITLE)
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(titles, vec!["Toy Story (1995)", "Se7en: Redux, The (1995)"]);
    }

    #[test]
    fn wrong_field_count_aborts_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "ratings.dat", "1::2::3.0::4\n1::2::3.0\n");

        match load_ratings(&path) {
            Err(PipelineError::Parse { line, reason, .. }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("expected 4 fields, found 3"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn non_numeric_key_aborts_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "movies.dat", "1::A (2000)::Drama\nx::B (2001)::Drama\n");

        match load_movies(&path) {
            Err(PipelineError::Parse { line, reason, .. }) => {
                assert_eq!(line, 2);
                assert!(reason.starts_with(MOVIE_ID));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_utf8_aborts_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.dat");
        fs::write(&path, b"1::Heat (1995)::Action\n2::Am\xe9lie (2001)::Comedy\n").unwrap();

        match load_movies(&path) {
            Err(PipelineError::Parse { line, reason, .. }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("UTF-8"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_ratings(&dir.path().join("absent.dat")).unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
