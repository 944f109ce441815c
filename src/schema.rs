//! Column names shared by every stage of the pipeline.

pub const USER_ID: &str = "userId";
pub const MOVIE_ID: &str = "movieId";
pub const RATING: &str = "rating";
pub const TIMESTAMP: &str = "timestamp";
pub const TITLE: &str = "title";
pub const GENRES: &str = "genres";

pub const RELEASE_YEAR: &str = "release_year";
pub const USER_MEAN_RATING: &str = "user_mean_rating";
pub const USER_RATING_COUNT: &str = "user_rating_count";
pub const MOVIE_MEAN_RATING: &str = "movie_mean_rating";
pub const MOVIE_RATING_COUNT: &str = "movie_rating_count";

/// Aggregate columns rescaled to zero mean and unit variance.
pub const AGGREGATE_COLUMNS: [&str; 4] = [
    USER_MEAN_RATING,
    USER_RATING_COUNT,
    MOVIE_MEAN_RATING,
    MOVIE_RATING_COUNT,
];

/// Separator between tokens of the `genres` field.
pub const GENRE_SEPARATOR: char = '|';
