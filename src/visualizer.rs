//! Descriptive charts over the engineered table.
//!
//! Every chart is split into a summary, computed from the frame without
//! touching it, and a renderer that writes the summary as an SVG file.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use polars::prelude::*;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::schema::{GENRES, GENRE_SEPARATOR, RATING};

pub const RATING_BINS: usize = 10;

pub const RATING_DISTRIBUTION_FILE: &str = "rating_distribution.svg";
pub const GENRE_COUNTS_FILE: &str = "genre_counts.svg";
pub const GENRE_MEAN_RATING_FILE: &str = "genre_mean_rating.svg";
pub const CORRELATION_HEATMAP_FILE: &str = "correlation_heatmap.svg";

const MEAN_RATING_COLUMN: &str = "mean_rating";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: u64,
}

/// Equal-width bins over `[min, max]`; the last bin is closed on the right.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let mut lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;

    let mut counts = vec![0u64; bins];
    for &value in values {
        let slot = (((value - lo) / width) as usize).min(bins - 1);
        counts[slot] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            start: lo + width * i as f64,
            end: lo + width * (i + 1) as f64,
            count,
        })
        .collect()
}

/// Rows per genre token, most frequent first. A token repeated within one
/// row counts once.
pub fn genre_frequencies(df: &DataFrame) -> Result<Vec<(String, u64)>> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for raw in df.column(GENRES)?.str()?.into_iter().flatten() {
        let tokens: HashSet<&str> = raw
            .split(GENRE_SEPARATOR)
            .filter(|t| !t.is_empty())
            .collect();
        for token in tokens {
            *counts.entry(token.to_string()).or_default() += 1;
        }
    }

    let mut counts: Vec<(String, u64)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(counts)
}

/// Mean rating per raw `genres` string (the whole combination, not per token).
pub fn mean_rating_by_genres(df: &DataFrame) -> Result<Vec<(String, f64)>> {
    let grouped = df
        .clone()
        .lazy()
        .group_by([col(GENRES)])
        .agg([col(RATING).mean().alias(MEAN_RATING_COLUMN)])
        .collect()?;

    let names = grouped.column(GENRES)?.str()?;
    let means = grouped.column(MEAN_RATING_COLUMN)?.f64()?;
    let mut rows: Vec<(String, f64)> = names
        .into_iter()
        .zip(means.into_iter())
        .filter_map(|(name, mean)| Some((name?.to_string(), mean?)))
        .collect();

    rows.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major, `columns.len()` squared entries.
    pub values: Vec<f64>,
}

impl CorrelationMatrix {
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.columns.len() + col]
    }
}

/// Pearson correlation over rows where both sides are present.
///
/// NaN when fewer than two such rows exist or either side is constant.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    (cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0)
}

/// Pairwise correlation of every numeric column, in frame order.
pub fn correlation_matrix(df: &DataFrame) -> Result<CorrelationMatrix> {
    let mut columns = Vec::new();
    let mut data: Vec<Vec<Option<f64>>> = Vec::new();
    for series in df.get_columns() {
        if !series.dtype().is_numeric() {
            continue;
        }
        let values = series.cast(&DataType::Float64)?;
        data.push(values.f64()?.into_iter().collect());
        columns.push(series.name().to_string());
    }

    let k = columns.len();
    let mut values = vec![f64::NAN; k * k];
    for i in 0..k {
        for j in i..k {
            let r = pearson(&data[i], &data[j]);
            values[i * k + j] = r;
            values[j * k + i] = r;
        }
    }

    Ok(CorrelationMatrix { columns, values })
}

/// Everything the four charts need.
#[derive(Debug, Clone)]
pub struct Summaries {
    pub rating_bins: Vec<HistogramBin>,
    pub genre_counts: Vec<(String, u64)>,
    pub genre_means: Vec<(String, f64)>,
    pub correlation: CorrelationMatrix,
}

pub fn summarize(df: &DataFrame) -> Result<Summaries> {
    let ratings: Vec<f64> = df.column(RATING)?.f64()?.into_iter().flatten().collect();

    Ok(Summaries {
        rating_bins: histogram(&ratings, RATING_BINS),
        genre_counts: genre_frequencies(df)?,
        genre_means: mean_rating_by_genres(df)?,
        correlation: correlation_matrix(df)?,
    })
}

type DrawResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn plot_error(path: &Path, err: Box<dyn std::error::Error>) -> PipelineError {
    PipelineError::Plot(format!("{}: {err}", path.display()))
}

fn draw_histogram(path: &Path, bins: &[HistogramBin]) -> DrawResult<()> {
    let root = SVGBackend::new(path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let x_start = bins.first().map_or(0.0, |b| b.start);
    let x_end = bins.last().map_or(1.0, |b| b.end);
    let y_max = bins.iter().map(|b| b.count).max().unwrap_or(0) + 1;

    let mut chart = ChartBuilder::on(&root)
        .caption("Distribution des notes", ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(x_start..x_end, 0u64..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Note")
        .y_desc("Nombre de votes")
        .draw()?;

    chart.draw_series(bins.iter().map(|bin| {
        Rectangle::new(
            [(bin.start, 0), (bin.end, bin.count)],
            BLUE.mix(0.6).filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}

fn draw_bars(
    path: &Path,
    caption: &str,
    x_desc: &str,
    y_desc: &str,
    bars: &[(String, f64)],
) -> DrawResult<()> {
    let root = SVGBackend::new(path, (1200, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let y_max = bars.iter().map(|(_, v)| *v).fold(0.0, f64::max) * 1.05 + 1e-9;
    let n = bars.len() as u32;

    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(180)
        .y_label_area_size(80)
        .build_cartesian_2d((0u32..n).into_segmented(), 0f64..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bars.len())
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) => bars
                .get(*i as usize)
                .map(|(label, _)| label.clone())
                .unwrap_or_default(),
            _ => String::new(),
        })
        .x_label_style(
            ("sans-serif", 11)
                .into_font()
                .transform(FontTransform::Rotate90),
        )
        .x_desc(x_desc)
        .y_desc(y_desc)
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BLUE.mix(0.7).filled())
            .margin(2)
            .data(bars.iter().enumerate().map(|(i, (_, v))| (i as u32, *v))),
    )?;

    root.present()?;
    Ok(())
}

const COOL: (u8, u8, u8) = (59, 76, 192);
const NEUTRAL: (u8, u8, u8) = (221, 221, 221);
const WARM: (u8, u8, u8) = (180, 4, 38);

/// Blue at -1, grey at 0, red at +1. NaN is a flat grey.
pub fn coolwarm(value: f64) -> RGBColor {
    if !value.is_finite() {
        return RGBColor(160, 160, 160);
    }
    let t = value.clamp(-1.0, 1.0);
    let (from, to, k) = if t < 0.0 {
        (COOL, NEUTRAL, t + 1.0)
    } else {
        (NEUTRAL, WARM, t)
    };
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * k).round() as u8;
    RGBColor(lerp(from.0, to.0), lerp(from.1, to.1), lerp(from.2, to.2))
}

fn draw_heatmap(path: &Path, matrix: &CorrelationMatrix) -> DrawResult<()> {
    let k = matrix.columns.len() as i32;
    let root = SVGBackend::new(path, (1400, 1000)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Matrice de Corrélation des Caractéristiques",
            ("sans-serif", 24),
        )
        .margin(20)
        .x_label_area_size(160)
        .y_label_area_size(180)
        .build_cartesian_2d(0i32..k, 0i32..k)?;

    // row 0 sits at the top
    let label = |v: i32, flip: bool| {
        let idx = if flip { k - 1 - v } else { v };
        usize::try_from(idx)
            .ok()
            .and_then(|i| matrix.columns.get(i).cloned())
            .unwrap_or_default()
    };

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(k as usize)
        .y_labels(k as usize)
        .x_label_formatter(&|v| label(*v, false))
        .y_label_formatter(&|v| label(*v, true))
        .x_label_style(
            ("sans-serif", 12)
                .into_font()
                .transform(FontTransform::Rotate90),
        )
        .y_label_style(("sans-serif", 12))
        .draw()?;

    let cells = (0..k).flat_map(|row| (0..k).map(move |col| (row, col)));

    chart.draw_series(cells.clone().map(|(row, col)| {
        let y = k - 1 - row;
        let value = matrix.get(row as usize, col as usize);
        Rectangle::new([(col, y), (col + 1, y + 1)], coolwarm(value).filled())
    }))?;

    chart.draw_series(cells.map(|(row, col)| {
        let y = k - 1 - row;
        let value = matrix.get(row as usize, col as usize);
        EmptyElement::at((col, y + 1))
            + Text::new(format!("{value:.2}"), (4, 4), ("sans-serif", 10).into_font())
    }))?;

    root.present()?;
    Ok(())
}

/// Writes the four charts under `dir` and returns their paths.
pub fn render(summaries: &Summaries, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let histogram_path = dir.join(RATING_DISTRIBUTION_FILE);
    draw_histogram(&histogram_path, &summaries.rating_bins)
        .map_err(|e| plot_error(&histogram_path, e))?;

    let counts: Vec<(String, f64)> = summaries
        .genre_counts
        .iter()
        .map(|(genre, count)| (genre.clone(), *count as f64))
        .collect();
    let counts_path = dir.join(GENRE_COUNTS_FILE);
    draw_bars(
        &counts_path,
        "Nombre de films par genre",
        "Genre",
        "Nombre de films",
        &counts,
    )
    .map_err(|e| plot_error(&counts_path, e))?;

    let means_path = dir.join(GENRE_MEAN_RATING_FILE);
    draw_bars(
        &means_path,
        "Moyenne des notes par genre",
        "Genre",
        "Moyenne des notes",
        &summaries.genre_means,
    )
    .map_err(|e| plot_error(&means_path, e))?;

    let heatmap_path = dir.join(CORRELATION_HEATMAP_FILE);
    draw_heatmap(&heatmap_path, &summaries.correlation)
        .map_err(|e| plot_error(&heatmap_path, e))?;

    let paths = vec![histogram_path, counts_path, means_path, heatmap_path];
    for path in &paths {
        info!(path = %path.display(), "chart written");
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> DataFrame {
        df!(
            RATING => [1.0f64, 2.0, 3.0, 5.0, 5.0],
            GENRES => ["Drama", "Comedy|Drama", "Comedy|Drama", "Action", "Drama"],
            "up" => [1i64, 2, 3, 4, 5],
            "down" => [10.0f64, 8.0, 6.0, 4.0, 2.0],
            "flat" => [7i32, 7, 7, 7, 7]
        )
        .unwrap()
    }

    #[test]
    fn histogram_counts_every_value_once() {
        let bins = histogram(&[0.5, 1.0, 2.5, 5.0, 5.0], 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins.iter().map(|b| b.count).sum::<u64>(), 5);
        assert!((bins[0].start - 0.5).abs() < 1e-12);
        assert!((bins[9].end - 5.0).abs() < 1e-12);
        // max lands in the closed last bin
        assert_eq!(bins[9].count, 2);
    }

    #[test]
    fn histogram_of_constant_values_widens_the_range() {
        let bins = histogram(&[3.0, 3.0], 2);
        assert_eq!(bins[0].start, 2.5);
        assert_eq!(bins[1].end, 3.5);
        assert_eq!(bins[1].count, 2);
        assert!(histogram(&[], 10).is_empty());
    }

    #[test]
    fn genre_tokens_are_counted_per_row() {
        let counts = genre_frequencies(&table()).unwrap();
        assert_eq!(
            counts,
            vec![
                ("Drama".to_string(), 4),
                ("Comedy".to_string(), 2),
                ("Action".to_string(), 1),
            ]
        );
    }

    #[test]
    fn repeated_token_in_one_row_counts_once() {
        let df = df!(
            RATING => [4.0f64, 3.0],
            GENRES => ["Drama|Drama|War", "War"]
        )
        .unwrap();

        let counts = genre_frequencies(&df).unwrap();
        assert_eq!(
            counts,
            vec![("War".to_string(), 2), ("Drama".to_string(), 1)]
        );
    }

    #[test]
    fn mean_rating_groups_whole_genre_strings() {
        let means = mean_rating_by_genres(&table()).unwrap();
        assert_eq!(
            means,
            vec![
                ("Action".to_string(), 5.0),
                ("Drama".to_string(), 3.0),
                ("Comedy|Drama".to_string(), 2.5),
            ]
        );
    }

    #[test]
    fn correlation_covers_numeric_columns_only() {
        let matrix = correlation_matrix(&table()).unwrap();
        assert_eq!(matrix.columns, vec![RATING, "up", "down", "flat"]);

        let up = 1;
        let down = 2;
        let flat = 3;
        assert!((matrix.get(up, up) - 1.0).abs() < 1e-12);
        assert!((matrix.get(up, down) + 1.0).abs() < 1e-12);
        assert_eq!(matrix.get(up, down), matrix.get(down, up));
        assert!(matrix.get(flat, up).is_nan());
    }

    #[test]
    fn pearson_skips_missing_pairs() {
        let xs = [Some(1.0), None, Some(2.0), Some(3.0)];
        let ys = [Some(2.0), Some(100.0), Some(4.0), Some(6.0)];
        assert!((pearson(&xs, &ys) - 1.0).abs() < 1e-12);
        assert!(pearson(&[Some(1.0)], &[Some(1.0)]).is_nan());
    }

    #[test]
    fn coolwarm_spans_blue_to_red() {
        let rgb = |c: RGBColor| (c.0, c.1, c.2);
        assert_eq!(rgb(coolwarm(-1.0)), COOL);
        assert_eq!(rgb(coolwarm(0.0)), NEUTRAL);
        assert_eq!(rgb(coolwarm(1.0)), WARM);
        assert_eq!(rgb(coolwarm(f64::NAN)), (160, 160, 160));
        assert_eq!(rgb(coolwarm(5.0)), WARM);
    }

    #[test]
    fn render_writes_all_four_charts() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("plots");
        let summaries = summarize(&table()).unwrap();

        let paths = render(&summaries, &out).unwrap();
        assert_eq!(
            paths,
            vec![
                out.join(RATING_DISTRIBUTION_FILE),
                out.join(GENRE_COUNTS_FILE),
                out.join(GENRE_MEAN_RATING_FILE),
                out.join(CORRELATION_HEATMAP_FILE),
            ]
        );
        for path in &paths {
            let svg = fs::read_to_string(path).unwrap();
            assert!(svg.contains("<svg"), "{} is not an SVG", path.display());
        }
    }
}
