//! Diagnostic histograms: one PNG per feature, bars split by class.

use std::path::{Path, PathBuf};

use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::{CLASS_COLUMN, Dataset};

#[derive(Debug, Error)]
pub enum FigureError {
    #[error("Dataset has no `{0}` column to split histograms by")]
    MissingColumn(String),
    #[error("Failed to create figure directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write figure {path}: {source}")]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },
}

impl FigureError {
    pub fn is_file_access(&self) -> bool {
        matches!(self, Self::CreateDir { .. } | Self::Write { .. })
    }
}

/// Rendering options for the class-split histograms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramStyle {
    pub width: u32,
    pub height: u32,
    pub bins: usize,
    /// Blank border around the plot area, in pixels.
    pub margin: u32,
    pub background: [u8; 3],
    pub class0_color: [u8; 3],
    pub class1_color: [u8; 3],
    pub axis_color: [u8; 3],
}

impl Default for HistogramStyle {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
            bins: 10,
            margin: 60,
            background: [255, 255, 255],
            class0_color: [31, 119, 180],
            class1_color: [255, 127, 14],
            axis_color: [0, 0, 0],
        }
    }
}

/// Y-axis caption shared by every histogram.
pub const Y_AXIS_LABEL: &str = "Number of observations";
const CLASS_NAMES: [&str; 2] = ["Class 0", "Class 1"];

const GLYPH: u32 = 8;
const TICK_LEN: u32 = 4;
const MAX_Y_TICKS: u32 = 4;

/// Per-class bin counts over bins shared by both classes.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassHistogram {
    pub class0: Vec<u32>,
    pub class1: Vec<u32>,
    /// Finite `(min, max)` the bins span; `None` when no value was finite.
    pub range: Option<(f64, f64)>,
}

/// Bin `values` into `bins` equal-width bins spanning the finite range.
///
/// Non-finite values and rows whose class is neither `0` nor `1` are skipped.
pub fn histogram_counts(values: &[f64], classes: &[f64], bins: usize) -> ClassHistogram {
    let bins = bins.max(1);
    let mut hist = ClassHistogram {
        class0: vec![0; bins],
        class1: vec![0; bins],
        range: None,
    };
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if min > max {
        return hist;
    }
    hist.range = Some((min, max));
    let span = if max > min { max - min } else { 1.0 };
    for (&value, &class) in values.iter().zip(classes) {
        if !value.is_finite() {
            continue;
        }
        let bin = (((value - min) / span) * bins as f64) as usize;
        let bin = bin.min(bins - 1);
        if class == 0.0 {
            hist.class0[bin] += 1;
        } else if class == 1.0 {
            hist.class1[bin] += 1;
        }
    }
    hist
}

/// Axis captions for one histogram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramLabels {
    pub x_axis: String,
    pub y_axis: String,
}

impl HistogramLabels {
    pub fn for_feature(feature: &str) -> Self {
        Self {
            x_axis: axis_label(feature),
            y_axis: Y_AXIS_LABEL.to_string(),
        }
    }
}

/// Readable caption for a column name: `IR_norm_range` becomes `Ir norm range`.
pub fn axis_label(feature: &str) -> String {
    let spaced = feature.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Draw side-by-side class bars for every bin with labelled axes and a class legend.
pub fn render_histogram(
    hist: &ClassHistogram,
    labels: &HistogramLabels,
    style: &HistogramStyle,
) -> RgbImage {
    let width = style.width.max(1);
    let height = style.height.max(1);
    let mut img = RgbImage::from_pixel(width, height, Rgb(style.background));

    let margin = style.margin.min(width / 2).min(height / 2);
    let (left, right) = (margin, width - margin);
    let (top, bottom) = (margin, height - margin);
    let plot_w = f64::from(right - left);
    let plot_h = f64::from(bottom - top);
    let caption_scale = (margin / (3 * GLYPH)).max(1);

    let bins = hist.class0.len().max(1);
    let peak = hist
        .class0
        .iter()
        .chain(&hist.class1)
        .copied()
        .max()
        .unwrap_or(0)
        .max(1);
    let bin_w = plot_w / bins as f64;
    for (bin, (&c0, &c1)) in hist.class0.iter().zip(&hist.class1).enumerate() {
        let x0 = f64::from(left) + bin as f64 * bin_w;
        let series = [
            (c0, x0, style.class0_color),
            (c1, x0 + bin_w / 2.0, style.class1_color),
        ];
        for (count, start, color) in series {
            let bar_h = (f64::from(count) / f64::from(peak) * plot_h).round() as u32;
            let x_start = start.round() as u32;
            let x_end = (start + bin_w / 2.0).round() as u32;
            fill_rect(
                &mut img,
                i64::from(x_start),
                i64::from(bottom - bar_h.min(bottom)),
                x_end.saturating_sub(x_start),
                bar_h,
                color,
            );
        }
    }

    let axis = style.axis_color;
    let y_ticks = MAX_Y_TICKS.min(peak);
    for step in 0..=y_ticks {
        let count = peak * step / y_ticks;
        let y = i64::from(bottom) - (f64::from(count) / f64::from(peak) * plot_h).round() as i64;
        fill_rect(&mut img, i64::from(left - TICK_LEN.min(left)), y, TICK_LEN, 1, axis);
        let text = count.to_string();
        let text_x = i64::from(left) - i64::from(TICK_LEN + 2) - text_width(&text, 1);
        draw_text(&mut img, text_x, y - i64::from(GLYPH / 2), &text, 1, axis);
    }

    if let Some((min, max)) = hist.range {
        let tick_top = i64::from(bottom + TICK_LEN + 2);
        for (fraction, value) in [(0.0, min), (0.5, (min + max) / 2.0), (1.0, max)] {
            let x = i64::from(left) + (fraction * plot_w).round() as i64;
            fill_rect(&mut img, x, i64::from(bottom), 1, TICK_LEN, axis);
            let text = tick_text(value);
            draw_text(&mut img, x - text_width(&text, 1) / 2, tick_top, &text, 1, axis);
        }
    }

    let caption_h = i64::from(GLYPH * caption_scale);
    let center_x = i64::from(left) + (plot_w / 2.0) as i64;
    let x_caption_w = text_width(&labels.x_axis, caption_scale);
    let x_caption_y = i64::from(height) - caption_h - 2;
    draw_text(
        &mut img,
        center_x - x_caption_w / 2,
        x_caption_y,
        &labels.x_axis,
        caption_scale,
        axis,
    );
    let center_y = i64::from(top) + (plot_h / 2.0) as i64;
    let y_caption_len = text_width(&labels.y_axis, caption_scale);
    draw_text_upward(
        &mut img,
        2,
        center_y + y_caption_len / 2,
        &labels.y_axis,
        caption_scale,
        axis,
    );

    draw_legend(&mut img, right, top, style);

    let axis = Rgb(axis);
    for x in left..=right.min(width - 1) {
        img.put_pixel(x, bottom.min(height - 1), axis);
    }
    for y in top..=bottom.min(height - 1) {
        img.put_pixel(left.min(width - 1), y, axis);
    }
    img
}

/// Colour swatches with class names, right-aligned in the band above the plot.
fn draw_legend(img: &mut RgbImage, right: u32, top: u32, style: &HistogramStyle) {
    let gap = i64::from(GLYPH / 2);
    let entries = [
        (style.class0_color, CLASS_NAMES[0]),
        (style.class1_color, CLASS_NAMES[1]),
    ];
    let entry_w = |name: &str| i64::from(GLYPH) + gap + text_width(name, 1) + 3 * gap;
    let total: i64 = entries.iter().map(|&(_, name)| entry_w(name)).sum();
    let y = i64::from(top.saturating_sub(GLYPH + 4));
    let mut x = i64::from(right) - total;
    for (color, name) in entries {
        fill_rect(img, x, y, GLYPH, GLYPH, color);
        draw_text(img, x + i64::from(GLYPH) + gap, y, name, 1, style.axis_color);
        x += entry_w(name);
    }
}

fn tick_text(value: f64) -> String {
    if value.fract() == 0.0 || value.abs() >= 100.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

fn text_width(text: &str, scale: u32) -> i64 {
    text.chars().count() as i64 * i64::from(GLYPH * scale)
}

fn glyph(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Left-to-right text with its top-left corner at `(x, y)`. Pixels outside the image are dropped.
fn draw_text(img: &mut RgbImage, x: i64, y: i64, text: &str, scale: u32, color: [u8; 3]) {
    let cell = i64::from(GLYPH * scale);
    let scale_px = i64::from(scale);
    for (idx, ch) in text.chars().enumerate() {
        let cell_x = x + idx as i64 * cell;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH {
                if (bits >> col) & 1 == 1 {
                    let px = cell_x + i64::from(col) * scale_px;
                    let py = y + row as i64 * scale_px;
                    fill_rect(img, px, py, scale, scale, color);
                }
            }
        }
    }
}

/// Text rotated a quarter turn counter-clockwise, reading upward from `(x, y_bottom)`.
fn draw_text_upward(
    img: &mut RgbImage,
    x: i64,
    y_bottom: i64,
    text: &str,
    scale: u32,
    color: [u8; 3],
) {
    let cell = i64::from(GLYPH * scale);
    let scale_px = i64::from(scale);
    for (idx, ch) in text.chars().enumerate() {
        let cell_top = y_bottom - (idx as i64 + 1) * cell;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..GLYPH {
                if (bits >> col) & 1 == 1 {
                    let px = x + row as i64 * scale_px;
                    let py = cell_top + i64::from(GLYPH - 1 - col) * scale_px;
                    fill_rect(img, px, py, scale, scale, color);
                }
            }
        }
    }
}

fn fill_rect(img: &mut RgbImage, x: i64, y: i64, w: u32, h: u32, color: [u8; 3]) {
    let x_start = x.max(0);
    let y_start = y.max(0);
    let x_end = (x + i64::from(w)).min(i64::from(img.width()));
    let y_end = (y + i64::from(h)).min(i64::from(img.height()));
    for py in y_start..y_end {
        for px in x_start..x_end {
            img.put_pixel(px as u32, py as u32, Rgb(color));
        }
    }
}

/// Write `<column>_histogram.png` into `dir` for every non-class column.
///
/// Returns the written paths in column order.
pub fn save_figures(
    dataset: &Dataset,
    dir: &Path,
    style: &HistogramStyle,
) -> Result<Vec<PathBuf>, FigureError> {
    let classes = dataset
        .column(CLASS_COLUMN)
        .map_err(|_| FigureError::MissingColumn(CLASS_COLUMN.to_string()))?
        .to_vec();
    std::fs::create_dir_all(dir).map_err(|source| FigureError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths = Vec::new();
    for (name, column) in dataset.iter_columns() {
        if name == CLASS_COLUMN {
            continue;
        }
        let hist = histogram_counts(&column.to_vec(), &classes, style.bins);
        let path = dir.join(format!("{name}_histogram.png"));
        render_histogram(&hist, &HistogramLabels::for_feature(name), style)
            .save(&path)
            .map_err(|source| FigureError::Write {
                path: path.clone(),
                source,
            })?;
        paths.push(path);
    }
    tracing::info!("Saved {} histogram(s) to {}", paths.len(), dir.display());
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Range;
    use tempfile::tempdir;

    #[test]
    fn counts_share_bins_across_classes() {
        let hist = histogram_counts(&[0.0, 1.0, 2.0, 3.0], &[0.0, 0.0, 1.0, 1.0], 2);
        assert_eq!(hist.class0, vec![2, 0]);
        assert_eq!(hist.class1, vec![0, 2]);
    }

    #[test]
    fn non_finite_values_are_skipped() {
        let hist = histogram_counts(&[f64::NAN, 1.0, f64::INFINITY, 1.0], &[0.0, 0.0, 1.0, 1.0], 3);
        assert_eq!(hist.class0.iter().sum::<u32>(), 1);
        assert_eq!(hist.class1.iter().sum::<u32>(), 1);
    }

    #[test]
    fn bars_use_class_colors() {
        let style = HistogramStyle {
            width: 200,
            height: 100,
            bins: 2,
            margin: 10,
            ..HistogramStyle::default()
        };
        let hist = ClassHistogram {
            class0: vec![2, 0],
            class1: vec![0, 2],
            range: Some((0.0, 1.0)),
        };
        let img = render_histogram(&hist, &HistogramLabels::for_feature("x"), &style);
        assert_eq!(img.dimensions(), (200, 100));
        assert_eq!(img.get_pixel(30, 50).0, style.class0_color);
        assert_eq!(img.get_pixel(160, 50).0, style.class1_color);
        assert_eq!(img.get_pixel(120, 50).0, style.background);
        assert_eq!(img.get_pixel(10, 50).0, style.axis_color);
    }

    #[test]
    fn axis_label_follows_feature_name() {
        assert_eq!(axis_label("IR_norm_range"), "Ir norm range");
        assert_eq!(axis_label("log_entropy"), "Log entropy");
        assert_eq!(axis_label(""), "");
        let labels = HistogramLabels::for_feature("entropy_x_contrast");
        assert_eq!(labels.x_axis, "Entropy x contrast");
        assert_eq!(labels.y_axis, "Number of observations");
    }

    fn count_pixels(img: &RgbImage, xs: Range<u32>, ys: Range<u32>, color: [u8; 3]) -> usize {
        ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
            .filter(|&(x, y)| img.get_pixel(x, y).0 == color)
            .count()
    }

    #[test]
    fn captions_ticks_and_legend_are_drawn_outside_the_plot() {
        let style = HistogramStyle {
            width: 240,
            height: 160,
            bins: 2,
            margin: 30,
            ..HistogramStyle::default()
        };
        let hist = ClassHistogram {
            class0: vec![3, 1],
            class1: vec![0, 2],
            range: Some((0.5, 2.5)),
        };
        let blank = HistogramLabels {
            x_axis: String::new(),
            y_axis: String::new(),
        };
        let labelled = render_histogram(&hist, &HistogramLabels::for_feature("IR_range"), &style);
        let bare = render_histogram(&hist, &blank, &style);
        let ink = style.axis_color;

        // x caption along the bottom edge, y caption along the left edge
        assert!(count_pixels(&labelled, 0..240, 145..160, ink) > 0);
        assert_eq!(count_pixels(&bare, 0..240, 145..160, ink), 0);
        assert!(count_pixels(&labelled, 0..10, 0..160, ink) > 0);
        assert_eq!(count_pixels(&bare, 0..10, 0..160, ink), 0);

        // tick values sit just outside the axes either way
        assert!(count_pixels(&bare, 0..240, 131..145, ink) > 0);
        assert!(count_pixels(&bare, 10..30, 30..130, ink) > 0);

        // legend swatches above the plot area
        assert!(count_pixels(&bare, 0..240, 0..30, style.class0_color) > 0);
        assert!(count_pixels(&bare, 0..240, 0..30, style.class1_color) > 0);
    }

    #[test]
    fn saves_one_png_per_feature() {
        let dir = tempdir().unwrap();
        let data = Dataset::from_columns([
            ("a", vec![1.0, 2.0, 3.0]),
            ("class", vec![0.0, 1.0, 1.0]),
            ("b", vec![0.5, 0.1, 0.2]),
        ])
        .unwrap();
        let style = HistogramStyle {
            width: 64,
            height: 48,
            margin: 4,
            ..HistogramStyle::default()
        };
        let out = dir.path().join("figures");
        let paths = save_figures(&data, &out, &style).unwrap();
        assert_eq!(paths, vec![out.join("a_histogram.png"), out.join("b_histogram.png")]);
        assert_eq!(image::image_dimensions(&paths[0]).unwrap(), (64, 48));
    }

    #[test]
    fn missing_class_column_is_an_error() {
        let dir = tempdir().unwrap();
        let data = Dataset::from_columns([("a", vec![1.0])]).unwrap();
        assert!(matches!(
            save_figures(&data, dir.path(), &HistogramStyle::default()),
            Err(FigureError::MissingColumn(_))
        ));
    }
}
