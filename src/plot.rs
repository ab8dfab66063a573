//! Figures and headless rasterisation
//!
//! Evaluation plots are described as data ([`Figure`]) and rendered into an
//! RGB bitmap without any windowing system. The renderer draws the frame,
//! series, bars, heatmap cells and scatter dots, plus titles, axis labels,
//! tick labels, legends and cell counts in an 8x8 bitmap font.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgb, RgbImage};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Default bitmap width in pixels
pub const DEFAULT_WIDTH: u32 = 640;
/// Default bitmap height in pixels
pub const DEFAULT_HEIGHT: u32 = 480;

/// Glyph edge in pixels at scale 1
const GLYPH: i64 = 8;
const PAD: i64 = 6;
const TICKS: usize = 5;
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const GRAY: Rgb<u8> = Rgb([160, 160, 160]);
const PALETTE: [Rgb<u8>; 8] = [
    Rgb([31, 119, 180]),
    Rgb([255, 127, 14]),
    Rgb([44, 160, 44]),
    Rgb([214, 39, 40]),
    Rgb([148, 103, 189]),
    Rgb([140, 86, 75]),
    Rgb([227, 119, 194]),
    Rgb([127, 127, 127]),
];

/// How consecutive points of a series are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrawStyle {
    /// Straight segments between points.
    #[default]
    #[serde(rename = "default")]
    Default,
    /// Horizontal to the next x, then vertical to the next y.
    #[serde(rename = "steps-post")]
    StepsPost,
}

/// Line drawing options shared by all series of a plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineStyle {
    /// Join style
    pub drawstyle: DrawStyle,
    /// Line width in pixels
    pub linewidth: u32,
}

impl LineStyle {
    /// Step style used by threshold-sweep curves.
    #[must_use]
    pub const fn steps_post() -> Self {
        Self {
            drawstyle: DrawStyle::StepsPost,
            linewidth: 1,
        }
    }
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            drawstyle: DrawStyle::Default,
            linewidth: 1,
        }
    }
}

/// One named `(x, y)` series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSeries {
    /// Legend label
    pub label: String,
    /// X coordinates
    pub x: Vec<f64>,
    /// Y coordinates
    pub y: Vec<f64>,
}

impl DataSeries {
    /// Create a series.
    #[must_use]
    pub fn new(label: impl Into<String>, x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            x,
            y,
        }
    }
}

/// Multi-series line plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinePlot {
    /// Optional title
    pub title: Option<String>,
    /// Series in legend order
    pub data_series: Vec<DataSeries>,
    /// X axis label
    pub xlabel: String,
    /// Y axis label
    pub ylabel: String,
    /// Line options
    pub line_style: LineStyle,
}

/// Matrix of values drawn as shaded cells (e.g. a confusion matrix).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    /// Optional title
    pub title: Option<String>,
    /// Cell values, row-major
    pub values: Array2<f64>,
    /// Row tick labels
    pub row_labels: Vec<String>,
    /// Column tick labels
    pub col_labels: Vec<String>,
    /// X axis label
    pub xlabel: String,
    /// Y axis label
    pub ylabel: String,
}

/// Horizontal bar chart, first bar at the top.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarChart {
    /// Optional title
    pub title: Option<String>,
    /// Bar labels
    pub labels: Vec<String>,
    /// Bar lengths
    pub values: Vec<f64>,
    /// Value axis label
    pub xlabel: String,
}

/// A dot in a [`ScatterPlot`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    /// Horizontal position
    pub x: f64,
    /// Row band the dot belongs to
    pub row: usize,
    /// Colour intensity in `[0, 1]` (low = blue, high = red)
    pub intensity: f64,
}

/// Dots arranged in horizontal bands, one band per row label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPlot {
    /// Optional title
    pub title: Option<String>,
    /// Band labels, first band at the top
    pub row_labels: Vec<String>,
    /// Dots
    pub points: Vec<ScatterPoint>,
    /// X axis label
    pub xlabel: String,
}

/// Renderable evaluation figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Figure {
    /// Line plot
    Lines(LinePlot),
    /// Heatmap
    Heatmap(Heatmap),
    /// Bar chart
    Bars(BarChart),
    /// Banded scatter plot
    Scatter(ScatterPlot),
}

impl Figure {
    /// Render at the default size.
    #[must_use]
    pub fn render(&self) -> RgbImage {
        self.render_with_size(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    /// Render at the given size. Sizes too small for the axes and labels
    /// yield a blank bitmap.
    #[must_use]
    pub fn render_with_size(&self, width: u32, height: u32) -> RgbImage {
        let mut canvas = Canvas::new(width, height, &self.margins(width));
        if canvas.is_degenerate() {
            return canvas.image;
        }
        match self {
            Self::Lines(plot) => canvas.draw_lines(plot),
            Self::Heatmap(heatmap) => canvas.draw_heatmap(heatmap),
            Self::Bars(chart) => canvas.draw_bars(chart),
            Self::Scatter(plot) => canvas.draw_scatter(plot),
        }
        canvas.draw_frame();
        canvas.draw_captions(self.title(), self.xlabel(), self.ylabel());
        canvas.image
    }

    fn title(&self) -> Option<&str> {
        match self {
            Self::Lines(plot) => plot.title.as_deref(),
            Self::Heatmap(heatmap) => heatmap.title.as_deref(),
            Self::Bars(chart) => chart.title.as_deref(),
            Self::Scatter(plot) => plot.title.as_deref(),
        }
    }

    fn xlabel(&self) -> &str {
        match self {
            Self::Lines(plot) => &plot.xlabel,
            Self::Heatmap(heatmap) => &heatmap.xlabel,
            Self::Bars(chart) => &chart.xlabel,
            Self::Scatter(plot) => &plot.xlabel,
        }
    }

    fn ylabel(&self) -> Option<&str> {
        match self {
            Self::Lines(plot) => Some(&plot.ylabel),
            Self::Heatmap(heatmap) => Some(&heatmap.ylabel),
            Self::Bars(_) | Self::Scatter(_) => None,
        }
    }

    /// Labels drawn left of the plot area.
    fn left_labels(&self) -> Vec<String> {
        match self {
            Self::Lines(plot) => ticks(finite_range(
                plot.data_series.iter().flat_map(|s| s.y.iter().copied()),
            ))
            .into_iter()
            .map(|(_, label)| label)
            .collect(),
            Self::Heatmap(heatmap) => heatmap.row_labels.clone(),
            Self::Bars(chart) => chart.labels.clone(),
            Self::Scatter(plot) => plot.row_labels.clone(),
        }
    }

    fn margins(&self, width: u32) -> Margins {
        let widest = self
            .left_labels()
            .iter()
            .map(|label| text_width(label, 1))
            .max()
            .unwrap_or(0);
        let ylabel = if self.ylabel().is_some() { GLYPH + PAD } else { 0 };
        Margins {
            left: (PAD + ylabel + widest + PAD).min(i64::from(width) / 2),
            top: self
                .title()
                .map_or(2 * PAD, |title| 2 * PAD + title_scale(title, width) * GLYPH),
            right: 2 * PAD + 2 * GLYPH,
            bottom: 3 * PAD + 2 * GLYPH,
        }
    }
}

impl From<LinePlot> for Figure {
    fn from(plot: LinePlot) -> Self {
        Self::Lines(plot)
    }
}

fn finite_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    if (hi - lo).abs() < f64::EPSILON {
        return (lo - 0.5, hi + 0.5);
    }
    (lo, hi)
}

/// Evenly spaced tick positions with labels, precision chosen by span.
#[allow(clippy::cast_precision_loss)]
fn ticks(range: (f64, f64)) -> Vec<(f64, String)> {
    let span = range.1 - range.0;
    (0..TICKS)
        .map(|i| {
            let value = range.0 + span * i as f64 / (TICKS - 1) as f64;
            let value = if value.abs() < span * 1e-9 { 0.0 } else { value };
            let label = if span >= 10.0 {
                format!("{value:.0}")
            } else if span >= 1.0 {
                format!("{value:.1}")
            } else {
                format!("{value:.2}")
            };
            (value, label)
        })
        .collect()
}

fn cell_label(value: f64) -> String {
    if value.fract().abs() < f64::EPSILON {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

fn len_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn text_width(text: &str, scale: i64) -> i64 {
    len_i64(text.chars().count()).saturating_mul(GLYPH * scale)
}

fn title_scale(title: &str, width: u32) -> i64 {
    if text_width(title, 2) + 2 * PAD <= i64::from(width) {
        2
    } else {
        1
    }
}

/// Row bitmaps of a character; bit 0 is the leftmost pixel.
fn glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

fn lerp_color(from: Rgb<u8>, to: Rgb<u8>, t: f64) -> Rgb<u8> {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let channel = |a: u8, b: u8| {
        let v = f64::from(a) + (f64::from(b) - f64::from(a)) * t;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let v = v.round().clamp(0.0, 255.0) as u8;
        v
    };
    Rgb([
        channel(from[0], to[0]),
        channel(from[1], to[1]),
        channel(from[2], to[2]),
    ])
}

/// Space reserved around the plot area, in pixels.
struct Margins {
    left: i64,
    top: i64,
    right: i64,
    bottom: i64,
}

struct Canvas {
    image: RgbImage,
    left: i64,
    top: i64,
    right: i64,
    bottom: i64,
}

impl Canvas {
    fn new(width: u32, height: u32, margins: &Margins) -> Self {
        let image = RgbImage::from_pixel(width, height, WHITE);
        Self {
            image,
            left: margins.left,
            top: margins.top,
            right: i64::from(width) - margins.right,
            bottom: i64::from(height) - margins.bottom,
        }
    }

    const fn is_degenerate(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    fn plot_width(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let w = (self.right - self.left) as f64;
        w
    }

    fn plot_height(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let h = (self.bottom - self.top) as f64;
        h
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn to_px(&self, x: f64, y: f64, x_range: (f64, f64), y_range: (f64, f64)) -> (i64, i64) {
        let fx = (x - x_range.0) / (x_range.1 - x_range.0);
        let fy = (y - y_range.0) / (y_range.1 - y_range.0);
        let px = self.left as f64 + fx * self.plot_width();
        let py = self.bottom as f64 - fy * self.plot_height();
        (px.round() as i64, py.round() as i64)
    }

    fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) {
            if x < self.image.width() && y < self.image.height() {
                self.image.put_pixel(x, y, color);
            }
        }
    }

    fn fill_rect(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgb<u8>) {
        for y in y0.min(y1)..=y0.max(y1) {
            for x in x0.min(x1)..=x0.max(x1) {
                self.put(x, y, color);
            }
        }
    }

    /// Bresenham segment, thickened by offsetting copies.
    fn line(&mut self, from: (i64, i64), to: (i64, i64), width: u32, color: Rgb<u8>) {
        let width = i64::from(width.max(1));
        let half = width / 2;
        for offset in -half..(width - half) {
            let (mut x, mut y) = (from.0 + offset, from.1 + offset);
            let (x1, y1) = (to.0 + offset, to.1 + offset);
            let dx = (x1 - x).abs();
            let dy = -(y1 - y).abs();
            let sx = if x < x1 { 1 } else { -1 };
            let sy = if y < y1 { 1 } else { -1 };
            let mut err = dx + dy;
            loop {
                self.put(x, y, color);
                if x == x1 && y == y1 {
                    break;
                }
                let e2 = 2 * err;
                if e2 >= dy {
                    err += dy;
                    x += sx;
                }
                if e2 <= dx {
                    err += dx;
                    y += sy;
                }
            }
        }
    }

    /// Left-to-right text with its top-left corner at `(x, y)`.
    fn text(&mut self, x: i64, y: i64, text: &str, scale: i64, color: Rgb<u8>) {
        for (i, c) in text.chars().enumerate() {
            let origin = x + len_i64(i) * GLYPH * scale;
            for (row, bits) in glyph(c).into_iter().enumerate() {
                for col in 0..8_u8 {
                    if (bits >> col) & 1 == 1 {
                        let px = origin + i64::from(col) * scale;
                        let py = y + len_i64(row) * scale;
                        self.fill_rect(px, py, px + scale - 1, py + scale - 1, color);
                    }
                }
            }
        }
    }

    fn text_centered(&mut self, cx: i64, y: i64, text: &str, scale: i64, color: Rgb<u8>) {
        self.text(cx - text_width(text, scale) / 2, y, text, scale, color);
    }

    fn text_right(&mut self, right: i64, cy: i64, text: &str) {
        self.text(right - text_width(text, 1), cy - GLYPH / 2, text, 1, BLACK);
    }

    /// Text rotated a quarter turn counter-clockwise, baseline at `x`,
    /// reading upwards from `bottom`.
    fn text_up(&mut self, x: i64, bottom: i64, text: &str, color: Rgb<u8>) {
        for (i, c) in text.chars().enumerate() {
            let origin = bottom - len_i64(i) * GLYPH;
            for (row, bits) in glyph(c).into_iter().enumerate() {
                for col in 0..8_u8 {
                    if (bits >> col) & 1 == 1 {
                        self.put(x + len_i64(row), origin - i64::from(col), color);
                    }
                }
            }
        }
    }

    fn draw_frame(&mut self) {
        let (l, t, r, b) = (self.left, self.top, self.right, self.bottom);
        self.line((l, t), (r, t), 1, BLACK);
        self.line((r, t), (r, b), 1, BLACK);
        self.line((r, b), (l, b), 1, BLACK);
        self.line((l, b), (l, t), 1, BLACK);
    }

    fn draw_captions(&mut self, title: Option<&str>, xlabel: &str, ylabel: Option<&str>) {
        let cx = (self.left + self.right) / 2;
        if let Some(title) = title {
            let scale = title_scale(title, self.image.width());
            self.text_centered(cx, PAD, title, scale, BLACK);
        }
        self.text_centered(cx, self.bottom + 2 * PAD + GLYPH, xlabel, 1, BLACK);
        if let Some(ylabel) = ylabel {
            let cy = (self.top + self.bottom) / 2;
            self.text_up(PAD, cy + text_width(ylabel, 1) / 2, ylabel, BLACK);
        }
    }

    fn draw_x_ticks(&mut self, x_range: (f64, f64)) {
        for (value, label) in ticks(x_range) {
            let (px, _) = self.to_px(value, 0.0, x_range, (0.0, 1.0));
            self.line((px, self.bottom), (px, self.bottom + 3), 1, BLACK);
            self.text_centered(px, self.bottom + PAD, &label, 1, BLACK);
        }
    }

    fn draw_y_ticks(&mut self, y_range: (f64, f64)) {
        for (value, label) in ticks(y_range) {
            let (_, py) = self.to_px(0.0, value, (0.0, 1.0), y_range);
            self.line((self.left - 3, py), (self.left, py), 1, BLACK);
            self.text_right(self.left - PAD, py, &label);
        }
    }

    /// Category labels centred on horizontal bands.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn draw_band_labels(&mut self, labels: &[String]) {
        if labels.is_empty() {
            return;
        }
        let band = self.plot_height() / labels.len() as f64;
        for (i, label) in labels.iter().enumerate() {
            let cy = self.top + ((i as f64 + 0.5) * band) as i64;
            self.text_right(self.left - PAD, cy, label);
        }
    }

    /// Boxed legend in the lower-right corner of the plot area.
    fn draw_legend(&mut self, labels: &[&str]) {
        let entries: Vec<(usize, &str)> = labels
            .iter()
            .enumerate()
            .filter(|(_, label)| !label.is_empty())
            .map(|(i, label)| (i, *label))
            .collect();
        if entries.is_empty() {
            return;
        }
        let swatch = 2 * GLYPH;
        let row = GLYPH + 4;
        let widest = entries
            .iter()
            .map(|(_, label)| text_width(label, 1))
            .max()
            .unwrap_or(0);
        let w = swatch + widest + 12;
        let h = len_i64(entries.len()) * row + 4;
        let x0 = (self.right - w - 4).max(self.left + 1);
        let y0 = (self.bottom - h - 4).max(self.top + 1);
        self.fill_rect(x0, y0, x0 + w, y0 + h, WHITE);
        self.line((x0, y0), (x0 + w, y0), 1, GRAY);
        self.line((x0 + w, y0), (x0 + w, y0 + h), 1, GRAY);
        self.line((x0 + w, y0 + h), (x0, y0 + h), 1, GRAY);
        self.line((x0, y0 + h), (x0, y0), 1, GRAY);
        for (k, (i, label)) in entries.into_iter().enumerate() {
            let y = y0 + 4 + len_i64(k) * row;
            let color = PALETTE[i % PALETTE.len()];
            self.fill_rect(x0 + 4, y + GLYPH / 2 - 1, x0 + 4 + swatch, y + GLYPH / 2, color);
            self.text(x0 + 8 + swatch, y, label, 1, BLACK);
        }
    }

    fn draw_lines(&mut self, plot: &LinePlot) {
        let x_range = finite_range(plot.data_series.iter().flat_map(|s| s.x.iter().copied()));
        let y_range = finite_range(plot.data_series.iter().flat_map(|s| s.y.iter().copied()));
        for (i, series) in plot.data_series.iter().enumerate() {
            let color = PALETTE[i % PALETTE.len()];
            let points: Vec<(f64, f64)> = series
                .x
                .iter()
                .zip(&series.y)
                .map(|(x, y)| (*x, *y))
                .filter(|(x, y)| x.is_finite() && y.is_finite())
                .collect();
            for pair in points.windows(2) {
                let (x0, y0) = pair[0];
                let (x1, y1) = pair[1];
                let start = self.to_px(x0, y0, x_range, y_range);
                let end = self.to_px(x1, y1, x_range, y_range);
                match plot.line_style.drawstyle {
                    DrawStyle::Default => self.line(start, end, plot.line_style.linewidth, color),
                    DrawStyle::StepsPost => {
                        let corner = (end.0, start.1);
                        self.line(start, corner, plot.line_style.linewidth, color);
                        self.line(corner, end, plot.line_style.linewidth, color);
                    }
                }
            }
        }
        self.draw_x_ticks(x_range);
        self.draw_y_ticks(y_range);
        let labels: Vec<&str> = plot.data_series.iter().map(|s| s.label.as_str()).collect();
        self.draw_legend(&labels);
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn draw_heatmap(&mut self, heatmap: &Heatmap) {
        let (rows, cols) = heatmap.values.dim();
        if rows == 0 || cols == 0 {
            return;
        }
        let max = heatmap
            .values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0_f64, f64::max);
        let cell_w = self.plot_width() / cols as f64;
        let cell_h = self.plot_height() / rows as f64;
        for ((r, c), value) in heatmap.values.indexed_iter() {
            let t = if max > 0.0 { value / max } else { 0.0 };
            let color = lerp_color(Rgb([247, 251, 255]), Rgb([8, 48, 107]), t);
            let x0 = self.left + (c as f64 * cell_w) as i64;
            let y0 = self.top + (r as f64 * cell_h) as i64;
            let x1 = self.left + ((c + 1) as f64 * cell_w) as i64 - 1;
            let y1 = self.top + ((r + 1) as f64 * cell_h) as i64 - 1;
            self.fill_rect(x0, y0, x1, y1, color);

            let label = cell_label(*value);
            if text_width(&label, 1) < x1 - x0 && GLYPH < y1 - y0 {
                let ink = if t > 0.5 { WHITE } else { BLACK };
                self.text_centered((x0 + x1) / 2, (y0 + y1) / 2 - GLYPH / 2, &label, 1, ink);
            }
        }
        self.draw_band_labels(&heatmap.row_labels);
        for (c, label) in heatmap.col_labels.iter().enumerate() {
            let cx = self.left + ((c as f64 + 0.5) * cell_w) as i64;
            self.text_centered(cx, self.bottom + PAD, label, 1, BLACK);
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn draw_bars(&mut self, chart: &BarChart) {
        let n = chart.values.len();
        if n == 0 {
            return;
        }
        let max = chart
            .values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0_f64, |m, v| m.max(v.abs()));
        let band = self.plot_height() / n as f64;
        for (i, value) in chart.values.iter().enumerate() {
            let fraction = if max > 0.0 { value.abs() / max } else { 0.0 };
            let y0 = self.top + (i as f64 * band + band * 0.1) as i64;
            let y1 = self.top + ((i + 1) as f64 * band - band * 0.1) as i64;
            let x1 = self.left + (fraction * self.plot_width()) as i64;
            self.fill_rect(self.left + 1, y0, x1, y1, PALETTE[0]);
        }
        self.draw_band_labels(&chart.labels);
        self.draw_x_ticks(if max > 0.0 { (0.0, max) } else { (0.0, 1.0) });
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn draw_scatter(&mut self, plot: &ScatterPlot) {
        let bands = plot.row_labels.len().max(1);
        let band = self.plot_height() / bands as f64;
        let x_range = finite_range(plot.points.iter().map(|p| p.x));
        // zero line
        if x_range.0 < 0.0 && x_range.1 > 0.0 {
            let (zx, _) = self.to_px(0.0, 0.0, x_range, (0.0, 1.0));
            self.line((zx, self.top), (zx, self.bottom), 1, GRAY);
        }
        for (i, point) in plot.points.iter().enumerate() {
            if !point.x.is_finite() {
                continue;
            }
            let (px, _) = self.to_px(point.x, 0.0, x_range, (0.0, 1.0));
            // deterministic vertical spread inside the band
            let jitter = ((i * 7919) % 97) as f64 / 97.0 - 0.5;
            let py = self.top + ((point.row as f64 + 0.5 + jitter * 0.6) * band) as i64;
            let color = lerp_color(Rgb([0, 138, 250]), Rgb([255, 0, 82]), point.intensity);
            self.fill_rect(px - 1, py - 1, px + 1, py + 1, color);
        }
        self.draw_band_labels(&plot.row_labels);
        self.draw_x_ticks(x_range);
    }
}
