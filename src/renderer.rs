// src/renderer.rs

use crate::cli::Args;
use crate::model::*;
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use indicatif::{ParallelProgressIterator, ProgressBar};
use palette::{FromColor, Hsluv, LinSrgb, Mix, Srgb};
use rayon::prelude::*;
use std::f32::consts::PI;
use std::path::PathBuf;
use tracing::{debug, warn};

const BACKGROUND: Rgb<u8> = Rgb([8, 8, 12]);
const AXIS: Rgb<u8> = Rgb([90, 90, 100]);
const VOLUME: Rgb<u8> = Rgb([70, 130, 180]);
const ACCENT: Rgb<u8> = Rgb([220, 60, 60]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chart {
    YearlyVolume,
    ContentAge,
    RatingDistribution,
    Alignment,
    TopDirectors,
    GenreTrends,
    Cumulative,
    Generosity,
    ContentTypes,
}

impl Chart {
    pub const ALL: [Chart; 9] = [
        Chart::YearlyVolume,
        Chart::ContentAge,
        Chart::RatingDistribution,
        Chart::Alignment,
        Chart::TopDirectors,
        Chart::GenreTrends,
        Chart::Cumulative,
        Chart::Generosity,
        Chart::ContentTypes,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Chart::YearlyVolume => "yearly_volume.png",
            Chart::ContentAge => "content_age.png",
            Chart::RatingDistribution => "rating_distribution.png",
            Chart::Alignment => "alignment.png",
            Chart::TopDirectors => "top_directors.png",
            Chart::GenreTrends => "genre_trends.png",
            Chart::Cumulative => "cumulative.png",
            Chart::Generosity => "generosity.png",
            Chart::ContentTypes => "content_types.png",
        }
    }
}

/// Render every chart that has data and return the written paths.
pub fn render_charts(analysis: &AnalysisResult, args: &Args) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create output directory {:?}", args.output))?;

    let bar = ProgressBar::new(Chart::ALL.len() as u64);
    bar.set_message("Rendering charts");

    let written: Vec<Option<PathBuf>> = Chart::ALL
        .par_iter()
        .progress_with(bar)
        .map(|&chart| -> Result<Option<PathBuf>> {
            let mut image = RgbImage::from_pixel(args.width, args.height, BACKGROUND);
            if !render_chart(&mut image, chart, analysis) {
                warn!("Skipping {}: not enough data", chart.file_name());
                return Ok(None);
            }
            let path = args.output.join(chart.file_name());
            image.save(&path).with_context(|| format!("Failed to save {:?}", path))?;
            debug!("Wrote {}", path.display());
            Ok(Some(path))
        })
        .collect::<Result<_>>()?;

    Ok(written.into_iter().flatten().collect())
}

/// Draw one chart. Returns false when the analysis has nothing to show.
fn render_chart(image: &mut RgbImage, chart: Chart, analysis: &AnalysisResult) -> bool {
    let mut plot = Plot::new(image);
    match chart {
        Chart::YearlyVolume => {
            let buckets = &analysis.by_year.buckets;
            if buckets.is_empty() {
                return false;
            }
            let max_count = buckets.iter().map(|b| b.count).max().unwrap_or(1) as f32;
            let slots = buckets.len();
            for (i, bucket) in buckets.iter().enumerate() {
                plot.bar(i, slots, bucket.count as f32 / max_count, VOLUME);
            }
            let means: Vec<f32> = buckets.iter().map(|b| b.mean_rating as f32 / 10.0).collect();
            plot.series(&means, ACCENT);
        }
        Chart::ContentAge => {
            if analysis.yearly.is_empty() {
                return false;
            }
            let ages: Vec<f32> = analysis.yearly.iter().map(|p| p.mean_content_age as f32).collect();
            let max_age = ages.iter().cloned().fold(1.0f32, f32::max);
            let scaled: Vec<f32> = ages.iter().map(|a| a / max_age).collect();
            plot.series(&scaled, Rgb([60, 180, 90]));
        }
        Chart::RatingDistribution => {
            let Ok(overall) = &analysis.overall else { return false };
            let max_count = overall.distribution.iter().copied().max().unwrap_or(1).max(1) as f32;
            for (i, &count) in overall.distribution.iter().enumerate() {
                plot.bar(i, 10, count as f32 / max_count, rating_to_color((i + 1) as f32));
            }
        }
        Chart::Alignment => {
            if analysis.correlation.is_err() {
                return false;
            }
            // Reference on x from 4 to 10, user rating on y from 1 to 10
            plot.line((0.0, 1.0 / 3.0), (1.0, 1.0), ACCENT);
            for &(user, reference) in &analysis.rating_pairs {
                let x = ((reference as f32 - 4.0) / 6.0).clamp(0.0, 1.0);
                let y = ((user as f32 - 1.0) / 9.0).clamp(0.0, 1.0);
                plot.dot(x, y, 3, VOLUME);
            }
        }
        Chart::TopDirectors => {
            let Ok(top) = &analysis.top_directors else { return false };
            let rows = top.len();
            for (i, director) in top.iter().enumerate() {
                if let Some(bucket) = analysis.by_director.get(director) {
                    // Axis spans ratings 6 to 10
                    let width = ((bucket.mean_rating as f32 - 6.0) / 4.0).clamp(0.02, 1.0);
                    plot.hbar(i, rows, width, rating_to_color(bucket.mean_rating as f32));
                }
            }
        }
        Chart::GenreTrends => {
            if analysis.genre_trends.is_empty() {
                return false;
            }
            let colors = generate_series_colors(analysis.genre_trends.len());
            for (trend, color) in analysis.genre_trends.iter().zip(colors) {
                let shares: Vec<f32> = trend.points.iter().map(|&(_, pct)| pct as f32 / 100.0).collect();
                plot.series(&shares, color);
            }
        }
        Chart::Cumulative => {
            let Some(last) = analysis.yearly.last() else { return false };
            let total = last.cumulative_count.max(1) as f32;
            let values: Vec<f32> =
                analysis.yearly.iter().map(|p| p.cumulative_count as f32 / total).collect();
            plot.series(&values, Rgb([190, 80, 190]));
        }
        Chart::Generosity => {
            if analysis.yearly.is_empty() {
                return false;
            }
            let values: Vec<f32> = analysis.yearly.iter().map(|p| p.generosity_pct as f32 / 100.0).collect();
            plot.series(&values, Rgb([60, 190, 200]));
        }
        Chart::ContentTypes => {
            let Ok(overall) = &analysis.overall else { return false };
            let counts: Vec<usize> = overall.content_types.values().copied().collect();
            let colors = generate_series_colors(counts.len());
            plot.pie(&counts, &colors);
            return true;
        }
    }
    plot.axes();
    true
}

/// Drawing area inside fixed margins. Coordinates passed in are fractions
/// of the area, with y growing upwards.
struct Plot<'a> {
    image: &'a mut RgbImage,
    left: f32,
    top: f32,
    width: f32,
    height: f32,
}

impl<'a> Plot<'a> {
    fn new(image: &'a mut RgbImage) -> Self {
        let (w, h) = (image.width() as f32, image.height() as f32);
        let margin_x = (w * 0.08).max(1.0);
        let margin_y = (h * 0.08).max(1.0);
        Plot {
            image,
            left: margin_x,
            top: margin_y,
            width: (w - 2.0 * margin_x).max(1.0),
            height: (h - 2.0 * margin_y).max(1.0),
        }
    }

    fn to_pixel(&self, x: f32, y: f32) -> (i64, i64) {
        let px = self.left + x * self.width;
        let py = self.top + (1.0 - y) * self.height;
        (px.round() as i64, py.round() as i64)
    }

    fn put(&mut self, x: i64, y: i64, color: Rgb<u8>) {
        if x >= 0 && y >= 0 && (x as u32) < self.image.width() && (y as u32) < self.image.height() {
            self.image.put_pixel(x as u32, y as u32, color);
        }
    }

    fn fill(&mut self, (x0, y0): (i64, i64), (x1, y1): (i64, i64), color: Rgb<u8>) {
        for y in y0.min(y1)..=y0.max(y1) {
            for x in x0.min(x1)..=x0.max(x1) {
                self.put(x, y, color);
            }
        }
    }

    /// Vertical bar in slot `i` of `slots`, `value` of full height
    fn bar(&mut self, i: usize, slots: usize, value: f32, color: Rgb<u8>) {
        let slot = 1.0 / slots.max(1) as f32;
        let x0 = i as f32 * slot + slot * 0.15;
        let x1 = (i + 1) as f32 * slot - slot * 0.15;
        let (a, b) = (self.to_pixel(x0, 0.0), self.to_pixel(x1, value.clamp(0.0, 1.0)));
        self.fill(a, b, color);
    }

    /// Horizontal bar in row `i` of `rows`, counted from the top
    fn hbar(&mut self, i: usize, rows: usize, value: f32, color: Rgb<u8>) {
        let slot = 1.0 / rows.max(1) as f32;
        let y_top = 1.0 - (i as f32 * slot + slot * 0.15);
        let y_bottom = 1.0 - ((i + 1) as f32 * slot - slot * 0.15);
        let (a, b) = (self.to_pixel(0.0, y_bottom), self.to_pixel(value.clamp(0.0, 1.0), y_top));
        self.fill(a, b, color);
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Rgb<u8>) {
        let (x0, y0) = self.to_pixel(from.0, from.1);
        let (x1, y1) = self.to_pixel(to.0, to.1);
        let steps = (x1 - x0).abs().max((y1 - y0).abs()).max(1);
        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            let x = x0 as f32 + (x1 - x0) as f32 * t;
            let y = y0 as f32 + (y1 - y0) as f32 * t;
            // Two pixels thick
            self.put(x.round() as i64, y.round() as i64, color);
            self.put(x.round() as i64, y.round() as i64 + 1, color);
        }
    }

    fn dot(&mut self, x: f32, y: f32, radius: i64, color: Rgb<u8>) {
        let (cx, cy) = self.to_pixel(x, y);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.put(cx + dx, cy + dy, color);
                }
            }
        }
    }

    /// Polyline over evenly spaced slots, values as fractions of full height
    fn series(&mut self, values: &[f32], color: Rgb<u8>) {
        let slot = 1.0 / values.len().max(1) as f32;
        let points: Vec<(f32, f32)> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| ((i as f32 + 0.5) * slot, v.clamp(0.0, 1.0)))
            .collect();
        for pair in points.windows(2) {
            self.line(pair[0], pair[1], color);
        }
        for &(x, y) in &points {
            self.dot(x, y, 4, color);
        }
    }

    fn pie(&mut self, counts: &[usize], colors: &[Rgb<u8>]) {
        let total: usize = counts.iter().sum();
        if total == 0 {
            return;
        }
        let (cx, cy) = self.to_pixel(0.5, 0.5);
        let radius = (self.width.min(self.height) / 2.0) as i64;
        // Cumulative angle at which each slice ends
        let mut ends = Vec::with_capacity(counts.len());
        let mut acc = 0usize;
        for &count in counts {
            acc += count;
            ends.push(acc as f32 / total as f32 * 2.0 * PI);
        }
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy > radius * radius {
                    continue;
                }
                let angle = (dy as f32).atan2(dx as f32).rem_euclid(2.0 * PI);
                let slice = ends.iter().position(|&end| angle <= end).unwrap_or(counts.len() - 1);
                self.put(cx + dx, cy + dy, colors[slice % colors.len()]);
            }
        }
    }

    fn axes(&mut self) {
        self.line((0.0, 0.0), (1.0, 0.0), AXIS);
        self.line((0.0, 0.0), (0.0, 1.0), AXIS);
    }
}

// Blue-to-orange gradient over the rating scale
/// Stops along the viridis ramp, lowest rating first
const RATING_STOPS: [(u8, u8, u8); 5] = [
    (0x44, 0x01, 0x54),
    (0x3b, 0x52, 0x8b),
    (0x21, 0x91, 0x8c),
    (0x5e, 0xc9, 0x62),
    (0xfd, 0xe7, 0x25),
];

fn rating_to_color(rating: f32) -> Rgb<u8> {
    let stop = |i: usize| -> LinSrgb {
        let (r, g, b) = RATING_STOPS[i];
        Srgb::new(r, g, b).into_format::<f32>().into_linear()
    };
    let position = ((rating - 1.0) / 9.0).clamp(0.0, 1.0) * (RATING_STOPS.len() - 1) as f32;
    let lower = (position as usize).min(RATING_STOPS.len() - 2);
    let mixed = stop(lower).mix(stop(lower + 1), position - lower as f32);
    to_rgb(Srgb::from_linear(mixed))
}

/// Evenly spaced HSLuv hues, so series stay apart at equal lightness
fn generate_series_colors(count: usize) -> Vec<Rgb<u8>> {
    let count = count.max(1);
    (0..count)
        .map(|i| {
            let color: Hsluv = Hsluv::new(12.0 + 360.0 * i as f32 / count as f32, 90.0, 65.0);
            to_rgb(Srgb::from_color(color))
        })
        .collect()
}

fn to_rgb(srgb: Srgb<f32>) -> Rgb<u8> {
    let (r, g, b) = srgb.into_components();
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0f32) as u8;
    Rgb([channel(r), channel(g), channel(b)])
}
