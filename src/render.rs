use crate::classify::find_containing_patch;
use crate::config::{AppConfig, PartitionConfig, RenderConfig};
use crate::grid::{build_base_grid, grid_dimensions};
use crate::types::Patch;
use anyhow::{bail, Context, Result};
use geo::Point;
use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use tracing::info;

const MIN_PATCH_OPACITY: f64 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub grid: [Rgba<u8>; 2],
    pub patch: Rgba<u8>,
    pub outline: Rgba<u8>,
    pub point: Rgba<u8>,
}

impl Palette {
    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        Ok(Self {
            grid: [
                hex_to_rgba(&config.grid_colors[0])?,
                hex_to_rgba(&config.grid_colors[1])?,
            ],
            patch: hex_to_rgba(&config.patch_color)?,
            outline: hex_to_rgba(&config.outline_color)?,
            point: hex_to_rgba(&config.point_color)?,
        })
    }
}

/// Checkerboard striping of the base grid.
pub fn color_for(gx: usize, gy: usize, grid_colors: &[Rgba<u8>; 2]) -> Rgba<u8> {
    grid_colors[(gx + gy) % 2]
}

/// Plate carrée mapping from the plane bounds onto pixels, north up.
#[derive(Debug, Clone, Copy)]
struct Canvas {
    bounds: Patch,
    pixels_per_degree: f64,
    width: u32,
    height: u32,
}

impl Canvas {
    fn new(bounds: Patch, pixels_per_degree: u32) -> Self {
        let ppd = pixels_per_degree as f64;
        Self {
            bounds,
            pixels_per_degree: ppd,
            width: (bounds.size() * ppd).round() as u32,
            height: (bounds.height() * ppd).round() as u32,
        }
    }

    fn to_pixel(&self, lon: f64, lat: f64) -> (i64, i64) {
        let x = ((lon - self.bounds.left) * self.pixels_per_degree).round() as i64;
        let y = ((self.bounds.top - lat) * self.pixels_per_degree).round() as i64;
        (x, y)
    }

    /// Half-open pixel span `[x0, x1) x [y0, y1)`, never thinner than one pixel.
    fn span(&self, patch: &Patch) -> (i64, i64, i64, i64) {
        let (x0, y0) = self.to_pixel(patch.left, patch.top);
        let (x1, y1) = self.to_pixel(patch.right, patch.bottom);
        (x0, x1.max(x0 + 1), y0, y1.max(y0 + 1))
    }
}

fn fill(img: &mut RgbaImage, (x0, x1, y0, y1): (i64, i64, i64, i64), mut shade: impl FnMut(Rgba<u8>) -> Rgba<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    for y in y0.max(0)..y1.min(h) {
        for x in x0.max(0)..x1.min(w) {
            let px = img.get_pixel_mut(x as u32, y as u32);
            *px = shade(*px);
        }
    }
}

fn outline(img: &mut RgbaImage, (x0, x1, y0, y1): (i64, i64, i64, i64), color: Rgba<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let mut put = |x: i64, y: i64| {
        if x >= 0 && y >= 0 && x < w && y < h {
            img.put_pixel(x as u32, y as u32, color);
        }
    };
    for x in x0..x1 {
        put(x, y0);
        put(x, y1 - 1);
    }
    for y in y0..y1 {
        put(x0, y);
        put(x1 - 1, y);
    }
}

fn blend(dst: Rgba<u8>, src: Rgba<u8>, alpha: f64) -> Rgba<u8> {
    let mix = |d: u8, s: u8| (s as f64 * alpha + d as f64 * (1.0 - alpha)).round() as u8;
    Rgba([mix(dst[0], src[0]), mix(dst[1], src[1]), mix(dst[2], src[2]), 255])
}

/// Number of points attributed to each patch, using the classifier's first-match rule.
/// The patches are a finalized snapshot, so the points are scanned in parallel.
pub fn count_points_per_patch(patches: &[Patch], points: &[Point<f64>]) -> Vec<usize> {
    let n = patches.len();
    points
        .par_iter()
        .filter_map(|point| find_containing_patch(point, patches.iter().enumerate()).map(|(i, _)| i))
        .fold(
            || vec![0usize; n],
            |mut counts, i| {
                counts[i] += 1;
                counts
            },
        )
        .reduce(
            || vec![0usize; n],
            |mut a, b| {
                a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                a
            },
        )
}

/// Base grid, then activated patches shaded by density, then the raw points.
pub fn render_map(
    partition: &PartitionConfig,
    pixels_per_degree: u32,
    palette: &Palette,
    patches: &[Patch],
    points: &[Point<f64>],
) -> RgbaImage {
    let canvas = Canvas::new(partition.bounds, pixels_per_degree);
    let mut img = RgbaImage::from_pixel(canvas.width, canvas.height, Rgba([255, 255, 255, 255]));

    // Cells come out x-major, so the build position gives the exact column and row.
    let (_, rows) = grid_dimensions(&partition.bounds, partition.base_step);
    for (i, cell) in build_base_grid(&partition.bounds, partition.base_step)
        .into_iter()
        .enumerate()
    {
        let color = color_for(i / rows, i % rows, &palette.grid);
        fill(&mut img, canvas.span(&cell), |_| color);
    }

    let counts = count_points_per_patch(patches, points);
    let densest = counts.iter().copied().max().unwrap_or(0);
    let denom = (densest as f64).ln_1p();
    for (patch, count) in patches.iter().zip(&counts) {
        // Log scale keeps one dense cluster from washing out the rest.
        let intensity = if denom > 0.0 {
            ((*count as f64).ln_1p() / denom).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let alpha = MIN_PATCH_OPACITY + (1.0 - MIN_PATCH_OPACITY) * intensity;
        let span = canvas.span(patch);
        fill(&mut img, span, |px| blend(px, palette.patch, alpha));
        outline(&mut img, span, palette.outline);
    }

    let dot = (pixels_per_degree as i64 / 2).max(1);
    for point in points.iter().filter(|p| partition.bounds.contains(p)) {
        let (x, y) = canvas.to_pixel(point.x(), point.y());
        let (x0, y0) = (x - dot / 2, y - dot / 2);
        fill(&mut img, (x0, x0 + dot, y0, y0 + dot), |_| palette.point);
    }

    img
}

pub fn generate_map(config: &AppConfig, patches: &[Patch], points: &[Point<f64>]) -> Result<()> {
    let palette = Palette::from_config(&config.render)?;
    info!(
        "Rendering {} patches and {} points at {} px/deg...",
        patches.len(),
        points.len(),
        config.output.pixels_per_degree
    );
    let img = render_map(
        &config.partition,
        config.output.pixels_per_degree,
        &palette,
        patches,
        points,
    );
    save_image(&img, &config.output.image)
}

fn save_image(img: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    img.save(path)
        .with_context(|| format!("Failed to save image: {:?}", path))?;
    info!("Wrote {}x{} image to {:?}", img.width(), img.height(), path);
    Ok(())
}

pub fn hex_to_rgba(hex: &str) -> Result<Rgba<u8>> {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        bail!("Invalid hex color: {:?}", hex);
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).with_context(|| format!("Invalid hex color: {:?}", hex))
    };
    Ok(Rgba([channel(0..2)?, channel(2..4)?, channel(4..6)?, 255]))
}
