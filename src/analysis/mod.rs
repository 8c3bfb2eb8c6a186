//! Wear-image analysis.
//!
//! A classical pipeline: grayscale → Gaussian blur → binary threshold →
//! foreground normalisation → contour tracing → outer borders above a
//! minimum area. The same image and settings always give the same result.

pub mod contours;

use anyhow::{Context, Result};
use image::RgbaImage;
use std::path::{Path, PathBuf};

use crate::config::WearConfig;

pub use contours::{annotate, Bounds, ContourBoundary};

/// Traces the outer boundaries of wear regions in an image.
pub fn analyze(image: &RgbaImage, settings: &WearConfig) -> Vec<ContourBoundary> {
    let gray = image::DynamicImage::ImageRgba8(image.clone()).to_luma8();
    let (bin, _) = contours::binarize(&gray, settings);
    contours::outer_boundaries(&bin, settings.min_area)
}

/// Outcome of analysing one image file.
#[derive(Debug)]
pub struct WearReport {
    pub source: PathBuf,
    pub boundaries: Vec<ContourBoundary>,
    /// Sum of boundary areas as a percentage of the image area
    pub coverage_percent: f64,
    /// Annotated overlay saved next to the other outputs
    pub overlay_path: PathBuf,
}

/// Loads an image, analyses it and saves the annotated overlay into `out_dir`.
pub fn analyze_file(path: &Path, settings: &WearConfig, out_dir: &Path) -> Result<WearReport> {
    let image = image::open(path)
        .with_context(|| format!("Failed to open wear image {}", path.display()))?
        .to_rgba8();

    let boundaries = analyze(&image, settings);
    let image_area = (image.width() as f64 * image.height() as f64).max(1.0);
    let covered: f64 = boundaries.iter().map(|b| b.area).sum();
    let coverage_percent = covered / image_area * 100.0;

    crate::log(&format!(
        "Wear analysis of {}: {} region(s), {:.2}% coverage",
        path.display(),
        boundaries.len(),
        coverage_percent
    ));

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "wear".to_string());
    let overlay_path = out_dir.join(format!("{}_contours.png", stem));
    annotate(&image, &boundaries)
        .save(&overlay_path)
        .with_context(|| format!("Failed to save {}", overlay_path.display()))?;

    Ok(WearReport {
        source: path.to_path_buf(),
        boundaries,
        coverage_percent,
        overlay_path,
    })
}
