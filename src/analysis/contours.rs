//! Contour extraction from wear images.

use image::{GrayImage, Rgba, RgbaImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::filter::gaussian_blur_f32;
use imageproc::point::Point;
use imageproc::rect::Rect;

use crate::config::WearConfig;

/// Axis-aligned bounding box in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One outer boundary of a wear region.
#[derive(Clone, Debug, PartialEq)]
pub struct ContourBoundary {
    /// Outline points in tracing order
    pub points: Vec<Point<i32>>,
    pub bounds: Bounds,
    /// Enclosed area (shoelace formula over the outline)
    pub area: f64,
}

/// Binarizes the image so that wear regions are white on black.
///
/// Returns the binary image and the threshold that was applied.
pub fn binarize(gray: &GrayImage, settings: &WearConfig) -> (GrayImage, u8) {
    let blurred = if settings.blur_sigma > 0.0 {
        gaussian_blur_f32(gray, settings.blur_sigma)
    } else {
        gray.clone()
    };
    let level = settings.threshold.unwrap_or_else(|| otsu_level(&blurred));
    let mut bin = threshold(&blurred, level, ThresholdType::Binary);
    normalize_foreground(&mut bin);
    (bin, level)
}

/// Inverts the binary image when white covers more than half of it, so the
/// minority class is always the traced foreground.
fn normalize_foreground(bin: &mut GrayImage) {
    let white = bin.pixels().filter(|p| p.0[0] > 0).count();
    let total = (bin.width() as usize) * (bin.height() as usize);
    if white * 2 > total {
        for p in bin.pixels_mut() {
            p.0[0] = 255 - p.0[0];
        }
    }
}

/// Traces the outer boundaries of a binary image, dropping small ones.
pub fn outer_boundaries(bin: &GrayImage, min_area: f64) -> Vec<ContourBoundary> {
    let mut boundaries = Vec::new();
    for contour in find_contours::<i32>(bin) {
        if contour.border_type != BorderType::Outer || contour.points.is_empty() {
            continue;
        }

        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;
        for p in &contour.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        if min_x < 0 || min_y < 0 {
            continue;
        }

        let bounds = Bounds {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        };
        // A traced outline runs through pixel centres, so a single pixel or
        // a thin line has zero polygon area; fall back to the box size.
        let area = polygon_area(&contour.points).max(if contour.points.len() < 3 {
            (bounds.width * bounds.height) as f64
        } else {
            0.0
        });
        if area < min_area {
            continue;
        }

        boundaries.push(ContourBoundary {
            points: contour.points,
            bounds,
            area,
        });
    }
    boundaries
}

fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    twice.abs() as f64 / 2.0
}

/// Draws outlines (red) and bounding boxes (green) over a copy of the image.
pub fn annotate(image: &RgbaImage, boundaries: &[ContourBoundary]) -> RgbaImage {
    let mut out = image.clone();
    let outline = Rgba([230, 30, 30, 255]);
    let bbox = Rgba([20, 200, 60, 255]);
    for boundary in boundaries {
        for p in &boundary.points {
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < out.width() && (p.y as u32) < out.height() {
                out.put_pixel(p.x as u32, p.y as u32, outline);
            }
        }
        let b = boundary.bounds;
        draw_hollow_rect_mut(
            &mut out,
            Rect::at(b.x as i32, b.y as i32).of_size(b.width.max(1), b.height.max(1)),
            bbox,
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn settings() -> WearConfig {
        WearConfig {
            threshold: Some(128),
            blur_sigma: 1.0,
            min_area: 25.0,
        }
    }

    #[test]
    fn test_polygon_area() {
        let square = [
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert_eq!(polygon_area(&square), 100.0);
    }

    #[test]
    fn test_foreground_is_minority() {
        // Light spot on a dark surface stays white after normalisation
        let mut gray = GrayImage::from_pixel(50, 50, Luma([20]));
        for x in 10..20 {
            for y in 10..20 {
                gray.put_pixel(x, y, Luma([220]));
            }
        }
        let (bin, level) = binarize(&gray, &settings());
        assert_eq!(level, 128);
        assert_eq!(bin.get_pixel(15, 15).0[0], 255);
        assert_eq!(bin.get_pixel(40, 40).0[0], 0);
    }

    #[test]
    fn test_otsu_when_threshold_unset() {
        let mut gray = GrayImage::from_pixel(40, 40, Luma([200]));
        for x in 5..15 {
            for y in 5..15 {
                gray.put_pixel(x, y, Luma([60]));
            }
        }
        let config = WearConfig {
            threshold: None,
            ..settings()
        };
        let (bin, level) = binarize(&gray, &config);
        assert!((60..200).contains(&level));
        assert_eq!(bin.get_pixel(10, 10).0[0], 255);
        assert_eq!(bin.get_pixel(30, 30).0[0], 0);
    }

    #[test]
    fn test_small_regions_are_dropped() {
        let mut bin = GrayImage::new(60, 60);
        bin.put_pixel(5, 5, Luma([255]));
        for x in 20..40 {
            for y in 20..40 {
                bin.put_pixel(x, y, Luma([255]));
            }
        }
        let boundaries = outer_boundaries(&bin, 25.0);
        assert_eq!(boundaries.len(), 1);
        assert_eq!(
            boundaries[0].bounds,
            Bounds {
                x: 20,
                y: 20,
                width: 20,
                height: 20
            }
        );
    }

    #[test]
    fn test_annotate_marks_outline() {
        let image = RgbaImage::from_pixel(30, 30, Rgba([255, 255, 255, 255]));
        let boundary = ContourBoundary {
            points: vec![Point::new(5, 5), Point::new(6, 5)],
            bounds: Bounds {
                x: 5,
                y: 5,
                width: 10,
                height: 10,
            },
            area: 100.0,
        };
        let out = annotate(&image, &[boundary]);
        assert_eq!(out.dimensions(), (30, 30));
        assert_ne!(*out.get_pixel(14, 10), Rgba([255, 255, 255, 255]));
        assert_eq!(*out.get_pixel(20, 20), Rgba([255, 255, 255, 255]));
    }
}
