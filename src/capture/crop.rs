//! Resolution-independent cropping.
//!
//! Every crop is expressed as four fractions of the source dimensions so the
//! same configuration produces proportionally identical output on any display.

use image::{imageops, imageops::FilterType, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::CropError;

/// A crop rectangle as fractional bounds (0.0 to 1.0) of the source image.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropRatios {
    /// Left edge (0.0 = left border of the source)
    pub left: f32,
    /// Top edge (0.0 = top border of the source)
    pub top: f32,
    /// Right edge (1.0 = right border of the source)
    pub right: f32,
    /// Bottom edge (1.0 = bottom border of the source)
    pub bottom: f32,
}

impl Default for CropRatios {
    fn default() -> Self {
        Self::FULL
    }
}

impl CropRatios {
    /// The whole image.
    pub const FULL: CropRatios = CropRatios {
        left: 0.0,
        top: 0.0,
        right: 1.0,
        bottom: 1.0,
    };

    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Checks `0 <= left < right <= 1` and `0 <= top < bottom <= 1`.
    pub fn validate(&self) -> Result<(), CropError> {
        let ok = (0.0..=1.0).contains(&self.left)
            && (0.0..=1.0).contains(&self.top)
            && self.right <= 1.0
            && self.bottom <= 1.0
            && self.left < self.right
            && self.top < self.bottom;
        if ok {
            Ok(())
        } else {
            Err(CropError::InvalidRatios {
                left: self.left,
                top: self.top,
                right: self.right,
                bottom: self.bottom,
            })
        }
    }

    /// Expresses `inner` (fractions of this crop) as fractions of the original image.
    pub fn compose(&self, inner: &CropRatios) -> CropRatios {
        let w = self.right - self.left;
        let h = self.bottom - self.top;
        CropRatios {
            left: self.left + inner.left * w,
            top: self.top + inner.top * h,
            right: self.left + inner.right * w,
            bottom: self.top + inner.bottom * h,
        }
    }

    /// Pixel rectangle `(x, y, width, height)` for an image of the given size.
    ///
    /// Origin is floored, size is rounded, and the result is at least one pixel
    /// and never extends past the source.
    pub fn to_pixels(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let x0 = ((self.left * width as f32).floor() as u32).min(width.saturating_sub(1));
        let y0 = ((self.top * height as f32).floor() as u32).min(height.saturating_sub(1));
        let w = (((self.right - self.left) * width as f32).round() as u32)
            .max(1)
            .min(width - x0);
        let h = (((self.bottom - self.top) * height as f32).round() as u32)
            .max(1)
            .min(height - y0);
        (x0, y0, w, h)
    }
}

/// Crops an image by fractional bounds.
pub fn crop(img: &RgbaImage, ratios: &CropRatios) -> Result<RgbaImage, CropError> {
    ratios.validate()?;
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Ok(img.clone());
    }
    let (x, y, cw, ch) = ratios.to_pixels(w, h);
    Ok(imageops::crop_imm(img, x, y, cw, ch).to_image())
}

/// Finds the bounding box of non-white content, padded by margins.
///
/// A pixel counts as content when any RGB channel is below `white_threshold`.
/// Returns [`CropRatios::FULL`] when the image is blank.
pub fn content_bounds(
    img: &RgbaImage,
    white_threshold: u8,
    margin_x: u32,
    margin_y: u32,
) -> CropRatios {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return CropRatios::FULL;
    }

    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;

    for (x, y, pixel) in img.enumerate_pixels() {
        if pixel[0] < white_threshold || pixel[1] < white_threshold || pixel[2] < white_threshold
        {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if min_x == u32::MAX {
        return CropRatios::FULL;
    }

    let left = min_x.saturating_sub(margin_x);
    let top = min_y.saturating_sub(margin_y);
    let right = (max_x + 1 + margin_x).min(w);
    let bottom = (max_y + 1 + margin_y).min(h);

    CropRatios {
        left: left as f32 / w as f32,
        top: top as f32 / h as f32,
        right: right as f32 / w as f32,
        bottom: bottom as f32 / h as f32,
    }
}

/// Crops the center `1/factor` of the image and scales it back to the source size.
pub fn center_zoom(img: &RgbaImage, factor: f32) -> RgbaImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || factor <= 1.0 {
        return img.clone();
    }
    let cw = ((w as f32 / factor) as u32).max(1);
    let ch = ((h as f32 / factor) as u32).max(1);
    let x = (w - cw) / 2;
    let y = (h - ch) / 2;
    let cropped = imageops::crop_imm(img, x, y, cw, ch).to_image();
    imageops::resize(&cropped, w, h, FilterType::Lanczos3)
}

/// Crops a full-height vertical strip `1/factor` wide from the center and
/// scales it back to the source size.
pub fn vertical_strip(img: &RgbaImage, factor: f32) -> RgbaImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || factor <= 1.0 {
        return img.clone();
    }
    let sw = ((w as f32 / factor) as u32).max(1);
    let x = (w - sw) / 2;
    let cropped = imageops::crop_imm(img, x, 0, sw, h).to_image();
    imageops::resize(&cropped, w, h, FilterType::Lanczos3)
}
