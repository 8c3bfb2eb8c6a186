//! Screen capture and cropping.
//!
//! This module provides:
//! - Fractional crops, whitespace trimming and close-up zooms (`crop`)
//! - Capture of a named window with a visible full-screen fallback (`capture`)
//! - The Win32 window and Graphics Capture backend (Windows only)

pub mod crop;
#[cfg(windows)]
pub mod screenshot;
#[cfg(windows)]
pub mod window;

use anyhow::Result;
use image::RgbaImage;

use crate::desktop::Desktop;

pub use crop::{center_zoom, content_bounds, crop, vertical_strip, CropRatios};

/// What a capture actually covered.
#[derive(Clone, Debug, PartialEq)]
pub enum CaptureScope {
    /// The named window's client area
    Window { title: String },
    /// The whole primary monitor, as requested
    FullScreen,
    /// The named window was not found, so the whole screen was captured instead
    FullScreenFallback { requested: String },
}

impl CaptureScope {
    pub fn is_fallback(&self) -> bool {
        matches!(self, CaptureScope::FullScreenFallback { .. })
    }
}

/// A raw captured frame.
pub struct Capture {
    pub image: RgbaImage,
    pub scope: CaptureScope,
}

/// A screenshot as it travels into the report: the untouched frame plus the
/// fractional crop to apply whenever it is shown or rendered.
#[derive(Clone, Debug)]
pub struct CapturedImage {
    pub pixels: RgbaImage,
    pub crop: CropRatios,
    pub label: String,
}

impl CapturedImage {
    pub fn new(pixels: RgbaImage, crop: CropRatios, label: impl Into<String>) -> Self {
        Self {
            pixels,
            crop,
            label: label.into(),
        }
    }

    /// The cropped view of the frame.
    pub fn view(&self) -> Result<RgbaImage, crate::error::CropError> {
        crop::crop(&self.pixels, &self.crop)
    }
}

/// Captures the window whose title contains `window_title`, or the full
/// screen when `window_title` is `None`.
///
/// When the window cannot be located the full screen is captured and the
/// result is marked [`CaptureScope::FullScreenFallback`].
pub fn capture(desktop: &dyn Desktop, window_title: Option<&str>) -> Result<Capture> {
    let Some(title) = window_title else {
        return Ok(Capture {
            image: desktop.capture_screen()?,
            scope: CaptureScope::FullScreen,
        });
    };

    match desktop.find_window(title)? {
        Some(window) => Ok(Capture {
            image: desktop.capture_window(window)?,
            scope: CaptureScope::Window {
                title: title.to_string(),
            },
        }),
        None => {
            crate::log(&format!(
                "Window \"{}\" not found, capturing full screen instead",
                title
            ));
            Ok(Capture {
                image: desktop.capture_screen()?,
                scope: CaptureScope::FullScreenFallback {
                    requested: title.to_string(),
                },
            })
        }
    }
}
