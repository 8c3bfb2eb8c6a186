//! Report assembly.
//!
//! A [`ReportJob`] is turned into one [`plan::ReportPlan`] which both
//! renderers consume, so the PDF document and the slide deck always have the
//! same pages in the same order:
//!
//! 1. Cover, outline and optional branding backdrops
//! 2. Present sections, numbered consecutively: specification text, design
//!    table, CAD drawings, 3D model views (with a close-up page)
//! 3. Closing page
//!
//! Rendering the same job twice produces identical bytes.

pub mod layout;
pub mod pdf;
pub mod plan;
pub mod pptx;
pub mod text;

use anyhow::Result;
use image::RgbaImage;
use std::path::{Path, PathBuf};

use crate::capture::CapturedImage;
use crate::config::{BrandingConfig, ReportConfig};
use crate::error::ReportError;
use crate::extract::{PdfText, Table};

pub use layout::Color;
pub use plan::{plan_report, ReportPlan};

/// Which report section an image group belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionKind {
    Drawings,
    Models,
}

/// An ordered set of captures shown together.
#[derive(Clone, Debug)]
pub struct ImageGroup {
    pub kind: SectionKind,
    pub title: String,
    pub images: Vec<CapturedImage>,
}

/// Loaded branding assets.
#[derive(Clone, Debug)]
pub struct Branding {
    pub logo: RgbaImage,
    pub cover: Option<RgbaImage>,
    pub preamble: Vec<RgbaImage>,
    pub closing: Option<RgbaImage>,
    pub company_name: String,
    pub accent: Color,
}

impl Branding {
    /// Loads the configured assets, resolving relative paths against `base`.
    ///
    /// The logo is required. Missing optional images are skipped and
    /// reported in the returned warnings.
    pub fn load(config: &BrandingConfig, base: &Path) -> Result<(Self, Vec<String>), ReportError> {
        let resolve = |p: &Path| -> PathBuf {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base.join(p)
            }
        };

        let logo_path = resolve(&config.logo);
        let logo = image::open(&logo_path)
            .map_err(|e| ReportError::MissingAsset {
                path: logo_path.clone(),
                reason: e.to_string(),
            })?
            .to_rgba8();

        let mut warnings = Vec::new();
        let mut optional = |path: &Path| -> Option<RgbaImage> {
            let full = resolve(path);
            match image::open(&full) {
                Ok(img) => Some(img.to_rgba8()),
                Err(e) => {
                    let msg = format!("Skipping branding image {}: {}", full.display(), e);
                    crate::log(&msg);
                    warnings.push(msg);
                    None
                }
            }
        };

        let cover = config.cover_image.as_deref().and_then(&mut optional);
        let preamble = config
            .preamble
            .iter()
            .filter_map(|p| optional(p.as_path()))
            .collect();
        let closing = config.closing_image.as_deref().and_then(&mut optional);

        let [r, g, b] = config.accent_color;
        Ok((
            Branding {
                logo,
                cover,
                preamble,
                closing,
                company_name: config.company_name.clone(),
                accent: Color(r, g, b),
            },
            warnings,
        ))
    }
}

/// Everything a report is built from.
#[derive(Clone, Debug)]
pub struct ReportJob {
    pub title: String,
    /// Shown on the cover; supplied by the caller so output stays reproducible
    pub date: String,
    pub brief_pages: Vec<PdfText>,
    pub table: Option<Table>,
    pub groups: Vec<ImageGroup>,
    pub branding: Branding,
}

/// Renders the report as a PDF document.
pub fn build_pdf(job: &ReportJob, settings: &ReportConfig) -> Result<Vec<u8>> {
    let plan = plan_report(job, settings)?;
    pdf::render(&plan)
}

/// Renders the report as a PPTX slide deck.
pub fn build_slides(job: &ReportJob, settings: &ReportConfig) -> Result<Vec<u8>> {
    let plan = plan_report(job, settings)?;
    pptx::render(&plan)
}
