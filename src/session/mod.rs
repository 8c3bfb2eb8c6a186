//! Session state and the actions the UI can trigger.
//!
//! A [`Session`] keeps captures in memory between actions. Generating a
//! report reads the session, extracts the input documents and writes both
//! output files into a fresh timestamped folder.

pub mod runner;

use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};

use crate::analysis::{self, WearReport};
use crate::automation::{launch_and_drive, CaptureTask};
use crate::capture::CapturedImage;
use crate::config::{AppConfig, IntegrationConfig, AUTOCAD, NX};
use crate::desktop::Desktop;
use crate::error::DriverError;
use crate::extract::{extract_document, ExtractedDocument, PdfText, Table};
use crate::report::plan::DRAWINGS_SECTION;
use crate::report::{self, Branding, ImageGroup, ReportJob, SectionKind};

/// Captures collected so far.
#[derive(Debug, Default)]
pub struct Session {
    pub drawings: Vec<CapturedImage>,
    pub models: Vec<ImageGroup>,
}

/// Result of an action that touches several inputs.
#[derive(Debug, Default)]
pub struct ActionSummary {
    pub succeeded: usize,
    pub warnings: Vec<String>,
}

/// Inputs for report generation.
#[derive(Clone, Debug, Default)]
pub struct GenerateRequest {
    /// Report title; empty uses the configured default
    pub title: String,
    /// PDF and spreadsheet files, dispatched by extension
    pub documents: Vec<PathBuf>,
}

/// Files written by [`Session::generate`].
#[derive(Debug)]
pub struct GeneratedReport {
    pub folder: PathBuf,
    pub pdf: PathBuf,
    pub slides: PathBuf,
    pub pages: usize,
    pub warnings: Vec<String>,
}

impl Session {
    pub const fn new() -> Self {
        Self {
            drawings: Vec::new(),
            models: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.drawings.clear();
        self.models.clear();
    }

    /// Opens each drawing, captures it and closes it again. A failing file
    /// is reported and the rest still run.
    pub fn capture_drawings(
        &mut self,
        desktop: &dyn Desktop,
        integration: &IntegrationConfig,
        files: &[PathBuf],
        progress: &dyn Fn(&str),
    ) -> ActionSummary {
        let mut summary = ActionSummary::default();
        for (i, file) in files.iter().enumerate() {
            progress(&format!(
                "Drawing {}/{}: {}",
                i + 1,
                files.len(),
                file.display()
            ));
            let task = CaptureTask::new(AUTOCAD, integration, Some(file));
            match launch_and_drive(desktop, task, progress) {
                Ok(outcome) => {
                    summary.succeeded += outcome.images.len();
                    summary.warnings.extend(outcome.warnings);
                    self.drawings.extend(outcome.images);
                }
                Err(e) => {
                    let msg = format!("{}: {}", file.display(), e);
                    crate::log(&format!("Drawing capture failed: {}", msg));
                    summary.warnings.push(msg);
                }
            }
        }
        summary
    }

    /// Captures every configured view of one model. The views become a new
    /// model group only when all of them were captured.
    pub fn capture_model(
        &mut self,
        desktop: &dyn Desktop,
        integration: &IntegrationConfig,
        target: Option<&Path>,
        progress: &dyn Fn(&str),
    ) -> Result<ActionSummary, DriverError> {
        let task = CaptureTask::new(NX, integration, target);
        let outcome = launch_and_drive(desktop, task, progress)?;
        let expected = integration.views.len().max(1);
        let mut summary = ActionSummary {
            succeeded: 0,
            warnings: outcome.warnings,
        };
        if outcome.images.len() < expected {
            summary.warnings.push(format!(
                "Only {} of {} views captured; model not added",
                outcome.images.len(),
                expected
            ));
            return Ok(summary);
        }

        summary.succeeded = outcome.images.len();
        let title = format!("Model {}", self.models.len() + 1);
        crate::log(&format!("{} added with {} view(s)", title, summary.succeeded));
        self.models.push(ImageGroup {
            kind: SectionKind::Models,
            title,
            images: outcome.images,
        });
        Ok(summary)
    }

    /// Image groups in report order.
    pub fn groups(&self) -> Vec<ImageGroup> {
        let mut groups = Vec::with_capacity(self.models.len() + 1);
        if !self.drawings.is_empty() {
            groups.push(ImageGroup {
                kind: SectionKind::Drawings,
                title: DRAWINGS_SECTION.to_string(),
                images: self.drawings.clone(),
            });
        }
        groups.extend(self.models.iter().cloned());
        groups
    }

    /// Builds the PDF and slide deck from the session and the given documents.
    ///
    /// Unreadable documents are skipped with a warning. A missing logo
    /// aborts before anything is written.
    pub fn generate(
        &self,
        request: &GenerateRequest,
        config: &AppConfig,
        asset_base: &Path,
        out_dir: &Path,
    ) -> Result<GeneratedReport> {
        let mut warnings = Vec::new();
        let mut brief_pages: Vec<PdfText> = Vec::new();
        let mut tables: Vec<Table> = Vec::new();

        for path in &request.documents {
            match extract_document(path, config.report.pdf_page_limit) {
                Ok(ExtractedDocument::Pdf(text)) => brief_pages.push(text),
                Ok(ExtractedDocument::Spreadsheet(table)) => tables.push(table),
                Err(e) => {
                    crate::log(&format!("Skipping input: {}", e));
                    warnings.push(e.to_string());
                }
            }
        }

        let (branding, branding_warnings) = Branding::load(&config.branding, asset_base)?;
        warnings.extend(branding_warnings);

        let table = Table::concat(&tables);
        let title = if request.title.trim().is_empty() {
            config.report.title.clone()
        } else {
            request.title.trim().to_string()
        };
        let job = ReportJob {
            title,
            date: Local::now().format("%Y-%m-%d").to_string(),
            brief_pages,
            table: (!table.is_empty()).then_some(table),
            groups: self.groups(),
            branding,
        };

        let plan = report::plan_report(&job, &config.report)?;
        let pdf_bytes = report::pdf::render(&plan)?;
        let slide_bytes = report::pptx::render(&plan)?;

        let folder = unique_folder(out_dir, &Local::now().format("%Y%m%d_%H%M%S").to_string());
        std::fs::create_dir_all(&folder)
            .with_context(|| format!("Failed to create {}", folder.display()))?;
        let pdf = folder.join("report.pdf");
        let slides = folder.join("report.pptx");
        std::fs::write(&pdf, pdf_bytes)
            .with_context(|| format!("Failed to write {}", pdf.display()))?;
        std::fs::write(&slides, slide_bytes)
            .with_context(|| format!("Failed to write {}", slides.display()))?;

        crate::log(&format!(
            "Report written to {} ({} pages, {} warning(s))",
            folder.display(),
            plan.pages.len(),
            warnings.len()
        ));

        Ok(GeneratedReport {
            folder,
            pdf,
            slides,
            pages: plan.pages.len(),
            warnings,
        })
    }
}

/// Runs the wear analyzer on each image, saving overlays into `out_dir`.
pub fn analyze_wear(
    images: &[PathBuf],
    config: &AppConfig,
    out_dir: &Path,
) -> (Vec<WearReport>, Vec<String>) {
    let mut reports = Vec::new();
    let mut warnings = Vec::new();
    for path in images {
        match analysis::analyze_file(path, &config.wear, out_dir) {
            Ok(report) => reports.push(report),
            Err(e) => {
                let msg = format!("{:#}", e);
                crate::log(&format!("Wear analysis failed: {}", msg));
                warnings.push(msg);
            }
        }
    }
    (reports, warnings)
}

/// `base/name`, or `base/name_2`, `base/name_3`... if it already exists.
fn unique_folder(base: &Path, name: &str) -> PathBuf {
    let first = base.join(name);
    if !first.exists() {
        return first;
    }
    (2..)
        .map(|n| base.join(format!("{}_{}", name, n)))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CropRatios;
    use crate::config::ViewStep;
    use crate::desktop::fake::{Call, FakeDesktop};
    use crate::extract::pdf::tests::write_pdf;
    use crate::extract::spreadsheet::tests::write_xlsx;
    use image::{Rgba, RgbaImage};
    use tempfile::{tempdir, TempDir};

    fn frame() -> RgbaImage {
        RgbaImage::from_pixel(200, 100, Rgba([200, 200, 200, 255]))
    }

    fn integration(dir: &TempDir, views: &[&str]) -> IntegrationConfig {
        let exe = dir.path().join("app.exe");
        std::fs::write(&exe, b"MZ").unwrap();
        IntegrationConfig {
            executable: Some(exe),
            window_title: "App".to_string(),
            startup_wait_ms: 0,
            poll_interval_ms: 1,
            ready_timeout_ms: 20,
            settle_ms: 0,
            render_wait_ms: 0,
            view_countdown_ms: 0,
            close_timeout_ms: 0,
            views: views
                .iter()
                .map(|label| ViewStep {
                    label: label.to_string(),
                    keys: Vec::new(),
                })
                .collect(),
            ..Default::default()
        }
    }

    fn config_with_logo(dir: &Path) -> AppConfig {
        std::fs::create_dir_all(dir.join("assets")).unwrap();
        RgbaImage::from_pixel(20, 10, Rgba([0, 0, 120, 255]))
            .save(dir.join("assets/logo.png"))
            .unwrap();
        AppConfig::default()
    }

    #[test]
    fn test_capture_drawings_reports_each_failure() {
        let dir = tempdir().unwrap();
        let integration = integration(&dir, &[]);
        let good = dir.path().join("bracket.dwg");
        std::fs::write(&good, b"AC1032").unwrap();
        let missing = dir.path().join("missing.dwg");

        let desktop = FakeDesktop::new(frame());
        let mut session = Session::new();
        let summary =
            session.capture_drawings(&desktop, &integration, &[missing, good], &|_| {});

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.warnings.len(), 1);
        assert!(summary.warnings[0].contains("missing.dwg"));
        assert_eq!(session.drawings.len(), 1);
        assert_eq!(session.drawings[0].label, "bracket");
        assert_eq!(desktop.count(&Call::RequestClose), 1);
    }

    #[test]
    fn test_capture_model_adds_numbered_groups() {
        let dir = tempdir().unwrap();
        let integration = integration(&dir, &["Top", "Front", "Isometric"]);
        let desktop = FakeDesktop::new(frame());
        let mut session = Session::new();

        for _ in 0..2 {
            let summary = session
                .capture_model(&desktop, &integration, None, &|_| {})
                .unwrap();
            assert_eq!(summary.succeeded, 3);
        }
        let titles: Vec<_> = session.models.iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, vec!["Model 1", "Model 2"]);
        assert!(session.models.iter().all(|g| g.kind == SectionKind::Models));
    }

    #[test]
    fn test_capture_model_failure_adds_nothing() {
        let dir = tempdir().unwrap();
        let integration = integration(&dir, &["Top"]);
        let mut desktop = FakeDesktop::new(frame());
        desktop.window_after = None;
        let mut session = Session::new();

        let err = session
            .capture_model(&desktop, &integration, None, &|_| {})
            .unwrap_err();
        assert!(matches!(err, DriverError::ReadinessTimeout { .. }));
        assert!(session.models.is_empty());
    }

    #[test]
    fn test_groups_put_drawings_first() {
        let mut session = Session::new();
        session.models.push(ImageGroup {
            kind: SectionKind::Models,
            title: "Model 1".to_string(),
            images: vec![CapturedImage::new(frame(), CropRatios::FULL, "Top")],
        });
        session
            .drawings
            .push(CapturedImage::new(frame(), CropRatios::FULL, "bracket"));

        let kinds: Vec<_> = session.groups().iter().map(|g| g.kind).collect();
        assert_eq!(kinds, vec![SectionKind::Drawings, SectionKind::Models]);
    }

    #[test]
    fn test_generate_tolerates_bad_inputs() {
        let dir = tempdir().unwrap();
        let config = config_with_logo(dir.path());
        let brief = dir.path().join("brief.pdf");
        write_pdf(&brief, 2);
        let sheet = dir.path().join("inputs.xlsx");
        write_xlsx(&sheet, &[&["Part", "Qty"], &["Shaft", "2"]]);
        let broken = dir.path().join("broken.xlsx");
        std::fs::write(&broken, b"not a workbook").unwrap();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, b"hello").unwrap();

        let mut session = Session::new();
        session
            .drawings
            .push(CapturedImage::new(frame(), CropRatios::FULL, "bracket"));

        let request = GenerateRequest {
            title: "Pump Housing".to_string(),
            documents: vec![brief, broken, sheet, notes],
        };
        let out = dir.path().join("output");
        let report = session.generate(&request, &config, dir.path(), &out).unwrap();

        assert_eq!(report.warnings.len(), 2);
        assert!(report.pdf.exists());
        assert!(report.slides.exists());
        assert!(report.folder.starts_with(&out));

        let doc = lopdf::Document::load(&report.pdf).unwrap();
        assert_eq!(doc.get_pages().len(), report.pages);
    }

    #[test]
    fn test_generate_without_logo_writes_nothing() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("output");
        let err = Session::new()
            .generate(&GenerateRequest::default(), &AppConfig::default(), dir.path(), &out)
            .unwrap_err();
        assert!(err.to_string().contains("logo"));
        assert!(!out.exists());
    }

    #[test]
    fn test_unique_folder() {
        let dir = tempdir().unwrap();
        let first = unique_folder(dir.path(), "20240501_120000");
        std::fs::create_dir_all(&first).unwrap();
        let second = unique_folder(dir.path(), "20240501_120000");
        assert_eq!(second, dir.path().join("20240501_120000_2"));
    }

    #[test]
    fn test_analyze_wear_collects_failures() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("pad.png");
        let mut img = RgbaImage::from_pixel(60, 40, Rgba([255, 255, 255, 255]));
        for x in 20..40 {
            for y in 10..30 {
                img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        img.save(&image).unwrap();

        let (reports, warnings) = analyze_wear(
            &[image, dir.path().join("gone.png")],
            &AppConfig::default(),
            &dir.path().join("wear"),
        );
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].boundaries.len(), 1);
        assert!(reports[0].overlay_path.exists());
        assert_eq!(warnings.len(), 1);
    }
}
