//! GUI application state.
//!
//! Holds the user's text inputs between frames and turns them into runner
//! actions.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::{AUTOCAD, NX};
use crate::session::runner::Action;
use crate::session::GenerateRequest;

/// Top-level tabs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    CaptureCad,
    CaptureModel,
    WearAnalysis,
    GenerateReports,
}

impl Tab {
    pub const ALL: [Tab; 4] = [
        Tab::CaptureCad,
        Tab::CaptureModel,
        Tab::WearAnalysis,
        Tab::GenerateReports,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::CaptureCad => "Capture CAD",
            Tab::CaptureModel => "Capture 3D Model",
            Tab::WearAnalysis => "Wear Analysis",
            Tab::GenerateReports => "Generate Reports",
        }
    }
}

/// GUI application state.
#[derive(Debug, Default)]
pub struct GuiState {
    pub tab: Tab,
    /// Drawing files, one per line
    pub drawing_paths: String,
    /// Optional model file opened on launch
    pub model_path: String,
    /// Wear images, one per line
    pub wear_paths: String,
    /// PDF and spreadsheet inputs, one per line
    pub document_paths: String,
    pub report_title: String,
    pub autocad_executable: String,
    pub nx_executable: String,
    /// Last known (drawings, models) counts
    pub counts: (usize, usize),
    /// Error from the last start attempt
    pub start_error: Option<String>,
}

/// Splits a multi-line input into paths. Blank lines are ignored and
/// surrounding quotes (as added by "Copy as path") are removed.
pub fn parse_paths(text: &str) -> Vec<PathBuf> {
    text.lines()
        .map(|line| line.trim().trim_matches('"').trim())
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect()
}

impl GuiState {
    /// Executable overrides entered in the Generate Reports tab.
    pub fn executable_overrides(&self) -> BTreeMap<String, PathBuf> {
        let mut overrides = BTreeMap::new();
        for (name, text) in [(AUTOCAD, &self.autocad_executable), (NX, &self.nx_executable)] {
            if let Some(path) = parse_paths(text).into_iter().next() {
                overrides.insert(name.to_string(), path);
            }
        }
        overrides
    }

    pub fn capture_drawings_action(&self) -> Action {
        Action::CaptureDrawings(parse_paths(&self.drawing_paths))
    }

    pub fn capture_model_action(&self) -> Action {
        Action::CaptureModel(parse_paths(&self.model_path).into_iter().next())
    }

    pub fn wear_action(&self) -> Action {
        Action::AnalyzeWear(parse_paths(&self.wear_paths))
    }

    pub fn generate_action(&self) -> Action {
        Action::Generate(GenerateRequest {
            title: self.report_title.clone(),
            documents: parse_paths(&self.document_paths),
        })
    }
}
