//! Application configuration.
//!
//! Loads settings from config.json at startup. Every field has a default so a
//! partial (or missing) file still yields a usable configuration. Integrations
//! are keyed by name ("autocad", "nx") and describe how to launch, drive and
//! capture one external application.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::capture::CropRatios;
use crate::error::ConfigError;

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Name of the 2D drafting integration.
pub const AUTOCAD: &str = "autocad";
/// Name of the 3D modelling integration.
pub const NX: &str = "nx";

/// A key that has no text representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedKey {
    Escape,
    Enter,
    Tab,
}

/// One step of a keystroke sequence.
///
/// In JSON: `{"key": "escape"}`, `{"text": "zoom\n"}` or `{"wait_ms": 500}`.
/// A `\n` inside text is sent as Enter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    Key(NamedKey),
    Text(String),
    WaitMs(u64),
}

/// A labelled view captured in multi-view mode.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViewStep {
    /// Label shown under the image in the report ("Top", "Front", ...)
    pub label: String,
    /// Keys sent after the countdown, before the capture
    #[serde(default)]
    pub keys: Vec<KeyAction>,
}

/// How to launch, drive and capture one external application.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfig {
    /// Explicit executable path. Takes precedence over search patterns.
    pub executable: Option<PathBuf>,
    /// Wildcard patterns (`*` within a path component). Highest match wins.
    pub search_patterns: Vec<String>,
    /// Substring of the main window title
    pub window_title: String,
    /// Fixed wait after spawning before looking for the window (milliseconds)
    pub startup_wait_ms: u64,
    /// Interval between window lookups (milliseconds)
    pub poll_interval_ms: u64,
    /// Give up looking for the window after this long (milliseconds)
    pub ready_timeout_ms: u64,
    /// Delay after focusing and maximizing (milliseconds)
    pub settle_ms: u64,
    /// Keystrokes sent once the window is ready
    pub commands: Vec<KeyAction>,
    /// Delay after the commands so the application can redraw (milliseconds)
    pub render_wait_ms: u64,
    /// Capture only the application window; false captures the whole screen
    pub capture_window: bool,
    /// Crop applied to every capture
    pub crop: CropRatios,
    /// Trim white margins inside the crop
    pub trim_whitespace: bool,
    /// Views captured in multi-view mode, in order
    pub views: Vec<ViewStep>,
    /// Countdown before each view capture (milliseconds)
    pub view_countdown_ms: u64,
    /// Keystrokes sent after the close request (e.g. "don't save")
    pub close_keys: Vec<KeyAction>,
    /// Wait for the process to exit before force-killing it (milliseconds)
    pub close_timeout_ms: u64,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            executable: None,
            search_patterns: Vec::new(),
            window_title: String::new(),
            startup_wait_ms: 5000,
            poll_interval_ms: 500,
            ready_timeout_ms: 30000,
            settle_ms: 1000,
            commands: Vec::new(),
            render_wait_ms: 2000,
            capture_window: true,
            crop: CropRatios::FULL,
            trim_whitespace: false,
            views: Vec::new(),
            view_countdown_ms: 5000,
            close_keys: Vec::new(),
            close_timeout_ms: 5000,
        }
    }
}

impl IntegrationConfig {
    fn autocad() -> Self {
        Self {
            search_patterns: vec![
                "C:/Program Files/Autodesk/AutoCAD*/acad.exe".to_string(),
                "C:/Program Files/Autodesk/AutoCAD LT*/acadlt.exe".to_string(),
            ],
            window_title: "AutoCAD".to_string(),
            startup_wait_ms: 18000,
            settle_ms: 1000,
            commands: vec![
                KeyAction::Key(NamedKey::Escape),
                KeyAction::Key(NamedKey::Escape),
                KeyAction::Text("zoom\n".to_string()),
                KeyAction::WaitMs(500),
                KeyAction::Text("e\n".to_string()),
            ],
            render_wait_ms: 8000,
            capture_window: true,
            crop: CropRatios::new(0.182, 0.204, 0.9375, 0.870),
            trim_whitespace: true,
            close_keys: vec![KeyAction::Text("n".to_string())],
            ..Default::default()
        }
    }

    fn nx() -> Self {
        let fit = vec![KeyAction::Text("f".to_string())];
        Self {
            search_patterns: vec!["C:/Program Files/Siemens/NX*/NXBIN/ugraf.exe".to_string()],
            window_title: "NX".to_string(),
            startup_wait_ms: 30000,
            ready_timeout_ms: 60000,
            settle_ms: 2000,
            render_wait_ms: 3000,
            capture_window: false,
            crop: CropRatios::new(0.28, 0.20, 0.75, 0.90),
            views: ["Top", "Front", "Isometric"]
                .into_iter()
                .map(|label| ViewStep {
                    label: label.to_string(),
                    keys: fit.clone(),
                })
                .collect(),
            view_countdown_ms: 5000,
            close_keys: vec![KeyAction::Text("n".to_string())],
            ..Default::default()
        }
    }
}

/// Branding assets and company details. Paths are relative to the executable.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandingConfig {
    /// Logo drawn bottom-left on every page. Required.
    pub logo: PathBuf,
    /// Optional image on the cover page
    pub cover_image: Option<PathBuf>,
    /// Optional full-page backdrops shown after the outline
    pub preamble: Vec<PathBuf>,
    /// Optional image on the closing page
    pub closing_image: Option<PathBuf>,
    pub company_name: String,
    /// Banner and table header colour (RGB)
    pub accent_color: [u8; 3],
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            logo: PathBuf::from("assets/logo.png"),
            cover_image: None,
            preamble: Vec::new(),
            closing_image: None,
            company_name: "Engineering Services".to_string(),
            accent_color: [0x1F, 0x4E, 0x79],
        }
    }
}

/// Report layout parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub title: String,
    /// Pages of text taken from each specification PDF
    pub pdf_page_limit: usize,
    /// Words per specification text page
    pub words_per_page: usize,
    /// Data rows per table page
    pub rows_per_page: usize,
    /// Zoom factor of the isometric close-up
    pub isometric_zoom: f32,
    /// Width divisor of the front view strip
    pub front_strip: f32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: "Technical Report".to_string(),
            pdf_page_limit: 3,
            words_per_page: 80,
            rows_per_page: 20,
            isometric_zoom: 2.5,
            front_strip: 1.8,
        }
    }
}

/// Wear analysis parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WearConfig {
    /// Binary threshold; `None` picks one with Otsu's method
    pub threshold: Option<u8>,
    /// Gaussian blur sigma applied before thresholding
    pub blur_sigma: f32,
    /// Boundaries enclosing less area than this (pixels) are dropped
    pub min_area: f64,
}

impl Default for WearConfig {
    fn default() -> Self {
        Self {
            threshold: Some(128),
            blur_sigma: 1.0,
            min_area: 25.0,
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub integrations: BTreeMap<String, IntegrationConfig>,
    pub branding: BrandingConfig,
    pub report: ReportConfig,
    pub wear: WearConfig,
    /// Where timestamped report folders are created. Defaults to `<exe_dir>/output`.
    pub output_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut integrations = BTreeMap::new();
        integrations.insert(AUTOCAD.to_string(), IntegrationConfig::autocad());
        integrations.insert(NX.to_string(), IntegrationConfig::nx());
        Self {
            integrations,
            branding: BrandingConfig::default(),
            report: ReportConfig::default(),
            wear: WearConfig::default(),
            output_dir: None,
        }
    }
}

impl AppConfig {
    /// Looks up an integration by name.
    pub fn integration(&self, name: &str) -> Result<&IntegrationConfig, ConfigError> {
        self.integrations
            .get(name)
            .ok_or_else(|| ConfigError::UnknownIntegration(name.to_string()))
    }

    /// Points an integration at an explicit executable for this session.
    pub fn set_executable(&mut self, name: &str, path: PathBuf) -> Result<(), ConfigError> {
        let integration = self
            .integrations
            .get_mut(name)
            .ok_or_else(|| ConfigError::UnknownIntegration(name.to_string()))?;
        integration.executable = Some(path);
        Ok(())
    }

    /// Sets integration executables from `CAD_REPORT_<NAME>_PATH` variables.
    ///
    /// `lookup` is normally `|k| std::env::var(k).ok()`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (name, integration) in self.integrations.iter_mut() {
            let key = env_key(name);
            if let Some(value) = lookup(&key).filter(|v| !v.trim().is_empty()) {
                crate::log(&format!("{} overrides {} executable: {}", key, name, value));
                integration.executable = Some(PathBuf::from(value.trim()));
            }
        }
    }

    /// Resolved output directory.
    pub fn output_dir(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => crate::paths::resolve(dir),
            None => crate::paths::get_output_dir(),
        }
    }
}

/// Environment variable overriding an integration's executable.
pub fn env_key(integration: &str) -> String {
    format!(
        "CAD_REPORT_{}_PATH",
        integration.to_uppercase().replace(|c: char| !c.is_ascii_alphanumeric(), "_")
    )
}

/// Parses configuration text. Missing fields take their defaults.
pub fn parse_config(contents: &str) -> serde_json::Result<AppConfig> {
    serde_json::from_str(contents)
}

/// Loads configuration from config.json or returns defaults.
/// Looks for config.json in the same directory as the executable.
fn load_config() -> AppConfig {
    let config_path = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("config.json")))
        .unwrap_or_else(|| Path::new("config.json").to_path_buf());

    crate::log(&format!("Looking for config at: {}", config_path.display()));

    let mut config = if config_path.exists() {
        match fs::read_to_string(&config_path) {
            Ok(contents) => match parse_config(&contents) {
                Ok(config) => {
                    crate::log("Config loaded from config.json");
                    config
                }
                Err(e) => {
                    crate::log(&format!(
                        "Failed to parse config.json: {}. Using defaults.",
                        e
                    ));
                    AppConfig::default()
                }
            },
            Err(e) => {
                crate::log(&format!(
                    "Failed to read config.json: {}. Using defaults.",
                    e
                ));
                AppConfig::default()
            }
        }
    } else {
        crate::log("config.json not found. Using default config.");
        AppConfig::default()
    };

    config.apply_env_overrides(|key| std::env::var(key).ok());
    config
}

/// Initializes the global configuration. Call once at startup.
pub fn init_config() {
    let _ = CONFIG.set(load_config());
}

/// Returns the global configuration, loading it on first use.
pub fn get_config() -> &'static AppConfig {
    CONFIG.get_or_init(load_config)
}
