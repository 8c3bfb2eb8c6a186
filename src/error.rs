//! Error types for the capture, extraction and report pipelines.
//!
//! The taxonomy follows how each failure is handled:
//! - environment errors (missing executable, missing branding asset) abort the operation
//! - timing errors (application never presented its window) abort the capture
//! - extraction errors are reported per file and never abort a report
//! - cleanup errors are logged by the driver and never returned

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the external application driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// No executable at the configured path or any search pattern.
    #[error("{integration}: executable not found (searched: {})", .searched.join(", "))]
    ExecutableNotFound {
        integration: String,
        searched: Vec<String>,
    },

    /// The file to open does not exist.
    #[error("target file not found: {}", .0.display())]
    TargetNotFound(PathBuf),

    /// Spawning the process failed.
    #[error("failed to launch {}: {source}", .executable.display())]
    LaunchFailed {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The expected window never appeared.
    #[error("{integration}: no window titled \"{title}\" after {waited_ms}ms")]
    ReadinessTimeout {
        integration: String,
        title: String,
        waited_ms: u64,
    },

    /// The configured crop rectangle is not a valid fraction of the frame.
    #[error("invalid crop for {integration}: {source}")]
    InvalidCrop {
        integration: String,
        #[source]
        source: CropError,
    },

    /// A desktop operation (focus, keystrokes, capture) failed.
    #[error("{integration}: {step} failed: {source}")]
    Desktop {
        integration: String,
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl DriverError {
    /// Environment errors are raised before any process is started.
    pub fn is_environment(&self) -> bool {
        matches!(
            self,
            DriverError::ExecutableNotFound { .. }
                | DriverError::TargetNotFound(_)
                | DriverError::InvalidCrop { .. }
        )
    }
}

/// Per-file document extraction failures.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{}: unsupported file type", .0.display())]
    UnsupportedType(PathBuf),

    #[error("{}: unreadable PDF: {source}", .path.display())]
    Pdf {
        path: PathBuf,
        #[source]
        source: lopdf::Error,
    },

    #[error("{}: PDF is encrypted", .0.display())]
    EncryptedPdf(PathBuf),

    #[error("{}: unreadable spreadsheet: {source}", .path.display())]
    Spreadsheet {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("{}: workbook has no sheets", .0.display())]
    EmptyWorkbook(PathBuf),
}

/// Invalid crop ratios.
#[derive(Debug, Error, PartialEq)]
pub enum CropError {
    #[error("crop ratios out of range: left={left} top={top} right={right} bottom={bottom}")]
    InvalidRatios {
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
    },
}

/// Report assembly failures.
#[derive(Debug, Error)]
pub enum ReportError {
    /// A required branding asset is missing or unreadable.
    #[error("branding asset {}: {reason}", .path.display())]
    MissingAsset { path: PathBuf, reason: String },
}

/// Configuration lookups.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("no integration named \"{0}\" in config")]
    UnknownIntegration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_classification() {
        let missing = DriverError::ExecutableNotFound {
            integration: "autocad".to_string(),
            searched: vec!["C:/x/acad.exe".to_string()],
        };
        assert!(missing.is_environment());
        assert!(missing.to_string().contains("C:/x/acad.exe"));

        let timeout = DriverError::ReadinessTimeout {
            integration: "nx".to_string(),
            title: "NX".to_string(),
            waited_ms: 1000,
        };
        assert!(!timeout.is_environment());
    }
}
