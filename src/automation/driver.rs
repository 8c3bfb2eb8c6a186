//! Launch, drive, capture and close one external application.
//!
//! The sequence for a single run:
//! 1. Resolve the executable and check the target file (no process yet)
//! 2. Spawn the process and wait for its main window
//! 3. Focus, maximize and send the configured command keys
//! 4. Capture (one labelled image, or one per configured view)
//! 5. Close the window, force-killing the process if it lingers
//!
//! Any failure after the spawn terminates the process before returning.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::automation::discovery::resolve_executable;
use crate::capture::{self, content_bounds, CaptureScope, CapturedImage};
use crate::config::{IntegrationConfig, ViewStep};
use crate::desktop::{AppProcess, Desktop, WindowHandle};
use crate::error::DriverError;

/// Pixel channel value at or above which a pixel counts as background
/// when trimming drawings.
const WHITE_THRESHOLD: u8 = 240;
/// Margins kept around trimmed content (pixels).
const TRIM_MARGIN_X: u32 = 20;
const TRIM_MARGIN_Y: u32 = 10;

/// One capture request, built per file and consumed by [`launch_and_drive`].
#[derive(Clone, Debug)]
pub struct CaptureTask<'a> {
    /// Integration name, used in logs and errors
    pub name: String,
    pub target: Option<PathBuf>,
    /// Substring of the window title that signals the application is up
    pub window_title: String,
    /// Fixed wait after launch before polling for the window
    pub startup_wait_ms: u64,
    pub integration: &'a IntegrationConfig,
}

impl<'a> CaptureTask<'a> {
    pub fn new(name: &str, integration: &'a IntegrationConfig, target: Option<&Path>) -> Self {
        Self {
            name: name.to_string(),
            target: target.map(Path::to_path_buf),
            window_title: integration.window_title.clone(),
            startup_wait_ms: integration.startup_wait_ms,
            integration,
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Default)]
pub struct DriveOutcome {
    /// One image in single mode, one per view in multi-view mode
    pub images: Vec<CapturedImage>,
    /// Non-fatal problems: capture fallbacks, forced termination
    pub warnings: Vec<String>,
    /// The process ignored the close request and was killed
    pub forced_termination: bool,
}

/// Kills the process on drop unless the run closed it.
struct ProcessGuard {
    process: Box<dyn AppProcess>,
    name: String,
    done: bool,
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        crate::log(&format!(
            "{}: terminating process {} after failed run",
            self.name,
            self.process.id()
        ));
        if let Err(e) = self.process.kill() {
            crate::log(&format!("{}: failed to terminate process: {}", self.name, e));
        }
    }
}

/// Runs the whole launch → wait → act → capture → close sequence.
///
/// `progress` receives a short description of each step.
pub fn launch_and_drive(
    desktop: &dyn Desktop,
    task: CaptureTask<'_>,
    progress: &dyn Fn(&str),
) -> Result<DriveOutcome, DriverError> {
    let name = task.name.as_str();
    let integration = task.integration;
    let target = task.target.as_deref();

    integration
        .crop
        .validate()
        .map_err(|source| DriverError::InvalidCrop {
            integration: name.to_string(),
            source,
        })?;

    let executable = resolve_executable(name, integration)?;
    if let Some(target) = target {
        if !target.exists() {
            return Err(DriverError::TargetNotFound(target.to_path_buf()));
        }
    }

    let step = |msg: String| {
        crate::log(&format!("{}: {}", name, msg));
        progress(&msg);
    };

    step(format!("Launching {}", executable.display()));
    let args: Vec<&OsStr> = target.map(|t| t.as_os_str()).into_iter().collect();
    let process = desktop
        .launch(&executable, &args)
        .map_err(|source| DriverError::LaunchFailed {
            executable: executable.clone(),
            source,
        })?;
    let mut guard = ProcessGuard {
        process,
        name: name.to_string(),
        done: false,
    };

    step(format!(
        "Waiting {} ms for the application to start",
        task.startup_wait_ms
    ));
    let window = wait_for_window(desktop, &task)?;

    let desktop_err = |what: &'static str| {
        let integration = name.to_string();
        move |source: anyhow::Error| DriverError::Desktop {
            integration,
            step: what,
            source,
        }
    };

    step("Focusing and maximizing the window".to_string());
    desktop.focus(window).map_err(desktop_err("focus"))?;
    desktop.maximize(window).map_err(desktop_err("maximize"))?;
    pause(integration.settle_ms);

    if !integration.commands.is_empty() {
        step("Sending commands".to_string());
        desktop
            .send_keys(&integration.commands)
            .map_err(desktop_err("send commands"))?;
    }
    pause(integration.render_wait_ms);

    let mut outcome = DriveOutcome::default();

    if integration.views.is_empty() {
        let label = target
            .and_then(|t| t.file_stem())
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| name.to_string());
        step(format!("Capturing {}", label));
        let image = capture_view(desktop, &task, &label, &mut outcome.warnings)
            .map_err(desktop_err("capture"))?;
        outcome.images.push(image);
    } else {
        step("Open the model view in the application; captures follow".to_string());
        for view in &integration.views {
            countdown(view, integration.view_countdown_ms, &step);
            desktop.focus(window).map_err(desktop_err("focus"))?;
            if !view.keys.is_empty() {
                desktop
                    .send_keys(&view.keys)
                    .map_err(desktop_err("send view keys"))?;
            }
            pause(integration.settle_ms);
            step(format!("Capturing {} view", view.label));
            let image = capture_view(desktop, &task, &view.label, &mut outcome.warnings)
                .map_err(desktop_err("capture"))?;
            outcome.images.push(image);
        }
    }

    step("Closing the application".to_string());
    if let Some(warning) = close(desktop, window, integration, &mut guard) {
        outcome.forced_termination = true;
        outcome.warnings.push(format!("{}: {}", name, warning));
    }

    Ok(outcome)
}

/// Blocks for the fixed startup wait, then polls for the window.
fn wait_for_window(desktop: &dyn Desktop, task: &CaptureTask<'_>) -> Result<WindowHandle, DriverError> {
    let name = task.name.as_str();
    let integration = task.integration;
    pause(task.startup_wait_ms);

    let start = Instant::now();
    let timeout = Duration::from_millis(integration.ready_timeout_ms);
    loop {
        let found = desktop
            .find_window(&task.window_title)
            .map_err(|source| DriverError::Desktop {
                integration: name.to_string(),
                step: "find window",
                source,
            })?;
        if let Some(window) = found {
            crate::log(&format!(
                "{}: window ready after {} ms of polling",
                name,
                start.elapsed().as_millis()
            ));
            return Ok(window);
        }
        if start.elapsed() >= timeout {
            return Err(DriverError::ReadinessTimeout {
                integration: name.to_string(),
                title: task.window_title.clone(),
                waited_ms: task.startup_wait_ms + start.elapsed().as_millis() as u64,
            });
        }
        pause(integration.poll_interval_ms.max(1));
    }
}

fn countdown(view: &ViewStep, total_ms: u64, step: &dyn Fn(String)) {
    let mut remaining = total_ms;
    while remaining > 0 {
        step(format!(
            "{} view: capturing in {} s",
            view.label,
            remaining.div_ceil(1000)
        ));
        let slice = remaining.min(1000);
        pause(slice);
        remaining -= slice;
    }
}

/// Captures, attaches the configured crop and optionally trims white margins.
fn capture_view(
    desktop: &dyn Desktop,
    task: &CaptureTask<'_>,
    label: &str,
    warnings: &mut Vec<String>,
) -> anyhow::Result<CapturedImage> {
    let integration = task.integration;
    let title = integration
        .capture_window
        .then_some(task.window_title.as_str());
    let raw = capture::capture(desktop, title)?;
    if let CaptureScope::FullScreenFallback { requested } = &raw.scope {
        warnings.push(format!(
            "{}: window \"{}\" not found, captured the full screen",
            label, requested
        ));
    }

    let mut crop = integration.crop;
    if integration.trim_whitespace {
        let cropped = capture::crop(&raw.image, &crop)?;
        let inner = content_bounds(&cropped, WHITE_THRESHOLD, TRIM_MARGIN_X, TRIM_MARGIN_Y);
        crop = crop.compose(&inner);
    }

    Ok(CapturedImage::new(raw.image, crop, label))
}

/// Requests a graceful close and force-kills on timeout.
///
/// Returns a warning when the process had to be killed. Cleanup failures are
/// logged, never returned as errors.
fn close(
    desktop: &dyn Desktop,
    window: WindowHandle,
    integration: &IntegrationConfig,
    guard: &mut ProcessGuard,
) -> Option<String> {
    guard.done = true;

    if let Err(e) = desktop.request_close(window) {
        crate::log(&format!("{}: close request failed: {}", guard.name, e));
    }
    if !integration.close_keys.is_empty() {
        pause(integration.settle_ms);
        if let Err(e) = desktop.send_keys(&integration.close_keys) {
            crate::log(&format!("{}: close keys failed: {}", guard.name, e));
        }
    }

    let start = Instant::now();
    let timeout = Duration::from_millis(integration.close_timeout_ms);
    loop {
        match guard.process.has_exited() {
            Ok(true) => return None,
            Ok(false) => {}
            Err(e) => {
                crate::log(&format!("{}: {}", guard.name, e));
                break;
            }
        }
        if start.elapsed() >= timeout {
            break;
        }
        pause(integration.poll_interval_ms.max(1));
    }

    let warning = format!(
        "process {} did not exit within {} ms and was terminated",
        guard.process.id(),
        integration.close_timeout_ms
    );
    crate::log(&format!("{}: {}", guard.name, warning));
    if let Err(e) = guard.process.kill() {
        crate::log(&format!("{}: failed to terminate process: {}", guard.name, e));
    }
    Some(warning)
}

fn pause(ms: u64) {
    if ms > 0 {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CropRatios;
    use crate::config::KeyAction;
    use crate::desktop::fake::{Call, FakeDesktop};
    use image::{Rgba, RgbaImage};
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// White frame with a dark block in the middle.
    fn drawing_frame() -> RgbaImage {
        let mut img = RgbaImage::from_pixel(400, 200, Rgba([255, 255, 255, 255]));
        for x in 180..220 {
            for y in 90..110 {
                img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        img
    }

    fn fast_integration(dir: &TempDir) -> IntegrationConfig {
        let exe = dir.path().join("acad.exe");
        std::fs::write(&exe, b"MZ").unwrap();
        IntegrationConfig {
            executable: Some(exe),
            window_title: "AutoCAD".to_string(),
            startup_wait_ms: 0,
            poll_interval_ms: 1,
            ready_timeout_ms: 20,
            settle_ms: 0,
            render_wait_ms: 0,
            view_countdown_ms: 0,
            close_timeout_ms: 0,
            commands: vec![KeyAction::Text("zoom\n".to_string())],
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_executable_fails_fast_without_capture() {
        let desktop = FakeDesktop::new(drawing_frame());
        let integration = IntegrationConfig {
            executable: Some("/definitely/not/here/acad.exe".into()),
            search_patterns: vec!["/definitely/not/here/AutoCAD*/acad.exe".to_string()],
            window_title: "AutoCAD".to_string(),
            ..Default::default()
        };

        let start = Instant::now();
        let err = drive(&desktop, "autocad", &integration, None).unwrap_err();
        assert!(err.is_environment());
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(desktop.calls().is_empty());
        assert!(!desktop.captured_anything());
    }

    fn drive(
        desktop: &FakeDesktop,
        name: &str,
        integration: &IntegrationConfig,
        target: Option<&Path>,
    ) -> Result<DriveOutcome, DriverError> {
        launch_and_drive(desktop, CaptureTask::new(name, integration, target), &|_| {})
    }

    #[test]
    fn test_task_carries_window_signature_and_wait() {
        let dir = tempfile::tempdir().unwrap();
        let desktop = FakeDesktop::new(drawing_frame());
        let integration = fast_integration(&dir);
        let target = dir.path().join("bracket.dwg");

        let mut task = CaptureTask::new("autocad", &integration, Some(&target));
        assert_eq!(task.window_title, "AutoCAD");
        assert_eq!(task.startup_wait_ms, 0);
        assert_eq!(task.target.as_deref(), Some(target.as_path()));

        // The task's signature is what gets polled, not the config's
        task.window_title = "AutoCAD 2024".to_string();
        task.target = None;
        launch_and_drive(&desktop, task, &|_| {}).unwrap();
        assert!(desktop.count(&Call::FindWindow("AutoCAD 2024".to_string())) >= 1);
        assert_eq!(desktop.count(&Call::FindWindow("AutoCAD".to_string())), 0);
    }

    #[test]
    fn test_missing_target_file() {
        let dir = tempfile::tempdir().unwrap();
        let desktop = FakeDesktop::new(drawing_frame());
        let integration = fast_integration(&dir);
        let target = dir.path().join("missing.dwg");

        let err = drive(&desktop, "autocad", &integration, Some(&target)).unwrap_err();
        assert!(matches!(err, DriverError::TargetNotFound(_)));
        assert!(desktop.calls().is_empty());
    }

    #[test]
    fn test_single_capture_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("bracket.dwg");
        std::fs::write(&target, b"AC1032").unwrap();
        let desktop = FakeDesktop::new(drawing_frame());
        let integration = fast_integration(&dir);
        let steps = RefCell::new(Vec::new());

        let task = CaptureTask::new("autocad", &integration, Some(&target));
        let outcome =
            launch_and_drive(&desktop, task, &|s| steps.borrow_mut().push(s.to_string())).unwrap();

        assert_eq!(outcome.images.len(), 1);
        assert_eq!(outcome.images[0].label, "bracket");
        assert!(outcome.warnings.is_empty());
        assert!(!outcome.forced_termination);
        assert!(!steps.borrow().is_empty());

        let calls = desktop.calls();
        let order: Vec<&Call> = calls
            .iter()
            .filter(|c| !matches!(c, Call::FindWindow(_)))
            .collect();
        assert!(matches!(order[0], Call::Launch(_)));
        assert_eq!(order[1], &Call::Focus);
        assert_eq!(order[2], &Call::Maximize);
        assert_eq!(
            order[3],
            &Call::Keys(vec![KeyAction::Text("zoom\n".to_string())])
        );
        assert_eq!(order[4], &Call::CaptureWindow);
        assert_eq!(order[5], &Call::RequestClose);
        assert_eq!(desktop.count(&Call::Kill), 0);
    }

    #[test]
    fn test_trim_composes_onto_crop() {
        let dir = tempfile::tempdir().unwrap();
        let desktop = FakeDesktop::new(drawing_frame());
        let integration = IntegrationConfig {
            crop: CropRatios::new(0.25, 0.0, 0.75, 1.0),
            trim_whitespace: true,
            ..fast_integration(&dir)
        };

        let outcome = drive(&desktop, "autocad", &integration, None).unwrap();
        let image = &outcome.images[0];
        // Untouched frame is kept; only the crop changes
        assert_eq!(image.pixels.dimensions(), (400, 200));
        // Block 180..220 x 90..110 plus 20/10 px margins
        let (x, y, w, h) = image.crop.to_pixels(400, 200);
        assert_eq!((x, y, w, h), (160, 80, 80, 40));
    }

    #[test]
    fn test_readiness_timeout_terminates_process() {
        let dir = tempfile::tempdir().unwrap();
        let mut desktop = FakeDesktop::new(drawing_frame());
        desktop.window_after = None;
        let integration = fast_integration(&dir);

        let err = drive(&desktop, "autocad", &integration, None).unwrap_err();
        assert!(matches!(err, DriverError::ReadinessTimeout { .. }));
        assert!(!err.is_environment());
        assert_eq!(desktop.count(&Call::Kill), 1);
        assert!(!desktop.captured_anything());
    }

    #[test]
    fn test_window_found_after_polling() {
        let dir = tempfile::tempdir().unwrap();
        let mut desktop = FakeDesktop::new(drawing_frame());
        desktop.window_after = Some(3);
        let integration = IntegrationConfig {
            ready_timeout_ms: 5000,
            ..fast_integration(&dir)
        };

        let outcome = drive(&desktop, "autocad", &integration, None).unwrap();
        assert_eq!(outcome.images.len(), 1);
        assert!(desktop.count(&Call::FindWindow("AutoCAD".to_string())) >= 4);
    }

    #[test]
    fn test_multi_view_and_forced_close() {
        let dir = tempfile::tempdir().unwrap();
        let mut desktop = FakeDesktop::new(drawing_frame());
        desktop.closes_cleanly = false;
        let fit = vec![KeyAction::Text("f".to_string())];
        let integration = IntegrationConfig {
            capture_window: false,
            views: ["Top", "Front", "Isometric"]
                .into_iter()
                .map(|label| ViewStep {
                    label: label.to_string(),
                    keys: fit.clone(),
                })
                .collect(),
            close_keys: vec![KeyAction::Text("n".to_string())],
            ..fast_integration(&dir)
        };

        let outcome = drive(&desktop, "nx", &integration, None).unwrap();
        let labels: Vec<_> = outcome.images.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["Top", "Front", "Isometric"]);
        assert_eq!(desktop.count(&Call::CaptureScreen), 3);
        assert_eq!(desktop.count(&Call::Keys(fit)), 3);
        assert_eq!(
            desktop.count(&Call::Keys(vec![KeyAction::Text("n".to_string())])),
            1
        );

        // Cleanup problems surface as warnings, not errors
        assert_eq!(desktop.count(&Call::Kill), 1);
        assert!(outcome.forced_termination);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("terminated"));
    }
}
