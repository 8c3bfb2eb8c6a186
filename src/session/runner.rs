//! Background runner for session actions.
//!
//! One action runs at a time on a worker thread. The GUI polls the running
//! flag, the current step text and the event log.

use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;

use super::{analyze_wear, GenerateRequest, Session};
use crate::config::{get_config, AppConfig, AUTOCAD, NX};
use crate::desktop::{self, Desktop};

/// Global flag indicating if an action is currently running.
static RUNNING: AtomicBool = AtomicBool::new(false);

/// Current step description (for GUI progress display).
static CURRENT_STEP: Mutex<String> = Mutex::new(String::new());

/// Recent events, oldest first.
static EVENTS: Mutex<Vec<String>> = Mutex::new(Vec::new());

/// Folder or file produced by the last successful action.
static LAST_OUTPUT: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Captures shared between actions.
static SESSION: Mutex<Session> = Mutex::new(Session::new());

const MAX_EVENTS: usize = 200;

/// Something the user asked for.
#[derive(Clone, Debug)]
pub enum Action {
    CaptureDrawings(Vec<PathBuf>),
    CaptureModel(Option<PathBuf>),
    AnalyzeWear(Vec<PathBuf>),
    Generate(GenerateRequest),
    ClearCaptures,
}

impl Action {
    fn describe(&self) -> &'static str {
        match self {
            Action::CaptureDrawings(_) => "CAD capture",
            Action::CaptureModel(_) => "3D model capture",
            Action::AnalyzeWear(_) => "Wear analysis",
            Action::Generate(_) => "Report generation",
            Action::ClearCaptures => "Clear captures",
        }
    }
}

/// Checks if an action is currently running.
pub fn is_running() -> bool {
    RUNNING.load(Ordering::SeqCst)
}

/// Gets the current step description.
pub fn current_step() -> String {
    CURRENT_STEP
        .lock()
        .map(|s| s.clone())
        .unwrap_or_default()
}

fn set_step(desc: &str) {
    if let Ok(mut s) = CURRENT_STEP.lock() {
        *s = desc.to_string();
    }
}

/// Gets the event log.
pub fn events() -> Vec<String> {
    EVENTS.lock().map(|e| e.clone()).unwrap_or_default()
}

/// Logs a message and appends it to the event log.
pub fn record(msg: &str) {
    crate::log(msg);
    if let Ok(mut events) = EVENTS.lock() {
        events.push(format!("{} {}", chrono::Local::now().format("%H:%M:%S"), msg));
        let excess = events.len().saturating_sub(MAX_EVENTS);
        events.drain(..excess);
    }
}

/// Gets the output of the last successful action.
pub fn last_output() -> Option<PathBuf> {
    LAST_OUTPUT.lock().ok().and_then(|p| p.clone())
}

fn set_last_output(path: PathBuf) {
    if let Ok(mut p) = LAST_OUTPUT.lock() {
        *p = Some(path);
    }
}

fn session() -> MutexGuard<'static, Session> {
    // A panicked action leaves the captures as they were
    SESSION.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Number of captured drawings and model groups, or `None` while an action
/// holds the session.
pub fn capture_counts() -> Option<(usize, usize)> {
    let session = SESSION.try_lock().ok()?;
    Some((session.drawings.len(), session.models.len()))
}

/// Clears the running flag when dropped.
struct RunningGuard;

impl Drop for RunningGuard {
    fn drop(&mut self) {
        set_step("");
        RUNNING.store(false, Ordering::SeqCst);
    }
}

fn begin() -> Result<RunningGuard> {
    if RUNNING.swap(true, Ordering::SeqCst) {
        return Err(anyhow!("Another action is already running"));
    }
    Ok(RunningGuard)
}

/// Starts an action on a background thread.
///
/// `executables` overrides integration executables for this run only.
///
/// # Errors
/// Returns an error if another action is running or an override names an
/// unknown integration.
pub fn start(action: Action, executables: &BTreeMap<String, PathBuf>) -> Result<()> {
    let guard = begin()?;

    let mut config = get_config().clone();
    for (name, path) in executables {
        config.set_executable(name, path.clone())?;
    }

    record(&format!("{} started", action.describe()));
    thread::spawn(move || {
        let _guard = guard;
        let desktop = desktop::native();
        let name = action.describe();
        match execute(action, &mut session(), desktop.as_ref(), &config) {
            Ok(summary) => record(&format!("{} finished: {}", name, summary)),
            Err(e) => record(&format!("{} failed: {:#}", name, e)),
        }
    });
    Ok(())
}

/// Runs one action to completion. Returns a one-line summary.
fn execute(
    action: Action,
    session: &mut Session,
    desktop: &dyn Desktop,
    config: &AppConfig,
) -> Result<String> {
    let progress = |msg: &str| set_step(msg);

    match action {
        Action::CaptureDrawings(files) => {
            let integration = config.integration(AUTOCAD)?;
            let summary = session.capture_drawings(desktop, integration, &files, &progress);
            for warning in &summary.warnings {
                record(warning);
            }
            Ok(format!(
                "{} of {} drawing(s) captured, {} in session",
                summary.succeeded,
                files.len(),
                session.drawings.len()
            ))
        }
        Action::CaptureModel(target) => {
            let integration = config.integration(NX)?;
            let summary =
                session.capture_model(desktop, integration, target.as_deref(), &progress)?;
            for warning in &summary.warnings {
                record(warning);
            }
            Ok(format!(
                "{} view(s) captured, {} model(s) in session",
                summary.succeeded,
                session.models.len()
            ))
        }
        Action::AnalyzeWear(images) => {
            let out_dir = config.output_dir().join("wear");
            progress(&format!("Analysing {} image(s)", images.len()));
            let (reports, warnings) = analyze_wear(&images, config, &out_dir);
            for warning in &warnings {
                record(warning);
            }
            for report in &reports {
                record(&format!(
                    "{}: {} region(s), {:.2}% coverage",
                    report.source.display(),
                    report.boundaries.len(),
                    report.coverage_percent
                ));
            }
            if !reports.is_empty() {
                set_last_output(out_dir);
            }
            Ok(format!("{} of {} image(s) analysed", reports.len(), images.len()))
        }
        Action::Generate(request) => {
            progress("Extracting documents and building the report");
            let report = session.generate(
                &request,
                config,
                crate::paths::get_exe_dir(),
                &config.output_dir(),
            )?;
            for warning in &report.warnings {
                record(warning);
            }
            set_last_output(report.folder.clone());
            Ok(format!(
                "{} page(s) written to {}",
                report.pages,
                report.folder.display()
            ))
        }
        Action::ClearCaptures => {
            session.clear();
            Ok("session cleared".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::fake::FakeDesktop;
    use image::RgbaImage;

    #[test]
    fn test_only_one_action_at_a_time() {
        let guard = begin().unwrap();
        assert!(is_running());
        assert!(begin().is_err());
        drop(guard);
        assert!(!is_running());
        assert!(begin().is_ok());
    }

    #[test]
    fn test_capture_with_unknown_executable_fails_without_touching_session() {
        let mut config = AppConfig::default();
        config
            .set_executable(NX, PathBuf::from("/definitely/not/here/ugraf.exe"))
            .unwrap();
        if let Some(nx) = config.integrations.get_mut(NX) {
            nx.search_patterns.clear();
        }
        let desktop = FakeDesktop::new(RgbaImage::new(10, 10));
        let mut session = Session::new();

        let err = execute(Action::CaptureModel(None), &mut session, &desktop, &config).unwrap_err();
        assert!(err.to_string().contains("executable not found"));
        assert!(session.models.is_empty());
        assert!(desktop.calls().is_empty());
    }

    #[test]
    fn test_record_keeps_recent_events() {
        for i in 0..(MAX_EVENTS + 5) {
            record(&format!("event {}", i));
        }
        let events = events();
        assert!(events.len() <= MAX_EVENTS);
        assert!(events.last().unwrap().ends_with(&format!("event {}", MAX_EVENTS + 4)));
    }
}
