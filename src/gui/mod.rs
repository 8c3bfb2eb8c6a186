//! GUI module for the application.
//!
//! A tabbed egui/eframe window. Every button starts one runner action; the
//! window polls the runner for progress while it works.

pub mod render;
pub mod state;

use eframe::egui::{self, Vec2};

use crate::session::runner::{self, Action};

use state::{GuiState, Tab};

/// Main GUI application struct.
pub struct GuiApp {
    state: GuiState,
}

impl GuiApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        Self {
            state: GuiState {
                report_title: crate::config::get_config().report.title.clone(),
                ..Default::default()
            },
        }
    }

    fn start(&mut self, action: Action) {
        match runner::start(action, &self.state.executable_overrides()) {
            Ok(()) => self.state.start_error = None,
            Err(e) => {
                crate::log(&format!("GUI: Failed to start action: {:#}", e));
                self.state.start_error = Some(format!("{:#}", e));
            }
        }
    }

    /// Open the last output folder in Windows Explorer.
    fn handle_open_folder(&self) {
        if let Some(path) = runner::last_output() {
            if let Err(e) = std::process::Command::new("explorer").arg(&path).spawn() {
                crate::log(&format!("GUI: Failed to open folder: {}", e));
            }
        }
    }
}

impl eframe::App for GuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let running = runner::is_running();
        if let Some(counts) = runner::capture_counts() {
            self.state.counts = counts;
        }

        // Keep polling while an action runs
        if running {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("CAD Report Builder");
            ui.add_space(8.0);

            render::render_tabs(ui, &mut self.state);

            let idle = !running;
            let mut action = None;
            egui::ScrollArea::vertical()
                .id_salt("tab_content")
                .max_height((ui.available_height() - 240.0).max(120.0))
                .show(ui, |ui| match self.state.tab {
                    Tab::CaptureCad => {
                        let (capture, clear) = render::render_cad_tab(ui, &mut self.state, idle);
                        if capture {
                            action = Some(self.state.capture_drawings_action());
                        } else if clear {
                            action = Some(Action::ClearCaptures);
                        }
                    }
                    Tab::CaptureModel => {
                        if render::render_model_tab(ui, &mut self.state, idle) {
                            action = Some(self.state.capture_model_action());
                        }
                    }
                    Tab::WearAnalysis => {
                        if render::render_wear_tab(ui, &mut self.state, idle) {
                            action = Some(self.state.wear_action());
                        }
                    }
                    Tab::GenerateReports => {
                        if render::render_reports_tab(ui, &mut self.state, idle) {
                            action = Some(self.state.generate_action());
                        }
                    }
                });

            if let Some(action) = action {
                self.start(action);
            }

            let step = runner::current_step();
            render::render_progress(ui, running, &step, self.state.start_error.as_deref());

            let events = runner::events();
            if render::render_events(ui, &events, runner::last_output().is_some()) {
                self.handle_open_folder();
            }
        });
    }
}

/// Run the GUI application.
/// This function blocks until the window is closed.
pub fn run_gui() -> eframe::Result<()> {
    crate::log("GUI: Creating native options...");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(Vec2::new(720.0, 640.0))
            .with_min_inner_size(Vec2::new(520.0, 480.0))
            .with_title("CAD Report Builder")
            // Drag-and-drop registers OLE, which conflicts with the multithreaded RoInitialize
            .with_drag_and_drop(false),
        ..Default::default()
    };

    eframe::run_native(
        "CAD Report Builder",
        options,
        Box::new(|cc| {
            crate::log("GUI: Creating GuiApp instance...");
            Ok(Box::new(GuiApp::new(cc)))
        }),
    )
}
