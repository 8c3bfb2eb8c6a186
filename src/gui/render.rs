//! GUI rendering functions.
//!
//! Each function draws one section and reports which buttons were clicked.

use eframe::egui::{self, Color32, RichText};

use super::state::{GuiState, Tab};

/// Render the tab selector.
pub fn render_tabs(ui: &mut egui::Ui, state: &mut GuiState) {
    ui.horizontal(|ui| {
        for tab in Tab::ALL {
            ui.selectable_value(&mut state.tab, tab, tab.title());
        }
    });
    ui.separator();
    ui.add_space(8.0);
}

fn path_list(ui: &mut egui::Ui, label: &str, hint: &str, text: &mut String) {
    ui.label(label);
    ui.add(
        egui::TextEdit::multiline(text)
            .hint_text(hint)
            .desired_rows(4)
            .desired_width(f32::INFINITY),
    );
}

fn start_button(ui: &mut egui::Ui, enabled: bool, text: &str) -> bool {
    let mut clicked = false;
    ui.add_enabled_ui(enabled, |ui| {
        if ui.button(RichText::new(text).size(16.0)).clicked() {
            clicked = true;
        }
    });
    clicked
}

/// Capture CAD tab. Returns (capture_clicked, clear_clicked).
pub fn render_cad_tab(ui: &mut egui::Ui, state: &mut GuiState, idle: bool) -> (bool, bool) {
    path_list(
        ui,
        "Drawing files (one per line):",
        "C:\\jobs\\bracket.dwg",
        &mut state.drawing_paths,
    );
    ui.add_space(8.0);
    ui.label(format!("Captured drawings: {}", state.counts.0));
    ui.add_space(8.0);

    let mut capture = false;
    let mut clear = false;
    ui.horizontal(|ui| {
        capture = start_button(ui, idle && !state.drawing_paths.trim().is_empty(), "▶ Capture");
        ui.add_space(20.0);
        clear = start_button(ui, idle && state.counts != (0, 0), "Clear captures");
    });
    (capture, clear)
}

/// Capture 3D Model tab. Returns true when capture was clicked.
pub fn render_model_tab(ui: &mut egui::Ui, state: &mut GuiState, idle: bool) -> bool {
    ui.label("Model file (optional, otherwise open it in the application when prompted):");
    ui.add(
        egui::TextEdit::singleline(&mut state.model_path)
            .hint_text("C:\\jobs\\housing.prt")
            .desired_width(f32::INFINITY),
    );
    ui.add_space(8.0);
    ui.label(
        RichText::new("Each view is captured after a countdown. Keep the model window in front.")
            .color(Color32::GRAY),
    );
    ui.label(format!("Captured models: {}", state.counts.1));
    ui.add_space(8.0);
    start_button(ui, idle, "▶ Capture new model")
}

/// Wear Analysis tab. Returns true when analysis was clicked.
pub fn render_wear_tab(ui: &mut egui::Ui, state: &mut GuiState, idle: bool) -> bool {
    path_list(
        ui,
        "Wear images (one per line):",
        "C:\\jobs\\pad_wear.png",
        &mut state.wear_paths,
    );
    ui.add_space(8.0);
    start_button(ui, idle && !state.wear_paths.trim().is_empty(), "▶ Analyse")
}

/// Generate Reports tab. Returns true when generation was clicked.
pub fn render_reports_tab(ui: &mut egui::Ui, state: &mut GuiState, idle: bool) -> bool {
    ui.horizontal(|ui| {
        ui.label("Report title:");
        ui.text_edit_singleline(&mut state.report_title);
    });
    ui.add_space(8.0);
    path_list(
        ui,
        "Specification PDFs and design spreadsheets (one per line):",
        "C:\\jobs\\brief.pdf",
        &mut state.document_paths,
    );
    ui.add_space(8.0);

    egui::CollapsingHeader::new("Executable paths").show(ui, |ui| {
        egui::Grid::new("executables").num_columns(2).show(ui, |ui| {
            ui.label("AutoCAD:");
            ui.text_edit_singleline(&mut state.autocad_executable);
            ui.end_row();
            ui.label("NX:");
            ui.text_edit_singleline(&mut state.nx_executable);
            ui.end_row();
        });
        ui.label(
            RichText::new("Leave blank to use config.json or the default install locations.")
                .color(Color32::GRAY),
        );
    });
    ui.add_space(8.0);

    let (drawings, models) = state.counts;
    ui.label(format!("CAD drawings: {}   3D models: {}", drawings, models));
    ui.add_space(8.0);
    start_button(ui, idle, "▶ Generate PDF and PPTX")
}

/// Render the status line and progress indicator.
pub fn render_progress(
    ui: &mut egui::Ui,
    running: bool,
    step: &str,
    start_error: Option<&str>,
) {
    ui.add_space(8.0);
    ui.separator();
    ui.add_space(8.0);

    ui.horizontal(|ui| {
        ui.label("Status:");
        if running {
            ui.spinner();
            let text = if step.is_empty() { "Working..." } else { step };
            ui.label(RichText::new(text).color(Color32::from_rgb(0, 120, 200)));
        } else {
            ui.label(RichText::new("Idle").color(Color32::GRAY));
        }
    });

    if let Some(error) = start_error {
        ui.label(RichText::new(error).color(Color32::from_rgb(200, 0, 0)));
    }
}

/// Render the event log. Returns true when "Open folder" was clicked.
pub fn render_events(ui: &mut egui::Ui, events: &[String], has_output: bool) -> bool {
    ui.add_space(8.0);
    ui.separator();
    ui.add_space(8.0);

    let mut open_clicked = false;
    ui.horizontal(|ui| {
        ui.label(RichText::new("Events").strong());
        ui.add_enabled_ui(has_output, |ui| {
            if ui.button("📁 Open folder").clicked() {
                open_clicked = true;
            }
        });
    });

    egui::ScrollArea::vertical()
        .max_height(160.0)
        .stick_to_bottom(true)
        .show(ui, |ui| {
            for event in events {
                let color = if event.contains("failed") {
                    Color32::from_rgb(200, 0, 0)
                } else {
                    Color32::GRAY
                };
                ui.label(RichText::new(event).color(color).monospace());
            }
        });

    open_clicked
}
