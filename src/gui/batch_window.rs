/// Batch processing window
///
/// Lets the user pick calibration file(s), the analyte file and the batch
/// folder, choose outputs, and start or cancel a run. Selection and run
/// logic live in [`BatchSession`]; this module only draws and reports
/// which button was pressed.

use crate::gui::progress_panel;
use crate::pipeline::session::BatchSession;

/// State for the batch window
#[derive(Default)]
pub struct BatchWindowState {
    pub open: bool,
    pub session: BatchSession,
    /// Paths typed by the user; empty means "ask with a dialog"
    pub calibration_hint: String,
    pub analyte_hint: String,
    pub folder_hint: String,
    pub output_window_open: bool,
}

impl BatchWindowState {
    /// Open a fresh window. A previous session is closed first.
    pub fn open_new(&mut self) {
        self.session.close();
        *self = Self {
            open: true,
            ..Default::default()
        };
    }

    /// Close the window, cancelling any run. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.session.close();
        self.open = false;
        self.output_window_open = false;
    }
}

/// Actions from the batch window
#[derive(Debug, Clone, PartialEq)]
pub enum BatchAction {
    None,
    SelectCalibrationFile,
    SelectCalibrationFiles,
    ClearCalibration,
    SelectAnalyteFile,
    SelectBatchFolder,
    OpenOutputOptions,
    LoadPreset,
    SavePreset,
    Run,
    Cancel,
    Close,
}

fn path_row(ui: &mut egui::Ui, button: &str, tooltip: &str, hint: &mut String, current: &str) -> bool {
    let mut clicked = false;
    ui.horizontal(|ui| {
        if ui
            .add_sized([150.0, 20.0], egui::Button::new(button))
            .on_hover_text(tooltip)
            .clicked()
        {
            clicked = true;
        }
        ui.add(
            egui::TextEdit::singleline(hint)
                .hint_text("type a path or leave empty to browse")
                .desired_width(260.0),
        );
        ui.label(if current.is_empty() { "—" } else { current });
    });
    clicked
}

/// Show the batch window. Returns the action the user triggered.
pub fn show_batch_window(ctx: &egui::Context, state: &mut BatchWindowState) -> BatchAction {
    let mut action = BatchAction::None;
    if !state.open {
        return action;
    }

    let running = state.session.is_running();
    let mut open = state.open;
    egui::Window::new("Batch Process")
        .open(&mut open)
        .default_size([720.0, 320.0])
        .resizable(true)
        .show(ctx, |ui| {
            let config = &state.session.config;
            let calibration = config.calibration_label();
            let analyte = config
                .analyte_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            let folder = config
                .batch_folder
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();

            ui.add_enabled_ui(!running, |ui| {
                if path_row(
                    ui,
                    "Calibration File",
                    "Tab-separated text file; each line holds a peak ID, peak RT and an RT window.",
                    &mut state.calibration_hint,
                    &calibration,
                ) {
                    action = BatchAction::SelectCalibrationFile;
                }
                ui.horizontal(|ui| {
                    if ui
                        .add_sized([150.0, 20.0], egui::Button::new("Multi Calibration"))
                        .on_hover_text("Select several calibration files at once.")
                        .clicked()
                    {
                        action = BatchAction::SelectCalibrationFiles;
                    }
                    if ui
                        .button("Clear")
                        .on_hover_text("Run without retention-time calibration.")
                        .clicked()
                    {
                        action = BatchAction::ClearCalibration;
                    }
                });
                if path_row(
                    ui,
                    "Analyte File",
                    "Tab-separated text file; each line holds a peak ID, peak RT and an RT window.",
                    &mut state.analyte_hint,
                    &analyte,
                ) {
                    action = BatchAction::SelectAnalyteFile;
                }
                if path_row(
                    ui,
                    "Batch Directory",
                    "Folder holding the chromatograms to process.",
                    &mut state.folder_hint,
                    &folder,
                ) {
                    action = BatchAction::SelectBatchFolder;
                }

                ui.add_space(4.0);
                if ui
                    .add_sized([ui.available_width(), 20.0], egui::Button::new("Output Options"))
                    .on_hover_text("Choose which values the summary reports.")
                    .clicked()
                {
                    action = BatchAction::OpenOutputOptions;
                }
                ui.horizontal(|ui| {
                    if ui
                        .button("📂 Load Preset…")
                        .on_hover_text("Fill in files, folder and outputs from a saved preset.")
                        .clicked()
                    {
                        action = BatchAction::LoadPreset;
                    }
                    if ui.button("💾 Save Preset…").clicked() {
                        action = BatchAction::SavePreset;
                    }
                });
            });

            ui.separator();
            progress_panel::show_progress(ui, state.session.tracker());

            let status = state.session.status();
            if !status.is_empty() {
                ui.add_space(4.0);
                ui.label(status);
            }
            let skipped = state.session.skipped();
            if !skipped.is_empty() {
                ui.collapsing(format!("Skipped files ({})", skipped.len()), |ui| {
                    for (path, reason) in skipped {
                        ui.label(format!("{}: {}", path.display(), reason));
                    }
                });
            }

            ui.separator();
            ui.horizontal(|ui| {
                if running {
                    if ui.button("■ Cancel").clicked() {
                        action = BatchAction::Cancel;
                    }
                } else if ui.button("▶ Run").clicked() {
                    action = BatchAction::Run;
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Close").clicked() {
                        action = BatchAction::Close;
                    }
                });
            });
        });

    if !open {
        action = BatchAction::Close;
    }
    action
}
