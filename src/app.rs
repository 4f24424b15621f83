/// Main application state and eframe::App implementation
///
/// Ties together settings, the batch window, the worker thread and the
/// results view.

use std::path::PathBuf;
use std::time::Duration;

use eframe::egui;
use egui_extras::{Column, TableBuilder};

use crate::config::Settings;
use crate::gui::batch_window::{self, BatchAction, BatchWindowState};
use crate::gui::chooser::RfdChooser;
use crate::gui::output_window;
use crate::gui::toolbar::{self, ToolbarAction};
use crate::pipeline::file_selector::{FileSelector, PathInput};
use crate::pipeline::summary::{self, FileResult};

/// The main application
pub struct HappyApp {
    settings: Settings,
    /// Where settings are saved by default
    settings_path: PathBuf,

    /// Native dialogs used for every path the user does not type
    selector: FileSelector<RfdChooser>,
    batch: BatchWindowState,

    /// Results of the last finished batch
    results: Vec<FileResult>,

    status_message: String,
    error_message: Option<String>,
    show_about: bool,
}

/// Split a typed list of paths on `;`. A single path stays text so it is
/// handled like a one-element selection.
fn typed_paths(text: &str) -> PathInput {
    if text.contains(';') {
        PathInput::List(
            text.split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect(),
        )
    } else {
        PathInput::from(text.trim())
    }
}

impl HappyApp {
    pub fn new(cc: &eframe::CreationContext<'_>, settings: Settings, settings_path: PathBuf) -> Self {
        let mut style = (*cc.egui_ctx.style()).clone();
        style.spacing.item_spacing = egui::vec2(8.0, 5.0);
        style.spacing.button_padding = egui::vec2(8.0, 4.0);
        cc.egui_ctx.set_style(style);

        Self {
            settings,
            settings_path,
            selector: FileSelector::new(RfdChooser::default()),
            batch: BatchWindowState::default(),
            results: Vec::new(),
            status_message: "Ready — open Process ▸ Batch Process to begin".to_string(),
            error_message: None,
            show_about: false,
        }
    }

    fn handle_toolbar_action(&mut self, ctx: &egui::Context, action: ToolbarAction) {
        match action {
            ToolbarAction::None => {}
            ToolbarAction::BatchProcess => {
                if !self.batch.open {
                    self.batch.open_new();
                    self.status_message = "Batch window opened".to_string();
                }
            }
            ToolbarAction::LoadSettings => {
                if let Some(path) = toolbar::open_settings_dialog() {
                    match Settings::load(&path) {
                        Ok(settings) => {
                            self.settings = settings;
                            self.status_message = format!("Settings loaded: {}", path.display());
                            self.settings_path = path;
                        }
                        Err(e) => self.error_message = Some(format!("Cannot load settings: {}", e)),
                    }
                }
            }
            ToolbarAction::SaveSettings => {
                if let Some(path) = toolbar::save_settings_dialog() {
                    match self.settings.save(&path) {
                        Ok(()) => {
                            self.status_message = format!("Settings saved: {}", path.display());
                            self.settings_path = path;
                        }
                        Err(e) => self.error_message = Some(format!("Cannot save settings: {}", e)),
                    }
                }
            }
            ToolbarAction::ExportResults => {
                if let Some(path) = toolbar::export_results_dialog() {
                    match summary::export_results_json(&path, &self.results) {
                        Ok(()) => self.status_message = format!("Results exported: {}", path.display()),
                        Err(e) => self.error_message = Some(format!("Export failed: {}", e)),
                    }
                }
            }
            ToolbarAction::ShowAbout => self.show_about = true,
            ToolbarAction::Quit => {
                self.batch.close();
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        }
    }

    fn handle_batch_action(&mut self, action: BatchAction) {
        let session = &mut self.batch.session;
        match action {
            BatchAction::None => {}
            BatchAction::SelectCalibrationFile => {
                session.set_calibration_file(&mut self.selector, self.batch.calibration_hint.trim());
            }
            BatchAction::SelectCalibrationFiles => {
                let input = typed_paths(&self.batch.calibration_hint);
                let extension = self.settings.calibration_extension.clone();
                session.set_calibration_files(&mut self.selector, &extension, input);
            }
            BatchAction::ClearCalibration => session.clear_calibration(),
            BatchAction::SelectAnalyteFile => {
                session.set_analyte_file(&mut self.selector, self.batch.analyte_hint.trim());
            }
            BatchAction::SelectBatchFolder => {
                session.set_batch_folder(&mut self.selector, self.batch.folder_hint.trim());
            }
            BatchAction::OpenOutputOptions => self.batch.output_window_open = true,
            BatchAction::LoadPreset => {
                if let Some(path) = toolbar::open_preset_dialog() {
                    let extension = self.settings.calibration_extension.clone();
                    match session.load_preset(&mut self.selector, &extension, &path) {
                        Ok(()) => self.status_message = format!("Preset loaded: {}", path.display()),
                        Err(e) => self.error_message = Some(format!("Cannot load preset: {}", e)),
                    }
                }
            }
            BatchAction::SavePreset => {
                if let Some(path) = toolbar::save_preset_dialog() {
                    match session.config.save_preset(&path) {
                        Ok(()) => self.status_message = format!("Preset saved: {}", path.display()),
                        Err(e) => self.error_message = Some(format!("Cannot save preset: {}", e)),
                    }
                }
            }
            BatchAction::Run => match session.run(&self.settings) {
                Ok(()) => self.status_message = "Batch started".to_string(),
                Err(e) => self.error_message = Some(e.to_string()),
            },
            BatchAction::Cancel => session.cancel(),
            BatchAction::Close => {
                self.batch.close();
                self.status_message = "Batch window closed".to_string();
            }
        }
    }

    /// Drain worker events and pick up a finished report
    fn poll_batch(&mut self, ctx: &egui::Context) {
        let session = &mut self.batch.session;
        if session.poll() {
            if let Some(report) = session.report() {
                self.results = report.results.clone();
            }
            if let Some(err) = session.take_error() {
                self.error_message = Some(err);
            }
            self.status_message = session.status().to_string();
        }
        if session.is_running() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }

    fn show_results(&self, ui: &mut egui::Ui) {
        if self.results.is_empty() {
            ui.centered_and_justified(|ui| {
                ui.label(
                    egui::RichText::new("No batch results yet")
                        .color(egui::Color32::from_rgb(0x70, 0x75, 0x80)),
                );
            });
            return;
        }

        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .column(Column::auto().at_least(120.0))
            .column(Column::auto().at_least(60.0))
            .columns(Column::auto().at_least(80.0), 6)
            .header(20.0, |mut header| {
                for title in ["Sample", "Peak", "RT", "Abs. Int.", "Bck. Sub.", "Rel. Int.", "Quality", "S/N"] {
                    header.col(|ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|mut body| {
                for file in &self.results {
                    for peak in &file.peaks {
                        body.row(18.0, |mut row| {
                            row.col(|ui| {
                                ui.label(&file.sample_name);
                            });
                            row.col(|ui| {
                                ui.label(&peak.id);
                            });
                            row.col(|ui| {
                                ui.label(format!("{:.3}", peak.rt));
                            });
                            row.col(|ui| {
                                ui.label(format!("{:.2}", peak.absolute_intensity));
                            });
                            row.col(|ui| {
                                ui.label(format!("{:.2}", peak.background_subtracted));
                            });
                            row.col(|ui| {
                                ui.label(format!("{:.4}", peak.relative_intensity));
                            });
                            row.col(|ui| {
                                ui.label(format!("{:.3}", peak.peak_quality));
                            });
                            row.col(|ui| {
                                if peak.sn.is_finite() {
                                    ui.label(format!("{:.1}", peak.sn));
                                } else {
                                    ui.label("∞");
                                }
                            });
                        });
                    }
                }
            });
    }
}

impl eframe::App for HappyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_batch(ctx);

        let action = toolbar::show_toolbar(ctx, !self.results.is_empty());
        self.handle_toolbar_action(ctx, action);

        // ── Batch Window ──
        let action = batch_window::show_batch_window(ctx, &mut self.batch);
        self.handle_batch_action(action);
        output_window::show_output_window(
            ctx,
            &mut self.batch.output_window_open,
            &mut self.batch.session.config.output,
        );

        // ── Status Bar ──
        egui::TopBottomPanel::bottom("status_bar")
            .frame(egui::Frame::new().inner_margin(egui::Margin::symmetric(12, 4)))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new(&self.status_message).size(11.5));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.label(
                            egui::RichText::new(self.settings_path.display().to_string())
                                .size(11.0)
                                .italics(),
                        )
                        .on_hover_text("Settings file");
                    });
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_results(ui);
        });

        // ── Error Dialog ──
        if let Some(message) = self.error_message.clone() {
            let mut dismissed = false;
            egui::Window::new("Error")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(&message);
                    ui.add_space(6.0);
                    if ui.button("OK").clicked() {
                        dismissed = true;
                    }
                });
            if dismissed {
                self.error_message = None;
            }
        }

        // ── About Dialog ──
        if self.show_about {
            egui::Window::new("About")
                .open(&mut self.show_about)
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.heading("HappyTools");
                    ui.label(format!("Version {}", env!("CARGO_PKG_VERSION")));
                    ui.add_space(10.0);
                    ui.label("Batch calibration and quantitation of chromatograms");
                    ui.add_space(10.0);
                    ui.label("• Retention-time calibration against reference peaks");
                    ui.label("• Peak integration with background and noise estimates");
                    ui.label("• Timestamped summaries and batch logs");
                });
        }
    }
}
