/// Toolbar — top menu bar with settings and batch actions

use std::path::PathBuf;

/// Actions that can be triggered from the toolbar
#[derive(Debug, Clone, PartialEq)]
pub enum ToolbarAction {
    None,
    BatchProcess,
    LoadSettings,
    SaveSettings,
    ExportResults,
    ShowAbout,
    Quit,
}

/// Render the toolbar and return any triggered action
pub fn show_toolbar(ctx: &egui::Context, has_results: bool) -> ToolbarAction {
    let mut action = ToolbarAction::None;

    egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
        egui::menu::bar(ui, |ui| {
            ui.menu_button("📁 File", |ui| {
                if ui.button("📂 Load Settings…").clicked() {
                    action = ToolbarAction::LoadSettings;
                    ui.close_menu();
                }
                if ui.button("💾 Save Settings…").clicked() {
                    action = ToolbarAction::SaveSettings;
                    ui.close_menu();
                }
                ui.separator();
                if ui
                    .add_enabled(has_results, egui::Button::new("📊 Export Results…"))
                    .clicked()
                {
                    action = ToolbarAction::ExportResults;
                    ui.close_menu();
                }
                ui.separator();
                if ui.button("⏻ Quit").clicked() {
                    action = ToolbarAction::Quit;
                    ui.close_menu();
                }
            });

            ui.menu_button("⚙ Process", |ui| {
                if ui.button("▶ Batch Process…").clicked() {
                    action = ToolbarAction::BatchProcess;
                    ui.close_menu();
                }
            });

            ui.menu_button("❓ Help", |ui| {
                if ui.button("ℹ About").clicked() {
                    action = ToolbarAction::ShowAbout;
                    ui.close_menu();
                }
            });

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(
                    egui::RichText::new("HappyTools")
                        .color(egui::Color32::from_rgb(0x70, 0x75, 0x80))
                        .size(12.0),
                );
            });
        });
    });

    action
}

/// Show open dialog for a settings file
pub fn open_settings_dialog() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Load Settings")
        .add_filter("JSON", &["json"])
        .add_filter("All Files", &["*"])
        .pick_file()
}

/// Show save dialog for a settings file
pub fn save_settings_dialog() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Save Settings")
        .add_filter("JSON", &["json"])
        .set_file_name("HappyTools.json")
        .save_file()
}

/// Show open dialog for a batch preset
pub fn open_preset_dialog() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Load Batch Preset")
        .add_filter("Batch Preset", &["json"])
        .pick_file()
}

/// Show save dialog for a batch preset
pub fn save_preset_dialog() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Save Batch Preset")
        .add_filter("Batch Preset", &["json"])
        .set_file_name("batch_preset.json")
        .save_file()
}

/// Show save dialog for exporting the last batch results
pub fn export_results_dialog() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Export Batch Results")
        .add_filter("JSON", &["json"])
        .set_file_name("batch_results.json")
        .save_file()
}
