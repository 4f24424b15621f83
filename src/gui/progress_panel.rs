/// Progress bars for the calibration and quantitation phases
use crate::pipeline::progress::{Phase, ProgressTracker};

pub fn show_progress(ui: &mut egui::Ui, tracker: &ProgressTracker) {
    egui::Grid::new("batch_progress")
        .num_columns(2)
        .spacing([12.0, 6.0])
        .show(ui, |ui| {
            for &phase in Phase::all() {
                if tracker.get(phase).is_complete() {
                    ui.label(format!("{} ✔", phase));
                } else {
                    ui.label(phase.to_string());
                }
                ui.add(
                    egui::ProgressBar::new(tracker.fraction(phase))
                        .text(tracker.label(phase))
                        .desired_width(320.0),
                );
                ui.end_row();
            }
        });
}
