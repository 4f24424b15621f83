/// Output options window: which values the batch summary reports
use crate::data::batch_config::{OutputFlag, OutputOptions};

pub fn show_output_window(ctx: &egui::Context, open: &mut bool, output: &mut OutputOptions) {
    if !*open {
        return;
    }
    let mut close_clicked = false;
    egui::Window::new("Output Options")
        .open(open)
        .resizable(false)
        .show(ctx, |ui| {
            ui.label("Select the outputs to include in the batch summary:");
            ui.add_space(4.0);
            for &flag in OutputFlag::all() {
                ui.checkbox(output.flag_mut(flag), flag.label());
            }
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                if ui.button("Select All").clicked() {
                    for &flag in OutputFlag::all() {
                        output.set(flag, true);
                    }
                }
                if ui.button("Clear").clicked() {
                    for &flag in OutputFlag::all() {
                        output.set(flag, false);
                    }
                }
                if ui.button("Done").clicked() {
                    close_clicked = true;
                }
            });
        });
    if close_clicked {
        *open = false;
    }
}
