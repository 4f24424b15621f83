#![allow(dead_code)]

mod app;
mod config;
mod data;
mod error;
mod gui;
mod log;
mod pipeline;

use app::HappyApp;
use config::Settings;

fn main() -> eframe::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    ::log::info!("Starting HappyTools v{}", env!("CARGO_PKG_VERSION"));

    let settings_path = Settings::default_path();
    let settings = Settings::load_or_default(&settings_path);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 700.0])
            .with_min_inner_size([720.0, 480.0])
            .with_title("HappyTools"),
        ..Default::default()
    };

    eframe::run_native(
        "HappyTools",
        options,
        Box::new(move |cc| Ok(Box::new(HappyApp::new(cc, settings, settings_path)))),
    )
}
