pub mod batch_window;
pub mod chooser;
pub mod output_window;
pub mod progress_panel;
pub mod toolbar;
