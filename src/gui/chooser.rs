/// Native file dialogs for the batch window
use std::path::PathBuf;

use crate::pipeline::file_selector::Chooser;

/// [`Chooser`] backed by `rfd` native dialogs
#[derive(Debug, Clone, Default)]
pub struct RfdChooser {
    /// Folder the dialogs open in
    pub start_dir: Option<PathBuf>,
}

impl RfdChooser {
    fn dialog(&self, title: &str) -> rfd::FileDialog {
        let dialog = rfd::FileDialog::new().set_title(title);
        match &self.start_dir {
            Some(dir) => dialog.set_directory(dir),
            None => dialog,
        }
    }
}

impl Chooser for RfdChooser {
    fn pick_file(&mut self, title: &str) -> Option<PathBuf> {
        let picked = self
            .dialog(title)
            .add_filter("Text Files", &["txt", "ref"])
            .add_filter("All Files", &["*"])
            .pick_file();
        if let Some(parent) = picked.as_ref().and_then(|p| p.parent()) {
            self.start_dir = Some(parent.to_path_buf());
        }
        picked
    }

    fn pick_folder(&mut self, title: &str) -> Option<PathBuf> {
        let picked = self.dialog(title).pick_folder();
        if let Some(folder) = &picked {
            self.start_dir = Some(folder.clone());
        }
        picked
    }

    fn pick_files(&mut self, title: &str, extension: &str) -> Vec<PathBuf> {
        let ext = extension.trim_start_matches('.');
        let picked = self
            .dialog(title)
            .add_filter(format!("{} Files", ext.to_uppercase()), &[ext])
            .pick_files()
            .unwrap_or_default();
        if let Some(parent) = picked.first().and_then(|p| p.parent()) {
            self.start_dir = Some(parent.to_path_buf());
        }
        picked
    }
}
