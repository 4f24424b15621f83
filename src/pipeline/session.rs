/// Batch window model
///
/// Everything the batch window does apart from drawing: filling in the
/// [`BatchConfig`] through a [`FileSelector`], starting a run, applying
/// worker events to the [`ProgressTracker`], and tearing down on close.

use std::path::{Path, PathBuf};

use super::batch::{BatchEvent, BatchHandle, BatchReport, BatchRunner};
use super::file_selector::{Chooser, FileSelector, PathInput, SelectKind};
use super::progress::{Phase, ProgressTracker};
use crate::config::Settings;
use crate::data::batch_config::BatchConfig;
use crate::error::{BatchError, BatchResult};

pub const CALIBRATION_FILE_PROMPT: &str = "Calibration File";
pub const CALIBRATION_FILES_PROMPT: &str = "Calibration Files";
pub const ANALYTE_FILE_PROMPT: &str = "Analyte File";
pub const BATCH_FOLDER_PROMPT: &str = "Batch Folder";

#[derive(Default)]
pub struct BatchSession {
    pub config: BatchConfig,
    tracker: ProgressTracker,
    handle: Option<BatchHandle>,
    report: Option<BatchReport>,
    skipped: Vec<(PathBuf, String)>,
    last_error: Option<String>,
    status: String,
    closed: bool,
}

impl BatchSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the batch folder. A cancelled chooser leaves the field unchanged.
    pub fn set_batch_folder<C: Chooser>(&mut self, selector: &mut FileSelector<C>, hint: &str) {
        if let Some(folder) = selector.resolve_single(BATCH_FOLDER_PROMPT, SelectKind::Folder, hint) {
            log::info!("Batch folder: {}", folder.display());
            self.config.batch_folder = Some(folder);
        }
    }

    /// Select a single calibration file, replacing any previous selection
    pub fn set_calibration_file<C: Chooser>(&mut self, selector: &mut FileSelector<C>, hint: &str) {
        if let Some(file) = selector.resolve_single(CALIBRATION_FILE_PROMPT, SelectKind::File, hint) {
            self.config.calibration_paths = vec![file];
        }
    }

    /// Select several calibration files
    pub fn set_calibration_files<C: Chooser>(
        &mut self,
        selector: &mut FileSelector<C>,
        extension: &str,
        input: PathInput,
    ) {
        let files = selector.resolve_multiple(CALIBRATION_FILES_PROMPT, extension, input);
        if !files.is_empty() {
            self.config.calibration_paths = files;
        }
    }

    pub fn set_analyte_file<C: Chooser>(&mut self, selector: &mut FileSelector<C>, hint: &str) {
        if let Some(file) = selector.resolve_single(ANALYTE_FILE_PROMPT, SelectKind::File, hint) {
            self.config.analyte_path = Some(file);
        }
    }

    pub fn clear_calibration(&mut self) {
        self.config.calibration_paths.clear();
    }

    /// Apply a saved batch preset (see [`BatchConfig::to_preset`]).
    ///
    /// Keys that are absent leave their field alone. Paths go through the
    /// selector like typed paths: missing single paths fall back to the
    /// chooser, calibration lists are taken as-is. The preset is applied
    /// only if every key is well formed.
    pub fn load_preset<C: Chooser>(
        &mut self,
        selector: &mut FileSelector<C>,
        extension: &str,
        path: &Path,
    ) -> BatchResult<()> {
        let text = std::fs::read_to_string(path)?;
        let preset: serde_json::Value = serde_json::from_str(&text).map_err(|e| BatchError::Parse {
            path: path.to_path_buf(),
            line: e.line(),
            message: e.to_string(),
        })?;
        let preset = preset.as_object().ok_or_else(|| {
            BatchError::InvalidArgument(format!("{}: a batch preset must be a JSON object", path.display()))
        })?;

        let mut config = self.config.clone();
        if let Some(outputs) = preset.get("outputs") {
            let outputs = outputs.as_object().ok_or_else(|| {
                BatchError::InvalidArgument("'outputs' must map flag names to true/false".to_string())
            })?;
            for (name, enabled) in outputs {
                let enabled = enabled.as_bool().ok_or_else(|| {
                    BatchError::InvalidArgument(format!("output flag '{}' must be true or false", name))
                })?;
                config.output.set_by_name(name, enabled)?;
            }
        }
        let text_field = |key: &str| -> BatchResult<Option<String>> {
            match preset.get(key) {
                None | Some(serde_json::Value::Null) => Ok(None),
                Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
                Some(other) => Err(BatchError::InvalidArgument(format!(
                    "'{}' must be a path, got {}",
                    key, other
                ))),
            }
        };
        let analyte = text_field("analyte")?;
        let folder = text_field("batch_folder")?;

        if let Some(calibration) = preset.get("calibration") {
            config.calibration_paths =
                selector.resolve_multiple_json(CALIBRATION_FILES_PROMPT, extension, calibration)?;
        }
        if let Some(hint) = analyte {
            if let Some(file) = selector.resolve_single(ANALYTE_FILE_PROMPT, SelectKind::File, &hint) {
                config.analyte_path = Some(file);
            }
        }
        if let Some(hint) = folder {
            if let Some(dir) = selector.resolve_single(BATCH_FOLDER_PROMPT, SelectKind::Folder, &hint) {
                config.batch_folder = Some(dir);
            }
        }

        self.config = config;
        self.status = format!("Preset loaded: {}", path.display());
        log::info!("Batch preset loaded from {}", path.display());
        Ok(())
    }

    /// Validate the configuration and start the batch on a worker thread
    pub fn run(&mut self, settings: &Settings) -> BatchResult<()> {
        if self.closed {
            return Err(BatchError::WindowClosed);
        }
        if self.is_running() {
            return Err(BatchError::InvalidArgument("a batch is already running".to_string()));
        }

        self.tracker.reset_all()?;
        self.report = None;
        self.skipped.clear();
        self.last_error = None;

        match BatchRunner::spawn(self.config.clone(), settings.clone()) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.status = "Batch running…".to_string();
                Ok(())
            }
            Err(e) => {
                self.status = format!("Cannot start batch: {}", e);
                Err(e)
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_done())
    }

    /// Apply pending worker events. Returns whether anything changed.
    pub fn poll(&mut self) -> bool {
        let events = match self.handle.as_mut() {
            Some(handle) => handle.poll(),
            None => return false,
        };
        let changed = !events.is_empty();
        for event in events {
            self.apply_event(event);
        }
        if self.handle.as_ref().is_some_and(|h| h.is_done()) {
            self.handle = None;
        }
        changed
    }

    pub fn apply_event(&mut self, event: BatchEvent) {
        if self.closed {
            log::debug!("Batch window closed, dropping {:?}", event);
            return;
        }
        match event {
            BatchEvent::Started { files } => {
                self.status = format!("Processing {} chromatograms…", files);
            }
            BatchEvent::Progress { phase, index, total } => {
                if let Err(e) = self.tracker.update(phase, index, total) {
                    log::warn!("Ignoring progress update: {}", e);
                }
            }
            BatchEvent::FileSkipped { path, reason } => {
                self.skipped.push((path, reason));
            }
            BatchEvent::Finished(report) => {
                self.fill_progress();
                self.status = format!(
                    "Finished: {} processed, {} skipped. Summary: {}",
                    report.processed,
                    report.skipped,
                    report.summary_path.display()
                );
                self.report = Some(report);
            }
            BatchEvent::Failed(message) => {
                self.fill_progress();
                self.status = format!("Batch failed: {}", message);
                self.last_error = Some(message);
            }
            BatchEvent::Cancelled => {
                self.fill_progress();
                self.status = "Batch cancelled".to_string();
            }
        }
    }

    /// Mark both phases as ended, whether the run completed or stopped early
    fn fill_progress(&mut self) {
        for &phase in Phase::all() {
            if let Err(e) = self.tracker.fill(phase) {
                log::debug!("Cannot fill {} progress: {}", phase, e);
            }
        }
    }

    /// Stop the running batch after the current file
    pub fn cancel(&mut self) {
        if let Some(handle) = &self.handle {
            handle.cancel();
            self.status = "Cancelling…".to_string();
        }
    }

    /// Cancel any run and stop accepting progress. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Some(handle) = self.handle.take() {
            handle.cancel();
            log::info!("Batch window closed during a run; worker cancelled");
        }
        self.tracker.close();
        self.closed = true;
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn report(&self) -> Option<&BatchReport> {
        self.report.as_ref()
    }

    pub fn skipped(&self) -> &[(PathBuf, String)] {
        &self.skipped
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Take the last worker failure, to show it once in a dialog
    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }
}
