/// Batch run descriptor
///
/// Filled in field by field while the batch window is open and cloned
/// into the worker when a run starts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{BatchError, BatchResult};

/// Optional output columns of the batch summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFlag {
    AbsoluteIntensity,
    RelativeIntensity,
    GaussianIntensity,
    BackgroundSubtracted,
    BackgroundNoise,
    PeakQuality,
}

impl OutputFlag {
    pub fn all() -> &'static [OutputFlag] {
        &[
            OutputFlag::AbsoluteIntensity,
            OutputFlag::RelativeIntensity,
            OutputFlag::GaussianIntensity,
            OutputFlag::BackgroundSubtracted,
            OutputFlag::BackgroundNoise,
            OutputFlag::PeakQuality,
        ]
    }

    /// Flag name, also used as the summary column title
    pub fn name(&self) -> &'static str {
        match self {
            OutputFlag::AbsoluteIntensity => "absolute_intensity",
            OutputFlag::RelativeIntensity => "relative_intensity",
            OutputFlag::GaussianIntensity => "gaussian_intensity",
            OutputFlag::BackgroundSubtracted => "background_subtracted",
            OutputFlag::BackgroundNoise => "background_noise",
            OutputFlag::PeakQuality => "peak_quality",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OutputFlag::AbsoluteIntensity => "Analyte Intensity",
            OutputFlag::RelativeIntensity => "Relative Intensity",
            OutputFlag::GaussianIntensity => "Gaussian Intensity",
            OutputFlag::BackgroundSubtracted => "Background Subtracted Intensity",
            OutputFlag::BackgroundNoise => "Background and Noise",
            OutputFlag::PeakQuality => "Peak Quality Criteria",
        }
    }

    pub fn from_name(name: &str) -> Option<OutputFlag> {
        OutputFlag::all().iter().copied().find(|f| f.name() == name)
    }
}

impl std::fmt::Display for OutputFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Mapping from output flag to enabled state. Every flag starts disabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputOptions {
    flags: BTreeMap<OutputFlag, bool>,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            flags: OutputFlag::all().iter().map(|&f| (f, false)).collect(),
        }
    }
}

impl OutputOptions {
    pub fn get(&self, flag: OutputFlag) -> bool {
        self.flags.get(&flag).copied().unwrap_or(false)
    }

    pub fn set(&mut self, flag: OutputFlag, enabled: bool) {
        self.flags.insert(flag, enabled);
    }

    /// Set a flag by its name
    pub fn set_by_name(&mut self, name: &str, enabled: bool) -> BatchResult<()> {
        let flag = OutputFlag::from_name(name)
            .ok_or_else(|| BatchError::InvalidArgument(format!("unknown output flag '{}'", name)))?;
        self.set(flag, enabled);
        Ok(())
    }

    /// Mutable access for checkbox bindings
    pub fn flag_mut(&mut self, flag: OutputFlag) -> &mut bool {
        self.flags.entry(flag).or_insert(false)
    }

    /// Enabled flags in column order
    pub fn enabled(&self) -> Vec<OutputFlag> {
        OutputFlag::all()
            .iter()
            .copied()
            .filter(|&f| self.get(f))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Zero, one or several calibration files
    pub calibration_paths: Vec<PathBuf>,
    pub analyte_path: Option<PathBuf>,
    pub batch_folder: Option<PathBuf>,
    pub output: OutputOptions,
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that the fields a run needs are present and exist on disk
    pub fn validate(&self) -> BatchResult<()> {
        let folder = self
            .batch_folder
            .as_ref()
            .ok_or(BatchError::MissingField("batch folder"))?;
        if !folder.is_dir() {
            return Err(BatchError::PathNotFound(folder.clone()));
        }

        let analyte = self
            .analyte_path
            .as_ref()
            .ok_or(BatchError::MissingField("analyte file"))?;
        if !analyte.is_file() {
            return Err(BatchError::PathNotFound(analyte.clone()));
        }

        if let Some(missing) = self.calibration_paths.iter().find(|p| !p.is_file()) {
            return Err(BatchError::PathNotFound(missing.clone()));
        }
        Ok(())
    }

    /// Preset form of the selections:
    /// `{"calibration": [...], "analyte": "...", "batch_folder": "...", "outputs": {flag: bool}}`.
    /// Unset paths are left out.
    pub fn to_preset(&self) -> serde_json::Value {
        let mut preset = serde_json::Map::new();
        preset.insert(
            "calibration".to_string(),
            self.calibration_paths
                .iter()
                .map(|p| serde_json::Value::from(p.display().to_string()))
                .collect(),
        );
        if let Some(analyte) = &self.analyte_path {
            preset.insert("analyte".to_string(), analyte.display().to_string().into());
        }
        if let Some(folder) = &self.batch_folder {
            preset.insert("batch_folder".to_string(), folder.display().to_string().into());
        }
        let outputs: serde_json::Map<String, serde_json::Value> = OutputFlag::all()
            .iter()
            .map(|&f| (f.name().to_string(), self.output.get(f).into()))
            .collect();
        preset.insert("outputs".to_string(), outputs.into());
        preset.into()
    }

    pub fn save_preset(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(&self.to_preset())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)?;
        log::info!("Batch preset saved to {}", path.display());
        Ok(())
    }

    /// Calibration paths joined for display
    pub fn calibration_label(&self) -> String {
        self.calibration_paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}
