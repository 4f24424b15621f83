/// Processing settings for batch runs
///
/// Stored as JSON. Missing fields fall back to their defaults so older
/// settings files keep loading.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// Settings file looked up in the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "HappyTools.json";

/// Environment variable overriding the settings file location
pub const SETTINGS_ENV: &str = "HAPPYTOOLS_SETTINGS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Extensions (without dot) of chromatogram files picked up from the batch folder
    pub chromatogram_extensions: Vec<String>,
    /// Extension offered by the multi-calibration chooser
    pub calibration_extension: String,
    /// Minimum number of calibrants above the S/N cutoff for a file to be calibrated
    pub min_calibrants: usize,
    pub calibration_sn_cutoff: f64,
    /// Degree of the polynomial mapping observed to expected retention time
    pub calibration_function_degree: usize,
    /// Half-width (minutes) around an analyte searched for background
    pub background_window: f64,
    /// Consecutive points averaged for the background estimate
    pub background_points: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chromatogram_extensions: vec!["txt".to_string(), "arw".to_string()],
            calibration_extension: "ref".to_string(),
            min_calibrants: 4,
            calibration_sn_cutoff: 9.0,
            calibration_function_degree: 2,
            background_window: 1.0,
            background_points: 10,
        }
    }
}

impl Settings {
    /// Settings path: `$HAPPYTOOLS_SETTINGS` or `HappyTools.json`
    pub fn default_path() -> PathBuf {
        std::env::var_os(SETTINGS_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Load settings, falling back to defaults if the file is absent or unreadable
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            log::info!("No settings file at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("Ignoring settings file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Whether `path` carries one of the chromatogram extensions (case-insensitive)
    pub fn is_chromatogram(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.chromatogram_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_json_takes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "min_calibrants": 2 }"#).unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.min_calibrants, 2);
        assert_eq!(settings.background_points, 10);
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(Settings::load_or_default(&path), Settings::default());
        assert_eq!(Settings::load_or_default(&dir.path().join("absent.json")), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved.json");
        let mut settings = Settings::default();
        settings.calibration_function_degree = 1;
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_chromatogram_extension_match() {
        let settings = Settings::default();
        assert!(settings.is_chromatogram(Path::new("run_01.txt")));
        assert!(settings.is_chromatogram(Path::new("RUN_02.ARW")));
        assert!(!settings.is_chromatogram(Path::new("cal.ref")));
        assert!(!settings.is_chromatogram(Path::new("noext")));
    }
}
