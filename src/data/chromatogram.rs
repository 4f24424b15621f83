use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::Settings;

/// Prefix of batch summary files, which share the `.txt` extension with
/// chromatograms and must not be fed back into a later run
pub const SUMMARY_PREFIX: &str = "summary_";

/// Chromatogram trace: retention time (minutes) against detector intensity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chromatogram {
    pub source_path: PathBuf,
    pub sample_name: String,
    pub time: Vec<f64>,
    pub intensity: Vec<f64>,
    /// Whether `time` has been corrected by a calibration fit
    pub calibrated: bool,
}

impl Chromatogram {
    pub fn new(sample_name: &str, time: Vec<f64>, intensity: Vec<f64>) -> Self {
        Self {
            source_path: PathBuf::new(),
            sample_name: sample_name.to_string(),
            time,
            intensity,
            calibrated: false,
        }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Index range `[start, end)` of points with `lo <= time <= hi`.
    /// Assumes `time` is ascending.
    pub fn range(&self, lo: f64, hi: f64) -> std::ops::Range<usize> {
        let start = self.time.partition_point(|&t| t < lo);
        let end = self.time.partition_point(|&t| t <= hi);
        start..end.max(start)
    }

    /// Index of the highest point within `[lo, hi]`
    pub fn apex(&self, lo: f64, hi: f64) -> Option<usize> {
        let range = self.range(lo, hi);
        range.max_by(|&a, &b| {
            self.intensity[a]
                .partial_cmp(&self.intensity[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

/// Parse a two-column chromatogram. Lines whose first two fields are not
/// numbers (vendor headers, titles) are skipped.
pub fn parse_chromatogram(text: &str) -> (Vec<f64>, Vec<f64>) {
    let mut time = Vec::new();
    let mut intensity = Vec::new();
    for line in text.lines() {
        let mut fields = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|f| !f.is_empty());
        let (Some(t), Some(i)) = (fields.next(), fields.next()) else {
            continue;
        };
        if let (Ok(t), Ok(i)) = (t.parse::<f64>(), i.parse::<f64>()) {
            time.push(t);
            intensity.push(i);
        }
    }
    (time, intensity)
}

pub fn read_chromatogram(path: &Path) -> io::Result<Chromatogram> {
    let text = fs::read_to_string(path)?;
    let (time, intensity) = parse_chromatogram(&text);
    if time.len() < 2 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("no chromatogram data in {}", path.display()),
        ));
    }
    if time.windows(2).any(|w| w[1] < w[0]) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("retention times are not ascending in {}", path.display()),
        ));
    }

    let sample_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "chromatogram".to_string());

    Ok(Chromatogram {
        source_path: path.to_path_buf(),
        sample_name,
        time,
        intensity,
        calibrated: false,
    })
}

/// List chromatogram files in a batch folder (non-recursive, sorted)
pub fn list_chromatograms(dir: &Path, settings: &Settings) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)?.flatten() {
        let p = entry.path();
        let is_summary = p
            .file_name()
            .map(|n| n.to_string_lossy().starts_with(SUMMARY_PREFIX))
            .unwrap_or(false);
        if p.is_file() && !is_summary && settings.is_chromatogram(&p) {
            files.push(p);
        }
    }
    files.sort();
    Ok(files)
}
