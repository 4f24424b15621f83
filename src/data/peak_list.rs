/// Calibration and analyte peak lists
///
/// Both files share one format: tab-separated text, one peak per line with
/// a peak id, the expected retention time and the retention-time window.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{BatchError, BatchResult};

/// One expected peak
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakEntry {
    pub id: String,
    /// Expected retention time (minutes)
    pub rt: f64,
    /// Half-width of the search window around `rt` (minutes)
    pub window: f64,
}

impl PeakEntry {
    pub fn bounds(&self) -> (f64, f64) {
        (self.rt - self.window, self.rt + self.window)
    }
}

/// Parse peak list text. `path` is only used for error messages.
pub fn parse_peak_list(text: &str, path: &Path) -> BatchResult<Vec<PeakEntry>> {
    let mut peaks = Vec::new();
    let mut seen_content = false;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let first_line = !seen_content;
        seen_content = true;

        let cols: Vec<&str> = line.split('\t').map(str::trim).collect();
        let err = |message: String| BatchError::Parse {
            path: path.to_path_buf(),
            line: line_no,
            message,
        };
        if cols.len() < 3 {
            return Err(err(format!(
                "expected peak id, rt and window separated by tabs, found {} column(s)",
                cols.len()
            )));
        }

        let rt = cols[1].parse::<f64>();
        let window = cols[2].parse::<f64>();
        let (rt, window) = match (rt, window) {
            (Ok(rt), Ok(window)) => (rt, window),
            // Column titles on the first line
            _ if first_line => continue,
            (Err(_), _) => return Err(err(format!("invalid retention time '{}'", cols[1]))),
            (_, Err(_)) => return Err(err(format!("invalid window '{}'", cols[2]))),
        };
        if cols[0].is_empty() {
            return Err(err("empty peak id".to_string()));
        }
        if !rt.is_finite() {
            return Err(err(format!("retention time must be a finite number, got {}", rt)));
        }
        if !window.is_finite() || window <= 0.0 {
            return Err(err(format!("window must be positive, got {}", window)));
        }

        peaks.push(PeakEntry {
            id: cols[0].to_string(),
            rt,
            window,
        });
    }

    Ok(peaks)
}

pub fn read_peak_list(path: &Path) -> BatchResult<Vec<PeakEntry>> {
    let text = std::fs::read_to_string(path)?;
    let peaks = parse_peak_list(&text, path)?;
    log::debug!("Read {} peaks from {}", peaks.len(), path.display());
    Ok(peaks)
}

/// Read several calibration files into one list. Entries keep file order;
/// a peak id seen in an earlier file wins over later duplicates.
pub fn read_merged_peak_lists(paths: &[std::path::PathBuf]) -> BatchResult<Vec<PeakEntry>> {
    let mut merged: Vec<PeakEntry> = Vec::new();
    for path in paths {
        for peak in read_peak_list(path)? {
            if merged.iter().any(|p| p.id == peak.id) {
                log::warn!(
                    "Duplicate calibrant '{}' in {} ignored",
                    peak.id,
                    path.display()
                );
                continue;
            }
            merged.push(peak);
        }
    }
    Ok(merged)
}
