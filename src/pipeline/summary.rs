/// Batch summary writer
///
/// One tab-separated row per (chromatogram, analyte). The metric columns
/// follow the enabled output flags.

use chrono::{DateTime, Local};
use std::io;
use std::path::{Path, PathBuf};

use super::processing::PeakMetrics;
use crate::data::batch_config::{OutputFlag, OutputOptions};
use crate::data::chromatogram::SUMMARY_PREFIX;

/// Quantitation results of one chromatogram
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FileResult {
    pub sample_name: String,
    pub source_path: PathBuf,
    pub calibrated: bool,
    pub peaks: Vec<PeakMetrics>,
}

fn flag_value(flag: OutputFlag, m: &PeakMetrics) -> String {
    match flag {
        OutputFlag::AbsoluteIntensity => format!("{:.4}", m.absolute_intensity),
        OutputFlag::RelativeIntensity => format!("{:.6}", m.relative_intensity),
        OutputFlag::GaussianIntensity => format!("{:.4}", m.gaussian_intensity),
        OutputFlag::BackgroundSubtracted => format!("{:.4}", m.background_subtracted),
        OutputFlag::BackgroundNoise => format!("{:.4}\t{:.4}", m.background, m.noise),
        OutputFlag::PeakQuality => format!("{:.4}", m.peak_quality),
    }
}

fn flag_header(flag: OutputFlag) -> String {
    match flag {
        // Two columns
        OutputFlag::BackgroundNoise => "background\tnoise".to_string(),
        other => other.name().to_string(),
    }
}

/// Render the summary table
pub fn render_summary(results: &[FileResult], output: &OutputOptions) -> String {
    let flags = output.enabled();
    let mut header = vec!["file".to_string(), "peak".to_string(), "rt".to_string()];
    header.extend(flags.iter().map(|&f| flag_header(f)));
    header.push("sn".to_string());

    let mut out = header.join("\t");
    out.push('\n');
    for file in results {
        for m in &file.peaks {
            let mut row = vec![file.sample_name.clone(), m.id.clone(), format!("{:.4}", m.rt)];
            row.extend(flags.iter().map(|&f| flag_value(f, m)));
            row.push(if m.sn.is_finite() {
                format!("{:.2}", m.sn)
            } else {
                "inf".to_string()
            });
            out.push_str(&row.join("\t"));
            out.push('\n');
        }
    }
    out
}

/// Timestamp shared by the files of one run, down to the millisecond
pub fn run_stamp(when: &DateTime<Local>) -> String {
    when.format("%Y%m%dT%H%M%S%3f").to_string()
}

/// Summary path inside the batch folder, stamped with `when`
pub fn summary_path(folder: &Path, when: &DateTime<Local>) -> PathBuf {
    folder.join(format!("{}{}.txt", SUMMARY_PREFIX, run_stamp(when)))
}

pub fn write_summary(
    folder: &Path,
    when: &DateTime<Local>,
    results: &[FileResult],
    output: &OutputOptions,
) -> io::Result<PathBuf> {
    let path = summary_path(folder, when);
    std::fs::write(&path, render_summary(results, output))?;
    log::info!("Summary written to {}", path.display());
    Ok(path)
}

/// Write the full per-file results as pretty JSON
pub fn export_results_json(path: &Path, results: &[FileResult]) -> io::Result<()> {
    let json = serde_json::to_string_pretty(results)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    std::fs::write(path, json)?;
    log::info!("Results exported to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<FileResult> {
        vec![FileResult {
            sample_name: "run_01".to_string(),
            source_path: PathBuf::from("run_01.txt"),
            calibrated: true,
            peaks: vec![PeakMetrics {
                id: "G0".to_string(),
                rt: 5.0,
                absolute_intensity: 18.5,
                background: 10.0,
                noise: 0.5,
                peak_quality: 0.98,
                sn: 201.0,
                ..Default::default()
            }],
        }]
    }

    #[test]
    fn test_minimal_columns_without_flags() {
        let text = render_summary(&sample(), &OutputOptions::default());
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "file\tpeak\trt\tsn");
        assert_eq!(lines[1], "run_01\tG0\t5.0000\t201.00");
    }

    #[test]
    fn test_enabled_flags_add_columns_in_order() {
        let mut output = OutputOptions::default();
        output.set(OutputFlag::PeakQuality, true);
        output.set(OutputFlag::AbsoluteIntensity, true);
        output.set(OutputFlag::BackgroundNoise, true);
        let text = render_summary(&sample(), &output);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "file\tpeak\trt\tabsolute_intensity\tbackground\tnoise\tpeak_quality\tsn"
        );
        let cols: Vec<_> = lines[1].split('\t').collect();
        assert_eq!(cols.len(), 8);
        assert_eq!(cols[3], "18.5000");
        assert_eq!(cols[4], "10.0000");
        assert_eq!(cols[6], "0.9800");
    }

    #[test]
    fn test_summary_name_is_timestamped() {
        let when = Local::now();
        let path = summary_path(Path::new("/data"), &when);
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(SUMMARY_PREFIX));
        assert!(name.ends_with(".txt"));
    }

    #[test]
    fn test_runs_within_one_second_get_distinct_names() {
        let when = Local::now();
        let later = when + chrono::Duration::milliseconds(1);
        assert_ne!(
            summary_path(Path::new("/data"), &when),
            summary_path(Path::new("/data"), &later)
        );
        assert_eq!(run_stamp(&when).len(), "20260101T000000000".len());
    }

    #[test]
    fn test_export_results_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        export_results_json(&path, &sample()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let back: Vec<FileResult> = serde_json::from_str(&text).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].peaks[0].id, "G0");
    }
}
