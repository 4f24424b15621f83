pub mod batch;
pub mod file_selector;
pub mod processing;
pub mod progress;
pub mod session;
pub mod summary;

#[cfg(test)]
mod tests {
    use super::batch::{BatchEvent, BatchRunner};
    use super::file_selector::{FileSelector, PathInput, ScriptedChooser};
    use super::processing::synthetic;
    use super::session::BatchSession;
    use crate::config::Settings;
    use crate::data::batch_config::OutputFlag;
    use std::fs;

    #[test]
    fn test_selection_to_summary_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let folder = root.join("batch");
        fs::create_dir_all(&folder).unwrap();

        let chrom = synthetic::chromatogram(&[(2.0, 80.0, 0.05), (4.0, 120.0, 0.05)], 6.0);
        fs::write(folder.join("sample_a.txt"), synthetic::to_text(&chrom)).unwrap();
        let analytes = root.join("analytes.txt");
        fs::write(&analytes, "peak\trt\twindow\nA1\t2.0\t0.3\nA2\t4.0\t0.3\n").unwrap();

        // Folder typed, analyte picked through the dialog
        let chooser = ScriptedChooser {
            single: Some(analytes.clone()),
            ..Default::default()
        };
        let mut selector = FileSelector::new(chooser);
        let mut session = BatchSession::new();
        session.set_batch_folder(&mut selector, &folder.to_string_lossy());
        session.set_analyte_file(&mut selector, "");
        session.set_calibration_files(&mut selector, "ref", PathInput::List(Vec::new()));
        assert_eq!(selector.chooser().calls, vec!["file:Analyte File", "files:Calibration Files:ref"]);
        assert!(session.config.calibration_paths.is_empty());

        session.config.output.set(OutputFlag::RelativeIntensity, true);
        let handle = BatchRunner::spawn(session.config.clone(), Settings::default()).unwrap();
        let report = match handle.wait().pop() {
            Some(BatchEvent::Finished(report)) => report,
            other => panic!("expected Finished, got {:?}", other),
        };

        let text = fs::read_to_string(&report.summary_path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "file\tpeak\trt\trelative_intensity\tsn");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("sample_a\tA1\t"));

        let log: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report.log_path).unwrap()).unwrap();
        assert!(log["entries"].as_array().is_some_and(|e| !e.is_empty()));
    }
}
