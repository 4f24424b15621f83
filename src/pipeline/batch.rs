/// Batch runner
///
/// Runs calibration and quantitation over every chromatogram of the batch
/// folder on a worker thread. The UI polls the returned [`BatchHandle`] each
/// frame; progress arrives as [`BatchEvent`]s over an mpsc channel, and the
/// run stops between files once the handle is cancelled or dropped.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Local;

use super::processing::{calibrate, quantify_all};
use super::progress::Phase;
use super::summary::{run_stamp, write_summary, FileResult};
use crate::config::Settings;
use crate::data::batch_config::BatchConfig;
use crate::data::chromatogram::{list_chromatograms, read_chromatogram, Chromatogram};
use crate::data::peak_list::{read_merged_peak_lists, read_peak_list};
use crate::error::{BatchError, BatchResult};
use crate::log::batch_log::BatchLog;

/// File name prefix of the logs written next to the summary
pub const BATCH_LOG_PREFIX: &str = "batch_log_";

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub summary_path: PathBuf,
    pub log_path: PathBuf,
    pub processed: usize,
    pub skipped: usize,
    pub results: Vec<FileResult>,
}

/// Messages from the worker to the UI thread
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started { files: usize },
    Progress { phase: Phase, index: usize, total: usize },
    FileSkipped { path: PathBuf, reason: String },
    Finished(BatchReport),
    Failed(String),
    Cancelled,
}

impl BatchEvent {
    /// Whether this is the last event of a run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchEvent::Finished(_) | BatchEvent::Failed(_) | BatchEvent::Cancelled
        )
    }
}

/// Sending side used by the worker. A closed channel counts as cancellation.
struct Reporter {
    tx: Sender<BatchEvent>,
    cancel: Arc<AtomicBool>,
}

impl Reporter {
    fn send(&self, event: BatchEvent) {
        if self.tx.send(event).is_err() {
            self.cancel.store(true, Ordering::SeqCst);
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Handle to a running batch, owned by the UI
pub struct BatchHandle {
    rx: Receiver<BatchEvent>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    done: bool,
}

impl BatchHandle {
    /// Drain pending events without blocking. If the worker vanished without
    /// a final event, a `Failed` event is synthesised.
    pub fn poll(&mut self) -> Vec<BatchEvent> {
        let mut events = Vec::new();
        if self.done {
            return events;
        }
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    let terminal = event.is_terminal();
                    events.push(event);
                    if terminal {
                        self.done = true;
                        break;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.done = true;
                    events.push(BatchEvent::Failed(
                        "batch worker stopped unexpectedly".to_string(),
                    ));
                    break;
                }
            }
        }
        events
    }

    /// Block until the run ends and return every remaining event
    #[cfg(test)]
    pub fn wait(mut self) -> Vec<BatchEvent> {
        let mut events = Vec::new();
        while !self.done {
            match self.rx.recv() {
                Ok(event) => {
                    self.done = event.is_terminal();
                    events.push(event);
                }
                Err(_) => {
                    self.done = true;
                    events.push(BatchEvent::Failed(
                        "batch worker stopped unexpectedly".to_string(),
                    ));
                }
            }
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        events
    }

    /// Ask the worker to stop after the current file
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

impl Drop for BatchHandle {
    fn drop(&mut self) {
        // Never join here: dropping happens on the UI thread
        self.cancel.store(true, Ordering::SeqCst);
    }
}

pub struct BatchRunner;

impl BatchRunner {
    /// Validate `config` and start the run on a worker thread
    pub fn spawn(config: BatchConfig, settings: Settings) -> BatchResult<BatchHandle> {
        config.validate()?;

        let (tx, rx) = channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let reporter = Reporter {
            tx,
            cancel: Arc::clone(&cancel),
        };

        let worker = thread::Builder::new()
            .name("batch-worker".to_string())
            .spawn(move || {
                let event = match run_batch(&config, &settings, &reporter) {
                    Ok(Some(report)) => BatchEvent::Finished(report),
                    Ok(None) => BatchEvent::Cancelled,
                    Err(e) => {
                        log::error!("Batch failed: {}", e);
                        BatchEvent::Failed(e.to_string())
                    }
                };
                let _ = reporter.tx.send(event);
            })?;

        Ok(BatchHandle {
            rx,
            cancel,
            worker: Some(worker),
            done: false,
        })
    }
}

/// The batch itself. `Ok(None)` means the run was cancelled.
fn run_batch(config: &BatchConfig, settings: &Settings, reporter: &Reporter) -> BatchResult<Option<BatchReport>> {
    let folder = config
        .batch_folder
        .as_ref()
        .ok_or(BatchError::MissingField("batch folder"))?;
    let analyte_path = config
        .analyte_path
        .as_ref()
        .ok_or(BatchError::MissingField("analyte file"))?;

    let mut batch_log = BatchLog::new(folder);
    let analytes = read_peak_list(analyte_path)?;
    let calibrants = read_merged_peak_lists(&config.calibration_paths)?;
    batch_log.add_entry(
        "Setup",
        &format!(
            "{} analytes from {}, {} calibrants from {} file(s)",
            analytes.len(),
            analyte_path.display(),
            calibrants.len(),
            config.calibration_paths.len()
        ),
    );

    let files = list_chromatograms(folder, settings)?;
    if files.is_empty() {
        return Err(BatchError::Upstream(format!(
            "no chromatograms ({}) in {}",
            settings.chromatogram_extensions.join(", "),
            folder.display()
        )));
    }
    log::info!("Batch started: {} chromatograms in {}", files.len(), folder.display());
    reporter.send(BatchEvent::Started { files: files.len() });

    // Calibration phase. Without calibrants there is nothing to fit, so the
    // phase is complete up front and files are only read.
    let calibrating = !calibrants.is_empty();
    if !calibrating {
        reporter.send(BatchEvent::Progress {
            phase: Phase::Calibration,
            index: files.len(),
            total: files.len(),
        });
    }
    let mut skipped = 0;
    let mut ready: Vec<Chromatogram> = Vec::with_capacity(files.len());
    for (i, path) in files.iter().enumerate() {
        if reporter.cancelled() {
            log::info!("Batch cancelled during calibration");
            return Ok(None);
        }
        let step = read_chromatogram(path)
            .map_err(|e| e.to_string())
            .and_then(|mut chrom| {
                if !calibrating {
                    return Ok(chrom);
                }
                let fit = calibrate(&mut chrom, &calibrants, settings)?;
                batch_log.add_entry(
                    "Calibration",
                    &format!(
                        "{}: {} calibrants, coefficients {:?}",
                        chrom.sample_name,
                        fit.hits.len(),
                        fit.coefficients
                    ),
                );
                Ok(chrom)
            });
        match step {
            Ok(chrom) => ready.push(chrom),
            Err(reason) => {
                log::warn!("Skipping {}: {}", path.display(), reason);
                batch_log.add_entry("Skipped", &format!("{}: {}", path.display(), reason));
                skipped += 1;
                reporter.send(BatchEvent::FileSkipped {
                    path: path.clone(),
                    reason,
                });
            }
        }
        if calibrating {
            reporter.send(BatchEvent::Progress {
                phase: Phase::Calibration,
                index: i + 1,
                total: files.len(),
            });
        }
    }

    if ready.is_empty() {
        return Err(BatchError::Upstream(format!(
            "none of the {} chromatograms could be calibrated",
            files.len()
        )));
    }

    // Quantitation phase
    let mut results = Vec::with_capacity(ready.len());
    for (i, chrom) in ready.iter().enumerate() {
        if reporter.cancelled() {
            log::info!("Batch cancelled during quantitation");
            return Ok(None);
        }
        let peaks = quantify_all(chrom, &analytes, settings);
        batch_log.add_entry(
            "Quantitation",
            &format!("{}: {} analytes", chrom.sample_name, peaks.len()),
        );
        results.push(FileResult {
            sample_name: chrom.sample_name.clone(),
            source_path: chrom.source_path.clone(),
            calibrated: chrom.calibrated,
            peaks,
        });
        reporter.send(BatchEvent::Progress {
            phase: Phase::Quantitation,
            index: i + 1,
            total: ready.len(),
        });
    }

    let Some((summary_path, log_path)) = write_outputs(folder, &results, config, &mut batch_log, reporter)? else {
        return Ok(None);
    };

    log::info!(
        "Batch finished: {} processed, {} skipped, {} log entries",
        results.len(),
        skipped,
        batch_log.len()
    );
    Ok(Some(BatchReport {
        summary_path,
        log_path,
        processed: results.len(),
        skipped,
        results,
    }))
}

/// Write the summary, the JSON batch log and its text twin. Nothing is
/// written once the run has been cancelled, however late.
fn write_outputs(
    folder: &Path,
    results: &[FileResult],
    config: &BatchConfig,
    batch_log: &mut BatchLog,
    reporter: &Reporter,
) -> BatchResult<Option<(PathBuf, PathBuf)>> {
    if reporter.cancelled() {
        log::info!("Batch cancelled before writing results");
        return Ok(None);
    }
    let now = Local::now();
    let summary_path = write_summary(folder, &now, results, &config.output)?;
    batch_log.add_entry("Summary", &summary_path.display().to_string());
    let stamp = run_stamp(&now);
    let log_path = folder.join(format!("{}{}.json", BATCH_LOG_PREFIX, stamp));
    batch_log.save_json(&log_path)?;
    batch_log.save_text(&folder.join(format!("{}{}.log", BATCH_LOG_PREFIX, stamp)))?;
    Ok(Some((summary_path, log_path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batch_config::OutputFlag;
    use crate::pipeline::processing::synthetic;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        root: TempDir,
        config: BatchConfig,
    }

    /// Two shifted chromatograms, one unreadable file, four calibrants, two analytes
    fn fixture() -> Fixture {
        let root = tempdir().unwrap();
        let folder = root.path().join("batch");
        fs::create_dir_all(&folder).unwrap();

        for (name, shift) in [("run_01", 0.1), ("run_02", -0.05)] {
            let peaks: Vec<_> = [2.0, 4.0, 6.0, 8.0, 3.0, 5.0]
                .iter()
                .map(|&c| (c + shift, 100.0, 0.05))
                .collect();
            let chrom = synthetic::chromatogram(&peaks, 10.0);
            fs::write(folder.join(format!("{}.txt", name)), synthetic::to_text(&chrom)).unwrap();
        }
        fs::write(folder.join("broken.txt"), "no data here\n").unwrap();

        let cal = root.path().join("cal.ref");
        fs::write(&cal, "C0\t2.0\t0.3\nC1\t4.0\t0.3\nC2\t6.0\t0.3\nC3\t8.0\t0.3\n").unwrap();
        let analytes = root.path().join("analytes.txt");
        fs::write(&analytes, "A1\t3.0\t0.3\nA2\t5.0\t0.3\n").unwrap();

        let mut config = BatchConfig::new();
        config.calibration_paths = vec![cal];
        config.analyte_path = Some(analytes);
        config.batch_folder = Some(folder);
        config.output.set(OutputFlag::AbsoluteIntensity, true);
        config.output.set(OutputFlag::PeakQuality, true);
        Fixture { root, config }
    }

    fn progress_of(events: &[BatchEvent], wanted: Phase) -> Vec<(usize, usize)> {
        events
            .iter()
            .filter_map(|e| match e {
                BatchEvent::Progress { phase, index, total } if *phase == wanted => Some((*index, *total)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_full_run() {
        let fx = fixture();
        let handle = BatchRunner::spawn(fx.config.clone(), Settings::default()).unwrap();
        let events = handle.wait();

        assert!(matches!(events.first(), Some(BatchEvent::Started { files: 3 })));
        assert_eq!(progress_of(&events, Phase::Calibration), vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(progress_of(&events, Phase::Quantitation), vec![(1, 2), (2, 2)]);
        assert!(events
            .iter()
            .any(|e| matches!(e, BatchEvent::FileSkipped { path, .. } if path.ends_with("broken.txt"))));

        let report = match events.last() {
            Some(BatchEvent::Finished(report)) => report.clone(),
            other => panic!("expected Finished, got {:?}", other),
        };
        assert_eq!((report.processed, report.skipped), (2, 1));
        assert!(report.results.iter().all(|r| r.calibrated));

        // Calibration moved the analytes back onto their expected times
        for file in &report.results {
            for peak in &file.peaks {
                let expected = if peak.id == "A1" { 3.0 } else { 5.0 };
                assert!((peak.rt - expected).abs() < 0.01, "{} {} at {}", file.sample_name, peak.id, peak.rt);
            }
        }

        let summary = fs::read_to_string(&report.summary_path).unwrap();
        let lines: Vec<_> = summary.lines().collect();
        assert_eq!(lines[0], "file\tpeak\trt\tabsolute_intensity\tpeak_quality\tsn");
        assert_eq!(lines.len(), 5);
        assert!(report.log_path.exists());
        assert!(report.log_path.with_extension("log").exists());
    }

    #[test]
    fn test_run_without_calibration_files() {
        let mut fx = fixture();
        fx.config.calibration_paths.clear();
        let events = BatchRunner::spawn(fx.config.clone(), Settings::default())
            .unwrap()
            .wait();
        match events.last() {
            Some(BatchEvent::Finished(report)) => {
                assert_eq!(report.processed, 2);
                assert!(report.results.iter().all(|r| !r.calibrated));
            }
            other => panic!("expected Finished, got {:?}", other),
        }

        // Calibration is complete before any file is quantified
        assert_eq!(progress_of(&events, Phase::Calibration), vec![(3, 3)]);
        assert!(matches!(
            &events[1],
            BatchEvent::Progress { phase: Phase::Calibration, index: 3, total: 3 }
        ));
    }

    #[test]
    fn test_spawn_rejects_missing_fields() {
        let dir = tempdir().unwrap();
        let mut config = BatchConfig::new();
        config.batch_folder = Some(dir.path().to_path_buf());
        assert!(matches!(
            BatchRunner::spawn(config, Settings::default()),
            Err(BatchError::MissingField("analyte file"))
        ));
    }

    #[test]
    fn test_empty_folder_is_upstream_failure() {
        let fx = fixture();
        let empty = fx.root.path().join("empty");
        fs::create_dir_all(&empty).unwrap();
        let mut config = fx.config.clone();
        config.batch_folder = Some(empty);
        let events = BatchRunner::spawn(config, Settings::default()).unwrap().wait();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], BatchEvent::Failed(msg) if msg.contains("no chromatograms")));
    }

    #[test]
    fn test_cancelled_run_writes_nothing() {
        let fx = fixture();
        let (tx, rx) = channel();
        let reporter = Reporter {
            tx,
            cancel: Arc::new(AtomicBool::new(true)),
        };
        let outcome = run_batch(&fx.config, &Settings::default(), &reporter).unwrap();
        assert!(outcome.is_none());

        let events: Vec<_> = rx.try_iter().collect();
        assert!(matches!(events.as_slice(), [BatchEvent::Started { files: 3 }]));

        let folder = fx.config.batch_folder.as_deref().unwrap();
        let written = fs::read_dir(folder)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with("summary_"))
            .count();
        assert_eq!(written, 0);
    }

    #[test]
    fn test_closed_channel_stops_worker() {
        let fx = fixture();
        let (tx, rx) = channel();
        drop(rx);
        let reporter = Reporter {
            tx,
            cancel: Arc::new(AtomicBool::new(false)),
        };
        let outcome = run_batch(&fx.config, &Settings::default(), &reporter).unwrap();
        assert!(outcome.is_none());
        assert!(reporter.cancelled());
    }

    fn written_outputs(folder: &Path) -> usize {
        fs::read_dir(folder)
            .unwrap()
            .flatten()
            .filter(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                name.starts_with("summary_") || name.starts_with(BATCH_LOG_PREFIX)
            })
            .count()
    }

    #[test]
    fn test_cancel_after_last_file_writes_nothing() {
        let fx = fixture();
        let folder = fx.config.batch_folder.clone().unwrap();
        let (tx, _rx) = channel();
        let reporter = Reporter {
            tx,
            cancel: Arc::new(AtomicBool::new(false)),
        };
        let mut batch_log = BatchLog::new(&folder);

        // Cancelled once every file has been quantified
        reporter.cancel.store(true, Ordering::SeqCst);
        let written = write_outputs(&folder, &[], &fx.config, &mut batch_log, &reporter).unwrap();
        assert!(written.is_none());
        assert_eq!(written_outputs(&folder), 0);

        reporter.cancel.store(false, Ordering::SeqCst);
        let (summary, log) = write_outputs(&folder, &[], &fx.config, &mut batch_log, &reporter)
            .unwrap()
            .unwrap();
        assert!(summary.exists() && log.exists());
        assert_eq!(written_outputs(&folder), 3);
    }

    #[test]
    fn test_cancelled_handle_ends_with_cancelled() {
        let fx = fixture();
        let folder = fx.config.batch_folder.clone().unwrap();
        let handle = BatchRunner::spawn(fx.config.clone(), Settings::default()).unwrap();
        handle.cancel();
        let events = handle.wait();
        assert!(matches!(events.last(), Some(BatchEvent::Cancelled)));
        assert!(!events.iter().any(|e| matches!(e, BatchEvent::Finished(_))));
        assert_eq!(written_outputs(&folder), 0);
    }
}
