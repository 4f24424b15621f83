/// Chromatogram calibration and peak quantitation
///
/// Calibration locates the calibrant peaks, fits a polynomial that maps
/// observed to expected retention times and applies it to the time axis.
/// Quantitation integrates each analyte window and derives background,
/// noise, gaussian-fit and quality figures from it.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::data::chromatogram::Chromatogram;
use crate::data::peak_list::PeakEntry;

/// FWHM = 2·sqrt(2·ln 2)·σ
const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949;

/// A calibrant located in a chromatogram
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrantHit {
    pub id: String,
    pub expected_rt: f64,
    pub observed_rt: f64,
    pub sn: f64,
}

/// Polynomial mapping observed to expected retention time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationFit {
    /// Coefficients in ascending powers
    pub coefficients: Vec<f64>,
    pub hits: Vec<CalibrantHit>,
}

impl CalibrationFit {
    pub fn apply(&self, t: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * t + c)
    }
}

/// Background level and noise around a peak
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Background {
    pub level: f64,
    pub noise: f64,
}

/// Quantitation result for one analyte in one chromatogram
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeakMetrics {
    pub id: String,
    /// Observed apex time (expected time when the window is empty)
    pub rt: f64,
    pub absolute_intensity: f64,
    pub background_subtracted: f64,
    pub relative_intensity: f64,
    pub gaussian_intensity: f64,
    pub background: f64,
    pub noise: f64,
    pub peak_quality: f64,
    pub sn: f64,
}

/// Background and noise from the quietest run of `points` consecutive
/// samples within `center ± half_width`
pub fn background_noise(chrom: &Chromatogram, center: f64, half_width: f64, points: usize) -> Background {
    let range = chrom.range(center - half_width, center + half_width);
    let values = &chrom.intensity[range];
    if values.is_empty() {
        return Background::default();
    }
    let width = points.clamp(1, values.len());

    let mut best: Option<&[f64]> = None;
    let mut best_mean = f64::INFINITY;
    for run in values.windows(width) {
        let mean = run.iter().sum::<f64>() / width as f64;
        if mean < best_mean {
            best_mean = mean;
            best = Some(run);
        }
    }
    let run = best.unwrap_or(values);
    let level = run.iter().sum::<f64>() / run.len() as f64;
    let variance = run.iter().map(|v| (v - level).powi(2)).sum::<f64>() / run.len() as f64;
    Background {
        level,
        noise: variance.sqrt(),
    }
}

fn signal_to_noise(height: f64, noise: f64) -> f64 {
    if noise > 0.0 {
        height / noise
    } else if height > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// Apex time refined with a parabola through the apex and its neighbours
fn refine_apex(chrom: &Chromatogram, idx: usize) -> f64 {
    if idx == 0 || idx + 1 >= chrom.len() {
        return chrom.time[idx];
    }
    let (y0, y1, y2) = (
        chrom.intensity[idx - 1],
        chrom.intensity[idx],
        chrom.intensity[idx + 1],
    );
    let denom = y0 - 2.0 * y1 + y2;
    if denom.abs() < f64::EPSILON {
        return chrom.time[idx];
    }
    let offset = (0.5 * (y0 - y2) / denom).clamp(-0.5, 0.5);
    let step = if offset >= 0.0 {
        chrom.time[idx + 1] - chrom.time[idx]
    } else {
        chrom.time[idx] - chrom.time[idx - 1]
    };
    chrom.time[idx] + offset * step
}

/// Locate calibrants; only those above the S/N cutoff are returned
pub fn find_calibrants(chrom: &Chromatogram, calibrants: &[PeakEntry], settings: &Settings) -> Vec<CalibrantHit> {
    let mut hits = Vec::new();
    for cal in calibrants {
        let (lo, hi) = cal.bounds();
        let Some(apex) = chrom.apex(lo, hi) else {
            log::debug!("{}: calibrant {} outside data range", chrom.sample_name, cal.id);
            continue;
        };
        let bg = background_noise(chrom, cal.rt, settings.background_window, settings.background_points);
        let sn = signal_to_noise(chrom.intensity[apex] - bg.level, bg.noise);
        if sn < settings.calibration_sn_cutoff {
            log::debug!(
                "{}: calibrant {} below S/N cutoff ({:.1} < {:.1})",
                chrom.sample_name,
                cal.id,
                sn,
                settings.calibration_sn_cutoff
            );
            continue;
        }
        hits.push(CalibrantHit {
            id: cal.id.clone(),
            expected_rt: cal.rt,
            observed_rt: refine_apex(chrom, apex),
            sn,
        });
    }
    hits
}

/// Least-squares polynomial fit, coefficients in ascending powers.
/// `None` when there are too few points or the system is singular.
pub fn fit_polynomial(x: &[f64], y: &[f64], degree: usize) -> Option<Vec<f64>> {
    let n = degree + 1;
    if x.len() != y.len() || x.len() < n {
        return None;
    }

    // Normal equations as an augmented n × (n+1) matrix
    let mut m = vec![vec![0.0f64; n + 1]; n];
    for (&xi, &yi) in x.iter().zip(y) {
        let powers: Vec<f64> = (0..2 * n).map(|p| xi.powi(p as i32)).collect();
        for r in 0..n {
            for c in 0..n {
                m[r][c] += powers[r + c];
            }
            m[r][n] += powers[r] * yi;
        }
    }

    for col in 0..n {
        let pivot = (col..n).max_by(|&a, &b| {
            m[a][col]
                .abs()
                .partial_cmp(&m[b][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if m[pivot][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot);
        let pivot_row = m[col].clone();
        for (r, row) in m.iter_mut().enumerate() {
            if r == col {
                continue;
            }
            let factor = row[col] / pivot_row[col];
            for c in col..=n {
                row[c] -= factor * pivot_row[c];
            }
        }
    }

    Some((0..n).map(|r| m[r][n] / m[r][r]).collect())
}

/// Calibrate the time axis in place. On error the chromatogram is left untouched.
pub fn calibrate(
    chrom: &mut Chromatogram,
    calibrants: &[PeakEntry],
    settings: &Settings,
) -> Result<CalibrationFit, String> {
    let hits = find_calibrants(chrom, calibrants, settings);
    let needed = settings.min_calibrants.max(1);
    if hits.len() < needed {
        return Err(format!(
            "{} of {} calibrants above S/N {:.1}, {} required",
            hits.len(),
            calibrants.len(),
            settings.calibration_sn_cutoff,
            needed
        ));
    }

    let degree = settings.calibration_function_degree.min(hits.len() - 1);
    let observed: Vec<f64> = hits.iter().map(|h| h.observed_rt).collect();
    let expected: Vec<f64> = hits.iter().map(|h| h.expected_rt).collect();
    let coefficients = fit_polynomial(&observed, &expected, degree)
        .ok_or_else(|| "calibration fit is singular".to_string())?;
    let fit = CalibrationFit { coefficients, hits };

    let corrected: Vec<f64> = chrom.time.iter().map(|&t| fit.apply(t)).collect();
    if corrected.windows(2).any(|w| w[1] < w[0]) {
        return Err("calibration function is not monotonic over the run".to_string());
    }
    chrom.time = corrected;
    chrom.calibrated = true;
    Ok(fit)
}

fn trapezoid(time: &[f64], values: &[f64]) -> f64 {
    time.windows(2)
        .zip(values.windows(2))
        .map(|(t, v)| (t[1] - t[0]) * (v[0] + v[1]) / 2.0)
        .sum()
}

/// Time at which the signal crosses `level` walking away from the apex
fn half_height_crossing(time: &[f64], signal: &[f64], apex: usize, level: f64, forward: bool) -> f64 {
    let mut i = apex;
    loop {
        let next = if forward {
            if i + 1 >= signal.len() {
                return time[i];
            }
            i + 1
        } else {
            if i == 0 {
                return time[0];
            }
            i - 1
        };
        if signal[next] < level {
            let (t0, t1, y0, y1) = (time[i], time[next], signal[i], signal[next]);
            return t0 + (level - y0) * (t1 - t0) / (y1 - y0);
        }
        i = next;
    }
}

/// Quantify one analyte. `relative_intensity` is filled in later by
/// [`quantify_all`], which knows the total over all analytes.
pub fn quantify(chrom: &Chromatogram, analyte: &PeakEntry, settings: &Settings) -> PeakMetrics {
    let bg = background_noise(chrom, analyte.rt, settings.background_window, settings.background_points);
    let (lo, hi) = analyte.bounds();
    let range = chrom.range(lo, hi);
    let mut metrics = PeakMetrics {
        id: analyte.id.clone(),
        rt: analyte.rt,
        background: bg.level,
        noise: bg.noise,
        ..Default::default()
    };
    if range.is_empty() {
        return metrics;
    }

    let time = &chrom.time[range.clone()];
    let values = &chrom.intensity[range];
    let apex = values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0);

    let span = time[time.len() - 1] - time[0];
    metrics.rt = time[apex];
    metrics.absolute_intensity = trapezoid(time, values);
    metrics.background_subtracted = metrics.absolute_intensity - bg.level * span;

    let signal: Vec<f64> = values.iter().map(|v| v - bg.level).collect();
    let height = signal[apex];
    metrics.sn = signal_to_noise(height, bg.noise);
    if height <= 0.0 {
        return metrics;
    }

    let left = half_height_crossing(time, &signal, apex, height / 2.0, false);
    let right = half_height_crossing(time, &signal, apex, height / 2.0, true);
    let sigma = (right - left) / FWHM_PER_SIGMA;
    if sigma > 0.0 {
        metrics.gaussian_intensity = height * sigma * (2.0 * PI).sqrt();

        let center = metrics.rt;
        let mut residual = 0.0;
        let mut total = 0.0;
        for (&t, &s) in time.iter().zip(&signal) {
            let model = height * (-(t - center).powi(2) / (2.0 * sigma * sigma)).exp();
            residual += (s - model).abs();
            total += s.abs();
        }
        if total > 0.0 {
            metrics.peak_quality = (1.0 - residual / total).clamp(0.0, 1.0);
        }
    }
    metrics
}

/// Quantify every analyte and fill in relative intensities
pub fn quantify_all(chrom: &Chromatogram, analytes: &[PeakEntry], settings: &Settings) -> Vec<PeakMetrics> {
    let mut results: Vec<PeakMetrics> = analytes
        .iter()
        .map(|a| quantify(chrom, a, settings))
        .collect();
    let total: f64 = results
        .iter()
        .map(|m| m.background_subtracted.max(0.0))
        .sum();
    if total > 0.0 {
        for m in &mut results {
            m.relative_intensity = m.background_subtracted.max(0.0) / total;
        }
    }
    results
}


#[cfg(test)]
mod tests {
    use super::synthetic;
    use super::*;

    fn peak(id: &str, rt: f64, window: f64) -> PeakEntry {
        PeakEntry {
            id: id.to_string(),
            rt,
            window,
        }
    }

    #[test]
    fn test_background_noise_finds_quiet_region() {
        let chrom = synthetic::chromatogram(&[(5.0, 100.0, 0.05)], 10.0);
        let bg = background_noise(&chrom, 5.0, 1.0, 10);
        assert!((bg.level - 10.0).abs() < 1e-6, "level {}", bg.level);
        assert!((bg.noise - 0.5).abs() < 1e-6, "noise {}", bg.noise);
    }

    #[test]
    fn test_background_of_empty_region() {
        let chrom = synthetic::chromatogram(&[], 1.0);
        assert_eq!(background_noise(&chrom, 50.0, 1.0, 10), Background::default());
    }

    #[test]
    fn test_fit_polynomial_exact_quadratic() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = x.iter().map(|v| 0.5 + 2.0 * v - 0.1 * v * v).collect();
        let c = fit_polynomial(&x, &y, 2).unwrap();
        assert!((c[0] - 0.5).abs() < 1e-9);
        assert!((c[1] - 2.0).abs() < 1e-9);
        assert!((c[2] + 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_fit_polynomial_needs_enough_points() {
        assert!(fit_polynomial(&[1.0, 2.0], &[1.0, 2.0], 2).is_none());
        assert!(fit_polynomial(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0], 1).is_none());
    }

    #[test]
    fn test_calibration_removes_shift() {
        let expected = [2.0, 4.0, 6.0, 8.0];
        let peaks: Vec<_> = expected.iter().map(|&c| (c + 0.1, 100.0, 0.05)).collect();
        let mut chrom = synthetic::chromatogram(&peaks, 10.0);
        let calibrants: Vec<_> = expected
            .iter()
            .enumerate()
            .map(|(i, &rt)| peak(&format!("C{}", i), rt, 0.3))
            .collect();

        let fit = calibrate(&mut chrom, &calibrants, &Settings::default()).unwrap();
        assert_eq!(fit.hits.len(), 4);
        assert!(chrom.calibrated);
        assert!((fit.apply(4.1) - 4.0).abs() < 0.005);

        let apex = chrom.apex(3.5, 4.5).unwrap();
        assert!((chrom.time[apex] - 4.0).abs() < 0.01, "apex at {}", chrom.time[apex]);
    }

    #[test]
    fn test_calibration_fails_with_too_few_calibrants() {
        let mut chrom = synthetic::chromatogram(&[(2.0, 100.0, 0.05), (4.0, 3.0, 0.05)], 10.0);
        let original = chrom.time.clone();
        let calibrants = vec![peak("C0", 2.0, 0.3), peak("C1", 4.0, 0.3), peak("C2", 6.0, 0.3)];
        let err = calibrate(&mut chrom, &calibrants, &Settings::default()).unwrap_err();
        assert!(err.contains("1 of 3"), "{}", err);
        assert_eq!(chrom.time, original);
        assert!(!chrom.calibrated);
    }

    #[test]
    fn test_quantify_gaussian_peak() {
        let chrom = synthetic::chromatogram(&[(5.0, 100.0, 0.05)], 10.0);
        let m = quantify(&chrom, &peak("G0", 5.0, 0.3), &Settings::default());
        let true_area = 100.0 * 0.05 * (2.0 * PI).sqrt();

        assert!((m.rt - 5.0).abs() < 0.006);
        assert!((m.absolute_intensity - (true_area + 6.0)).abs() < 0.15, "{}", m.absolute_intensity);
        assert!((m.background_subtracted - true_area).abs() < 0.1, "{}", m.background_subtracted);
        assert!((m.gaussian_intensity - true_area).abs() / true_area < 0.03, "{}", m.gaussian_intensity);
        assert!(m.peak_quality > 0.9, "quality {}", m.peak_quality);
        assert!(m.sn > 150.0, "sn {}", m.sn);
    }

    #[test]
    fn test_quantify_outside_data() {
        let chrom = synthetic::chromatogram(&[(5.0, 100.0, 0.05)], 10.0);
        let m = quantify(&chrom, &peak("far", 50.0, 0.3), &Settings::default());
        assert_eq!(m.rt, 50.0);
        assert_eq!(m.absolute_intensity, 0.0);
        assert_eq!(m.sn, 0.0);
    }

    #[test]
    fn test_relative_intensities_sum_to_one() {
        let chrom = synthetic::chromatogram(&[(3.0, 100.0, 0.05), (6.0, 300.0, 0.05)], 10.0);
        let analytes = vec![peak("A", 3.0, 0.3), peak("B", 6.0, 0.3)];
        let results = quantify_all(&chrom, &analytes, &Settings::default());
        let sum: f64 = results.iter().map(|m| m.relative_intensity).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!((results[1].relative_intensity - 0.75).abs() < 0.01);
    }
}
