/// Two-phase batch progress
///
/// Calibration and quantitation are tracked independently. Each phase goes
/// idle (0%) → running → complete (100%). The tracker is owned by the UI
/// thread; the batch worker only sends `(phase, index, total)` messages.

use serde::{Deserialize, Serialize};

use crate::error::{BatchError, BatchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Calibration,
    Quantitation,
}

impl Phase {
    pub fn all() -> &'static [Phase] {
        &[Phase::Calibration, Phase::Quantitation]
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Calibration => write!(f, "Calibration"),
            Phase::Quantitation => write!(f, "Quantitation"),
        }
    }
}

/// Progress of a single phase. Invariant: `index <= total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub index: usize,
    pub total: usize,
    pub percent: u8,
}

impl PhaseProgress {
    pub fn is_complete(&self) -> bool {
        self.percent == 100
    }
}

/// Integer percentage `floor(index / total * 100)`
pub fn percentage(index: usize, total: usize) -> BatchResult<u8> {
    if total == 0 {
        return Err(BatchError::InvalidArgument(
            "progress total must be greater than zero".to_string(),
        ));
    }
    if index > total {
        return Err(BatchError::InvalidArgument(format!(
            "progress index {} exceeds total {}",
            index, total
        )));
    }
    // index <= total, so the result is at most 100
    Ok((index as u128 * 100 / total as u128) as u8)
}

#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    calibration: PhaseProgress,
    quantitation: PhaseProgress,
    closed: bool,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn phase_mut(&mut self, phase: Phase) -> BatchResult<&mut PhaseProgress> {
        if self.closed {
            return Err(BatchError::WindowClosed);
        }
        Ok(match phase {
            Phase::Calibration => &mut self.calibration,
            Phase::Quantitation => &mut self.quantitation,
        })
    }

    pub fn get(&self, phase: Phase) -> PhaseProgress {
        match phase {
            Phase::Calibration => self.calibration,
            Phase::Quantitation => self.quantitation,
        }
    }

    /// Record that `index` of `total` items are done. Returns the new percentage.
    pub fn update(&mut self, phase: Phase, index: usize, total: usize) -> BatchResult<u8> {
        let percent = percentage(index, total)?;
        let state = self.phase_mut(phase)?;
        *state = PhaseProgress {
            index,
            total,
            percent,
        };
        Ok(percent)
    }

    pub fn reset(&mut self, phase: Phase) -> BatchResult<()> {
        let state = self.phase_mut(phase)?;
        state.index = 0;
        state.percent = 0;
        Ok(())
    }

    /// Mark a phase complete regardless of how far it got
    pub fn fill(&mut self, phase: Phase) -> BatchResult<()> {
        let state = self.phase_mut(phase)?;
        state.index = state.total;
        state.percent = 100;
        Ok(())
    }

    pub fn reset_all(&mut self) -> BatchResult<()> {
        for &phase in Phase::all() {
            self.reset(phase)?;
        }
        Ok(())
    }

    /// Displayed text, e.g. `"30%"`
    pub fn label(&self, phase: Phase) -> String {
        format!("{}%", self.get(phase).percent)
    }

    /// Fraction in `0.0..=1.0` for progress bars
    pub fn fraction(&self, phase: Phase) -> f32 {
        self.get(phase).percent as f32 / 100.0
    }

    /// Stop accepting updates. Calling it again has no effect.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_floors_percentage() {
        let mut tracker = ProgressTracker::new();
        for t in 1..=40usize {
            for i in 0..=t {
                let p = tracker.update(Phase::Calibration, i, t).unwrap();
                assert_eq!(p as usize, i * 100 / t);
                assert_eq!(tracker.label(Phase::Calibration), format!("{}%", i * 100 / t));
            }
        }
    }

    #[test]
    fn test_three_of_ten_is_thirty_percent() {
        let mut tracker = ProgressTracker::new();
        tracker.update(Phase::Calibration, 3, 10).unwrap();
        assert_eq!(tracker.label(Phase::Calibration), "30%");
        assert_eq!(tracker.label(Phase::Quantitation), "0%");
    }

    #[test]
    fn test_one_of_three_floors() {
        let mut tracker = ProgressTracker::new();
        assert_eq!(tracker.update(Phase::Quantitation, 1, 3).unwrap(), 33);
        assert_eq!(tracker.update(Phase::Quantitation, 2, 3).unwrap(), 66);
    }

    #[test]
    fn test_zero_total_rejected() {
        let mut tracker = ProgressTracker::new();
        tracker.update(Phase::Calibration, 1, 2).unwrap();
        assert!(matches!(
            tracker.update(Phase::Calibration, 0, 0),
            Err(BatchError::InvalidArgument(_))
        ));
        assert!(matches!(
            tracker.update(Phase::Calibration, 3, 0),
            Err(BatchError::InvalidArgument(_))
        ));
        // Failed updates leave the state alone
        assert_eq!(tracker.label(Phase::Calibration), "50%");
    }

    #[test]
    fn test_index_past_total_rejected() {
        let mut tracker = ProgressTracker::new();
        assert!(tracker.update(Phase::Calibration, 11, 10).is_err());
    }

    #[test]
    fn test_reset_update_fill_stays_at_ceiling() {
        let mut tracker = ProgressTracker::new();
        tracker.reset(Phase::Quantitation).unwrap();
        tracker.update(Phase::Quantitation, 7, 7).unwrap();
        assert_eq!(tracker.get(Phase::Quantitation).percent, 100);
        tracker.fill(Phase::Quantitation).unwrap();
        assert_eq!(tracker.get(Phase::Quantitation).percent, 100);
        assert_eq!(tracker.get(Phase::Quantitation).index, 7);
    }

    #[test]
    fn test_idempotent_and_out_of_order() {
        let mut tracker = ProgressTracker::new();
        tracker.update(Phase::Calibration, 4, 8).unwrap();
        tracker.update(Phase::Calibration, 4, 8).unwrap();
        assert_eq!(tracker.label(Phase::Calibration), "50%");
        tracker.update(Phase::Calibration, 2, 8).unwrap();
        assert_eq!(tracker.label(Phase::Calibration), "25%");
    }

    #[test]
    fn test_fill_marks_early_termination() {
        let mut tracker = ProgressTracker::new();
        tracker.update(Phase::Calibration, 2, 9).unwrap();
        tracker.fill(Phase::Calibration).unwrap();
        let state = tracker.get(Phase::Calibration);
        assert_eq!((state.index, state.total, state.percent), (9, 9, 100));
        assert!(state.is_complete());
        assert_eq!(tracker.fraction(Phase::Calibration), 1.0);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut tracker = ProgressTracker::new();
        tracker.update(Phase::Quantitation, 5, 10).unwrap();
        tracker.reset(Phase::Quantitation).unwrap();
        assert_eq!(tracker.label(Phase::Quantitation), "0%");
        assert_eq!(tracker.get(Phase::Quantitation).index, 0);
    }

    #[test]
    fn test_closed_tracker_refuses_updates() {
        let mut tracker = ProgressTracker::new();
        tracker.update(Phase::Calibration, 1, 4).unwrap();
        tracker.close();
        tracker.close();
        assert!(matches!(
            tracker.update(Phase::Calibration, 2, 4),
            Err(BatchError::WindowClosed)
        ));
        assert!(matches!(tracker.fill(Phase::Calibration), Err(BatchError::WindowClosed)));
        assert_eq!(tracker.label(Phase::Calibration), "25%");
    }
}
