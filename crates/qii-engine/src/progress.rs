//! Per-iteration progress notifications.
//!
//! The influence engine reports after every processed permutation or subset.
//! Observers only watch; nothing they do can change the computed scores.

use std::fmt;

const BAR_LENGTH: usize = 20;

/// Snapshot of a running computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Number of iterations processed so far (1-based after the first report).
    pub iteration: usize,
    /// Total iteration budget of the run.
    pub total: usize,
    /// Sum of all unnormalized per-feature accumulators, when requested.
    pub running_sum: Option<f64>,
}

impl Progress {
    /// Completed fraction, clamped to \[0.0, 1.0\].
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.iteration as f64 / self.total as f64).clamp(0.0, 1.0)
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.iteration >= self.total
    }
}

/// Renders the single-line text bar.
///
/// ```
/// use qii_engine::progress::Progress;
///
/// let progress = Progress { iteration: 3, total: 12, running_sum: Some(0.1234) };
/// assert_eq!(
///     progress.to_string(),
///     "Percent: [#####---------------] 25% Count: 3 Approx: 0.12 | ",
/// );
/// ```
impl fmt::Display for Progress {
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fraction = self.fraction();
        let block = (BAR_LENGTH as f64 * fraction).round() as usize;
        let percent = (fraction * 100.0) as usize;
        let status = if self.is_done() { "Done..." } else { "" };
        write!(
            f,
            "Percent: [{}{}] {percent}% Count: {}",
            "#".repeat(block),
            "-".repeat(BAR_LENGTH - block),
            self.iteration,
        )?;
        if let Some(sum) = self.running_sum {
            write!(f, " Approx: {sum:.2}")?;
        }
        write!(f, " | {status}")
    }
}

/// Receives progress reports.
///
/// Observers may be called from worker threads, one call at a time.
pub trait ProgressObserver: Sync {
    fn on_progress(&self, progress: &Progress);
}

/// Observer that ignores every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _progress: &Progress) {}
}

impl<F> ProgressObserver for F
where
    F: Fn(&Progress) + Sync,
{
    fn on_progress(&self, progress: &Progress) {
        self(progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_running_sum() {
        let progress = Progress {
            iteration: 1,
            total: 2,
            running_sum: None,
        };
        assert_eq!(
            progress.to_string(),
            "Percent: [##########----------] 50% Count: 1 | "
        );
    }

    #[test]
    fn test_display_done() {
        let progress = Progress {
            iteration: 6,
            total: 6,
            running_sum: Some(-0.5),
        };
        assert!(progress.is_done());
        assert_eq!(
            progress.to_string(),
            "Percent: [####################] 100% Count: 6 Approx: -0.50 | Done..."
        );
    }

    #[test]
    fn test_fraction_of_empty_run() {
        let progress = Progress {
            iteration: 0,
            total: 0,
            running_sum: None,
        };
        assert!((progress.fraction() - 1.0).abs() < f64::EPSILON);
    }
}
