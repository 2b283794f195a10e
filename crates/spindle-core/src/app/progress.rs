//! ProgressReporter - console progress lines with an ETA.

use std::io::Write;

use chrono::{DateTime, Utc};

/// Stateless renderer for "how far along, how long left".
///
/// Used for console output only; Tasks carry their own `percent_complete`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressReporter;

impl ProgressReporter {
    /// Estimated time remaining, extrapolated linearly from the time spent
    /// so far.
    ///
    /// Returns `"ETA: HH:MM:SS"`, or `"ETA: unknown"` before any progress.
    pub fn eta(started_at: DateTime<Utc>, now: DateTime<Utc>, fraction: f64) -> String {
        if fraction.is_nan() || fraction <= 0.0 {
            return "ETA: unknown".to_string();
        }
        let fraction = fraction.min(1.0);
        let elapsed = (now - started_at).num_milliseconds().max(0) as f64 / 1000.0;
        let remaining = (elapsed / fraction - elapsed).round().max(0.0) as u64;

        let hours = remaining / 3600;
        let minutes = (remaining % 3600) / 60;
        let seconds = remaining % 60;
        format!("ETA: {hours:02}:{minutes:02}:{seconds:02}")
    }

    pub fn line(
        label: &str,
        completed: usize,
        total: usize,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> String {
        let fraction = if total == 0 {
            1.0
        } else {
            completed as f64 / total as f64
        };
        format!(
            "{label}: {completed}/{total} ({:.1}%) [{}]",
            fraction * 100.0,
            Self::eta(started_at, now, fraction)
        )
    }

    /// Overwrite the current console line with a progress line.
    pub fn print(
        label: &str,
        completed: usize,
        total: usize,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        let line = Self::line(label, completed, total, started_at, now);
        tracing::trace!(target: "spindle::progress", "{line}");

        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\r{line}");
        if completed >= total {
            let _ = writeln!(out);
        }
        let _ = out.flush();
    }
}
