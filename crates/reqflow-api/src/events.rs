// ── Lifecycle event sink ──
//
// One method per request phase. Executors call these in a fixed order;
// every method defaults to a no-op so sinks only implement what they watch.

use std::time::Duration;

use serde::Serialize;

use crate::envelope::Envelope;

/// Raw byte counters for one direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub loaded: u64,
    /// Known only when the peer (or the payload) declared a length.
    pub total: Option<u64>,
}

/// Progress enriched with a percentage and estimates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressReport {
    pub loaded: u64,
    pub total: Option<u64>,
    /// 0.0 ..= 100.0, or 0.0 while the total is unknown.
    pub progress: f64,
    pub size_left: Option<u64>,
    pub time_left: Option<Duration>,
}

impl ProgressReport {
    /// Derive a report from counters and the time spent so far.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn new(progress: Progress, elapsed: Duration) -> Self {
        let Progress { loaded, total } = progress;
        let size_left = total.map(|t| t.saturating_sub(loaded));
        let percent = match total {
            Some(0) => 100.0,
            Some(t) => (loaded.min(t) as f64 / t as f64) * 100.0,
            None => 0.0,
        };
        // Absurd totals (a lying Content-Length) overflow Duration; no estimate then.
        let time_left = match size_left {
            Some(left) if loaded > 0 => {
                let ratio = left as f64 / loaded as f64;
                Duration::try_from_secs_f64(elapsed.as_secs_f64() * ratio).ok()
            }
            _ => None,
        };

        Self {
            loaded,
            total,
            progress: percent,
            size_left,
            time_left,
        }
    }
}

/// Receiver of lifecycle callbacks for a single request.
///
/// Order for a settled exchange: `before_request`, `request_start`,
/// `request_progress`*, `request_end`, `response_start`,
/// `response_progress`*, one of `success`/`error`, `response_end`.
/// A timeout emits `timeout_error` before `error`. An abort emits only
/// `abort` and nothing after it.
pub trait EventSink: Send + Sync {
    fn on_before_request(&self) {}
    fn on_request_start(&self) {}
    fn on_request_progress(&self, _progress: Progress) {}
    fn on_request_end(&self) {}
    fn on_response_start(&self) {}
    fn on_response_progress(&self, _progress: Progress) {}
    fn on_success(&self, _envelope: &Envelope) {}
    fn on_error(&self, _envelope: &Envelope) {}
    fn on_response_end(&self) {}
    fn on_timeout_error(&self) {}
    fn on_abort(&self) {}
}

/// Sink that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_halfway() {
        let report = ProgressReport::new(
            Progress {
                loaded: 50,
                total: Some(100),
            },
            Duration::from_secs(2),
        );
        assert!((report.progress - 50.0).abs() < f64::EPSILON);
        assert_eq!(report.size_left, Some(50));
        assert_eq!(report.time_left, Some(Duration::from_secs(2)));
    }

    #[test]
    fn oversized_total_yields_no_time_estimate() {
        let report = ProgressReport::new(
            Progress {
                loaded: 1,
                total: Some(u64::MAX),
            },
            Duration::from_secs(2),
        );
        assert_eq!(report.size_left, Some(u64::MAX - 1));
        assert_eq!(report.time_left, None);
        assert!(report.progress < 1.0);
    }

    #[test]
    fn report_without_total_has_no_estimates() {
        let report = ProgressReport::new(
            Progress {
                loaded: 10,
                total: None,
            },
            Duration::from_millis(10),
        );
        assert!(report.progress.abs() < f64::EPSILON);
        assert_eq!(report.size_left, None);
        assert_eq!(report.time_left, None);
    }
}
