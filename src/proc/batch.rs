/*!
 * Batch Accounting
 * Aggregate statistics over batch jobs, drained as a report
 */

use crate::core::types::Tick;
use crate::kernel::Kernel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Running aggregates. Lives behind its own kernel mutex, a leaf lock taken
/// while holding a record lock, so every method is plain arithmetic.
pub(crate) struct BatchStats {
    jobs: u64,
    completed: u64,
    first_dispatch: Option<Tick>,
    last_completion: Tick,
    waiting_total: Tick,
    waiting_min: Tick,
    waiting_max: Tick,
    turnaround_total: Tick,
    completion_total: Tick,
    completion_min: Tick,
    completion_max: Tick,
    burst_total: Tick,
    burst_count: u64,
    estimate_total: Tick,
    estimate_count: u64,
    error_total: Tick,
    error_count: u64,
}

impl Default for BatchStats {
    fn default() -> Self {
        Self {
            jobs: 0,
            completed: 0,
            first_dispatch: None,
            last_completion: 0,
            waiting_total: 0,
            waiting_min: Tick::MAX,
            waiting_max: 0,
            turnaround_total: 0,
            completion_total: 0,
            completion_min: Tick::MAX,
            completion_max: 0,
            burst_total: 0,
            burst_count: 0,
            estimate_total: 0,
            estimate_count: 0,
            error_total: 0,
            error_count: 0,
        }
    }
}

impl BatchStats {
    /// A batch job entered the table.
    pub fn add_job(&mut self) {
        self.jobs += 1;
    }

    /// A batch job was dispatched at `now`; the earliest dispatch anchors
    /// the batch span.
    pub fn note_start(&mut self, now: Tick) {
        if self.first_dispatch.is_none() {
            self.first_dispatch = Some(now);
        }
    }

    /// Ticks a job spent Runnable before this dispatch.
    pub fn add_waiting(&mut self, waited: Tick) {
        self.waiting_total += waited;
        self.waiting_min = self.waiting_min.min(waited);
        self.waiting_max = self.waiting_max.max(waited);
    }

    /// Measured length of one completed CPU burst.
    pub fn observe_burst(&mut self, burst: Tick) {
        self.burst_total += burst;
        self.burst_count += 1;
    }

    /// The smoothed estimate that was in force for a burst.
    pub fn observe_estimate(&mut self, estimate: Tick) {
        self.estimate_total += estimate;
        self.estimate_count += 1;
    }

    /// Absolute difference between an estimate and the burst it predicted.
    pub fn observe_estimate_error(&mut self, error: Tick) {
        self.error_total += error;
        self.error_count += 1;
    }

    /// A batch job exited at `now`; `ctime` is its creation tick.
    pub fn record_completion(&mut self, now: Tick, ctime: Tick) {
        self.completed += 1;
        self.last_completion = self.last_completion.max(now);
        self.turnaround_total += now.saturating_sub(ctime);
        let completion = now.saturating_sub(ctime);
        self.completion_total += completion;
        self.completion_min = self.completion_min.min(completion);
        self.completion_max = self.completion_max.max(completion);
    }

    /// Whether every counted batch job has completed.
    pub fn quiesced(&self) -> bool {
        self.completed >= self.jobs
    }

    /// Fold the aggregates into a report and reset for the next batch.
    pub fn take_report(&mut self) -> BatchReport {
        fn avg(total: Tick, count: u64) -> Tick {
            if count == 0 {
                0
            } else {
                total / count
            }
        }
        fn min_or_zero(min: Tick) -> Tick {
            if min == Tick::MAX {
                0
            } else {
                min
            }
        }

        let report = BatchReport {
            jobs: self.jobs,
            completed: self.completed,
            span: self
                .first_dispatch
                .map_or(0, |start| self.last_completion.saturating_sub(start)),
            turnaround_avg: avg(self.turnaround_total, self.completed),
            waiting_avg: avg(self.waiting_total, self.jobs),
            waiting_min: min_or_zero(self.waiting_min),
            waiting_max: self.waiting_max,
            completion_avg: avg(self.completion_total, self.completed),
            completion_min: min_or_zero(self.completion_min),
            completion_max: self.completion_max,
            burst_avg: avg(self.burst_total, self.burst_count),
            burst_count: self.burst_count,
            estimate_avg: avg(self.estimate_total, self.estimate_count),
            estimate_error_avg: avg(self.error_total, self.error_count),
        };
        *self = Self::default();
        report
    }
}

/// Drained snapshot of the batch aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub jobs: u64,
    pub completed: u64,
    /// Ticks from the first batch dispatch to the last batch completion.
    pub span: Tick,
    pub turnaround_avg: Tick,
    pub waiting_avg: Tick,
    pub waiting_min: Tick,
    pub waiting_max: Tick,
    pub completion_avg: Tick,
    pub completion_min: Tick,
    pub completion_max: Tick,
    pub burst_avg: Tick,
    pub burst_count: u64,
    pub estimate_avg: Tick,
    pub estimate_error_avg: Tick,
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "batch: {} jobs, {} completed over {} ticks",
            self.jobs, self.completed, self.span
        )?;
        writeln!(f, "turnaround: avg {}", self.turnaround_avg)?;
        writeln!(
            f,
            "waiting:    avg {} min {} max {}",
            self.waiting_avg, self.waiting_min, self.waiting_max
        )?;
        writeln!(
            f,
            "completion: avg {} min {} max {}",
            self.completion_avg, self.completion_min, self.completion_max
        )?;
        writeln!(
            f,
            "burst:      avg {} over {} runs",
            self.burst_avg, self.burst_count
        )?;
        write!(
            f,
            "estimate:   avg {}, error avg {}",
            self.estimate_avg, self.estimate_error_avg
        )
    }
}

impl Kernel {
    /// Drain the batch aggregates accumulated since the last call.
    pub fn take_batch_report(&self) -> BatchReport {
        self.batch.lock().take_report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn report_averages_and_extremes() {
        let mut stats = BatchStats::default();
        stats.add_job();
        stats.add_job();
        stats.note_start(10);
        stats.note_start(50);
        stats.add_waiting(4);
        stats.add_waiting(8);
        stats.observe_burst(6);
        stats.observe_burst(10);
        stats.observe_estimate(8);
        stats.observe_estimate_error(2);
        stats.record_completion(40, 10);
        stats.record_completion(100, 20);

        let report = stats.take_report();
        assert_eq!(report.jobs, 2);
        assert_eq!(report.completed, 2);
        assert_eq!(report.span, 90);
        assert_eq!(report.turnaround_avg, (30 + 80) / 2);
        assert_eq!(report.waiting_avg, 6);
        assert_eq!(report.waiting_min, 4);
        assert_eq!(report.waiting_max, 8);
        assert_eq!(report.completion_min, 30);
        assert_eq!(report.completion_max, 80);
        assert_eq!(report.burst_avg, 8);
        assert_eq!(report.estimate_avg, 8);
        assert_eq!(report.estimate_error_avg, 2);
    }

    #[test]
    fn empty_report_is_all_zeros() {
        let mut stats = BatchStats::default();
        let report = stats.take_report();
        assert_eq!(report.jobs, 0);
        assert_eq!(report.span, 0);
        assert_eq!(report.waiting_min, 0);
        assert_eq!(report.completion_min, 0);
        assert_eq!(report.turnaround_avg, 0);
    }

    #[test]
    fn take_report_resets_the_aggregates() {
        let mut stats = BatchStats::default();
        stats.add_job();
        stats.record_completion(10, 0);
        let _ = stats.take_report();
        let report = stats.take_report();
        assert_eq!(report.jobs, 0);
        assert_eq!(report.completed, 0);
    }

    #[test]
    fn report_serializes_with_snake_case_fields() {
        let mut stats = BatchStats::default();
        stats.add_job();
        let json = serde_json::to_value(stats.take_report()).unwrap();
        assert_eq!(json["jobs"], 1);
        assert_eq!(json["estimate_error_avg"], 0);
    }
}
