//! The Coordinator-owned statistics struct (§3), behind a single lock per
//! §9's "critical-section-protected counters" remapping.

use std::sync::Mutex;
use std::time::Instant;

/// Cheap, always-fresh counters — the "short form" query in §4.4.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortStats {
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub in_bytes: u64,
    pub out_bytes: u64,
}

/// The full struct from §3, with throughput/ratio/ETA derived on demand.
#[derive(Debug, Clone, Copy)]
pub struct DetailedStats {
    pub total_items: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub in_progress: u64,
    pub in_bytes: u64,
    pub out_bytes: u64,
    pub elapsed: std::time::Duration,
    pub bytes_per_sec: f64,
    pub items_per_sec: f64,
    pub compression_ratio: f64,
    pub estimated_time_remaining: std::time::Duration,
}

#[derive(Debug)]
struct Inner {
    total_items: u64,
    completed: u64,
    failed: u64,
    cancelled: u64,
    in_progress: u64,
    in_bytes: u64,
    out_bytes: u64,
    start_wall_time: Option<Instant>,
    last_emission_wall_time: Option<Instant>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            total_items: 0,
            completed: 0,
            failed: 0,
            cancelled: 0,
            in_progress: 0,
            in_bytes: 0,
            out_bytes: 0,
            start_wall_time: None,
            last_emission_wall_time: None,
        }
    }
}

/// Lock-guarded batch statistics. One instance lives on the Coordinator and
/// is reset at the start of each batch (§4.4 step 4).
#[derive(Debug, Default)]
pub struct Statistics(Mutex<Inner>);

impl Statistics {
    pub fn new() -> Self {
        Self(Mutex::new(Inner::default()))
    }

    pub fn reset_for_batch(&self, total_items: u64) {
        let mut inner = self.0.lock().unwrap();
        *inner = Inner {
            total_items,
            start_wall_time: Some(Instant::now()),
            ..Inner::default()
        };
    }

    pub fn job_started(&self) {
        let mut inner = self.0.lock().unwrap();
        inner.in_progress += 1;
    }

    pub fn job_completed_ok(&self, in_bytes: u64, out_bytes: u64) {
        let mut inner = self.0.lock().unwrap();
        inner.in_progress = inner.in_progress.saturating_sub(1);
        inner.completed += 1;
        inner.in_bytes += in_bytes;
        inner.out_bytes += out_bytes;
    }

    pub fn job_failed(&self) {
        let mut inner = self.0.lock().unwrap();
        inner.in_progress = inner.in_progress.saturating_sub(1);
        inner.failed += 1;
    }

    pub fn job_cancelled(&self) {
        let mut inner = self.0.lock().unwrap();
        inner.in_progress = inner.in_progress.saturating_sub(1);
        inner.cancelled += 1;
    }

    pub fn short(&self) -> ShortStats {
        let inner = self.0.lock().unwrap();
        ShortStats {
            completed: inner.completed,
            failed: inner.failed,
            cancelled: inner.cancelled,
            in_bytes: inner.in_bytes,
            out_bytes: inner.out_bytes,
        }
    }

    pub fn detailed(&self) -> DetailedStats {
        let inner = self.0.lock().unwrap();
        let elapsed = inner
            .start_wall_time
            .map(|t| t.elapsed())
            .unwrap_or_default();
        let secs = elapsed.as_secs_f64();
        let bytes_per_sec = if secs > 0.0 {
            inner.in_bytes as f64 / secs
        } else {
            0.0
        };
        let items_per_sec = if secs > 0.0 {
            inner.completed as f64 / secs
        } else {
            0.0
        };
        let compression_ratio = if inner.out_bytes > 0 {
            inner.in_bytes as f64 / inner.out_bytes as f64
        } else {
            0.0
        };
        let done = inner.completed + inner.failed + inner.cancelled;
        let remaining_items = inner.total_items.saturating_sub(done);
        let estimated_time_remaining = if items_per_sec > 0.0 {
            std::time::Duration::from_secs_f64(remaining_items as f64 / items_per_sec)
        } else {
            std::time::Duration::ZERO
        };
        DetailedStats {
            total_items: inner.total_items,
            completed: inner.completed,
            failed: inner.failed,
            cancelled: inner.cancelled,
            in_progress: inner.in_progress,
            in_bytes: inner.in_bytes,
            out_bytes: inner.out_bytes,
            elapsed,
            bytes_per_sec,
            items_per_sec,
            compression_ratio,
            estimated_time_remaining,
        }
    }

    /// True if at least `interval` has elapsed since the last emission, in
    /// which case the last-emission time is bumped to now as a side effect
    /// (mirroring the teacher's `maybe_emit_progress` throttle).
    pub fn should_emit(&self, interval: std::time::Duration) -> bool {
        let mut inner = self.0.lock().unwrap();
        let now = Instant::now();
        let due = match inner.last_emission_wall_time {
            Some(last) => now.duration_since(last) >= interval,
            None => true,
        };
        if due {
            inner.last_emission_wall_time = Some(now);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_stats_accumulate_across_jobs() {
        let stats = Statistics::new();
        stats.reset_for_batch(3);
        stats.job_completed_ok(100, 40);
        stats.job_completed_ok(200, 50);
        stats.job_failed();
        let s = stats.short();
        assert_eq!(s.completed, 2);
        assert_eq!(s.failed, 1);
        assert_eq!(s.in_bytes, 300);
        assert_eq!(s.out_bytes, 90);
    }

    #[test]
    fn compression_ratio_is_zero_with_no_output_yet() {
        let stats = Statistics::new();
        stats.reset_for_batch(1);
        assert_eq!(stats.detailed().compression_ratio, 0.0);
    }

    #[test]
    fn cancellation_releases_in_progress_like_any_other_terminal_state() {
        let stats = Statistics::new();
        stats.reset_for_batch(1);
        stats.job_started();
        assert_eq!(stats.detailed().in_progress, 1);
        stats.job_cancelled();
        let detailed = stats.detailed();
        assert_eq!(detailed.in_progress, 0);
        assert_eq!(detailed.cancelled, 1);
    }
}
