//! Lightweight stage timing.
//!
//! Timers always measure; reporting goes through `tracing` at debug level, or
//! info level when timing is enabled (programmatically or via `AF_TIMING`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable performance timing globally.
pub fn enable_timing() {
    ENABLED.store(true, Ordering::Relaxed);
}

/// Disable performance timing globally.
pub fn disable_timing() {
    ENABLED.store(false, Ordering::Relaxed);
}

/// Check if timing is enabled.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed) || std::env::var("AF_TIMING").is_ok()
}

/// A simple timer that measures elapsed time.
pub struct Timer {
    label: &'static str,
    start: Instant,
}

impl Timer {
    /// Create and start a new timer with the given label.
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
        }
    }

    /// Elapsed seconds so far.
    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Stop the timer, report it and return elapsed seconds.
    pub fn stop(self) -> f64 {
        let elapsed = self.elapsed();
        if is_enabled() {
            tracing::info!(stage = self.label, elapsed_s = elapsed, "timing");
        } else {
            tracing::debug!(stage = self.label, elapsed_s = elapsed, "timing");
        }
        elapsed
    }
}

/// Wall time per pipeline stage, in the order the stages ran.
#[derive(Debug, Clone, Default)]
pub struct StageTimings {
    entries: Vec<(String, f64)>,
}

impl StageTimings {
    pub fn record(&mut self, stage: impl Into<String>, seconds: f64) {
        self.entries.push((stage.into(), seconds));
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn total_seconds(&self) -> f64 {
        self.entries.iter().map(|(_, s)| s).sum()
    }

    pub fn get(&self, stage: &str) -> Option<f64> {
        self.entries
            .iter()
            .filter(|(name, _)| name == stage)
            .map(|(_, s)| *s)
            .reduce(|a, b| a + b)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_timings_accumulate_repeated_stages() {
        let mut t = StageTimings::default();
        t.record("modes", 0.5);
        t.record("run", 1.0);
        t.record("modes", 0.25);
        assert_eq!(t.get("modes"), Some(0.75));
        assert_eq!(t.get("missing"), None);
        assert!((t.total_seconds() - 1.75).abs() < 1e-15);
    }

    #[test]
    fn timing_switch_toggles() {
        enable_timing();
        assert!(is_enabled());
        disable_timing();
        if std::env::var("AF_TIMING").is_err() {
            assert!(!is_enabled());
        }
    }

    #[test]
    fn timer_measures_nonnegative_time() {
        let timer = Timer::start("unit");
        assert!(timer.stop() >= 0.0);
    }
}
