//! # Backpressure — Memory-Pressure Monitor
//!
//! Samples process memory via [`sysinfo::System`] and exposes a pause/resume
//! gate a [`crate::stream::pipeline::Pipeline`] consults before admitting
//! more in-flight items. A hysteresis band (distinct pause and resume
//! thresholds) avoids the monitor flapping open/closed every poll when
//! usage sits right at the line.

use crate::config::StreamConfig;
use crate::error::{CoreError, CoreResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use sysinfo::System;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Tracks whether the pipeline should currently accept new work, re-sampling
/// memory usage on demand rather than on its own background timer — callers
/// decide the polling cadence via `metrics_interval_ms`.
pub struct BackpressureMonitor {
    sys: Mutex<System>,
    memory_limit: usize,
    pause_threshold: f64,
    resume_threshold: f64,
    paused: AtomicBool,
    /// Set the moment `paused` latches true, cleared on resume. Drives
    /// `check_limit`'s distinction between ordinary backpressure (prefer
    /// waiting) and a sustained over-limit condition (escalate to
    /// `MemoryLimitExceeded`).
    paused_since: Mutex<Option<Instant>>,
    metrics_interval: Duration,
}

impl BackpressureMonitor {
    pub fn new(cfg: &StreamConfig) -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        BackpressureMonitor {
            sys: Mutex::new(sys),
            memory_limit: cfg.memory_limit,
            pause_threshold: cfg.backpressure_threshold,
            resume_threshold: (cfg.backpressure_threshold - cfg.backpressure_hysteresis).max(0.0),
            paused: AtomicBool::new(false),
            paused_since: Mutex::new(None),
            metrics_interval: Duration::from_millis(cfg.metrics_interval_ms),
        }
    }

    /// Fraction of `memoryLimit` currently in use by this process, in
    /// `[0.0, +inf)` — can exceed `1.0` if usage has overshot the limit.
    pub fn usage_ratio(&self) -> f64 {
        let mut sys = self.sys.lock().unwrap();
        sys.refresh_memory();
        let used = sys.used_memory() as f64;
        if self.memory_limit == 0 {
            return 0.0;
        }
        used / self.memory_limit as f64
    }

    /// Re-samples and updates the pause/resume latch, returning whether the
    /// pipeline should currently accept new work. Hysteresis means a single
    /// reading above `pause_threshold` latches a pause that only clears once
    /// usage drops below the (lower) `resume_threshold`.
    pub fn poll(&self) -> bool {
        let ratio = self.usage_ratio();
        if ratio >= self.pause_threshold {
            if !self.paused.swap(true, Ordering::Relaxed) {
                *self.paused_since.lock().unwrap() = Some(Instant::now());
                warn!(ratio, threshold = self.pause_threshold, "pipeline paused on memory pressure");
            }
        } else if ratio <= self.resume_threshold && self.paused.swap(false, Ordering::Relaxed) {
            *self.paused_since.lock().unwrap() = None;
            debug!(ratio, threshold = self.resume_threshold, "pipeline resumed");
        }
        !self.paused.load(Ordering::Relaxed)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// `Err(MemoryLimitExceeded)` if the monitor has been continuously
    /// paused for longer than one metrics interval, `Ok(())` otherwise
    /// (either not paused at all, or paused but still within the interval
    /// where plain backpressure is preferred). Distinct from `drain`'s
    /// `BackpressureStalled`, which fires on exhausting a fixed poll count
    /// regardless of how much wall-clock time that covers.
    pub fn check_limit(&self) -> CoreResult<()> {
        if !self.is_paused() {
            return Ok(());
        }
        let since = *self.paused_since.lock().unwrap();
        if let Some(since) = since {
            if since.elapsed() >= self.metrics_interval {
                return Err(CoreError::MemoryLimitExceeded {
                    used: self.used_bytes(),
                    limit: self.memory_limit,
                });
            }
        }
        Ok(())
    }

    /// Blocks (async) until the monitor clears, polling every `interval`, up
    /// to `max_polls` times. Returns `Err(MemoryLimitExceeded)` as soon as
    /// the pause has been sustained past one metrics interval, or
    /// `Err(BackpressureStalled)` if `max_polls` is exhausted first while
    /// still paused but short of that interval — a caller can treat either
    /// as a signal to widen `memoryLimit` or slow upstream production.
    pub async fn drain(&self, interval: Duration, max_polls: u32) -> CoreResult<()> {
        for _ in 0..max_polls {
            if self.poll() {
                return Ok(());
            }
            self.check_limit()?;
            sleep(interval).await;
        }
        if self.poll() {
            Ok(())
        } else {
            self.check_limit()?;
            warn!(max_polls, "backpressure drain stalled, still over limit");
            Err(CoreError::BackpressureStalled)
        }
    }

    /// Memory usage sampled at the moment of the call, for reporting
    /// alongside [`super::StageMetrics`].
    pub fn used_bytes(&self) -> usize {
        let mut sys = self.sys.lock().unwrap();
        sys.refresh_memory();
        sys.used_memory() as usize
    }

    pub fn memory_limit(&self) -> usize {
        self.memory_limit
    }
}
