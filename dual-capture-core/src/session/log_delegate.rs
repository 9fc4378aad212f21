use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::audio_models::CaptureSource;
use crate::models::diagnostics::CaptureDiagnostics;
use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::CaptureState;
use crate::traits::capture_delegate::CaptureDelegate;

/// Decides which occurrences of a repeating event get logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPolicy {
    /// Log every N-th occurrence; 0 never logs.
    pub every: u64,
}

impl SamplingPolicy {
    pub fn new(every: u64) -> Self {
        Self { every }
    }

    /// `count` is 1-based: the first buffer is count 1.
    pub fn should_log(&self, count: u64) -> bool {
        self.every != 0 && count % self.every == 0
    }
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self { every: 100 }
    }
}

#[derive(Default)]
struct SourceCounters {
    buffers: AtomicU64,
    bytes: AtomicU64,
    silent_buffers: AtomicU64,
    discontinuities: AtomicU64,
    errors: AtomicU64,
}

impl SourceCounters {
    fn snapshot(&self) -> CaptureDiagnostics {
        CaptureDiagnostics {
            buffers: self.buffers.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            silent_buffers: self.silent_buffers.load(Ordering::Relaxed),
            discontinuities: self.discontinuities.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Delegate that counts per-stream events and logs a sample of them.
///
/// Counters are lock-free so the capture threads never wait on it.
#[derive(Default)]
pub struct LogDelegate {
    policy: SamplingPolicy,
    counters: [SourceCounters; 2],
}

impl LogDelegate {
    pub fn new(policy: SamplingPolicy) -> Self {
        Self {
            policy,
            counters: Default::default(),
        }
    }

    pub fn diagnostics(&self, source: CaptureSource) -> CaptureDiagnostics {
        self.counters[source.index()].snapshot()
    }

    fn counters(&self, source: CaptureSource) -> &SourceCounters {
        &self.counters[source.index()]
    }
}

impl CaptureDelegate for LogDelegate {
    fn on_state_changed(&self, source: CaptureSource, state: CaptureState) {
        log::debug!("{} -> {}", source, state);
    }

    fn on_buffer(&self, source: CaptureSource, bytes: usize, silent: bool) {
        let counters = self.counters(source);
        let count = counters.buffers.fetch_add(1, Ordering::Relaxed) + 1;
        let total = counters.bytes.fetch_add(bytes as u64, Ordering::Relaxed) + bytes as u64;
        if silent {
            counters.silent_buffers.fetch_add(1, Ordering::Relaxed);
        }

        if self.policy.should_log(count) {
            log::info!("Capturing {} audio... (buffer #{}, {} bytes)", source, count, total);
        }
    }

    fn on_discontinuity(&self, source: CaptureSource) {
        let count = self.counters(source).discontinuities.fetch_add(1, Ordering::Relaxed) + 1;
        if count == 1 || self.policy.should_log(count) {
            log::warn!("{} data discontinuity ({} so far)", source, count);
        }
    }

    fn on_error(&self, source: CaptureSource, error: &CaptureError) {
        let count = self.counters(source).errors.fetch_add(1, Ordering::Relaxed) + 1;
        if count == 1 || self.policy.should_log(count) {
            log::warn!("{} capture error #{}: {}", source, count, error);
        }
    }

    fn on_capture_finished(&self, result: &RecordingResult) {
        let diag = self.diagnostics(result.source);
        log::debug!(
            "{} finished: {} buffers, {} silent, {} discontinuities, {} errors",
            result.source,
            diag.buffers,
            diag.silent_buffers,
            diag.discontinuities,
            diag.errors
        );
    }
}
