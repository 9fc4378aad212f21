use crate::models::audio_models::CaptureSource;
use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::CaptureState;

/// Observer for capture stream events.
///
/// Injected at construction instead of process-wide counters. `on_buffer`,
/// `on_discontinuity` and `on_error` may be called from a capture worker or a
/// driver callback thread, so implementations must return quickly and must
/// not block on the stream that is reporting.
pub trait CaptureDelegate: Send + Sync {
    /// Called when a stream changes lifecycle state.
    fn on_state_changed(&self, source: CaptureSource, state: CaptureState);

    /// Called for every buffer appended to the output file.
    fn on_buffer(&self, source: CaptureSource, bytes: usize, silent: bool);

    /// Called when the driver reports a gap in the captured data.
    fn on_discontinuity(&self, source: CaptureSource);

    /// Called when an error occurs after the stream started.
    fn on_error(&self, source: CaptureSource, error: &CaptureError);

    /// Called once the stream has stopped and its file is finalized.
    fn on_capture_finished(&self, result: &RecordingResult);
}
