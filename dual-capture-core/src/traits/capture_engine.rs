use std::path::Path;

use crate::models::audio_models::{AudioFormat, CaptureSource};
use crate::models::error::CaptureError;

/// What an engine reports once it has stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSummary {
    /// PCM bytes written after the header.
    pub data_bytes: u64,
    /// Whether the encoder was finalized. False when the engine never started
    /// or its worker had to be abandoned.
    pub finalized: bool,
}

/// One audio endpoint streaming into one file.
///
/// Implemented by `PollingEngine` (loopback) and `CallbackEngine`
/// (microphone). The two share no state; a platform `EngineFactory` decides
/// which concrete endpoint each is built on.
pub trait CaptureEngine: Send {
    fn source(&self) -> CaptureSource;

    fn output_path(&self) -> &Path;

    /// Acquire the endpoint, open the encoder and begin capturing.
    ///
    /// Returns the format being written. On error every resource acquired so
    /// far, including a partially created file, has been released.
    fn start(&mut self) -> Result<AudioFormat, CaptureError>;

    /// Quiesce capture and finalize the file. Returns only after in-flight
    /// buffers have been appended or discarded. Repeated calls return the
    /// first summary.
    fn stop(&mut self) -> EngineSummary;

    /// True while buffers are still flowing into the file.
    fn is_capturing(&self) -> bool;
}
