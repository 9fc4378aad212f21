use std::sync::Arc;

use crate::engine::callback::CompletionHandler;
use crate::models::audio_models::AudioFormat;
use crate::models::error::CaptureError;
use crate::processing::buffer_pool::CaptureBuffer;

/// One packet borrowed from a polled endpoint.
#[derive(Debug, Clone, Copy)]
pub struct Packet<'a> {
    /// Raw PCM for `frames` frames. Contents are undefined when `silent` is set.
    pub data: &'a [u8],
    pub frames: u32,
    /// The driver marked this packet as silence.
    pub silent: bool,
    /// The driver dropped data before this packet.
    pub discontinuity: bool,
}

/// An endpoint that is drained by an engine-owned thread.
///
/// Every method, including `open`, runs on the capture worker thread, so
/// implementations may hold thread-affine handles.
pub trait PolledEndpoint: Send + 'static {
    /// Acquire the device and negotiate the PCM format to be written.
    fn open(&mut self) -> Result<AudioFormat, CaptureError>;

    /// Begin delivering packets.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Frames in the next pending packet, or zero when nothing is pending.
    fn next_packet_frames(&mut self) -> Result<u32, CaptureError>;

    /// Borrow the next packet, pass it to `sink`, then release it back to the
    /// driver.
    fn read_packet(&mut self, sink: &mut dyn FnMut(&Packet<'_>)) -> Result<(), CaptureError>;

    /// Stop the device and release everything acquired by `open`. Errors are
    /// swallowed.
    fn close(&mut self);
}

/// A device that records into application buffers and reports each completed
/// buffer through a driver-owned callback thread.
///
/// Contract for implementations: whenever `CompletionHandler::on_buffer_filled`
/// returns `Completion::Requeue`, the same buffer must be handed back to the
/// driver before the callback returns; on `Completion::Discard` it must not be.
pub trait InputDevice: Send {
    /// Open the device for `format`, routing completions to `handler`.
    fn open(&mut self, format: &AudioFormat, handler: Arc<CompletionHandler>) -> Result<(), CaptureError>;

    /// Register `buffer` with the driver and queue it for recording.
    fn submit(&mut self, buffer: &mut CaptureBuffer) -> Result<(), CaptureError>;

    /// Begin recording into queued buffers.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Stop recording and return every queued buffer through the handler.
    /// Returns once no completion is still in flight. No-op when not open.
    fn halt(&mut self);

    /// Unregister all buffers, close the device and drop the handler.
    /// No-op when not open.
    fn close(&mut self);
}
