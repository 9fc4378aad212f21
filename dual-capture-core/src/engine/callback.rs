//! Callback capture engine, used for the microphone.
//!
//! The driver records into a fixed pool of application buffers and reports
//! each completed buffer on its own thread. The `CompletionHandler` appends
//! the recorded bytes and tells the device whether to hand the buffer back:
//!
//! ```text
//! driver thread                     CompletionHandler
//! ─────────────                     ─────────────────
//! buffer done ──on_buffer_filled──▶ lock stream
//!                                   Queued → Filled
//!                                   running? append, Filled → Queued ─▶ Requeue
//!                                   stopped? Filled → Free            ─▶ Discard
//! Requeue ──▶ resubmit to driver
//! ```
//!
//! Pool and encoder live behind one `parking_lot::Mutex`, which is also the
//! barrier `stop` uses: once the running flag is cleared and the lock has been
//! taken once, no further bytes can reach the file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{AudioFormat, CaptureSource};
use crate::models::config::BufferPoolConfig;
use crate::models::error::CaptureError;
use crate::processing::buffer_pool::BufferPool;
use crate::storage::stream_encoder::StreamEncoder;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_engine::{CaptureEngine, EngineSummary};
use crate::traits::endpoint::InputDevice;

/// What the device must do with a buffer after the handler has seen it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Hand the buffer back to the driver for another fill.
    Requeue,
    /// Keep the buffer; the stream is shutting down.
    Discard,
}

struct StreamState {
    pool: BufferPool,
    encoder: Option<StreamEncoder>,
}

/// Receives buffer completions from a driver callback thread.
pub struct CompletionHandler {
    source: CaptureSource,
    running: Arc<AtomicBool>,
    stream: Arc<Mutex<StreamState>>,
    delegate: Arc<dyn CaptureDelegate>,
}

impl CompletionHandler {
    /// Called by the device when buffer `id` holds `recorded` fresh bytes.
    pub fn on_buffer_filled(&self, id: usize, recorded: usize) -> Completion {
        let mut guard = self.stream.lock();
        let stream = &mut *guard;

        if let Err(e) = stream.pool.mark_filled(id, recorded) {
            // The device keeps a discarded buffer, so it no longer counts as queued.
            let _ = stream.pool.release(id);
            drop(guard);
            log::warn!("{} dropped completion: {}", self.source, e);
            return Completion::Discard;
        }

        if !self.running.load(Ordering::Acquire) {
            let _ = stream.pool.release(id);
            return Completion::Discard;
        }

        if let (Some(encoder), Some(buffer)) = (stream.encoder.as_mut(), stream.pool.get(id)) {
            encoder.append(buffer.filled());
        }
        if let Err(e) = stream.pool.requeue(id) {
            let _ = stream.pool.release(id);
            drop(guard);
            log::warn!("{} could not requeue buffer: {}", self.source, e);
            return Completion::Discard;
        }
        drop(guard);

        self.delegate.on_buffer(self.source, recorded, false);
        Completion::Requeue
    }

    /// Called by the device when handing a buffer back to the driver failed.
    /// The pool shrinks by one buffer; capture continues on the rest.
    pub fn on_resubmit_failed(&self, id: usize, error: CaptureError) {
        let _ = self.stream.lock().pool.release(id);
        log::error!("{} lost buffer {}: {}", self.source, id, error);
        self.delegate.on_error(self.source, &error);
    }
}

/// Engine driving an `InputDevice` through a pool of rotating buffers.
pub struct CallbackEngine<D: InputDevice> {
    source: CaptureSource,
    device: D,
    format: AudioFormat,
    output_path: PathBuf,
    pool_config: BufferPoolConfig,
    delegate: Arc<dyn CaptureDelegate>,
    running: Arc<AtomicBool>,
    stream: Option<Arc<Mutex<StreamState>>>,
    summary: Option<EngineSummary>,
}

impl<D: InputDevice> CallbackEngine<D> {
    pub fn new(
        source: CaptureSource,
        device: D,
        format: AudioFormat,
        output_path: PathBuf,
        pool_config: BufferPoolConfig,
        delegate: Arc<dyn CaptureDelegate>,
    ) -> Self {
        Self {
            source,
            device,
            format,
            output_path,
            pool_config,
            delegate,
            running: Arc::new(AtomicBool::new(false)),
            stream: None,
            summary: None,
        }
    }

    fn submit_all(&mut self, stream: &Mutex<StreamState>) -> Result<(), CaptureError> {
        let mut guard = stream.lock();
        for id in 0..guard.pool.len() {
            guard.pool.mark_queued(id)?;
            let buffer = guard
                .pool
                .get_mut(id)
                .ok_or_else(|| CaptureError::InvalidState(format!("missing buffer {}", id)))?;
            self.device.submit(buffer)?;
        }
        Ok(())
    }

    /// Release everything a failed `start` acquired, including the file.
    fn unwind(&mut self, stream: Arc<Mutex<StreamState>>) {
        self.running.store(false, Ordering::Release);
        self.device.halt();
        self.device.close();

        let mut guard = stream.lock();
        guard.pool.release_all();
        if let Some(encoder) = guard.encoder.take() {
            encoder.discard();
        }
    }
}

impl<D: InputDevice> CaptureEngine for CallbackEngine<D> {
    fn source(&self) -> CaptureSource {
        self.source
    }

    fn output_path(&self) -> &Path {
        &self.output_path
    }

    fn start(&mut self) -> Result<AudioFormat, CaptureError> {
        if self.stream.is_some() || self.summary.is_some() {
            return Err(CaptureError::InvalidState(format!("{} capture cannot be restarted", self.source)));
        }

        let pool = BufferPool::new(self.pool_config.buffer_count, self.pool_config.buffer_size);
        if pool.is_empty() {
            return Err(CaptureError::InvalidState(format!("{} capture has no buffers", self.source)));
        }
        let encoder = StreamEncoder::open(&self.output_path, self.format)?;
        let stream = Arc::new(Mutex::new(StreamState {
            pool,
            encoder: Some(encoder),
        }));
        let handler = Arc::new(CompletionHandler {
            source: self.source,
            running: Arc::clone(&self.running),
            stream: Arc::clone(&stream),
            delegate: Arc::clone(&self.delegate),
        });

        if let Err(e) = self.device.open(&self.format, handler) {
            self.unwind(stream);
            return Err(e);
        }
        if let Err(e) = self.submit_all(&stream) {
            self.unwind(stream);
            return Err(e);
        }

        // Set before the device starts so the very first completion is kept.
        self.running.store(true, Ordering::Release);
        if let Err(e) = self.device.start() {
            self.unwind(stream);
            return Err(e);
        }

        log::info!(
            "{} capture started: {} -> {} ({} x {} byte buffers)",
            self.source,
            self.format,
            self.output_path.display(),
            self.pool_config.buffer_count,
            self.pool_config.buffer_size
        );
        self.stream = Some(stream);
        Ok(self.format)
    }

    fn stop(&mut self) -> EngineSummary {
        if let Some(summary) = self.summary {
            return summary;
        }
        let Some(stream) = self.stream.take() else {
            return EngineSummary::default();
        };

        self.running.store(false, Ordering::Release);
        // Wait out any completion that saw the flag before it was cleared.
        drop(stream.lock());

        self.device.halt();
        self.device.close();

        let mut guard = stream.lock();
        guard.pool.release_all();
        let data_bytes = match guard.encoder.take() {
            Some(mut encoder) => {
                encoder.finalize();
                encoder.data_bytes()
            }
            None => 0,
        };
        drop(guard);

        log::info!("{} capture stopped: {} data bytes written", self.source, data_bytes);
        let summary = EngineSummary {
            data_bytes,
            finalized: true,
        };
        self.summary = Some(summary);
        summary
    }

    fn is_capturing(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl<D: InputDevice> Drop for CallbackEngine<D> {
    fn drop(&mut self) {
        self.stop();
    }
}
