//! Polling capture engine, used for loopback taps.
//!
//! ```text
//! start() ──spawn──▶ [worker] open endpoint → open encoder → start endpoint
//!    ▲                   │
//!    └──── ready(format) ┘
//!                        loop while running:
//!                          frames = next_packet_frames()
//!                          0  → sleep(poll_interval)
//!                          >0 → drain every pending packet into the encoder
//!                        close endpoint → finalize encoder → exit
//! stop() ── clear flag, join worker (bounded) ──▶ EngineSummary
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};

use crate::engine::worker::CaptureWorker;
use crate::models::audio_models::{AudioFormat, CaptureSource};
use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::storage::stream_encoder::StreamEncoder;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_engine::{CaptureEngine, EngineSummary};
use crate::traits::endpoint::{Packet, PolledEndpoint};

/// Engine that owns a worker thread actively draining a `PolledEndpoint`.
pub struct PollingEngine<E: PolledEndpoint> {
    source: CaptureSource,
    output_path: PathBuf,
    poll_interval: Duration,
    stop_timeout: Duration,
    max_consecutive_errors: u32,
    delegate: Arc<dyn CaptureDelegate>,
    endpoint: Option<E>,
    running: Arc<AtomicBool>,
    worker: Option<CaptureWorker<EngineSummary>>,
    summary: Option<EngineSummary>,
}

impl<E: PolledEndpoint> PollingEngine<E> {
    pub fn new(
        source: CaptureSource,
        endpoint: E,
        output_path: PathBuf,
        config: &CaptureConfiguration,
        delegate: Arc<dyn CaptureDelegate>,
    ) -> Self {
        Self {
            source,
            output_path,
            poll_interval: config.poll_interval,
            stop_timeout: config.stop_timeout,
            max_consecutive_errors: config.max_consecutive_errors,
            delegate,
            endpoint: Some(endpoint),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            summary: None,
        }
    }
}

impl<E: PolledEndpoint> CaptureEngine for PollingEngine<E> {
    fn source(&self) -> CaptureSource {
        self.source
    }

    fn output_path(&self) -> &Path {
        &self.output_path
    }

    fn start(&mut self) -> Result<AudioFormat, CaptureError> {
        if self.worker.is_some() {
            return Err(CaptureError::InvalidState(format!("{} capture already running", self.source)));
        }
        let endpoint = self.endpoint.take().ok_or_else(|| {
            CaptureError::InvalidState(format!("{} capture cannot be restarted", self.source))
        })?;

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let capture = PollLoop {
            source: self.source,
            output_path: self.output_path.clone(),
            poll_interval: self.poll_interval,
            max_consecutive_errors: self.max_consecutive_errors,
            running: Arc::clone(&self.running),
            delegate: Arc::clone(&self.delegate),
        };

        self.running.store(true, Ordering::Release);
        let mut worker = CaptureWorker::spawn(
            &format!("{}-capture", self.source.label()),
            Arc::clone(&self.running),
            self.stop_timeout,
            move || capture.run(endpoint, ready_tx),
        )
        .map_err(|e| {
            self.running.store(false, Ordering::Release);
            e
        })?;

        // Block until the worker has opened everything or given up.
        match ready_rx.recv_timeout(self.stop_timeout) {
            Ok(Ok(format)) => {
                self.worker = Some(worker);
                Ok(format)
            }
            Ok(Err(e)) => {
                worker.stop();
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                // A late open sees the closed channel and unwinds on the worker.
                drop(ready_rx);
                worker.stop();
                Err(CaptureError::ThreadCreationFailure(format!(
                    "{} did not finish startup within {:?}",
                    worker.name(),
                    self.stop_timeout
                )))
            }
            Err(RecvTimeoutError::Disconnected) => {
                worker.stop();
                Err(CaptureError::ThreadCreationFailure(format!(
                    "{} exited during startup",
                    worker.name()
                )))
            }
        }
    }

    fn stop(&mut self) -> EngineSummary {
        if let Some(summary) = self.summary {
            return summary;
        }
        let Some(mut worker) = self.worker.take() else {
            return EngineSummary::default();
        };

        let summary = worker.stop().unwrap_or_default();
        if !summary.finalized {
            log::error!(
                "{} capture did not finish cleanly; {} may declare a short length",
                self.source,
                self.output_path.display()
            );
        }
        self.summary = Some(summary);
        summary
    }

    fn is_capturing(&self) -> bool {
        self.running.load(Ordering::Acquire) && self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}

impl<E: PolledEndpoint> Drop for PollingEngine<E> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the worker thread needs, moved onto it at spawn.
struct PollLoop {
    source: CaptureSource,
    output_path: PathBuf,
    poll_interval: Duration,
    max_consecutive_errors: u32,
    running: Arc<AtomicBool>,
    delegate: Arc<dyn CaptureDelegate>,
}

impl PollLoop {
    fn run<E: PolledEndpoint>(
        self,
        mut endpoint: E,
        ready: Sender<Result<AudioFormat, CaptureError>>,
    ) -> EngineSummary {
        let (format, mut encoder) = match self.open(&mut endpoint) {
            Ok(opened) => opened,
            Err(e) => {
                let _ = ready.send(Err(e));
                return EngineSummary::default();
            }
        };

        if ready.send(Ok(format)).is_err() {
            log::warn!("{} capture opened after start gave up; discarding", self.source);
            endpoint.close();
            encoder.discard();
            return EngineSummary::default();
        }
        log::info!(
            "{} capture started: {} -> {}",
            self.source,
            format,
            self.output_path.display()
        );

        self.capture(&mut endpoint, &mut encoder, format.block_align() as usize);

        endpoint.close();
        encoder.finalize();
        log::info!(
            "{} capture stopped: {} data bytes written",
            self.source,
            encoder.data_bytes()
        );

        EngineSummary {
            data_bytes: encoder.data_bytes(),
            finalized: true,
        }
    }

    /// Open endpoint and encoder, unwinding both on any failure.
    fn open<E: PolledEndpoint>(&self, endpoint: &mut E) -> Result<(AudioFormat, StreamEncoder), CaptureError> {
        let format = match endpoint.open() {
            Ok(format) => format,
            Err(e) => {
                endpoint.close();
                return Err(e);
            }
        };

        let encoder = match StreamEncoder::open(&self.output_path, format) {
            Ok(encoder) => encoder,
            Err(e) => {
                endpoint.close();
                return Err(e);
            }
        };

        if let Err(e) = endpoint.start() {
            endpoint.close();
            encoder.discard();
            return Err(e);
        }

        Ok((format, encoder))
    }

    fn capture<E: PolledEndpoint>(&self, endpoint: &mut E, encoder: &mut StreamEncoder, block_align: usize) {
        let mut silence = Vec::new();
        let mut consecutive_errors = 0u32;

        while self.running.load(Ordering::Acquire) {
            match self.drain(endpoint, encoder, &mut silence, block_align) {
                Ok(packets) => {
                    consecutive_errors = 0;
                    if packets == 0 {
                        thread::sleep(self.poll_interval);
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    self.delegate.on_error(self.source, &e);
                    if consecutive_errors >= self.max_consecutive_errors {
                        log::error!(
                            "{} capture giving up after {} consecutive errors: {}",
                            self.source,
                            consecutive_errors,
                            e
                        );
                        break;
                    }
                    thread::sleep(self.poll_interval);
                }
            }
        }
    }

    /// Append every currently pending packet. Returns how many were drained.
    ///
    /// Packets the driver flags as silent are written as zeroed frames of the
    /// same length so the file timeline keeps pace with the device clock.
    fn drain<E: PolledEndpoint>(
        &self,
        endpoint: &mut E,
        encoder: &mut StreamEncoder,
        silence: &mut Vec<u8>,
        block_align: usize,
    ) -> Result<usize, CaptureError> {
        let mut packets = 0;

        while endpoint.next_packet_frames()? > 0 {
            endpoint.read_packet(&mut |packet: &Packet<'_>| {
                if packet.discontinuity {
                    self.delegate.on_discontinuity(self.source);
                }

                let bytes = if packet.silent {
                    let len = packet.frames as usize * block_align;
                    if silence.len() < len {
                        silence.resize(len, 0);
                    }
                    &silence[..len]
                } else {
                    packet.data
                };

                encoder.append(bytes);
                self.delegate.on_buffer(self.source, bytes.len(), packet.silent);
            })?;
            packets += 1;
        }

        Ok(packets)
    }
}
