use std::path::Path;
use std::sync::Arc;

use crate::models::audio_models::{AudioFormat, CaptureSource};
use crate::models::error::CaptureError;
use crate::models::recording_result::{RecordingMetadata, RecordingResult};
use crate::models::state::CaptureState;
use crate::storage::metadata;
use crate::storage::stream_encoder::sha256_file;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_engine::{CaptureEngine, EngineSummary};
use crate::traits::capture_stream::CaptureStream;

/// Lifecycle wrapper around one capture engine.
///
/// ```text
/// idle ──start──▶ initializing ──ok──▶ running ──stop──▶ stopping ──▶ stopped
///                      │                                                 ▲
///                      └───────────────── start failed ──────────────────┘
/// ```
///
/// Once stopped, the session holds a `RecordingResult` describing the
/// finalized file.
pub struct CaptureSession {
    engine: Box<dyn CaptureEngine>,
    delegate: Arc<dyn CaptureDelegate>,
    write_metadata: bool,
    state: CaptureState,
    format: Option<AudioFormat>,
    last_error: Option<CaptureError>,
    result: Option<RecordingResult>,
}

impl CaptureSession {
    pub fn new(engine: Box<dyn CaptureEngine>, delegate: Arc<dyn CaptureDelegate>, write_metadata: bool) -> Self {
        Self {
            engine,
            delegate,
            write_metadata,
            state: CaptureState::Idle,
            format: None,
            last_error: None,
            result: None,
        }
    }

    pub fn source(&self) -> CaptureSource {
        self.engine.source()
    }

    pub fn output_path(&self) -> &Path {
        self.engine.output_path()
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Format being written, known once `start` succeeded.
    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    /// Why the last `start` failed.
    pub fn last_error(&self) -> Option<&CaptureError> {
        self.last_error.as_ref()
    }

    pub fn result(&self) -> Option<&RecordingResult> {
        self.result.as_ref()
    }

    fn set_state(&mut self, state: CaptureState) {
        self.state = state;
        log::debug!("{} session {}", self.source(), state);
        self.delegate.on_state_changed(self.source(), state);
    }

    fn build_result(&self, format: AudioFormat, summary: EngineSummary) -> RecordingResult {
        let path = self.output_path().to_path_buf();
        let checksum = sha256_file(&path).unwrap_or_else(|e| {
            log::warn!("Could not checksum {}: {}", path.display(), e);
            String::new()
        });

        let metadata = RecordingMetadata::new(
            self.source(),
            &path.to_string_lossy(),
            &format,
            summary.data_bytes,
            &checksum,
        );
        if self.write_metadata {
            if let Err(e) = metadata::write_metadata(&metadata, &path) {
                log::warn!("Could not write metadata for {}: {}", path.display(), e);
            }
        }

        RecordingResult {
            source: self.source(),
            file_path: path,
            format,
            data_bytes: summary.data_bytes,
            duration_secs: format.duration_secs(summary.data_bytes),
            checksum,
            metadata,
        }
    }
}

impl CaptureStream for CaptureSession {
    fn start(&mut self) -> Result<(), CaptureError> {
        if !self.state.is_idle() {
            return Err(CaptureError::InvalidState(format!(
                "{} session cannot start from {}",
                self.source(),
                self.state
            )));
        }

        self.set_state(CaptureState::Initializing);
        match self.engine.start() {
            Ok(format) => {
                self.format = Some(format);
                self.set_state(CaptureState::Running);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to start {} capture: {}", self.source(), e);
                self.last_error = Some(e.clone());
                self.set_state(CaptureState::Stopped);
                Err(e)
            }
        }
    }

    fn stop(&mut self) {
        if !self.state.is_running() {
            return;
        }

        self.set_state(CaptureState::Stopping);
        let summary = self.engine.stop();

        match (self.format, summary.finalized) {
            (Some(format), true) => {
                let result = self.build_result(format, summary);
                log::info!(
                    "{} recording saved: {} ({:.2} s, {} bytes)",
                    result.source,
                    result.file_path.display(),
                    result.duration_secs,
                    result.data_bytes
                );
                self.delegate.on_capture_finished(&result);
                self.result = Some(result);
            }
            _ => log::error!("{} recording was not finalized", self.source()),
        }

        self.set_state(CaptureState::Stopped);
    }

    fn is_running(&self) -> bool {
        self.state.is_running() && self.engine.is_capturing()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}
