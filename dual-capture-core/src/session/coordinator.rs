use std::sync::Arc;

use crate::models::audio_models::CaptureSource;
use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::session::capture_session::CaptureSession;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_stream::CaptureStream;
use crate::traits::engine_factory::EngineFactory;

/// Drives the loopback and microphone streams as a pair.
///
/// The two streams share nothing but this owner: each writes its own file on
/// its own clock, and no attempt is made to align their timelines.
pub struct DualCaptureCoordinator<L: CaptureStream = CaptureSession, M: CaptureStream = CaptureSession> {
    loopback: L,
    microphone: M,
}

impl<L: CaptureStream, M: CaptureStream> DualCaptureCoordinator<L, M> {
    pub fn new(loopback: L, microphone: M) -> Self {
        Self { loopback, microphone }
    }

    /// Start loopback, then microphone.
    ///
    /// If the microphone fails, the already running loopback stream is
    /// stopped before the error is returned, so on `Err` nothing is running.
    pub fn start_all(&mut self) -> Result<(), CaptureError> {
        self.loopback.start()?;

        if let Err(e) = self.microphone.start() {
            log::warn!("Microphone failed to start, stopping loopback capture");
            self.loopback.stop();
            return Err(e);
        }

        log::info!("Both captures running");
        Ok(())
    }

    /// Stop both streams. Safe to call on streams that never started or
    /// already stopped.
    pub fn stop_all(&mut self) {
        self.loopback.stop();
        self.microphone.stop();
    }

    /// True while either stream is still capturing.
    pub fn is_running(&self) -> bool {
        self.loopback.is_running() || self.microphone.is_running()
    }

    pub fn loopback(&self) -> &L {
        &self.loopback
    }

    pub fn microphone(&self) -> &M {
        &self.microphone
    }
}

impl DualCaptureCoordinator {
    /// Build both sessions from the platform's engine factory.
    pub fn from_factory(
        factory: &dyn EngineFactory,
        config: &CaptureConfiguration,
        delegate: Arc<dyn CaptureDelegate>,
    ) -> Result<Self, CaptureError> {
        config
            .validate()
            .map_err(|e| CaptureError::InvalidState(format!("invalid configuration: {}", e)))?;

        let loopback = CaptureSession::new(
            factory.loopback(config, Arc::clone(&delegate)),
            Arc::clone(&delegate),
            config.write_metadata,
        );
        let microphone = CaptureSession::new(
            factory.microphone(config, Arc::clone(&delegate)),
            delegate,
            config.write_metadata,
        );
        Ok(Self::new(loopback, microphone))
    }

    /// Results of the streams that recorded, loopback first.
    pub fn results(&self) -> Vec<&RecordingResult> {
        [self.loopback.result(), self.microphone.result()]
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn session(&self, source: CaptureSource) -> &CaptureSession {
        match source {
            CaptureSource::Loopback => &self.loopback,
            CaptureSource::Microphone => &self.microphone,
        }
    }
}
