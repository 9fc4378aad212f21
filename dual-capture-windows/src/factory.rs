use std::sync::Arc;

use dual_capture_core::engine::callback::CallbackEngine;
use dual_capture_core::engine::polling::PollingEngine;
use dual_capture_core::models::audio_models::CaptureSource;
use dual_capture_core::models::config::CaptureConfiguration;
use dual_capture_core::traits::capture_delegate::CaptureDelegate;
use dual_capture_core::traits::capture_engine::CaptureEngine;
use dual_capture_core::traits::engine_factory::EngineFactory;

use crate::wasapi_loopback::WasapiLoopbackEndpoint;
use crate::wavein_mic::WaveInDevice;

/// WASAPI loopback for system audio, waveIn for the microphone.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsEngineFactory;

impl EngineFactory for WindowsEngineFactory {
    fn loopback(&self, config: &CaptureConfiguration, delegate: Arc<dyn CaptureDelegate>) -> Box<dyn CaptureEngine> {
        Box::new(PollingEngine::new(
            CaptureSource::Loopback,
            WasapiLoopbackEndpoint::new(),
            config.output_path(CaptureSource::Loopback),
            config,
            delegate,
        ))
    }

    fn microphone(&self, config: &CaptureConfiguration, delegate: Arc<dyn CaptureDelegate>) -> Box<dyn CaptureEngine> {
        Box::new(CallbackEngine::new(
            CaptureSource::Microphone,
            WaveInDevice::new(),
            config.mic_format,
            config.output_path(CaptureSource::Microphone),
            config.buffer_pool,
            delegate,
        ))
    }
}
