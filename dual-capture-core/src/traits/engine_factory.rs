use std::sync::Arc;

use crate::models::config::CaptureConfiguration;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_engine::CaptureEngine;

/// Builds the platform's engines. Which implementation is used is a
/// compile-time choice made by the binary.
pub trait EngineFactory {
    /// Engine capturing the default render endpoint in loopback mode.
    fn loopback(&self, config: &CaptureConfiguration, delegate: Arc<dyn CaptureDelegate>) -> Box<dyn CaptureEngine>;

    /// Engine capturing the default input device.
    fn microphone(&self, config: &CaptureConfiguration, delegate: Arc<dyn CaptureDelegate>)
        -> Box<dyn CaptureEngine>;
}
