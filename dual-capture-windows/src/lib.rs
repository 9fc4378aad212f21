//! # dual-capture-windows
//!
//! Windows backends for dual-capture.
//!
//! Provides:
//! - `WasapiLoopbackEndpoint`: system audio via WASAPI loopback on the default render endpoint (polled)
//! - `WaveInDevice`: microphone via waveIn with driver callbacks
//! - `DeviceEnumerator`: default endpoint lookup and friendly names
//! - `WindowsEngineFactory`: wires both into the core engines
//!
//! ## Usage
//! ```ignore
//! use dual_capture_core::{CaptureConfiguration, DualCaptureCoordinator, LogDelegate};
//! use dual_capture_windows::WindowsEngineFactory;
//!
//! let config = CaptureConfiguration::default();
//! let delegate = Arc::new(LogDelegate::default());
//! let mut coordinator = DualCaptureCoordinator::from_factory(&WindowsEngineFactory, &config, delegate)?;
//! coordinator.start_all()?;
//! ```

#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod factory;
#[cfg(target_os = "windows")]
mod format;
#[cfg(target_os = "windows")]
pub mod wasapi_loopback;
#[cfg(target_os = "windows")]
pub mod wavein_mic;

#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use factory::WindowsEngineFactory;
#[cfg(target_os = "windows")]
pub use wasapi_loopback::WasapiLoopbackEndpoint;
#[cfg(target_os = "windows")]
pub use wavein_mic::WaveInDevice;
