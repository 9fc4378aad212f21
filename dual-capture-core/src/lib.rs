//! # dual-capture-core
//!
//! Platform-agnostic core of the dual-stream recorder.
//!
//! Captures two independent streams, the microphone and the system output
//! (loopback), each into its own WAV file. Device backends implement the
//! `PolledEndpoint` and `InputDevice` traits and are wrapped in the generic
//! `PollingEngine` and `CallbackEngine`; a platform `EngineFactory` picks them.
//!
//! ## Architecture
//!
//! ```text
//! dual-capture-core (this crate)
//! ├── traits/       ← CaptureEngine, CaptureStream, CaptureDelegate, PolledEndpoint, InputDevice, EngineFactory
//! ├── models/       ← CaptureError, CaptureState, CaptureConfiguration, AudioFormat, RecordingResult
//! ├── processing/   ← WAV header generation, capture buffer pool
//! ├── engine/       ← PollingEngine, CallbackEngine, CaptureWorker
//! ├── session/      ← CaptureSession, DualCaptureCoordinator, LogDelegate
//! └── storage/      ← StreamEncoder, metadata sidecar, output directory
//! ```
//!
//! Data path: endpoint → buffer → engine → `StreamEncoder` → file.
//! Control path: coordinator → session → engine.

pub mod engine;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use engine::callback::{CallbackEngine, Completion, CompletionHandler};
pub use engine::polling::PollingEngine;
pub use models::audio_models::{AudioFormat, CaptureSource};
pub use models::config::{BufferPoolConfig, CaptureConfiguration};
pub use models::diagnostics::CaptureDiagnostics;
pub use models::error::{format_last_platform_error, CaptureError};
pub use models::recording_result::{RecordingMetadata, RecordingResult};
pub use models::state::CaptureState;
pub use processing::buffer_pool::{BufferPool, BufferState, CaptureBuffer};
pub use session::capture_session::CaptureSession;
pub use session::coordinator::DualCaptureCoordinator;
pub use session::log_delegate::{LogDelegate, SamplingPolicy};
pub use storage::output::create_output_directory;
pub use storage::stream_encoder::StreamEncoder;
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::capture_engine::{CaptureEngine, EngineSummary};
pub use traits::capture_stream::CaptureStream;
pub use traits::endpoint::{InputDevice, Packet, PolledEndpoint};
pub use traits::engine_factory::EngineFactory;
