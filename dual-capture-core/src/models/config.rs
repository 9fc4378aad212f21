use std::path::PathBuf;
use std::time::Duration;

use super::audio_models::{AudioFormat, CaptureSource};

/// Fixed-size buffer pool used by callback-driven engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Number of buffers kept in flight (default: 4).
    pub buffer_count: usize,

    /// Size of each buffer in bytes (default: 4096, ~23 ms at 44.1 kHz stereo 16-bit).
    pub buffer_size: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            buffer_count: 4,
            buffer_size: 4096,
        }
    }
}

/// Configuration for a dual capture session.
#[derive(Debug, Clone)]
pub struct CaptureConfiguration {
    /// Directory where recording files are written (default: `output`).
    pub output_directory: PathBuf,

    /// File name for the microphone stream (default: `mic.wav`).
    pub mic_file_name: String,

    /// File name for the loopback stream (default: `speaker.wav`).
    pub loopback_file_name: String,

    /// How long the orchestrator records before stopping both streams.
    pub session_duration: Duration,

    /// Format requested from the microphone driver.
    pub mic_format: AudioFormat,

    pub buffer_pool: BufferPoolConfig,

    /// Sleep between polls when the loopback endpoint has no data (default: 5 ms).
    pub poll_interval: Duration,

    /// Upper bound on waiting for a capture worker to exit (default: 5 s).
    pub stop_timeout: Duration,

    /// Consecutive driver errors after which a polling worker gives up.
    pub max_consecutive_errors: u32,

    /// Log every N-th buffer per stream; 0 disables per-buffer logging.
    pub log_sample_every: u64,

    /// Write a `<file>.metadata.json` sidecar next to each recording.
    pub write_metadata: bool,
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        self.mic_format.validate()?;
        if self.mic_file_name.is_empty() || self.loopback_file_name.is_empty() {
            return Err("output file names must not be empty".into());
        }
        if self.mic_file_name == self.loopback_file_name {
            return Err("microphone and loopback must write to different files".into());
        }
        if self.buffer_pool.buffer_count < 2 {
            return Err(format!(
                "buffer pool needs at least 2 buffers, got {}",
                self.buffer_pool.buffer_count
            ));
        }
        let block_align = self.mic_format.block_align() as usize;
        if self.buffer_pool.buffer_size == 0 || self.buffer_pool.buffer_size % block_align != 0 {
            return Err(format!(
                "buffer size {} is not a whole number of {}-byte frames",
                self.buffer_pool.buffer_size, block_align
            ));
        }
        if self.poll_interval.is_zero() {
            return Err("poll interval must be positive".into());
        }
        if self.max_consecutive_errors == 0 {
            return Err("error limit must be positive".into());
        }
        Ok(())
    }

    /// Destination path for the given stream.
    pub fn output_path(&self, source: CaptureSource) -> PathBuf {
        let name = match source {
            CaptureSource::Microphone => &self.mic_file_name,
            CaptureSource::Loopback => &self.loopback_file_name,
        };
        self.output_directory.join(name)
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("output"),
            mic_file_name: "mic.wav".into(),
            loopback_file_name: "speaker.wav".into(),
            session_duration: Duration::from_secs(30),
            mic_format: AudioFormat::MICROPHONE,
            buffer_pool: BufferPoolConfig::default(),
            poll_interval: Duration::from_millis(5),
            stop_timeout: Duration::from_secs(5),
            max_consecutive_errors: 200,
            log_sample_every: 100,
            write_metadata: true,
        }
    }
}
