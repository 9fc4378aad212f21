use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::audio_models::{AudioFormat, CaptureSource};

/// Result produced when a capture stream stops and its file is finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub source: CaptureSource,
    pub file_path: PathBuf,
    pub format: AudioFormat,
    /// PCM bytes following the 44-byte header.
    pub data_bytes: u64,
    /// Audio duration derived from `data_bytes` and the format.
    pub duration_secs: f64,
    /// Lowercase hex SHA-256 of the finalized file, empty if it could not be read.
    pub checksum: String,
    pub metadata: RecordingMetadata,
}

/// Metadata written as a JSON sidecar next to a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub source: CaptureSource,
    pub file_path: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub data_bytes: u64,
    pub duration_secs: f64,
    pub checksum: String,
    pub created_at: String,
}

impl RecordingMetadata {
    pub fn new(
        source: CaptureSource,
        file_path: &str,
        format: &AudioFormat,
        data_bytes: u64,
        checksum: &str,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source,
            file_path: file_path.to_string(),
            sample_rate: format.sample_rate,
            channels: format.channels,
            bits_per_sample: format.bits_per_sample,
            data_bytes,
            duration_secs: format.duration_secs(data_bytes),
            checksum: checksum.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
