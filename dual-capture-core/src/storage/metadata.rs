use std::fs;
use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingMetadata;

/// Sidecar location for a recording: `speaker.wav` → `speaker.metadata.json`.
pub fn metadata_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("metadata.json")
}

/// Write recording metadata as a JSON sidecar file.
pub fn write_metadata(metadata: &RecordingMetadata, recording_path: &Path) -> Result<(), CaptureError> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| CaptureError::IoFailure(format!("failed to serialize metadata: {}", e)))?;
    fs::write(metadata_path(recording_path), json).map_err(|e| CaptureError::io("failed to write metadata", e))?;
    Ok(())
}

/// Read recording metadata from a JSON sidecar file.
pub fn read_metadata(recording_path: &Path) -> Result<RecordingMetadata, CaptureError> {
    let json =
        fs::read_to_string(metadata_path(recording_path)).map_err(|e| CaptureError::io("failed to read metadata", e))?;
    let metadata: RecordingMetadata = serde_json::from_str(&json)
        .map_err(|e| CaptureError::IoFailure(format!("failed to parse metadata: {}", e)))?;
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::{AudioFormat, CaptureSource};

    #[test]
    fn sidecar_sits_next_to_recording() {
        assert_eq!(
            metadata_path(Path::new("output/speaker.wav")),
            PathBuf::from("output/speaker.metadata.json")
        );
    }

    #[test]
    fn metadata_survives_disk() {
        let recording = std::env::temp_dir().join(format!("dual_capture_meta_{}.wav", std::process::id()));
        let metadata = RecordingMetadata::new(
            CaptureSource::Loopback,
            &recording.to_string_lossy(),
            &AudioFormat::new(48_000, 2, 16),
            192_000,
            "abc123",
        );

        write_metadata(&metadata, &recording).unwrap();
        let loaded = read_metadata(&recording).unwrap();
        assert_eq!(loaded, metadata);
        assert!((loaded.duration_secs - 1.0).abs() < 1e-9);

        let raw = fs::read_to_string(metadata_path(&recording)).unwrap();
        assert!(raw.contains("\"source\": \"loopback\""));

        fs::remove_file(metadata_path(&recording)).ok();
    }

    #[test]
    fn missing_sidecar_is_io_failure() {
        let result = read_metadata(Path::new("/nonexistent/dual_capture/none.wav"));
        assert!(matches!(result, Err(CaptureError::IoFailure(_))));
    }
}
