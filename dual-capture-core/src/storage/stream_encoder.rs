use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::audio_models::AudioFormat;
use crate::models::error::CaptureError;
use crate::processing::wav_format::{self, WAV_HEADER_SIZE};

/// Streaming WAV writer.
///
/// ```text
/// [44-byte WAV header, sizes zero until finalize]
/// [raw PCM data...]
/// ```
///
/// The header is written speculatively on `open` and patched in place by
/// `finalize` once the total length is known, so a process that dies
/// mid-recording still leaves a parseable file that declares zero samples.
///
/// `append` takes `&mut self`; callers sharing an encoder across threads wrap
/// it in a `parking_lot::Mutex`.
pub struct StreamEncoder {
    path: PathBuf,
    format: AudioFormat,
    header: [u8; WAV_HEADER_SIZE],
    writer: Option<BufWriter<File>>,
    data_bytes: u64,
    write_failures: u64,
}

impl StreamEncoder {
    /// Create or truncate `path` and write the placeholder header.
    pub fn open(path: impl Into<PathBuf>, format: AudioFormat) -> Result<Self, CaptureError> {
        let path = path.into();
        format.validate().map_err(CaptureError::FormatRejected)?;

        let file = File::create(&path)
            .map_err(|e| CaptureError::io(&format!("cannot create {}", path.display()), e))?;
        let mut writer = BufWriter::new(file);

        let header = wav_format::generate_wav_header(&format, 0);
        writer
            .write_all(&header)
            .map_err(|e| CaptureError::io(&format!("cannot write header to {}", path.display()), e))?;

        log::debug!("Opened {} ({})", path.display(), format);

        Ok(Self {
            path,
            format,
            header,
            writer: Some(writer),
            data_bytes: 0,
            write_failures: 0,
        })
    }

    /// Append raw PCM bytes. Does nothing once the encoder is closed.
    ///
    /// Write errors are logged and counted rather than returned; a recording
    /// with a gap is preferred over aborting the stream.
    pub fn append(&mut self, data: &[u8]) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        if data.is_empty() {
            return;
        }

        match writer.write_all(data) {
            Ok(()) => self.data_bytes += data.len() as u64,
            Err(e) => {
                if self.write_failures % 100 == 0 {
                    log::error!(
                        "Failed to write audio data to {} ({} failures so far): {}",
                        self.path.display(),
                        self.write_failures + 1,
                        e
                    );
                }
                self.write_failures += 1;
            }
        }
    }

    /// Patch the header sizes, rewrite it at offset 0 and close the file.
    ///
    /// Idempotent: later calls are no-ops. Errors are logged, never returned,
    /// so that stopping a stream cannot fail.
    pub fn finalize(&mut self) {
        let Some(mut writer) = self.writer.take() else {
            return;
        };

        if let Err(e) = self.rewrite_header(&mut writer) {
            log::error!("Failed to finalize {}: {}", self.path.display(), e);
            return;
        }

        log::debug!(
            "Finalized {} with {} data bytes",
            self.path.display(),
            self.data_bytes
        );
    }

    /// Close and delete the file. Used to unwind a start that never produced audio.
    pub fn discard(mut self) {
        if self.writer.take().is_some() {
            if let Err(e) = fs::remove_file(&self.path) {
                log::warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }

    fn rewrite_header(&mut self, writer: &mut BufWriter<File>) -> std::io::Result<()> {
        writer.flush()?;

        if self.write_failures > 0 {
            // Partial writes make the counter unreliable; trust the file length.
            let end = writer.get_mut().seek(SeekFrom::End(0))?;
            self.data_bytes = end.saturating_sub(WAV_HEADER_SIZE as u64);
        }

        wav_format::patch_sizes(&mut self.header, self.data_bytes);
        let file = writer.get_mut();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&self.header)?;
        file.flush()
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// PCM bytes written after the header.
    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    /// Total bytes in the file, header included.
    pub fn bytes_written(&self) -> u64 {
        self.data_bytes + WAV_HEADER_SIZE as u64
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StreamEncoder {
    fn drop(&mut self) {
        self.finalize();
    }
}

/// Compute the SHA-256 hex digest of a file.
pub fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let data = fs::read(path).map_err(|e| CaptureError::io("failed to read file for checksum", e))?;
    let digest = Sha256::digest(&data);
    Ok(hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::wav_format::WavHeader;

    fn temp_file_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("dual_capture_test_{}_{}", std::process::id(), name))
    }

    fn read_header(path: &Path) -> WavHeader {
        let data = fs::read(path).unwrap();
        WavHeader::parse(&data).unwrap()
    }

    #[test]
    fn open_writes_placeholder_header() {
        let path = temp_file_path("placeholder.wav");
        let encoder = StreamEncoder::open(&path, AudioFormat::MICROPHONE).unwrap();
        assert!(encoder.is_open());
        assert_eq!(encoder.bytes_written(), 44);

        // Flush without finalizing, as if the process died here.
        let mut encoder = encoder;
        encoder.writer.as_mut().unwrap().flush().unwrap();

        let header = read_header(&path);
        assert_eq!(header.data_size, 0);
        assert_eq!(header.riff_size, 36);
        assert_eq!(header.format, AudioFormat::MICROPHONE);

        drop(encoder);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn declared_size_matches_appended_buffers() {
        let path = temp_file_path("sizes.wav");
        let mut encoder = StreamEncoder::open(&path, AudioFormat::MICROPHONE).unwrap();

        let sizes = [4096usize, 1000, 4, 2048, 0, 512];
        for (i, size) in sizes.iter().enumerate() {
            encoder.append(&vec![i as u8; *size]);
        }
        encoder.finalize();

        let total: usize = sizes.iter().sum();
        let data = fs::read(&path).unwrap();
        assert_eq!(data.len(), 44 + total);

        let header = WavHeader::parse(&data).unwrap();
        assert_eq!(header.data_size as usize, total);
        assert_eq!(header.riff_size as usize - 36, total);
        assert!(header.is_consistent());

        fs::remove_file(&path).ok();
    }

    #[test]
    fn pcm_bytes_follow_header_in_order() {
        let path = temp_file_path("order.wav");
        let mut encoder = StreamEncoder::open(&path, AudioFormat::new(48_000, 1, 16)).unwrap();
        encoder.append(&[1, 2, 3, 4]);
        encoder.append(&[5, 6]);
        encoder.finalize();

        let data = fs::read(&path).unwrap();
        assert_eq!(&data[44..], &[1, 2, 3, 4, 5, 6]);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn finalize_twice_is_identical_to_once() {
        let path = temp_file_path("idempotent.wav");
        let mut encoder = StreamEncoder::open(&path, AudioFormat::MICROPHONE).unwrap();
        encoder.append(&vec![0x42u8; 777]);

        encoder.finalize();
        let once = fs::read(&path).unwrap();

        encoder.finalize();
        let twice = fs::read(&path).unwrap();

        assert_eq!(once, twice);
        assert!(!encoder.is_open());

        fs::remove_file(&path).ok();
    }

    #[test]
    fn append_after_finalize_is_ignored() {
        let path = temp_file_path("closed_append.wav");
        let mut encoder = StreamEncoder::open(&path, AudioFormat::MICROPHONE).unwrap();
        encoder.append(&[0u8; 8]);
        encoder.finalize();
        encoder.append(&[0u8; 8]);

        assert_eq!(encoder.data_bytes(), 8);
        assert_eq!(fs::read(&path).unwrap().len(), 52);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn drop_finalizes() {
        let path = temp_file_path("drop.wav");
        {
            let mut encoder = StreamEncoder::open(&path, AudioFormat::MICROPHONE).unwrap();
            encoder.append(&[7u8; 100]);
        }
        assert_eq!(read_header(&path).data_size, 100);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn discard_removes_file() {
        let path = temp_file_path("discard.wav");
        let encoder = StreamEncoder::open(&path, AudioFormat::MICROPHONE).unwrap();
        assert!(path.exists());
        encoder.discard();
        assert!(!path.exists());
    }

    #[test]
    fn open_in_missing_directory_fails() {
        let path = temp_file_path("missing_dir").join("nested").join("out.wav");
        let result = StreamEncoder::open(&path, AudioFormat::MICROPHONE);
        assert!(matches!(result, Err(CaptureError::IoFailure(_))));
    }

    #[test]
    fn open_rejects_invalid_format() {
        let path = temp_file_path("bad_format.wav");
        let result = StreamEncoder::open(&path, AudioFormat::new(0, 2, 16));
        assert!(matches!(result, Err(CaptureError::FormatRejected(_))));
        assert!(!path.exists());
    }

    #[test]
    fn open_rejects_format_too_wide_for_header() {
        let path = temp_file_path("too_wide.wav");
        let result = StreamEncoder::open(&path, AudioFormat::new(48_000, 4096, 32));
        assert!(matches!(result, Err(CaptureError::FormatRejected(_))));
        assert!(!path.exists());
    }

    #[test]
    fn checksum_is_hex_sha256() {
        let path = temp_file_path("checksum.wav");
        let mut encoder = StreamEncoder::open(&path, AudioFormat::MICROPHONE).unwrap();
        encoder.append(&[1u8; 16]);
        encoder.finalize();

        let checksum = sha256_file(&path).unwrap();
        assert_eq!(checksum.len(), 64);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(checksum, sha256_file(&path).unwrap());

        fs::remove_file(&path).ok();
    }
}
