//! Canonical 44-byte RIFF/WAVE header generation and parsing.
//!
//! Layout (all integers little-endian):
//! ```text
//! [0-3]    "RIFF"
//! [4-7]    36 + data_size
//! [8-11]   "WAVE"
//! [12-15]  "fmt "
//! [16-19]  16 (PCM format chunk size)
//! [20-21]  1 (PCM format code)
//! [22-23]  channels
//! [24-27]  sample_rate
//! [28-31]  byte_rate = sample_rate * block_align
//! [32-33]  block_align = channels * bits_per_sample / 8
//! [34-35]  bits_per_sample
//! [36-39]  "data"
//! [40-43]  data_size
//! ```

use crate::models::audio_models::AudioFormat;
use crate::models::error::CaptureError;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Bytes of the header counted by the RIFF size field beyond the data chunk.
const RIFF_OVERHEAD: u32 = WAV_HEADER_SIZE as u32 - 8;

const PCM_FORMAT_CODE: u16 = 1;
const PCM_FMT_CHUNK_SIZE: u32 = 16;

/// Generate a 44-byte PCM header declaring `data_size` bytes of samples.
///
/// Sizes above `u32::MAX` saturate; a RIFF file cannot declare more.
pub fn generate_wav_header(format: &AudioFormat, data_size: u64) -> [u8; WAV_HEADER_SIZE] {
    let data_size = clamp_u32(data_size);
    let riff_size = data_size.saturating_add(RIFF_OVERHEAD);

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&riff_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&PCM_FMT_CHUNK_SIZE.to_le_bytes());
    header[20..22].copy_from_slice(&PCM_FORMAT_CODE.to_le_bytes());
    header[22..24].copy_from_slice(&format.channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&format.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&format.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&format.bits_per_sample.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Patch the RIFF size (offset 4) and data size (offset 40) fields in place.
pub fn patch_sizes(header: &mut [u8; WAV_HEADER_SIZE], data_size: u64) {
    let data_size = clamp_u32(data_size);
    header[4..8].copy_from_slice(&data_size.saturating_add(RIFF_OVERHEAD).to_le_bytes());
    header[40..44].copy_from_slice(&data_size.to_le_bytes());
}

fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Decoded view of a canonical header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_size: u32,
    pub format_code: u16,
    pub format: AudioFormat,
    pub byte_rate: u32,
    pub block_align: u16,
    pub data_size: u32,
}

impl WavHeader {
    /// Parse the first 44 bytes of a canonical PCM WAV file.
    pub fn parse(bytes: &[u8]) -> Result<Self, CaptureError> {
        if bytes.len() < WAV_HEADER_SIZE {
            return Err(CaptureError::IoFailure(format!(
                "wav header truncated: {} of {} bytes",
                bytes.len(),
                WAV_HEADER_SIZE
            )));
        }
        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(CaptureError::IoFailure("missing RIFF/WAVE magic".into()));
        }
        if &bytes[12..16] != b"fmt " || &bytes[36..40] != b"data" {
            return Err(CaptureError::IoFailure("not a canonical 44-byte wav header".into()));
        }

        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        Ok(Self {
            riff_size: u32_at(4),
            format_code: u16_at(20),
            format: AudioFormat::new(u32_at(24), u16_at(22), u16_at(34)),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            data_size: u32_at(40),
        })
    }

    /// Whether the size fields agree with each other (`riff_size == 36 + data_size`).
    pub fn is_consistent(&self) -> bool {
        self.riff_size == self.data_size.saturating_add(RIFF_OVERHEAD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_48k() -> AudioFormat {
        AudioFormat::new(48_000, 2, 16)
    }

    #[test]
    fn header_riff_magic() {
        let header = generate_wav_header(&stereo_48k(), 0);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[12..16], b"fmt ");
        assert_eq!(&header[36..40], b"data");
    }

    #[test]
    fn header_pcm_format() {
        let header = generate_wav_header(&stereo_48k(), 0);
        // Format code = 1 (PCM)
        assert_eq!(u16::from_le_bytes([header[20], header[21]]), 1);
        // fmt chunk size = 16
        assert_eq!(u32::from_le_bytes([header[16], header[17], header[18], header[19]]), 16);
    }

    #[test]
    fn header_44khz_stereo_16bit() {
        let header = generate_wav_header(&AudioFormat::MICROPHONE, 9600);
        let parsed = WavHeader::parse(&header).unwrap();

        assert_eq!(parsed.format, AudioFormat::MICROPHONE);
        assert_eq!(parsed.byte_rate, 176_400); // 44100 * 2 * 16/8
        assert_eq!(parsed.block_align, 4);
        assert_eq!(parsed.data_size, 9600);
        assert_eq!(parsed.riff_size, 36 + 9600);
        assert!(parsed.is_consistent());
    }

    #[test]
    fn placeholder_header_declares_empty_stream() {
        let parsed = WavHeader::parse(&generate_wav_header(&stereo_48k(), 0)).unwrap();
        assert_eq!(parsed.data_size, 0);
        assert_eq!(parsed.riff_size, 36);
    }

    #[test]
    fn patch_sizes_updates_both_fields() {
        let mut header = generate_wav_header(&stereo_48k(), 0);
        patch_sizes(&mut header, 19_200);

        let parsed = WavHeader::parse(&header).unwrap();
        assert_eq!(parsed.data_size, 19_200);
        assert_eq!(parsed.riff_size, 19_200 + 36);
        // Format fields untouched
        assert_eq!(parsed.format, stereo_48k());
    }

    #[test]
    fn oversized_stream_saturates() {
        let mut header = generate_wav_header(&stereo_48k(), 0);
        patch_sizes(&mut header, u64::from(u32::MAX) + 10);

        let parsed = WavHeader::parse(&header).unwrap();
        assert_eq!(parsed.data_size, u32::MAX);
        assert_eq!(parsed.riff_size, u32::MAX);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(WavHeader::parse(&[0u8; 10]).is_err());
        assert!(WavHeader::parse(&[0u8; 44]).is_err());
    }
}
