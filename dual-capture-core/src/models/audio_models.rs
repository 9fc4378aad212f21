use std::fmt;

use serde::{Deserialize, Serialize};

/// Which of the two independent streams a component belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSource {
    /// Physical input device, captured through a driver callback.
    Microphone,
    /// Render endpoint tapped in loopback mode, captured by polling.
    Loopback,
}

impl CaptureSource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Microphone => "mic",
            Self::Loopback => "loopback",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Self::Microphone => 0,
            Self::Loopback => 1,
        }
    }
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// PCM layout of a stream. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl AudioFormat {
    /// Microphone policy: 44.1 kHz, stereo, 16-bit. Chosen instead of the
    /// device default so the output is identical across hardware.
    pub const MICROPHONE: AudioFormat = AudioFormat::new(44_100, 2, 16);

    pub const fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Bytes per frame (one sample for every channel). Saturates for
    /// layouts `validate` rejects.
    pub fn block_align(&self) -> u16 {
        u16::try_from(self.frame_bytes()).unwrap_or(u16::MAX)
    }

    /// Saturates for layouts `validate` rejects.
    pub fn byte_rate(&self) -> u32 {
        u32::try_from(self.sample_rate as u64 * self.block_align() as u64).unwrap_or(u32::MAX)
    }

    fn frame_bytes(&self) -> u32 {
        self.channels as u32 * self.bits_per_sample as u32 / 8
    }

    /// Playback duration of `data_bytes` of PCM in this format.
    pub fn duration_secs(&self, data_bytes: u64) -> f64 {
        let byte_rate = self.byte_rate();
        if byte_rate == 0 {
            return 0.0;
        }
        data_bytes as f64 / byte_rate as f64
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.channels == 0 {
            return Err("channel count must be positive".into());
        }
        if ![8, 16, 24, 32].contains(&self.bits_per_sample) {
            return Err(format!("unsupported bit depth: {}", self.bits_per_sample));
        }
        // Both derived fields must fit their 16/32-bit WAV header slots.
        if self.frame_bytes() > u16::MAX as u32 {
            return Err(format!(
                "{} channels of {}-bit samples exceed the WAV block size",
                self.channels, self.bits_per_sample
            ));
        }
        if self.sample_rate as u64 * self.frame_bytes() as u64 > u32::MAX as u64 {
            return Err(format!("byte rate of {} exceeds the WAV header limit", self));
        }
        Ok(())
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}-bit",
            self.sample_rate, self.channels, self.bits_per_sample
        )
    }
}
