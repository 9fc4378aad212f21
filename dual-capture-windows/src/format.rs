use windows::Win32::Media::Audio::{WAVEFORMATEX, WAVE_FORMAT_PCM};

use dual_capture_core::models::audio_models::AudioFormat;

/// Plain PCM `WAVEFORMATEX` describing `format`.
pub fn pcm_wave_format(format: &AudioFormat) -> WAVEFORMATEX {
    WAVEFORMATEX {
        wFormatTag: WAVE_FORMAT_PCM as u16,
        nChannels: format.channels,
        nSamplesPerSec: format.sample_rate,
        nAvgBytesPerSec: format.byte_rate(),
        nBlockAlign: format.block_align(),
        wBitsPerSample: format.bits_per_sample,
        cbSize: 0,
    }
}
