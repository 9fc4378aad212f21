//! WASAPI loopback endpoint for system audio.
//!
//! Taps the default render endpoint with `AUDCLNT_STREAMFLAGS_LOOPBACK`. The
//! client asks for 16-bit PCM at the mix format's rate and channel count and
//! lets the audio engine convert (`AUTOCONVERTPCM`), so the header written
//! by the encoder always describes the bytes that follow it.
//!
//! ## Notes
//! - No permissions are needed for loopback on Windows
//! - DRM-protected audio is delivered as silence
//! - All COM objects are created and used on the capture worker thread

use std::ptr;
use std::slice;

use windows::core::PCWSTR;
use windows::Win32::Foundation::HANDLE;
use windows::Win32::Media::Audio::{
    eRender, IAudioCaptureClient, IAudioClient, AUDCLNT_BUFFERFLAGS_DATA_DISCONTINUITY, AUDCLNT_BUFFERFLAGS_SILENT,
    AUDCLNT_SHAREMODE_SHARED, AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM, AUDCLNT_STREAMFLAGS_LOOPBACK,
    AUDCLNT_STREAMFLAGS_SRC_DEFAULT_QUALITY,
};
use windows::Win32::System::Com::{CoTaskMemFree, CLSCTX_ALL};
use windows::Win32::System::Threading::{AvRevertMmThreadCharacteristics, AvSetMmThreadCharacteristicsW};

use dual_capture_core::models::audio_models::AudioFormat;
use dual_capture_core::models::error::CaptureError;
use dual_capture_core::traits::endpoint::{Packet, PolledEndpoint};

use crate::com::ComApartment;
use crate::device_enumerator::DeviceEnumerator;
use crate::format::pcm_wave_format;

/// Shared-mode buffer length requested from the engine, in 100 ns units (100 ms).
const BUFFER_DURATION: i64 = 1_000_000;

/// Bit depth written for loopback recordings.
const LOOPBACK_BITS: u16 = 16;

struct OpenClient {
    audio_client: IAudioClient,
    capture_client: IAudioCaptureClient,
    block_align: usize,
    mmcss: Option<HANDLE>,
}

/// Loopback tap on the default render endpoint.
///
/// Constructed empty on any thread; `open` runs on the capture worker and
/// acquires everything there.
pub struct WasapiLoopbackEndpoint {
    // Declared before `com` so the interfaces are released before CoUninitialize.
    client: Option<OpenClient>,
    com: Option<ComApartment>,
}

// SAFETY: the endpoint holds no COM state until `open`, which runs on the
// worker thread that then owns it until `close`.
unsafe impl Send for WasapiLoopbackEndpoint {}

impl WasapiLoopbackEndpoint {
    pub fn new() -> Self {
        Self { client: None, com: None }
    }

    fn client(&self) -> Result<&OpenClient, CaptureError> {
        self.client
            .as_ref()
            .ok_or_else(|| CaptureError::InvalidState("loopback endpoint is not open".into()))
    }
}

impl Default for WasapiLoopbackEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl PolledEndpoint for WasapiLoopbackEndpoint {
    fn open(&mut self) -> Result<AudioFormat, CaptureError> {
        if self.client.is_some() {
            return Err(CaptureError::InvalidState("loopback endpoint already open".into()));
        }

        let com = ComApartment::enter()?;
        let enumerator = DeviceEnumerator::new()?;
        let device = enumerator.default_endpoint(eRender)?;
        let name = DeviceEnumerator::friendly_name(&device).unwrap_or_else(|| "default render endpoint".into());

        let audio_client: IAudioClient = unsafe { device.Activate(CLSCTX_ALL, None) }
            .map_err(|e| CaptureError::EndpointUnavailable(format!("{}: Activate failed: {}", name, e)))?;

        let mix_ptr = unsafe { audio_client.GetMixFormat() }
            .map_err(|e| CaptureError::FormatRejected(format!("GetMixFormat failed: {}", e)))?;
        let (mix_rate, mix_channels, mix_bits) = unsafe {
            let mix = ptr::read_unaligned(mix_ptr);
            CoTaskMemFree(Some(mix_ptr as *const _));
            (mix.nSamplesPerSec, mix.nChannels, mix.wBitsPerSample)
        };

        let format = AudioFormat::new(mix_rate, mix_channels, LOOPBACK_BITS);
        format.validate().map_err(CaptureError::FormatRejected)?;
        let wave_format = pcm_wave_format(&format);

        unsafe {
            audio_client.Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                AUDCLNT_STREAMFLAGS_LOOPBACK
                    | AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM
                    | AUDCLNT_STREAMFLAGS_SRC_DEFAULT_QUALITY,
                BUFFER_DURATION,
                0,
                &wave_format,
                None,
            )
        }
        .map_err(|e| CaptureError::FormatRejected(format!("{}: Initialize ({}) failed: {}", name, format, e)))?;

        let capture_client: IAudioCaptureClient = unsafe { audio_client.GetService() }
            .map_err(|e| CaptureError::EndpointUnavailable(format!("GetService failed: {}", e)))?;

        // Real-time scheduling for the worker; capture still works without it.
        let mut task_index = 0u32;
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        let mmcss = unsafe { AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index) }
            .map_err(|e| log::debug!("MMCSS registration failed: {}", e))
            .ok();

        log::info!(
            "Loopback endpoint: {} (mix {} Hz, {} ch, {}-bit; capturing {})",
            name,
            mix_rate,
            mix_channels,
            mix_bits,
            format
        );

        self.client = Some(OpenClient {
            audio_client,
            capture_client,
            block_align: format.block_align() as usize,
            mmcss,
        });
        self.com = Some(com);
        Ok(format)
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        let client = self.client()?;
        unsafe { client.audio_client.Start() }
            .map_err(|e| CaptureError::EndpointUnavailable(format!("IAudioClient::Start failed: {}", e)))
    }

    fn next_packet_frames(&mut self) -> Result<u32, CaptureError> {
        let client = self.client()?;
        unsafe { client.capture_client.GetNextPacketSize() }
            .map_err(|e| CaptureError::EndpointUnavailable(format!("GetNextPacketSize failed: {}", e)))
    }

    fn read_packet(&mut self, sink: &mut dyn FnMut(&Packet<'_>)) -> Result<(), CaptureError> {
        let client = self.client()?;

        let mut data: *mut u8 = ptr::null_mut();
        let mut frames = 0u32;
        let mut flags = 0u32;
        unsafe {
            client
                .capture_client
                .GetBuffer(&mut data, &mut frames, &mut flags, None, None)
        }
        .map_err(|e| CaptureError::EndpointUnavailable(format!("GetBuffer failed: {}", e)))?;

        let len = frames as usize * client.block_align;
        let bytes: &[u8] = if data.is_null() || len == 0 {
            &[]
        } else {
            // SAFETY: valid for `frames` frames until ReleaseBuffer.
            unsafe { slice::from_raw_parts(data, len) }
        };

        sink(&Packet {
            data: bytes,
            frames,
            silent: (flags & AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0,
            discontinuity: (flags & AUDCLNT_BUFFERFLAGS_DATA_DISCONTINUITY.0 as u32) != 0,
        });

        unsafe { client.capture_client.ReleaseBuffer(frames) }
            .map_err(|e| CaptureError::EndpointUnavailable(format!("ReleaseBuffer failed: {}", e)))
    }

    fn close(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = unsafe { client.audio_client.Stop() } {
                log::debug!("IAudioClient::Stop failed: {}", e);
            }
            if let Some(handle) = client.mmcss {
                let _ = unsafe { AvRevertMmThreadCharacteristics(handle) };
            }
        }
        self.com = None;
    }
}

impl Drop for WasapiLoopbackEndpoint {
    fn drop(&mut self) {
        self.close();
    }
}
