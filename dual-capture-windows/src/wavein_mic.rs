//! waveIn microphone device.
//!
//! Opens `WAVE_MAPPER` with a `CALLBACK_FUNCTION`. The driver calls
//! `wave_in_proc` on its own thread with `WIM_DATA` for each filled
//! `WAVEHDR`; the header's `dwUser` carries the pool buffer id and the
//! callback instance points at a boxed `CallbackContext` owned by the device.

use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use windows::core::PSTR;
use windows::Win32::Media::Audio::{
    waveInAddBuffer, waveInClose, waveInOpen, waveInPrepareHeader, waveInReset, waveInStart, waveInStop,
    waveInUnprepareHeader, CALLBACK_FUNCTION, HWAVEIN, WAVEHDR, WAVERR_BADFORMAT, WAVE_MAPPER, WHDR_DONE, WIM_DATA,
};
use windows::Win32::Media::MMSYSERR_NOERROR;

use dual_capture_core::engine::callback::{Completion, CompletionHandler};
use dual_capture_core::models::audio_models::AudioFormat;
use dual_capture_core::models::error::CaptureError;
use dual_capture_core::processing::buffer_pool::CaptureBuffer;
use dual_capture_core::traits::endpoint::InputDevice;

use crate::format::pcm_wave_format;

/// How long `halt` waits for the driver to hand back every buffer.
const HALT_TIMEOUT: Duration = Duration::from_secs(1);

const HEADER_SIZE: u32 = mem::size_of::<WAVEHDR>() as u32;

struct CallbackContext {
    handler: Arc<CompletionHandler>,
    /// Callbacks currently executing.
    active: AtomicUsize,
}

/// Default waveIn input device driven by driver callbacks.
pub struct WaveInDevice {
    handle: Option<HWAVEIN>,
    context: Option<Box<CallbackContext>>,
    // Boxed so each header keeps its address while the driver holds it.
    headers: Vec<Box<WAVEHDR>>,
}

// SAFETY: the raw handle and headers are only touched through `&mut self`;
// the driver thread reaches them exclusively through `wave_in_proc`.
unsafe impl Send for WaveInDevice {}

impl WaveInDevice {
    pub fn new() -> Self {
        Self {
            handle: None,
            context: None,
            headers: Vec::new(),
        }
    }

    fn handle(&self) -> Result<HWAVEIN, CaptureError> {
        self.handle
            .ok_or_else(|| CaptureError::InvalidState("waveIn device is not open".into()))
    }

    /// True once every header is back with the application and no callback
    /// is still running.
    fn quiesced(&self) -> bool {
        let idle = self
            .context
            .as_ref()
            .map_or(true, |c| c.active.load(Ordering::Acquire) == 0);
        idle && self
            .headers
            .iter()
            .all(|h| unsafe { ptr::addr_of!(h.dwFlags).read_unaligned() } & WHDR_DONE != 0)
    }
}

impl Default for WaveInDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl InputDevice for WaveInDevice {
    fn open(&mut self, format: &AudioFormat, handler: Arc<CompletionHandler>) -> Result<(), CaptureError> {
        if self.handle.is_some() {
            return Err(CaptureError::InvalidState("waveIn device already open".into()));
        }

        let wave_format = pcm_wave_format(format);
        let context = Box::new(CallbackContext {
            handler,
            active: AtomicUsize::new(0),
        });
        let instance = &*context as *const CallbackContext as usize;

        let mut handle = HWAVEIN::default();
        let result = unsafe {
            waveInOpen(
                Some(&mut handle as *mut HWAVEIN),
                WAVE_MAPPER,
                &wave_format,
                Some(wave_in_proc as usize),
                Some(instance),
                CALLBACK_FUNCTION,
            )
        };
        if result != MMSYSERR_NOERROR {
            return Err(match result {
                WAVERR_BADFORMAT => CaptureError::FormatRejected(format!("waveInOpen rejected {}", format)),
                code => mm_error("waveInOpen", code),
            });
        }

        log::info!("waveIn device opened ({})", format);
        self.handle = Some(handle);
        self.context = Some(context);
        Ok(())
    }

    fn submit(&mut self, buffer: &mut CaptureBuffer) -> Result<(), CaptureError> {
        let handle = self.handle()?;

        let mut header = Box::new(WAVEHDR {
            lpData: PSTR(buffer.as_mut_ptr()),
            dwBufferLength: buffer.capacity() as u32,
            dwUser: buffer.id(),
            ..Default::default()
        });
        let header_ptr: *mut WAVEHDR = &mut *header;

        check("waveInPrepareHeader", unsafe {
            waveInPrepareHeader(handle, header_ptr, HEADER_SIZE)
        })?;
        if let Err(e) = check("waveInAddBuffer", unsafe { waveInAddBuffer(handle, header_ptr, HEADER_SIZE) }) {
            unsafe { waveInUnprepareHeader(handle, header_ptr, HEADER_SIZE) };
            return Err(e);
        }

        self.headers.push(header);
        Ok(())
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        let handle = self.handle()?;
        check("waveInStart", unsafe { waveInStart(handle) })
    }

    fn halt(&mut self) {
        let Some(handle) = self.handle else {
            return;
        };

        unsafe {
            waveInStop(handle);
            waveInReset(handle);
        }

        let deadline = Instant::now() + HALT_TIMEOUT;
        while !self.quiesced() {
            if Instant::now() >= deadline {
                log::warn!("waveIn buffers still pending after {:?}", HALT_TIMEOUT);
                break;
            }
            // A completion that raced the stop may have re-queued its buffer.
            unsafe { waveInReset(handle) };
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn close(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        for mut header in self.headers.drain(..) {
            let result = unsafe { waveInUnprepareHeader(handle, &mut *header, HEADER_SIZE) };
            if result != MMSYSERR_NOERROR {
                log::warn!("waveInUnprepareHeader failed (MMRESULT {})", result);
            }
        }

        let result = unsafe { waveInClose(handle) };
        if result != MMSYSERR_NOERROR {
            log::warn!("waveInClose failed (MMRESULT {})", result);
        }

        // No callback can reference the context once the device is closed.
        self.context = None;
        log::debug!("waveIn device closed");
    }
}

impl Drop for WaveInDevice {
    fn drop(&mut self) {
        self.halt();
        self.close();
    }
}

/// Driver callback. Runs on a driver-owned thread; never blocks beyond the
/// handler's short lock and never calls back into reset or close.
unsafe extern "system" fn wave_in_proc(hwi: HWAVEIN, msg: u32, instance: usize, param1: usize, _param2: usize) {
    if msg != WIM_DATA || instance == 0 || param1 == 0 {
        return;
    }

    let context = &*(instance as *const CallbackContext);
    let header = param1 as *mut WAVEHDR;
    context.active.fetch_add(1, Ordering::AcqRel);

    let id = (*header).dwUser;
    let recorded = (*header).dwBytesRecorded as usize;
    if context.handler.on_buffer_filled(id, recorded) == Completion::Requeue {
        let result = waveInAddBuffer(hwi, header, HEADER_SIZE);
        if result != MMSYSERR_NOERROR {
            context.handler.on_resubmit_failed(id, mm_error("waveInAddBuffer", result));
        }
    }

    context.active.fetch_sub(1, Ordering::AcqRel);
}

fn check(call: &str, result: u32) -> Result<(), CaptureError> {
    if result == MMSYSERR_NOERROR {
        Ok(())
    } else {
        Err(mm_error(call, result))
    }
}

fn mm_error(call: &str, result: u32) -> CaptureError {
    CaptureError::EndpointUnavailable(format!("{} failed (MMRESULT {})", call, result))
}
