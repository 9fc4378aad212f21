use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};

use dual_capture_core::models::error::CaptureError;

/// Membership of the calling thread in the multithreaded COM apartment.
///
/// Every successful `CoInitializeEx` is balanced by `CoUninitialize` on drop,
/// so the guard must be dropped on the thread that created it and after every
/// COM interface obtained under it.
pub struct ComApartment {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl ComApartment {
    pub fn enter() -> Result<Self, CaptureError> {
        unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) }
            .ok()
            .map_err(|e| CaptureError::EndpointUnavailable(format!("CoInitializeEx failed: {}", e)))?;
        Ok(Self {
            _not_send: std::marker::PhantomData,
        })
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}
