//! Default endpoint lookup via the MMDevice API.

use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::{eConsole, EDataFlow, IMMDevice, IMMDeviceEnumerator, MMDeviceEnumerator};
use windows::Win32::System::Com::{CoCreateInstance, CLSCTX_ALL, STGM_READ};

use dual_capture_core::models::error::CaptureError;

pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    /// Requires COM to be initialized on the calling thread.
    pub fn new() -> Result<Self, CaptureError> {
        let enumerator: IMMDeviceEnumerator = unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }
            .map_err(|e| CaptureError::EndpointUnavailable(format!("failed to create device enumerator: {}", e)))?;
        Ok(Self { enumerator })
    }

    /// The console-role default endpoint for `flow` (`eRender` or `eCapture`).
    pub fn default_endpoint(&self, flow: EDataFlow) -> Result<IMMDevice, CaptureError> {
        unsafe { self.enumerator.GetDefaultAudioEndpoint(flow, eConsole) }
            .map_err(|e| CaptureError::EndpointUnavailable(format!("no default endpoint: {}", e)))
    }

    /// Read `PKEY_Device_FriendlyName`, e.g. "Speakers (Realtek High Definition Audio)".
    pub fn friendly_name(device: &IMMDevice) -> Option<String> {
        let store = unsafe { device.OpenPropertyStore(STGM_READ) }.ok()?;
        let value = unsafe { store.GetValue(&PKEY_Device_FriendlyName) }.ok()?;
        let name = value.to_string();
        (!name.is_empty()).then_some(name)
    }
}
