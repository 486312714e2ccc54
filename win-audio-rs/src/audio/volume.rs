//! Volume control using IAudioEndpointVolume.
//!
//! Provides volume and mute control for the default audio endpoints.

use super::device::{AudioError, Flow, PlatformStatus};
use super::endpoint::EndpointVolume;
use windows::Win32::Media::Audio::{Endpoints::IAudioEndpointVolume, IMMDevice};
use windows::Win32::System::Com::CLSCTX_ALL;

/// Volume controller for a specific device.
///
/// The interface is released when the controller is dropped.
pub struct VolumeController {
    endpoint_volume: IAudioEndpointVolume,
}

impl VolumeController {
    /// Activate the volume interface on the given device.
    pub fn new(device: &IMMDevice, flow: Flow) -> Result<Self, AudioError> {
        unsafe {
            let endpoint_volume: IAudioEndpointVolume = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| AudioError::endpoint(flow, e))?;

            Ok(Self { endpoint_volume })
        }
    }
}

impl EndpointVolume for VolumeController {
    fn scalar_volume(&self) -> Result<f32, PlatformStatus> {
        unsafe { Ok(self.endpoint_volume.GetMasterVolumeLevelScalar()?) }
    }

    fn set_scalar_volume(&self, level: f32) -> Result<(), PlatformStatus> {
        let level = level.clamp(0.0, 1.0);
        unsafe {
            self.endpoint_volume
                .SetMasterVolumeLevelScalar(level, std::ptr::null())?;
        }
        Ok(())
    }

    fn mute(&self) -> Result<bool, PlatformStatus> {
        unsafe {
            let muted = self.endpoint_volume.GetMute()?;
            Ok(muted.as_bool())
        }
    }

    fn set_mute(&self, muted: bool) -> Result<(), PlatformStatus> {
        unsafe {
            self.endpoint_volume.SetMute(muted, std::ptr::null())?;
        }
        Ok(())
    }
}
