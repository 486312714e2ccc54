//! Default endpoint lookup using Windows MMDevice API.
//!
//! Provides COM initialization and default device resolution.

use super::device::{AudioError, Flow};
#[cfg(not(windows))]
use super::device::PlatformStatus;
use super::endpoint::EndpointResolver;
#[cfg(not(windows))]
use super::endpoint::EndpointVolume;

#[cfg(windows)]
pub use self::system::{ensure_com, ComGuard};

#[cfg(windows)]
mod system {
    use super::super::device::PlatformStatus;
    use std::cell::RefCell;
    use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
    use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};

    /// COM initialization guard that uninitializes COM on drop.
    pub struct ComGuard {
        initialized: bool,
    }

    impl ComGuard {
        /// Initialize COM for the current thread.
        ///
        /// A thread already initialized into a single-threaded apartment is
        /// accepted as is; COM stays usable and the guard leaves it alone.
        pub fn new() -> Result<Self, PlatformStatus> {
            let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
            if hr == RPC_E_CHANGED_MODE {
                tracing::trace!("COM already initialized in another apartment");
                return Ok(Self { initialized: false });
            }
            hr.ok()?;
            tracing::trace!("COM initialized for thread");
            Ok(Self { initialized: true })
        }
    }

    impl Drop for ComGuard {
        fn drop(&mut self) {
            if self.initialized {
                unsafe {
                    CoUninitialize();
                }
            }
        }
    }

    thread_local! {
        static THREAD_COM: RefCell<Option<ComGuard>> = const { RefCell::new(None) };
    }

    /// Make sure COM is initialized on the calling thread.
    ///
    /// The first call on a thread creates a guard that lives until the thread
    /// exits; later calls are no-ops. A failed init is not cached.
    pub fn ensure_com() -> Result<(), PlatformStatus> {
        THREAD_COM.with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.is_none() {
                *slot = Some(ComGuard::new()?);
            }
            Ok(())
        })
    }
}

/// Resolver for the system's default console-role endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEndpoints;

#[cfg(windows)]
impl EndpointResolver for SystemEndpoints {
    type Endpoint = super::volume::VolumeController;

    fn resolve(&self, flow: Flow) -> Result<Self::Endpoint, AudioError> {
        use super::volume::VolumeController;
        use windows::Win32::Media::Audio::{
            eCapture, eConsole, eRender, IMMDeviceEnumerator, MMDeviceEnumerator,
        };
        use windows::Win32::System::Com::{CoCreateInstance, CLSCTX_ALL};

        ensure_com().map_err(|status| AudioError::endpoint(flow, status))?;

        let resolution_failed = move |e: windows::core::Error| AudioError::endpoint(flow, e);

        let data_flow = match flow {
            Flow::Render => eRender,
            Flow::Capture => eCapture,
        };

        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                    .map_err(resolution_failed)?;

            let device = enumerator
                .GetDefaultAudioEndpoint(data_flow, eConsole)
                .map_err(resolution_failed)?;

            VolumeController::new(&device, flow)
        }
    }
}

/// Endpoint type for hosts without Windows Core Audio. Never constructed.
#[cfg(not(windows))]
#[derive(Debug)]
pub enum UnsupportedEndpoint {}

#[cfg(not(windows))]
impl EndpointVolume for UnsupportedEndpoint {
    fn scalar_volume(&self) -> Result<f32, PlatformStatus> {
        match *self {}
    }

    fn set_scalar_volume(&self, _level: f32) -> Result<(), PlatformStatus> {
        match *self {}
    }

    fn mute(&self) -> Result<bool, PlatformStatus> {
        match *self {}
    }

    fn set_mute(&self, _muted: bool) -> Result<(), PlatformStatus> {
        match *self {}
    }
}

#[cfg(not(windows))]
impl EndpointResolver for SystemEndpoints {
    type Endpoint = UnsupportedEndpoint;

    fn resolve(&self, flow: Flow) -> Result<Self::Endpoint, AudioError> {
        Err(AudioError::endpoint(
            flow,
            PlatformStatus::new(PlatformStatus::E_NOTIMPL, "Not implemented on this platform"),
        ))
    }
}

/// The endpoint handle produced by [`SystemEndpoints`].
pub type SystemEndpoint = <SystemEndpoints as EndpointResolver>::Endpoint;

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(windows))]
    #[test]
    fn test_system_endpoints_unsupported_off_windows() {
        for flow in [Flow::Render, Flow::Capture] {
            let err = SystemEndpoints.resolve(flow).unwrap_err();
            assert!(matches!(err, AudioError::EndpointResolution { flow: f, .. } if f == flow));
            assert_eq!(err.status_code(), Some(PlatformStatus::E_NOTIMPL));
        }
    }

    #[cfg(windows)]
    #[test]
    fn test_com_guard_nests() {
        let outer = ComGuard::new().unwrap();
        let inner = ComGuard::new().unwrap();
        drop(inner);
        drop(outer);
        ensure_com().unwrap();
        ensure_com().unwrap();
    }
}
