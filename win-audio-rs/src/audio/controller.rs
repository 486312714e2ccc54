//! Speaker and microphone operations on the default endpoints.

use super::device::{AudioError, Flow, PlatformStatus};
use super::endpoint::{EndpointResolver, EndpointVolume};
use super::enumerator::SystemEndpoints;
use super::level::{percent_to_scalar, scalar_to_percent};

const GET_VOLUME: &str = "GetMasterVolumeLevelScalar";
const SET_VOLUME: &str = "SetMasterVolumeLevelScalar";
const GET_MUTE: &str = "GetMute";
const SET_MUTE: &str = "SetMute";

/// Entry point for volume operations.
///
/// Every call through [`DeviceControl`] resolves its endpoint from scratch
/// and releases it before returning.
#[derive(Debug, Clone, Default)]
pub struct AudioController<R> {
    resolver: R,
}

impl AudioController<SystemEndpoints> {
    /// Controller for the system's default devices.
    pub fn system() -> Self {
        Self::new(SystemEndpoints)
    }
}

impl<R: EndpointResolver> AudioController<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Default render endpoint.
    pub fn speaker(&self) -> DeviceControl<'_, R> {
        self.device(Flow::Render)
    }

    /// Default capture endpoint.
    pub fn mic(&self) -> DeviceControl<'_, R> {
        self.device(Flow::Capture)
    }

    pub fn device(&self, flow: Flow) -> DeviceControl<'_, R> {
        DeviceControl {
            resolver: &self.resolver,
            flow,
        }
    }

    /// Resolve an endpoint once and keep it for several operations.
    ///
    /// The session pins the device that was default when it was opened.
    pub fn open(&self, flow: Flow) -> Result<EndpointSession<R::Endpoint>, AudioError> {
        EndpointSession::open(&self.resolver, flow)
    }
}

/// Per-call operations on the default endpoint of one flow.
#[derive(Debug)]
pub struct DeviceControl<'a, R> {
    resolver: &'a R,
    flow: Flow,
}

impl<R: EndpointResolver> DeviceControl<'_, R> {
    pub fn flow(&self) -> Flow {
        self.flow
    }

    fn with_session<T>(
        &self,
        f: impl FnOnce(&EndpointSession<R::Endpoint>) -> Result<T, AudioError>,
    ) -> Result<T, AudioError> {
        let session = EndpointSession::open(self.resolver, self.flow)?;
        f(&session)
    }

    /// Current volume as a percentage (0-100).
    pub fn volume(&self) -> Result<u8, AudioError> {
        self.with_session(EndpointSession::volume)
    }

    /// Set the volume. Values outside 0-100 saturate.
    pub fn set_volume(&self, percent: i64) -> Result<(), AudioError> {
        self.with_session(|s| s.set_volume(percent))
    }

    pub fn mute(&self) -> Result<(), AudioError> {
        self.with_session(|s| s.set_mute(true))
    }

    pub fn unmute(&self) -> Result<(), AudioError> {
        self.with_session(|s| s.set_mute(false))
    }

    pub fn is_muted(&self) -> Result<bool, AudioError> {
        self.with_session(EndpointSession::is_muted)
    }
}

/// A resolved endpoint, released when dropped.
#[derive(Debug)]
pub struct EndpointSession<E> {
    flow: Flow,
    endpoint: E,
}

impl<E: EndpointVolume> EndpointSession<E> {
    pub fn open<R>(resolver: &R, flow: Flow) -> Result<Self, AudioError>
    where
        R: EndpointResolver<Endpoint = E> + ?Sized,
    {
        let endpoint = resolver.resolve(flow).map_err(|e| {
            tracing::warn!(%flow, error = %e, "endpoint resolution failed");
            e
        })?;
        tracing::trace!(%flow, "endpoint resolved");
        Ok(Self { flow, endpoint })
    }

    pub fn flow(&self) -> Flow {
        self.flow
    }

    fn operation_failed(&self, op: &'static str, status: PlatformStatus) -> AudioError {
        tracing::warn!(flow = %self.flow, op, %status, "endpoint operation failed");
        AudioError::Operation { op, status }
    }

    pub fn volume(&self) -> Result<u8, AudioError> {
        let scalar = self
            .endpoint
            .scalar_volume()
            .map_err(|s| self.operation_failed(GET_VOLUME, s))?;
        let percent = scalar_to_percent(scalar);
        tracing::debug!(flow = %self.flow, scalar, percent, "read volume");
        Ok(percent)
    }

    pub fn set_volume(&self, percent: i64) -> Result<(), AudioError> {
        let scalar = percent_to_scalar(percent);
        self.endpoint
            .set_scalar_volume(scalar)
            .map_err(|s| self.operation_failed(SET_VOLUME, s))?;
        tracing::debug!(flow = %self.flow, percent, scalar, "set volume");
        Ok(())
    }

    pub fn set_mute(&self, muted: bool) -> Result<(), AudioError> {
        self.endpoint
            .set_mute(muted)
            .map_err(|s| self.operation_failed(SET_MUTE, s))?;
        tracing::debug!(flow = %self.flow, muted, "set mute");
        Ok(())
    }

    pub fn is_muted(&self) -> Result<bool, AudioError> {
        let muted = self
            .endpoint
            .mute()
            .map_err(|s| self.operation_failed(GET_MUTE, s))?;
        tracing::debug!(flow = %self.flow, muted, "read mute");
        Ok(muted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockEndpoints;

    fn controller() -> AudioController<MockEndpoints> {
        AudioController::new(MockEndpoints::new())
    }

    #[test]
    fn test_volume_reads_rounded_percent() {
        let audio = controller();
        audio.resolver().set_scalar(Flow::Render, 0.424);
        assert_eq!(audio.speaker().volume().unwrap(), 42);
    }

    #[test]
    fn test_set_volume_writes_scalar() {
        let audio = controller();
        audio.mic().set_volume(70).unwrap();
        assert_eq!(audio.resolver().scalar(Flow::Capture), 0.7);
        assert_eq!(audio.resolver().scalar(Flow::Render), 0.5);
    }

    #[test]
    fn test_each_call_releases_its_endpoint() {
        let audio = controller();
        audio.speaker().volume().unwrap();
        audio.speaker().mute().unwrap();
        audio.mic().is_muted().unwrap();
        assert_eq!(audio.resolver().resolve_count(), 3);
        assert_eq!(audio.resolver().open_handles(), 0);
    }

    #[test]
    fn test_endpoint_released_on_operation_failure() {
        let audio = controller();
        audio
            .resolver()
            .fail_operations(Flow::Render, Some(PlatformStatus::E_FAIL));
        let err = audio.speaker().set_volume(10).unwrap_err();
        assert!(matches!(
            err,
            AudioError::Operation { op: SET_VOLUME, .. }
        ));
        assert_eq!(
            err.to_string(),
            "SetMasterVolumeLevelScalar failed: HRESULT 0x80004005 (Simulated device failure)"
        );
        assert_eq!(audio.resolver().open_handles(), 0);
    }

    #[test]
    fn test_is_muted_failure_is_an_error() {
        let audio = controller();
        audio
            .resolver()
            .fail_operations(Flow::Capture, Some(PlatformStatus::E_FAIL));
        assert!(matches!(
            audio.mic().is_muted(),
            Err(AudioError::Operation { op: GET_MUTE, .. })
        ));
    }

    #[test]
    fn test_session_reuses_one_endpoint() {
        let audio = controller();
        {
            let session = audio.open(Flow::Render).unwrap();
            session.set_volume(80).unwrap();
            session.set_mute(true).unwrap();
            assert_eq!(session.volume().unwrap(), 80);
            assert!(session.is_muted().unwrap());
            assert_eq!(audio.resolver().open_handles(), 1);
        }
        assert_eq!(audio.resolver().resolve_count(), 1);
        assert_eq!(audio.resolver().open_handles(), 0);
    }
}
