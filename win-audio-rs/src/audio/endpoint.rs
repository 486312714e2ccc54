//! Endpoint volume capability.
//!
//! `EndpointResolver` locates the default endpoint for a flow and hands back
//! its volume interface. Dropping the endpoint releases it.

use super::device::{AudioError, Flow, PlatformStatus};

/// Volume and mute control on a resolved endpoint.
pub trait EndpointVolume {
    /// Master volume as a scalar (0.0 to 1.0).
    fn scalar_volume(&self) -> Result<f32, PlatformStatus>;

    /// Set the master volume scalar. No event context is attributed.
    fn set_scalar_volume(&self, level: f32) -> Result<(), PlatformStatus>;

    /// Current mute flag.
    fn mute(&self) -> Result<bool, PlatformStatus>;

    /// Set the mute flag.
    fn set_mute(&self, muted: bool) -> Result<(), PlatformStatus>;
}

/// Resolves the default (console role) endpoint for a flow.
pub trait EndpointResolver {
    type Endpoint: EndpointVolume;

    /// Resolve the current default endpoint. Never cached: each call looks
    /// the device up again.
    fn resolve(&self, flow: Flow) -> Result<Self::Endpoint, AudioError>;
}

impl<R: EndpointResolver + ?Sized> EndpointResolver for &R {
    type Endpoint = R::Endpoint;

    fn resolve(&self, flow: Flow) -> Result<Self::Endpoint, AudioError> {
        (**self).resolve(flow)
    }
}
