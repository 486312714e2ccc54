//! Windows Audio Controller - Library
//!
//! Query and control the volume and mute state of the system's default
//! speaker (render) and microphone (capture) endpoints.
//!
//! ## Features
//!
//! - Read and set master volume as a 0-100 percentage
//! - Mute, unmute and query mute state
//! - Per-call endpoint resolution, or a reusable [`EndpointSession`]
//! - In-memory [`MockEndpoints`] for tests
//!
//! Off Windows, [`SystemEndpoints`] fails every call with `E_NOTIMPL`.
//!
//! The free functions below resolve the current default device on every
//! call and release it before returning.

pub mod audio;

pub use audio::{
    AudioController, AudioError, DeviceControl, EndpointResolver, EndpointSession,
    EndpointVolume, Flow, MockEndpoints, PlatformStatus, SystemEndpoint, SystemEndpoints,
};

fn system() -> AudioController<SystemEndpoints> {
    AudioController::system()
}

/// Default speaker volume (0-100).
pub fn get_speaker_volume() -> Result<u8, AudioError> {
    system().speaker().volume()
}

/// Set the default speaker volume. Values outside 0-100 saturate.
pub fn set_speaker_volume(percent: i64) -> Result<(), AudioError> {
    system().speaker().set_volume(percent)
}

pub fn mute_speaker() -> Result<(), AudioError> {
    system().speaker().mute()
}

pub fn unmute_speaker() -> Result<(), AudioError> {
    system().speaker().unmute()
}

pub fn is_speaker_muted() -> Result<bool, AudioError> {
    system().speaker().is_muted()
}

/// Default microphone volume (0-100).
pub fn get_mic_volume() -> Result<u8, AudioError> {
    system().mic().volume()
}

/// Set the default microphone volume. Values outside 0-100 saturate.
pub fn set_mic_volume(percent: i64) -> Result<(), AudioError> {
    system().mic().set_volume(percent)
}

pub fn mute_mic() -> Result<(), AudioError> {
    system().mic().mute()
}

pub fn unmute_mic() -> Result<(), AudioError> {
    system().mic().unmute()
}

pub fn is_mic_muted() -> Result<bool, AudioError> {
    system().mic().is_muted()
}
