//! Audio endpoint data models.
//!
//! Defines the endpoint flow direction, the platform status carried by
//! failures, and the error taxonomy shared by every volume operation.

use thiserror::Error;

/// Endpoint direction (maps to Windows EDataFlow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Flow {
    /// Output device (speakers, headphones)
    Render = 0,

    /// Input device (microphones)
    Capture = 1,
}

impl Flow {
    /// Short name used in messages and the JSON command surface.
    pub fn label(&self) -> &'static str {
        match self {
            Flow::Render => "speaker",
            Flow::Capture => "mic",
        }
    }

    /// Parse the numeric flow used across the C ABI (0 = render, 1 = capture).
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Flow::Render),
            1 => Some(Flow::Capture),
            _ => None,
        }
    }
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A failed platform status code together with its decoded system message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformStatus {
    /// Raw HRESULT
    pub code: i32,

    /// System message for the code, empty when the system has none
    pub message: String,
}

impl PlatformStatus {
    /// HRESULT_FROM_WIN32(ERROR_NOT_FOUND), reported when no default endpoint exists.
    pub const E_NOTFOUND: i32 = 0x8007_0490_u32 as i32;

    /// Generic failure.
    pub const E_FAIL: i32 = 0x8000_4005_u32 as i32;

    /// Operation not implemented on this host.
    pub const E_NOTIMPL: i32 = 0x8000_4001_u32 as i32;

    /// CoInitialize has not been called.
    pub const CO_E_NOTINITIALIZED: i32 = 0x8004_01F0_u32 as i32;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for PlatformStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HRESULT 0x{:08X}", self.code as u32)?;
        let message = self.message.trim();
        if !message.is_empty() {
            write!(f, " ({message})")?;
        }
        Ok(())
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for PlatformStatus {
    fn from(err: windows::core::Error) -> Self {
        Self::new(err.code().0, err.message())
    }
}

/// Audio service error types.
#[derive(Debug, Clone, Error)]
pub enum AudioError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to get {flow} endpoint: {status}")]
    EndpointResolution { flow: Flow, status: PlatformStatus },

    #[error("{op} failed: {status}")]
    Operation {
        op: &'static str,
        status: PlatformStatus,
    },
}

impl AudioError {
    /// Any failure while locating or activating the default endpoint,
    /// COM initialization included.
    pub fn endpoint(flow: Flow, status: impl Into<PlatformStatus>) -> Self {
        AudioError::EndpointResolution {
            flow,
            status: status.into(),
        }
    }

    /// The raw platform status code, if the failure came from the platform.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            AudioError::InvalidArgument(_) => None,
            AudioError::EndpointResolution { status, .. }
            | AudioError::Operation { status, .. } => Some(status.code),
        }
    }
}
