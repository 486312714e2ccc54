//! In-memory endpoints for tests.
//!
//! `MockEndpoints` simulates one default render and one default capture
//! device. Devices can be removed and operations made to fail, and the
//! resolver counts how many endpoint handles are currently open.

use super::device::{AudioError, Flow, PlatformStatus};
use super::endpoint::{EndpointResolver, EndpointVolume};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct MockDevice {
    present: bool,
    scalar: f32,
    muted: bool,
    failure: Option<PlatformStatus>,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self {
            present: true,
            scalar: 0.5,
            muted: false,
            failure: None,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    render: MockDevice,
    capture: MockDevice,
    resolved: usize,
    released: usize,
}

impl MockState {
    fn device(&mut self, flow: Flow) -> &mut MockDevice {
        match flow {
            Flow::Render => &mut self.render,
            Flow::Capture => &mut self.capture,
        }
    }
}

/// Shared, thread-safe simulated audio system.
#[derive(Debug, Clone, Default)]
pub struct MockEndpoints {
    state: Arc<Mutex<MockState>>,
}

impl MockEndpoints {
    /// Both devices present at 50% and unmuted.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Plug or unplug the default device for a flow.
    pub fn set_present(&self, flow: Flow, present: bool) {
        self.lock().device(flow).present = present;
    }

    /// Make every volume/mute call on a flow fail with the given status code.
    /// `None` clears the failure.
    pub fn fail_operations(&self, flow: Flow, code: Option<i32>) {
        self.lock().device(flow).failure =
            code.map(|code| PlatformStatus::new(code, "Simulated device failure"));
    }

    /// Seed the device scalar directly.
    pub fn set_scalar(&self, flow: Flow, scalar: f32) {
        self.lock().device(flow).scalar = scalar;
    }

    pub fn scalar(&self, flow: Flow) -> f32 {
        self.lock().device(flow).scalar
    }

    pub fn is_muted(&self, flow: Flow) -> bool {
        self.lock().device(flow).muted
    }

    /// Number of successful resolutions so far.
    pub fn resolve_count(&self) -> usize {
        self.lock().resolved
    }

    /// Endpoint handles resolved but not yet dropped.
    pub fn open_handles(&self) -> usize {
        let state = self.lock();
        state.resolved - state.released
    }
}

impl EndpointResolver for MockEndpoints {
    type Endpoint = MockEndpoint;

    fn resolve(&self, flow: Flow) -> Result<Self::Endpoint, AudioError> {
        let mut state = self.lock();
        if !state.device(flow).present {
            return Err(AudioError::endpoint(
                flow,
                PlatformStatus::new(PlatformStatus::E_NOTFOUND, "Element not found."),
            ));
        }
        state.resolved += 1;
        Ok(MockEndpoint {
            flow,
            state: Arc::clone(&self.state),
        })
    }
}

/// Handle to a simulated endpoint. Counts as released when dropped.
#[derive(Debug)]
pub struct MockEndpoint {
    flow: Flow,
    state: Arc<Mutex<MockState>>,
}

impl MockEndpoint {
    fn with_device<T>(
        &self,
        f: impl FnOnce(&mut MockDevice) -> T,
    ) -> Result<T, PlatformStatus> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let device = state.device(self.flow);
        if let Some(status) = &device.failure {
            return Err(status.clone());
        }
        Ok(f(device))
    }
}

impl EndpointVolume for MockEndpoint {
    fn scalar_volume(&self) -> Result<f32, PlatformStatus> {
        self.with_device(|d| d.scalar)
    }

    fn set_scalar_volume(&self, level: f32) -> Result<(), PlatformStatus> {
        self.with_device(|d| d.scalar = level.clamp(0.0, 1.0))
    }

    fn mute(&self) -> Result<bool, PlatformStatus> {
        self.with_device(|d| d.muted)
    }

    fn set_mute(&self, muted: bool) -> Result<(), PlatformStatus> {
        self.with_device(|d| d.muted = muted)
    }
}

impl Drop for MockEndpoint {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.released += 1;
    }
}
