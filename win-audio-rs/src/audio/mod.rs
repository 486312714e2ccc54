//! Audio module for Windows Core Audio API interactions.
//!
//! This module provides default endpoint resolution, COM lifetime handling,
//! and volume/mute control for the default speaker and microphone.

pub mod controller;
pub mod device;
pub mod endpoint;
pub mod enumerator;
pub mod level;
pub mod mock;
#[cfg(windows)]
pub mod volume;

pub use controller::{AudioController, DeviceControl, EndpointSession};
pub use device::{AudioError, Flow, PlatformStatus};
pub use endpoint::{EndpointResolver, EndpointVolume};
pub use enumerator::{SystemEndpoint, SystemEndpoints};
pub use mock::{MockEndpoint, MockEndpoints};
