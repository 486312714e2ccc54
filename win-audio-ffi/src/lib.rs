//! FFI bindings for the Windows Audio Controller.
//!
//! This crate provides C ABI functions for host applications that cannot
//! call Core Audio directly. All functions use panic::catch_unwind to
//! prevent Rust panics from unwinding across the FFI boundary.
//!
//! Status-returning functions return 0 on success and a negative
//! [`ErrorCode`] on failure; the message is available from
//! `win_audio_last_error_message()` on the same thread.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::ffi::{c_char, c_void, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Once;
use std::thread::{self, ThreadId};
use tracing_subscriber::EnvFilter;
use win_audio_rs::audio::level::percent_from_f64;
use win_audio_rs::{
    AudioController, AudioError, EndpointResolver, EndpointSession, Flow, SystemEndpoint,
    SystemEndpoints,
};

// ============================================================================
// Error Handling
// ============================================================================

/// Error codes returned by FFI functions.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    InvalidHandle = -1,
    InvalidArgument = -2,
    EndpointResolution = -3,
    Operation = -4,
    JsonError = -6,
    Panic = -99,
}

impl ErrorCode {
    /// Error kind name reported in JSON responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ErrorCode::Success => "Success",
            ErrorCode::InvalidHandle => "InvalidHandle",
            ErrorCode::InvalidArgument => "InvalidArgument",
            ErrorCode::EndpointResolution => "EndpointResolutionError",
            ErrorCode::Operation => "OperationError",
            ErrorCode::JsonError => "JsonError",
            ErrorCode::Panic => "Panic",
        }
    }
}

impl From<&AudioError> for ErrorCode {
    fn from(err: &AudioError) -> Self {
        match err {
            AudioError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            AudioError::EndpointResolution { .. } => ErrorCode::EndpointResolution,
            AudioError::Operation { .. } => ErrorCode::Operation,
        }
    }
}

// Thread-local storage for the last error.
thread_local! {
    static LAST_ERROR: RefCell<Option<(ErrorCode, String)>> = const { RefCell::new(None) };
}

fn set_last_error(code: ErrorCode, message: impl Into<String>) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some((code, message.into()));
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

fn record_error(err: &AudioError) -> ErrorCode {
    let code = ErrorCode::from(err);
    set_last_error(code, err.to_string());
    code
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration accepted by win_audio_init().
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// tracing filter directive, e.g. "debug" or "win_audio_rs=trace"
    #[serde(default)]
    pub log_level: Option<String>,
}

impl EngineConfig {
    fn filter(&self) -> EnvFilter {
        self.log_level
            .as_deref()
            .and_then(|level| EnvFilter::try_new(level).ok())
            .or_else(|| EnvFilter::try_from_default_env().ok())
            .unwrap_or_else(|| EnvFilter::new("warn"))
    }
}

static LOGGING: Once = Once::new();

// ============================================================================
// Data Types for JSON Serialization
// ============================================================================

/// A command for win_audio_invoke(), e.g. `{"op":"setMicVolume","args":[40]}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub op: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// Error details in an invoke response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDto {
    pub code: i32,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i32>,
    pub message: String,
}

/// Response from win_audio_invoke().
#[derive(Debug, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDto>,
}

impl InvokeResponse {
    fn success(value: Option<Value>) -> Self {
        Self {
            ok: true,
            value,
            error: None,
        }
    }

    fn failure(code: ErrorCode, status: Option<i32>, message: String) -> Self {
        Self {
            ok: false,
            value: None,
            error: Some(ErrorDto {
                code: code as i32,
                kind: code.kind().to_string(),
                status,
                message,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    GetVolume,
    SetVolume,
    Mute,
    Unmute,
    IsMuted,
}

fn parse_operation(name: &str) -> Option<(Flow, Operation)> {
    let op = match name {
        "getSpeakerVolume" => (Flow::Render, Operation::GetVolume),
        "setSpeakerVolume" => (Flow::Render, Operation::SetVolume),
        "muteSpeaker" => (Flow::Render, Operation::Mute),
        "unmuteSpeaker" => (Flow::Render, Operation::Unmute),
        "isSpeakerMuted" => (Flow::Render, Operation::IsMuted),
        "getMicVolume" => (Flow::Capture, Operation::GetVolume),
        "setMicVolume" => (Flow::Capture, Operation::SetVolume),
        "muteMic" => (Flow::Capture, Operation::Mute),
        "unmuteMic" => (Flow::Capture, Operation::Unmute),
        "isMicMuted" => (Flow::Capture, Operation::IsMuted),
        _ => return None,
    };
    Some(op)
}

/// Read a volume argument from JSON. Absent or non-numeric values are rejected.
fn percent_from_json(value: Option<&Value>) -> Result<i64, AudioError> {
    match value.and_then(Value::as_f64) {
        Some(number) => percent_from_f64(number),
        None => Err(AudioError::InvalidArgument(
            "Expected volume number".to_string(),
        )),
    }
}

// ============================================================================
// Endpoint Handle Type
// ============================================================================

/// Opaque handle to an open endpoint. Actually points to an EndpointHandle.
pub type WinAudioEndpointHandle = *mut c_void;

/// An open endpoint and the thread that opened it.
///
/// COM for the endpoint belongs to the opening thread, so the handle is only
/// usable there.
struct EndpointHandle<E> {
    owner: ThreadId,
    session: EndpointSession<E>,
}

impl<E> EndpointHandle<E> {
    fn new(session: EndpointSession<E>) -> Self {
        Self {
            owner: thread::current().id(),
            session,
        }
    }

    fn into_raw(self) -> WinAudioEndpointHandle {
        Box::into_raw(Box::new(self)) as WinAudioEndpointHandle
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Allocate a C string from a Rust string. Caller must free with win_audio_free_string.
fn alloc_c_string(s: &str) -> *mut c_char {
    // Interior nul bytes are dropped rather than failing the whole string
    let bytes: Vec<u8> = s.bytes().filter(|b| *b != 0).collect();
    CString::new(bytes).map_or(ptr::null_mut(), CString::into_raw)
}

/// Parse a C string to a Rust string slice.
unsafe fn parse_c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

/// Borrow an out-parameter, rejecting null.
unsafe fn out_param<'a, T>(ptr: *mut T, name: &str) -> Result<&'a mut T, AudioError> {
    ptr.as_mut()
        .ok_or_else(|| AudioError::InvalidArgument(format!("{name} must not be null")))
}

fn system() -> AudioController<SystemEndpoints> {
    AudioController::system()
}

/// Run a status-returning operation behind catch_unwind and record failures.
fn run_status<F>(what: &str, f: F) -> i32
where
    F: FnOnce() -> Result<(), AudioError>,
{
    clear_last_error();

    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => ErrorCode::Success as i32,
        Ok(Err(e)) => {
            tracing::debug!(operation = what, error = %e, "ffi call failed");
            record_error(&e) as i32
        }
        Err(_) => {
            set_last_error(ErrorCode::Panic, format!("Panic during {what}"));
            ErrorCode::Panic as i32
        }
    }
}

fn get_volume<R: EndpointResolver>(
    audio: &AudioController<R>,
    flow: Flow,
    out_volume: *mut i32,
) -> Result<(), AudioError> {
    let out = unsafe { out_param(out_volume, "out_volume")? };
    *out = i32::from(audio.device(flow).volume()?);
    Ok(())
}

fn set_volume<R: EndpointResolver>(
    audio: &AudioController<R>,
    flow: Flow,
    volume: f64,
) -> Result<(), AudioError> {
    let percent = percent_from_f64(volume)?;
    audio.device(flow).set_volume(percent)
}

/// Writes `false` before querying, so a failed call still leaves a defined
/// value behind the pointer alongside the error code.
fn is_muted<R: EndpointResolver>(
    audio: &AudioController<R>,
    flow: Flow,
    out_muted: *mut bool,
) -> Result<(), AudioError> {
    let out = unsafe { out_param(out_muted, "out_muted")? };
    *out = false;
    *out = audio.device(flow).is_muted()?;
    Ok(())
}

fn invoke<R: EndpointResolver>(audio: &AudioController<R>, request_json: &str) -> InvokeResponse {
    let request: InvokeRequest = match serde_json::from_str(request_json) {
        Ok(request) => request,
        Err(e) => {
            let message = format!("Invalid request: {e}");
            set_last_error(ErrorCode::JsonError, message.clone());
            return InvokeResponse::failure(ErrorCode::JsonError, None, message);
        }
    };

    let Some((flow, op)) = parse_operation(&request.op) else {
        let message = format!("Unknown operation: {}", request.op);
        set_last_error(ErrorCode::InvalidArgument, message.clone());
        return InvokeResponse::failure(ErrorCode::InvalidArgument, None, message);
    };

    let device = audio.device(flow);
    let result = match op {
        Operation::GetVolume => device.volume().map(|v| Some(Value::from(v))),
        Operation::SetVolume => percent_from_json(request.args.first())
            .and_then(|percent| device.set_volume(percent))
            .map(|()| None),
        Operation::Mute => device.mute().map(|()| None),
        Operation::Unmute => device.unmute().map(|()| None),
        Operation::IsMuted => device.is_muted().map(|m| Some(Value::from(m))),
    };

    match result {
        Ok(value) => InvokeResponse::success(value),
        Err(e) => {
            let code = record_error(&e);
            let mut response = InvokeResponse::failure(code, e.status_code(), e.to_string());
            if op == Operation::IsMuted {
                response.value = Some(Value::Bool(false));
            }
            response
        }
    }
}

/// Borrow the session behind a handle on its opening thread.
///
/// # Safety
/// A non-null handle must come from `EndpointHandle::<E>::into_raw` and not be released yet.
unsafe fn session_from<'a, E>(
    handle: WinAudioEndpointHandle,
) -> Result<&'a EndpointSession<E>, &'static str> {
    let handle = (handle as *const EndpointHandle<E>)
        .as_ref()
        .ok_or("Endpoint handle is null")?;
    if handle.owner != thread::current().id() {
        return Err("Endpoint handle used outside the thread that opened it");
    }
    Ok(&handle.session)
}

/// Release a handle. Returns false, leaking the endpoint, when called off the
/// opening thread: its COM apartment may already be gone.
///
/// # Safety
/// Same contract as `session_from`; the handle must not be used afterwards.
unsafe fn release_handle<E>(handle: WinAudioEndpointHandle) -> bool {
    let handle = Box::from_raw(handle as *mut EndpointHandle<E>);
    if handle.owner != thread::current().id() {
        tracing::warn!("endpoint handle closed off its opening thread, leaking it");
        let _ = Box::leak(handle);
        return false;
    }
    true
}

/// Like run_status, for calls on an endpoint handle.
fn run_handle_status<F>(what: &str, handle: WinAudioEndpointHandle, f: F) -> i32
where
    F: FnOnce(&EndpointSession<SystemEndpoint>) -> Result<(), AudioError>,
{
    let session = match unsafe { session_from::<SystemEndpoint>(handle) } {
        Ok(session) => session,
        Err(message) => {
            set_last_error(ErrorCode::InvalidHandle, message);
            return ErrorCode::InvalidHandle as i32;
        }
    };
    run_status(what, || f(session))
}

// ============================================================================
// FFI Functions - Lifecycle
// ============================================================================

/// Install logging for the library.
///
/// # Arguments
/// * `config_json` - JSON configuration string (can be null for defaults),
///   e.g. `{"log_level":"debug"}`
///
/// # Returns
/// 0. Only the first call in a process installs a subscriber; a malformed
/// config falls back to `RUST_LOG`, then to "warn".
#[no_mangle]
pub extern "C" fn win_audio_init(config_json: *const c_char) -> i32 {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let parsed = unsafe { parse_c_str(config_json) }
            .map(serde_json::from_str::<EngineConfig>)
            .transpose();
        let (config, parse_error) = match parsed {
            Ok(config) => (config.unwrap_or_default(), None),
            Err(e) => (EngineConfig::default(), Some(e)),
        };

        LOGGING.call_once(|| {
            // A host that already installed a subscriber keeps it
            let _ = tracing_subscriber::fmt()
                .with_env_filter(config.filter())
                .try_init();
        });

        if let Some(e) = parse_error {
            tracing::warn!(error = %e, "ignoring malformed engine config");
        }
        tracing::debug!(version = env!("CARGO_PKG_VERSION"), "win-audio initialized");
    });

    match result {
        Ok(()) => ErrorCode::Success as i32,
        Err(_) => {
            set_last_error(ErrorCode::Panic, "Panic during init");
            ErrorCode::Panic as i32
        }
    }
}

// ============================================================================
// FFI Functions - Speaker
// ============================================================================

/// Get the default speaker volume (0-100).
///
/// # Returns
/// 0 on success, negative error code on failure.
#[no_mangle]
pub extern "C" fn win_audio_get_speaker_volume(out_volume: *mut i32) -> i32 {
    run_status("get speaker volume", || {
        get_volume(&system(), Flow::Render, out_volume)
    })
}

/// Set the default speaker volume. Values outside 0-100 saturate; fractions
/// are truncated. NaN or infinity is rejected with InvalidArgument.
#[no_mangle]
pub extern "C" fn win_audio_set_speaker_volume(volume: f64) -> i32 {
    run_status("set speaker volume", || {
        set_volume(&system(), Flow::Render, volume)
    })
}

#[no_mangle]
pub extern "C" fn win_audio_mute_speaker() -> i32 {
    run_status("mute speaker", || system().speaker().mute())
}

#[no_mangle]
pub extern "C" fn win_audio_unmute_speaker() -> i32 {
    run_status("unmute speaker", || system().speaker().unmute())
}

/// Query the default speaker mute state.
///
/// On failure `*out_muted` is set to false and a negative code is returned;
/// the false value is not an answer.
#[no_mangle]
pub extern "C" fn win_audio_is_speaker_muted(out_muted: *mut bool) -> i32 {
    run_status("is speaker muted", || {
        is_muted(&system(), Flow::Render, out_muted)
    })
}

// ============================================================================
// FFI Functions - Microphone
// ============================================================================

/// Get the default microphone volume (0-100).
#[no_mangle]
pub extern "C" fn win_audio_get_mic_volume(out_volume: *mut i32) -> i32 {
    run_status("get mic volume", || {
        get_volume(&system(), Flow::Capture, out_volume)
    })
}

/// Set the default microphone volume. Same input rules as the speaker.
#[no_mangle]
pub extern "C" fn win_audio_set_mic_volume(volume: f64) -> i32 {
    run_status("set mic volume", || {
        set_volume(&system(), Flow::Capture, volume)
    })
}

#[no_mangle]
pub extern "C" fn win_audio_mute_mic() -> i32 {
    run_status("mute mic", || system().mic().mute())
}

#[no_mangle]
pub extern "C" fn win_audio_unmute_mic() -> i32 {
    run_status("unmute mic", || system().mic().unmute())
}

/// Query the default microphone mute state. Failure semantics match
/// win_audio_is_speaker_muted().
#[no_mangle]
pub extern "C" fn win_audio_is_mic_muted(out_muted: *mut bool) -> i32 {
    run_status("is mic muted", || {
        is_muted(&system(), Flow::Capture, out_muted)
    })
}

// ============================================================================
// FFI Functions - JSON Commands
// ============================================================================

/// Run one operation described as JSON.
///
/// # Arguments
/// * `request_json` - e.g. `{"op":"getSpeakerVolume"}` or
///   `{"op":"setMicVolume","args":[40]}`
///
/// # Returns
/// JSON response `{"ok":true,"value":...}` or
/// `{"ok":false,"error":{"code":..,"kind":..,"message":..}}`. A failed
/// isSpeakerMuted/isMicMuted also carries `"value":false`.
/// Caller must free with win_audio_free_string(). Returns null only on panic.
#[no_mangle]
pub extern "C" fn win_audio_invoke(request_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let response = match unsafe { parse_c_str(request_json) } {
            Some(json) => invoke(&system(), json),
            None => {
                let message = "Invalid request string".to_string();
                set_last_error(ErrorCode::InvalidArgument, message.clone());
                InvokeResponse::failure(ErrorCode::InvalidArgument, None, message)
            }
        };
        serde_json::to_string(&response)
    });

    match result {
        Ok(Ok(json)) => alloc_c_string(&json),
        Ok(Err(e)) => {
            set_last_error(ErrorCode::JsonError, e.to_string());
            ptr::null_mut()
        }
        Err(_) => {
            set_last_error(ErrorCode::Panic, "Panic during invoke");
            ptr::null_mut()
        }
    }
}

// ============================================================================
// FFI Functions - Endpoint Handles
// ============================================================================

/// Resolve the default endpoint once for several operations.
///
/// # Arguments
/// * `flow` - 0 = speaker (render), 1 = microphone (capture)
///
/// # Returns
/// Handle to the endpoint, or null on failure. Check win_audio_last_error_code() on failure.
///
/// # Safety
/// The returned handle must be freed with win_audio_endpoint_close(). It keeps
/// addressing the device that was default when it was opened. The handle is
/// tied to the calling thread: calls from any other thread fail with
/// InvalidHandle, and that thread must stay alive until the handle is closed.
#[no_mangle]
pub extern "C" fn win_audio_endpoint_open(flow: u32) -> WinAudioEndpointHandle {
    clear_last_error();

    let result = panic::catch_unwind(|| {
        let flow = Flow::from_raw(flow)
            .ok_or_else(|| AudioError::InvalidArgument(format!("Invalid flow: {flow}")))?;
        system().open(flow)
    });

    match result {
        Ok(Ok(session)) => EndpointHandle::new(session).into_raw(),
        Ok(Err(e)) => {
            record_error(&e);
            ptr::null_mut()
        }
        Err(_) => {
            set_last_error(ErrorCode::Panic, "Panic during endpoint open");
            ptr::null_mut()
        }
    }
}

/// Release an endpoint handle.
///
/// # Safety
/// The handle must have been created by win_audio_endpoint_open() and must not be used after this call.
/// Closing from a thread other than the opening one leaks the endpoint instead of releasing it.
#[no_mangle]
pub extern "C" fn win_audio_endpoint_close(handle: WinAudioEndpointHandle) {
    if handle.is_null() {
        return;
    }

    let _ = panic::catch_unwind(|| unsafe {
        release_handle::<SystemEndpoint>(handle);
    });
}

#[no_mangle]
pub extern "C" fn win_audio_endpoint_get_volume(
    handle: WinAudioEndpointHandle,
    out_volume: *mut i32,
) -> i32 {
    run_handle_status("endpoint get volume", handle, |session| {
        let out = unsafe { out_param(out_volume, "out_volume")? };
        *out = i32::from(session.volume()?);
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn win_audio_endpoint_set_volume(handle: WinAudioEndpointHandle, volume: f64) -> i32 {
    run_handle_status("endpoint set volume", handle, |session| {
        session.set_volume(percent_from_f64(volume)?)
    })
}

/// # Arguments
/// * `muted` - 1 = muted, 0 = unmuted
#[no_mangle]
pub extern "C" fn win_audio_endpoint_set_mute(handle: WinAudioEndpointHandle, muted: i32) -> i32 {
    run_handle_status("endpoint set mute", handle, |session| {
        session.set_mute(muted != 0)
    })
}

#[no_mangle]
pub extern "C" fn win_audio_endpoint_is_muted(
    handle: WinAudioEndpointHandle,
    out_muted: *mut bool,
) -> i32 {
    run_handle_status("endpoint is muted", handle, |session| {
        let out = unsafe { out_param(out_muted, "out_muted")? };
        *out = false;
        *out = session.is_muted()?;
        Ok(())
    })
}

// ============================================================================
// FFI Functions - Memory Management
// ============================================================================

/// Free a string allocated by this library.
///
/// # Safety
/// The pointer must have been returned by one of the win_audio_* functions.
/// Do not call this on strings from other sources.
#[no_mangle]
pub extern "C" fn win_audio_free_string(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }

    let _ = panic::catch_unwind(|| unsafe {
        let _ = CString::from_raw(ptr);
    });
}

// ============================================================================
// FFI Functions - Error Handling
// ============================================================================

/// Get the last error code.
///
/// # Returns
/// The error code from the last failed operation, or 0 if no error.
#[no_mangle]
pub extern "C" fn win_audio_last_error_code() -> i32 {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|(code, _)| *code as i32)
            .unwrap_or(0)
    })
}

/// Get the last error message.
///
/// # Returns
/// Error message string. Caller must free with win_audio_free_string().
/// Returns null if no error.
#[no_mangle]
pub extern "C" fn win_audio_last_error_message() -> *mut c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|(_, msg)| alloc_c_string(msg))
            .unwrap_or(ptr::null_mut())
    })
}

// ============================================================================
// FFI Functions - Utility
// ============================================================================

/// Get the library version.
///
/// # Returns
/// Version string. Caller must free with win_audio_free_string().
#[no_mangle]
pub extern "C" fn win_audio_version() -> *mut c_char {
    alloc_c_string(env!("CARGO_PKG_VERSION"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use win_audio_rs::audio::MockEndpoint;
    use win_audio_rs::{MockEndpoints, PlatformStatus};

    fn mock() -> AudioController<MockEndpoints> {
        AudioController::new(MockEndpoints::new())
    }

    fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = unsafe { CStr::from_ptr(ptr).to_str().unwrap().to_string() };
        win_audio_free_string(ptr);
        s
    }

    #[test]
    fn test_error_code_conversion() {
        let err = AudioError::EndpointResolution {
            flow: Flow::Render,
            status: PlatformStatus::new(PlatformStatus::E_NOTFOUND, ""),
        };
        assert_eq!(ErrorCode::from(&err), ErrorCode::EndpointResolution);
        assert_eq!(
            ErrorCode::from(&AudioError::InvalidArgument("x".to_string())),
            ErrorCode::InvalidArgument
        );
        assert_eq!(ErrorCode::Operation.kind(), "OperationError");
    }

    #[test]
    fn test_com_init_failure_reported_as_resolution() {
        let err = AudioError::endpoint(
            Flow::Capture,
            PlatformStatus::new(PlatformStatus::CO_E_NOTINITIALIZED, ""),
        );
        let code = record_error(&err);
        assert_eq!(code, ErrorCode::EndpointResolution);
        assert_eq!(code.kind(), "EndpointResolutionError");
        assert_eq!(
            take_string(win_audio_last_error_message()),
            "Failed to get mic endpoint: HRESULT 0x800401F0"
        );
    }

    #[test]
    fn test_percent_from_json() {
        assert_eq!(percent_from_json(Some(&serde_json::json!(55))).unwrap(), 55);
        assert_eq!(percent_from_json(Some(&serde_json::json!(33.9))).unwrap(), 33);
        assert_eq!(percent_from_json(Some(&serde_json::json!(150))).unwrap(), 150);
        for bad in [serde_json::json!("not a number"), Value::Null, serde_json::json!(true)] {
            assert!(matches!(
                percent_from_json(Some(&bad)),
                Err(AudioError::InvalidArgument(_))
            ));
        }
        assert!(matches!(
            percent_from_json(None),
            Err(AudioError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_typed_operations() {
        let audio = mock();
        let mut volume = -1;
        set_volume(&audio, Flow::Capture, 150.0).unwrap();
        get_volume(&audio, Flow::Capture, &mut volume).unwrap();
        assert_eq!(volume, 100);

        let mut muted = false;
        audio.mic().mute().unwrap();
        is_muted(&audio, Flow::Capture, &mut muted).unwrap();
        assert!(muted);
    }

    #[test]
    fn test_null_out_param_rejected() {
        let audio = mock();
        let err = get_volume(&audio, Flow::Render, ptr::null_mut()).unwrap_err();
        assert!(matches!(err, AudioError::InvalidArgument(_)));
        assert_eq!(audio.resolver().resolve_count(), 0);
    }

    #[test]
    fn test_nan_volume_rejected_without_platform_call() {
        let audio = mock();
        let err = set_volume(&audio, Flow::Render, f64::NAN).unwrap_err();
        assert!(matches!(err, AudioError::InvalidArgument(_)));
        assert_eq!(audio.resolver().resolve_count(), 0);
        assert_eq!(audio.resolver().scalar(Flow::Render), 0.5);
    }

    #[test]
    fn test_is_muted_failure_still_writes_false() {
        let audio = mock();
        audio.mic().mute().unwrap();
        audio
            .resolver()
            .fail_operations(Flow::Capture, Some(PlatformStatus::E_FAIL));
        let mut muted = true;
        let err = is_muted(&audio, Flow::Capture, &mut muted).unwrap_err();
        assert!(!muted);
        assert!(matches!(err, AudioError::Operation { .. }));
    }

    #[test]
    fn test_run_status_records_last_error() {
        let code = run_status("test", || {
            Err(AudioError::InvalidArgument("Expected volume number".to_string()))
        });
        assert_eq!(code, ErrorCode::InvalidArgument as i32);
        assert_eq!(win_audio_last_error_code(), code);
        assert_eq!(
            take_string(win_audio_last_error_message()),
            "Invalid argument: Expected volume number"
        );

        assert_eq!(run_status("test", || Ok(())), 0);
        assert_eq!(win_audio_last_error_code(), 0);
        assert!(win_audio_last_error_message().is_null());
    }

    #[test]
    fn test_run_status_catches_panics() {
        let code = run_status("test", || panic!("boom"));
        assert_eq!(code, ErrorCode::Panic as i32);
        assert_eq!(take_string(win_audio_last_error_message()), "Panic during test");
    }

    #[test]
    fn test_invoke_get_and_set() {
        let audio = mock();
        let response = invoke(&audio, r#"{"op":"setSpeakerVolume","args":[33.9]}"#);
        assert!(response.ok);
        assert!(response.value.is_none());

        let response = invoke(&audio, r#"{"op":"getSpeakerVolume"}"#);
        assert!(response.ok);
        assert_eq!(response.value, Some(Value::from(33)));

        let response = invoke(&audio, r#"{"op":"muteMic"}"#);
        assert!(response.ok);
        let response = invoke(&audio, r#"{"op":"isMicMuted"}"#);
        assert_eq!(response.value, Some(Value::Bool(true)));
    }

    #[test]
    fn test_invoke_truncates_and_saturates_host_numbers() {
        let audio = mock();
        assert!(invoke(&audio, r#"{"op":"setMicVolume","args":[12.7]}"#).ok);
        assert_eq!(audio.mic().volume().unwrap(), 12);
        assert!(invoke(&audio, r#"{"op":"setMicVolume","args":[4294967346]}"#).ok);
        assert_eq!(audio.mic().volume().unwrap(), 100);
    }

    #[test]
    fn test_invoke_rejects_missing_volume() {
        let audio = mock();
        for request in [
            r#"{"op":"setSpeakerVolume"}"#,
            r#"{"op":"setSpeakerVolume","args":["not a number"]}"#,
        ] {
            let response = invoke(&audio, request);
            assert!(!response.ok);
            let error = response.error.unwrap();
            assert_eq!(error.code, ErrorCode::InvalidArgument as i32);
            assert_eq!(error.kind, "InvalidArgument");
        }
        assert_eq!(audio.resolver().resolve_count(), 0);
    }

    #[test]
    fn test_invoke_is_muted_failure_carries_false() {
        let audio = mock();
        audio.resolver().set_present(Flow::Render, false);
        let response = invoke(&audio, r#"{"op":"isSpeakerMuted"}"#);
        assert!(!response.ok);
        assert_eq!(response.value, Some(Value::Bool(false)));
        let error = response.error.unwrap();
        assert_eq!(error.kind, "EndpointResolutionError");
        assert_eq!(error.status, Some(PlatformStatus::E_NOTFOUND));
        assert!(error.message.starts_with("Failed to get speaker endpoint"));
    }

    #[test]
    fn test_invoke_bad_requests() {
        let audio = mock();
        let response = invoke(&audio, "{not json");
        assert_eq!(response.error.unwrap().code, ErrorCode::JsonError as i32);

        let response = invoke(&audio, r#"{"op":"getHeadphoneVolume"}"#);
        assert_eq!(response.error.unwrap().code, ErrorCode::InvalidArgument as i32);
    }

    #[test]
    fn test_invoke_response_json_shape() {
        let audio = mock();
        let json = serde_json::to_string(&invoke(&audio, r#"{"op":"getMicVolume"}"#)).unwrap();
        assert_eq!(json, r#"{"ok":true,"value":50}"#);
    }

    #[test]
    fn test_session_handle_operations() {
        let audio = mock();
        let handle = EndpointHandle::new(audio.open(Flow::Render).unwrap()).into_raw();

        let session = unsafe { session_from::<MockEndpoint>(handle) }.unwrap();
        session.set_volume(64).unwrap();
        assert_eq!(session.volume().unwrap(), 64);
        assert_eq!(audio.resolver().open_handles(), 1);

        assert!(unsafe { release_handle::<MockEndpoint>(handle) });
        assert_eq!(audio.resolver().open_handles(), 0);
    }

    #[test]
    fn test_handle_is_tied_to_opening_thread() {
        let audio = mock();
        let handle = EndpointHandle::new(audio.open(Flow::Capture).unwrap()).into_raw();
        let address = handle as usize;

        thread::spawn(move || {
            let handle = address as WinAudioEndpointHandle;
            let err = unsafe { session_from::<MockEndpoint>(handle) }.unwrap_err();
            assert!(err.contains("thread"));
            assert!(!unsafe { release_handle::<MockEndpoint>(handle) });
        })
        .join()
        .unwrap();

        assert_eq!(audio.resolver().open_handles(), 1);
        assert!(unsafe { session_from::<MockEndpoint>(handle) }.is_ok());
        assert!(unsafe { release_handle::<MockEndpoint>(handle) });
        assert_eq!(audio.resolver().open_handles(), 0);
    }

    #[test]
    fn test_null_handle_sets_last_error() {
        assert_eq!(
            win_audio_endpoint_set_mute(ptr::null_mut(), 1),
            ErrorCode::InvalidHandle as i32
        );
        assert_eq!(win_audio_last_error_code(), ErrorCode::InvalidHandle as i32);
        assert_eq!(
            take_string(win_audio_last_error_message()),
            "Endpoint handle is null"
        );
    }

    #[test]
    fn test_null_handle_rejected() {
        let mut volume = 0;
        assert_eq!(
            win_audio_endpoint_get_volume(ptr::null_mut(), &mut volume),
            ErrorCode::InvalidHandle as i32
        );
        win_audio_endpoint_close(ptr::null_mut());
    }

    #[test]
    fn test_open_rejects_unknown_flow() {
        assert!(win_audio_endpoint_open(7).is_null());
        assert_eq!(win_audio_last_error_code(), ErrorCode::InvalidArgument as i32);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_exports_fail_cleanly_off_windows() {
        let mut volume = 0;
        assert_eq!(
            win_audio_get_speaker_volume(&mut volume),
            ErrorCode::EndpointResolution as i32
        );
        let mut muted = true;
        assert_eq!(
            win_audio_is_mic_muted(&mut muted),
            ErrorCode::EndpointResolution as i32
        );
        assert!(!muted);
        assert!(win_audio_endpoint_open(0).is_null());
        assert_eq!(
            win_audio_last_error_code(),
            ErrorCode::EndpointResolution as i32
        );
    }

    #[test]
    fn test_init_accepts_null_and_malformed_config() {
        assert_eq!(win_audio_init(ptr::null()), 0);
        let bad = CString::new("{log_level").unwrap();
        assert_eq!(win_audio_init(bad.as_ptr()), 0);
    }

    #[test]
    fn test_engine_config_filter_fallback() {
        let config: EngineConfig = serde_json::from_str(r#"{"log_level":"debug"}"#).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_version() {
        let version = take_string(win_audio_version());
        assert!(!version.is_empty());
    }
}
