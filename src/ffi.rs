//! FFI bindings for inkcheck
//!
//! C-compatible functions for driving the capture and scoring pipeline from
//! other languages. All functions take null-terminated C strings and return
//! allocated memory that must be freed by the caller using `inkcheck_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::capture::{replay_capture_log, CaptureLog};
use crate::error::CaptureError;
use crate::metrics::compute_stroke_metrics;
use crate::pipeline::{capture_log_to_verdict, session_to_verdict, CaptchaProcessor};
use crate::scoring::builtin_algorithm;
use crate::session::session_to_json;
use crate::types::CapturePoint;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Turn a pipeline result into a C string, recording the error on failure
fn result_to_cstr(result: Result<String, CaptureError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Run `f` on a JSON argument, or record an invalid-pointer error
unsafe fn with_json_arg(
    json: *const c_char,
    f: impl FnOnce(&str) -> Result<String, CaptureError>,
) -> *mut c_char {
    clear_last_error();

    match cstr_to_string(json) {
        Some(s) => result_to_cstr(f(&s)),
        None => {
            set_last_error("Invalid JSON string pointer");
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Replay a capture log and return the session JSON.
///
/// # Safety
/// - `log_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `inkcheck_free_string`.
/// - Returns NULL on error; call `inkcheck_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn inkcheck_capture_log_to_session(log_json: *const c_char) -> *mut c_char {
    with_json_arg(log_json, |json| {
        let log = CaptureLog::from_json(json)?;
        let session = replay_capture_log(&log)?;
        session_to_json(&session)
    })
}

/// Replay a capture log, score it with the built-in algorithms and return the verdict JSON.
///
/// # Safety
/// - `log_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `inkcheck_free_string`.
/// - Returns NULL on error; call `inkcheck_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn inkcheck_capture_log_to_verdict(log_json: *const c_char) -> *mut c_char {
    with_json_arg(log_json, capture_log_to_verdict)
}

/// Score a session with the built-in algorithms and return the verdict JSON.
///
/// # Safety
/// - `session_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `inkcheck_free_string`.
/// - Returns NULL on error; call `inkcheck_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn inkcheck_session_to_verdict(session_json: *const c_char) -> *mut c_char {
    with_json_arg(session_json, session_to_verdict)
}

/// Compute stroke metrics for a JSON array of capture points.
///
/// # Safety
/// - `points_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `inkcheck_free_string`.
/// - Returns NULL on error; call `inkcheck_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn inkcheck_stroke_metrics(points_json: *const c_char) -> *mut c_char {
    with_json_arg(points_json, |json| {
        let points: Vec<CapturePoint> = serde_json::from_str(json)?;
        let metrics = compute_stroke_metrics(&points);
        Ok(serde_json::to_string(&metrics)?)
    })
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a CaptchaProcessor
pub struct CaptchaProcessorHandle {
    processor: CaptchaProcessor,
}

/// Create a processor with every built-in algorithm registered.
///
/// # Safety
/// - Returns a pointer to a newly allocated processor.
/// - Must be freed with `inkcheck_processor_free`.
#[no_mangle]
pub unsafe extern "C" fn inkcheck_processor_new() -> *mut CaptchaProcessorHandle {
    clear_last_error();

    let handle = Box::new(CaptchaProcessorHandle {
        processor: CaptchaProcessor::new(),
    });
    Box::into_raw(handle)
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `inkcheck_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn inkcheck_processor_free(processor: *mut CaptchaProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Register a built-in algorithm by name.
///
/// Returns 0 on success, -1 on error (unknown name or invalid pointers).
///
/// # Safety
/// - `processor` must be a valid pointer returned by `inkcheck_processor_new`.
/// - `name` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn inkcheck_processor_register_builtin(
    processor: *mut CaptchaProcessorHandle,
    name: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let name_str = match cstr_to_string(name) {
        Some(s) => s,
        None => {
            set_last_error("Invalid name string pointer");
            return -1;
        }
    };

    match builtin_algorithm(&name_str) {
        Some(algorithm) => {
            handle.processor.engine_mut().register_shared(algorithm);
            0
        }
        None => {
            set_last_error(&format!("Unknown built-in algorithm: {}", name_str));
            -1
        }
    }
}

/// Unregister every algorithm with the given name.
///
/// Returns the number of algorithms removed, or -1 on error.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `inkcheck_processor_new`.
/// - `name` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn inkcheck_processor_unregister(
    processor: *mut CaptchaProcessorHandle,
    name: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    match cstr_to_string(name) {
        Some(name_str) => handle.processor.engine_mut().unregister(&name_str) as i32,
        None => {
            set_last_error("Invalid name string pointer");
            -1
        }
    }
}

/// Score a session JSON with the processor's engine and return the verdict JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `inkcheck_processor_new`.
/// - `session_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `inkcheck_free_string`.
/// - Returns NULL on error; call `inkcheck_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn inkcheck_processor_score_session(
    processor: *mut CaptchaProcessorHandle,
    session_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;
    with_json_arg(session_json, |json| handle.processor.process_session(json))
}

/// Replay and score a capture log with the processor's engine.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `inkcheck_processor_new`.
/// - `log_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `inkcheck_free_string`.
/// - Returns NULL on error; call `inkcheck_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn inkcheck_processor_score_capture_log(
    processor: *mut CaptchaProcessorHandle,
    log_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;
    with_json_arg(log_json, |json| handle.processor.process_log(json))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by inkcheck functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an inkcheck function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn inkcheck_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next inkcheck function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn inkcheck_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the inkcheck library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn inkcheck_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
