//! C ABI over [`Transpiler`]. Generated code crosses the boundary as a
//! NUL-terminated string owned by the caller until passed to
//! [`oxcc__free`].

use std::ffi::{CString, c_char};
use std::path::Path;
use std::slice;

use tracing::{error, warn};

use crate::{Status, TranspileError, Transpiler};

/// Path bytes from the caller, or `None` when they are not a usable path.
///
/// # Safety
/// `path_ptr` must point to `path_len` readable bytes.
unsafe fn path_arg<'a>(path_ptr: *const c_char, path_len: usize) -> Option<&'a Path> {
    if path_ptr.is_null() || path_len == 0 {
        return None;
    }
    let bytes: &[u8] = unsafe { slice::from_raw_parts(path_ptr.cast::<u8>(), path_len) };
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(Path::new(text)),
        Err(err) => {
            warn!("path is not UTF-8: {err}");
            None
        }
    }
}

/// # Safety
/// Pointer arguments must satisfy the contract of [`oxcc_transpiler__transpile`].
unsafe fn transpile_into(
    transpiler: &Transpiler,
    path_ptr: *const c_char,
    path_len: usize,
    out_code: *mut *mut c_char,
    out_len: *mut usize,
) -> Status {
    if out_code.is_null() || out_len.is_null() {
        return Status::Invalid;
    }
    let Some(path) = (unsafe { path_arg(path_ptr, path_len) }) else {
        return Status::Invalid;
    };
    match transpiler.transpile(path) {
        Ok(output) => {
            let len = output.code.len();
            match CString::new(output.code) {
                Ok(code) => {
                    unsafe {
                        out_code.write(code.into_raw());
                        out_len.write(len);
                    }
                    Status::Ok
                }
                Err(err) => {
                    error!("generated code contains a NUL byte: {err}");
                    Status::Io
                }
            }
        }
        Err(err) => {
            report(&err);
            err.status()
        }
    }
}

fn report(err: &TranspileError) {
    for diagnostic in err.diagnostics() {
        warn!("{diagnostic}");
    }
    error!("{err}");
}

/// One-shot transpile of the file at `path_ptr[..path_len]`. On success
/// `*out_code` receives the generated source and `*out_len` its length
/// without the terminating NUL.
///
/// # Safety
/// `path_ptr` must point to `path_len` readable bytes and `out_code` and
/// `out_len` must be valid for writes. The returned buffer must be released
/// with [`oxcc__free`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn oxcc__transpile(
    path_ptr: *const c_char,
    path_len: usize,
    out_code: *mut *mut c_char,
    out_len: *mut usize,
) -> Status {
    unsafe { transpile_into(&Transpiler::new(), path_ptr, path_len, out_code, out_len) }
}

/// # Safety
/// `code` must be null or a buffer returned by a transpile call that has not
/// been freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn oxcc__free(code: *mut c_char) {
    if code.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(code) });
}

/// # Safety
/// The returned pointer must be released with [`oxcc_transpiler__free`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn oxcc_transpiler__new() -> *mut Transpiler {
    Box::into_raw(Box::new(Transpiler::new()))
}

/// # Safety
/// `transpiler` must come from [`oxcc_transpiler__new`]. The other pointers
/// follow [`oxcc__transpile`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn oxcc_transpiler__transpile(
    transpiler: *const Transpiler,
    path_ptr: *const c_char,
    path_len: usize,
    out_code: *mut *mut c_char,
    out_len: *mut usize,
) -> Status {
    let Some(transpiler) = (unsafe { transpiler.as_ref() }) else {
        return Status::Invalid;
    };
    unsafe { transpile_into(transpiler, path_ptr, path_len, out_code, out_len) }
}

/// # Safety
/// `transpiler` must be null or come from [`oxcc_transpiler__new`], and is
/// invalid afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn oxcc_transpiler__free(transpiler: *mut Transpiler) {
    if transpiler.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(transpiler) });
}

/// Same as [`oxcc__free`].
///
/// # Safety
/// See [`oxcc__free`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn oxcc_string__free(code: *mut c_char) {
    unsafe { oxcc__free(code) }
}
