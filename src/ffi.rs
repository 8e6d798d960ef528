use std::ffi::{c_char, CStr, CString};
use std::path::PathBuf;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::pipeline::{ConfigOverrides, PipelineConfig};
use crate::progress::ConsoleProgress;

static LAST_ERROR: Lazy<Mutex<Option<CString>>> = Lazy::new(|| Mutex::new(None));

fn set_last_error(msg: &str) {
    let c = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    let mut guard = LAST_ERROR.lock().unwrap_or_else(|e| e.into_inner());
    *guard = Some(c);
}

/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that stays valid for
/// the duration of the call.
unsafe fn take_cstr(ptr: *const c_char, name: &str) -> Result<String, String> {
    if ptr.is_null() {
        return Err(format!("{name} is null"));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(|s| s.to_string())
        .map_err(|_| format!("{name} is not valid UTF-8"))
}

/// # Safety
/// Same contract as [`take_cstr`].
unsafe fn take_optional_cstr(ptr: *const c_char, name: &str) -> Result<Option<String>, String> {
    if ptr.is_null() {
        return Ok(None);
    }
    unsafe { take_cstr(ptr, name) }.map(|s| Some(s).filter(|s| !s.trim().is_empty()))
}

/// # Safety
/// Every pointer must satisfy the contract of [`take_cstr`].
unsafe fn translate_text(
    config_path: *const c_char,
    source_lang: *const c_char,
    target_lang: *const c_char,
    text: *const c_char,
    country: *const c_char,
) -> Result<String, String> {
    let (config_path, source_lang, target_lang, text, country) = unsafe {
        (
            take_optional_cstr(config_path, "config_path")?,
            take_cstr(source_lang, "source_lang")?,
            take_cstr(target_lang, "target_lang")?,
            take_cstr(text, "text")?,
            take_optional_cstr(country, "country")?,
        )
    };

    let cfg = PipelineConfig::from_overrides(ConfigOverrides {
        config_path: config_path.map(PathBuf::from),
        ..Default::default()
    })
    .map_err(|e| format!("{e:#}"))?;
    let agent = cfg
        .build_agent(ConsoleProgress::silent())
        .map_err(|e| format!("{e:#}"))?;
    let translation = agent
        .translate(&source_lang, &target_lang, &text, country.as_deref())
        .map_err(|e| e.to_string())?;
    // Partial output is not handed across the boundary.
    translation.into_text().map_err(|e| e.to_string())
}

/// Translate `text` using `translation-agent.toml` (or the default search when
/// `config_path` is null). `country` may be null.
///
/// Returns an owned UTF-8 string to release with `ta_free_string`, or null on
/// failure (see `ta_last_error_utf8()`).
///
/// # Safety
/// Each argument must be null or a NUL-terminated string valid for the duration
/// of the call. `source_lang`, `target_lang` and `text` must not be null.
#[no_mangle]
pub unsafe extern "C" fn ta_translate_text(
    config_path: *const c_char,
    source_lang: *const c_char,
    target_lang: *const c_char,
    text: *const c_char,
    country: *const c_char,
) -> *mut c_char {
    match unsafe { translate_text(config_path, source_lang, target_lang, text, country) } {
        Ok(out) => match CString::new(out) {
            Ok(c) => c.into_raw(),
            Err(_) => {
                set_last_error("translation contains an interior NUL byte");
                std::ptr::null_mut()
            }
        },
        Err(msg) => {
            set_last_error(&msg);
            std::ptr::null_mut()
        }
    }
}

/// Releases a string returned by `ta_translate_text`. Null is ignored.
///
/// # Safety
/// `ptr` must be null or a pointer returned by `ta_translate_text` that has not
/// been freed yet. It must not be used after this call.
#[no_mangle]
pub unsafe extern "C" fn ta_free_string(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(ptr) });
}

/// Returns the last error message as a UTF-8 C string pointer (or null if none).
/// The pointer is valid until the next failing `ta_translate_text` call.
#[no_mangle]
pub extern "C" fn ta_last_error_utf8() -> *const c_char {
    let guard = LAST_ERROR.lock().unwrap_or_else(|e| e.into_inner());
    match guard.as_ref() {
        Some(s) => s.as_ptr(),
        None => std::ptr::null(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_arguments_set_last_error() {
        let src = CString::new("English").unwrap();
        let out = unsafe {
            ta_translate_text(
                std::ptr::null(),
                src.as_ptr(),
                std::ptr::null(),
                std::ptr::null(),
                std::ptr::null(),
            )
        };
        assert!(out.is_null());
        let msg = unsafe { CStr::from_ptr(ta_last_error_utf8()) };
        assert_eq!(msg.to_str().unwrap(), "target_lang is null");
    }

    #[test]
    fn free_accepts_null_and_owned_strings() {
        unsafe {
            ta_free_string(std::ptr::null_mut());
            ta_free_string(CString::new("x").unwrap().into_raw());
        }
    }
}
