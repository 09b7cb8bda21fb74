//! Policy normalizers.
//!
//! Raw option values arrive loosely typed (`serde_json::Value`, typically
//! read from JSON or TOML). Each function here coerces one kind of option
//! into its canonical form or fails with a [`CaptureError`]. None of them
//! hold state.

use eventcap_types::{CaptureError, ConsolePolicy};
use serde_json::Value;

use crate::hooks::{system_clock, Clock, HookRef};

/// Whether a value counts as "not set" for option purposes.
///
/// `null`, `false`, zero, and the empty string are falsy. Everything else,
/// including empty arrays and objects, is truthy.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Normalizes a storage limit. `0` means unbounded.
///
/// Falsy values and the string `"0"` map to `0`. Positive integers pass
/// through; integral floats (`5.0`) and integer strings (`"5"`) are accepted
/// as integers.
///
/// # Errors
///
/// Returns `CaptureError::InvalidConfig` for negative, fractional, or
/// non-numeric values (including `true`, arrays, and objects).
pub fn normalize_limit(value: &Value) -> Result<usize, CaptureError> {
    if is_falsy(value) {
        return Ok(0);
    }

    let invalid = || {
        CaptureError::InvalidConfig(format!(
            "limit must be a non-negative integer, got {value}"
        ))
    };

    match value {
        Value::Number(n) => number_to_count(n).ok_or_else(invalid),
        Value::String(s) => s.trim().parse::<usize>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// Converts a JSON number to a non-negative integer count, if it is one.
pub(crate) fn number_to_count(n: &serde_json::Number) -> Option<usize> {
    if let Some(u) = n.as_u64() {
        return usize::try_from(u).ok();
    }
    if n.is_i64() {
        return None;
    }
    let f = n.as_f64()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= usize::MAX as f64 {
        Some(f as usize)
    } else {
        None
    }
}

/// Normalizes a console policy. Never fails.
///
/// - falsy -> `Off`
/// - `true` -> `All`
/// - numbers are floored and clamped into `Off..=All`
/// - strings match policy names case-insensitively; unknown names -> `Off`
/// - anything else -> `Off`
pub fn normalize_console_policy(value: &Value) -> ConsolePolicy {
    if is_falsy(value) {
        return ConsolePolicy::Off;
    }

    match value {
        Value::Bool(true) => ConsolePolicy::All,
        Value::Number(n) => {
            let ordinal = n.as_f64().unwrap_or(0.0).floor();
            let clamped = ordinal.clamp(
                ConsolePolicy::Off.as_u8() as f64,
                ConsolePolicy::All.as_u8() as f64,
            );
            ConsolePolicy::from_u8(clamped as u8).unwrap_or(ConsolePolicy::Off)
        }
        Value::String(s) => s.parse().unwrap_or(ConsolePolicy::Off),
        _ => ConsolePolicy::Off,
    }
}

/// Resolves an optional callable option.
///
/// Absent or falsy references yield `Ok(None)`; a direct callable passes
/// through. Any other reference is handed to `lookup`.
///
/// # Errors
///
/// Returns `CaptureError::InvalidConfig` naming `label` when `lookup` cannot
/// produce a callable for the reference.
pub fn resolve_callable<F>(
    value: Option<HookRef<F>>,
    label: &str,
    lookup: impl FnOnce(&Value) -> Option<F>,
) -> Result<Option<F>, CaptureError> {
    match value {
        None => Ok(None),
        Some(HookRef::Direct(callable)) => Ok(Some(callable)),
        Some(HookRef::Reference(reference)) if is_falsy(&reference) => Ok(None),
        Some(HookRef::Reference(reference)) => match lookup(&reference) {
            Some(callable) => Ok(Some(callable)),
            None => Err(CaptureError::InvalidConfig(format!(
                "{label}: could not resolve {reference} to a callable"
            ))),
        },
    }
}

/// Resolves the clock option, defaulting to the system clock.
///
/// # Errors
///
/// Returns `CaptureError::InvalidConfig` for any non-falsy reference; clocks
/// are never looked up by name.
pub fn resolve_clock(value: Option<HookRef<Clock>>) -> Result<Clock, CaptureError> {
    match value {
        None => Ok(system_clock()),
        Some(HookRef::Direct(clock)) => Ok(clock),
        Some(HookRef::Reference(reference)) if is_falsy(&reference) => Ok(system_clock()),
        Some(HookRef::Reference(reference)) => Err(CaptureError::InvalidConfig(format!(
            "clock must be a callable, got {reference}"
        ))),
    }
}

/// Validates a stream name.
///
/// Non-empty strings are trimmed; numbers are rendered as strings (integral
/// floats without a trailing `.0`). Everything else is invalid.
///
/// # Errors
///
/// With `strict` set, an invalid name returns `CaptureError::InvalidName`.
/// Otherwise invalid names yield `Ok(None)`.
pub fn validate_stream_name(value: &Value, strict: bool) -> Result<Option<String>, CaptureError> {
    let name = match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(number_to_name(n)),
        _ => None,
    };

    match name {
        Some(name) => Ok(Some(name)),
        None if strict => Err(CaptureError::InvalidName(format!(
            "stream name must be a non-empty string or a number, got {value}"
        ))),
        None => Ok(None),
    }
}

fn number_to_name(n: &serde_json::Number) -> String {
    if n.is_f64() {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                return format!("{}", f as i64);
            }
        }
    }
    n.to_string()
}
