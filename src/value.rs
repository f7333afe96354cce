//! Helpers for cached JSON values.
//!
//! Counters follow memcached: a value is numeric when it is an unsigned
//! integer or a string of decimal digits. Increments wrap at 2^64 and
//! decrements floor at zero.

use serde_json::Value;

/// Reads a stored value as an unsigned counter.
pub fn counter_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            trimmed.parse().ok()
        }
        _ => None,
    }
}

/// Applies an increment to a stored value, `None` if it is not a counter.
pub fn incremented(value: &Value, delta: u64) -> Option<u64> {
    counter_value(value).map(|current| current.wrapping_add(delta))
}

/// Applies a decrement to a stored value, `None` if it is not a counter.
pub fn decremented(value: &Value, delta: u64) -> Option<u64> {
    counter_value(value).map(|current| current.saturating_sub(delta))
}

/// Approximate stored size of a value in bytes.
///
/// Strings count their raw length; everything else its JSON encoding.
pub fn data_size(value: &Value) -> usize {
    match value {
        Value::String(s) => s.len(),
        other => other.to_string().len(),
    }
}
