//! Naming rules shared by Google Cloud resource kinds

use serde_json::Value;
use stratum_core::{CloudError, Result};

/// Lowercase letters, digits and hyphens; starts with a letter, does not end
/// with a hyphen, at most `max_len` characters.
pub fn check_dns_label(field: &str, value: &str, max_len: usize) -> Result<()> {
    let valid = !value.is_empty()
        && value.len() <= max_len
        && value.starts_with(|c: char| c.is_ascii_lowercase())
        && !value.ends_with('-')
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if valid {
        Ok(())
    } else {
        Err(CloudError::Validation(format!(
            "{} '{}' must be 1-{} lowercase letters, digits or hyphens, start with a letter and not end with a hyphen",
            field, value, max_len
        )))
    }
}

pub fn check_one_of(field: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(CloudError::Validation(format!(
            "{} must be one of {}, got '{}'",
            field,
            allowed.join(", "),
            value
        )))
    }
}

/// Copy `body[pointer]` into the state attribute `key` when present
pub fn copy_attr(
    state: &mut stratum_core::ObservedState,
    body: &Value,
    pointer: &str,
    key: &str,
) {
    if let Some(value) = body.pointer(pointer).filter(|v| !v.is_null()) {
        state.set_attribute(key, value.clone());
    }
}
