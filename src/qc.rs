use std::path::Path;

use crate::error::{MetaRegError, Result};

/// `exclusive_min`: reject `value == min`; the upper bound is always inclusive.
pub fn check_range_f64(
    value: f64,
    min: f64,
    max: f64,
    exclusive_min: bool,
    name: &str,
) -> Result<()> {
    if !value.is_finite() {
        return Err(MetaRegError::InvalidArgument(format!(
            "Value of {name} should be finite"
        )));
    }
    let below = if exclusive_min {
        value <= min
    } else {
        value < min
    };
    if below {
        return Err(MetaRegError::InvalidArgument(format!(
            "Value of {name} should be above {min}"
        )));
    }
    if value > max {
        return Err(MetaRegError::InvalidArgument(format!(
            "Value of {name} should be at most {max}"
        )));
    }
    Ok(())
}

pub fn check_file_exists(path: &Path, name: &str) -> Result<()> {
    if !path.exists() {
        return Err(MetaRegError::InvalidArgument(format!(
            "File {path:?} passed to {name} does not exist"
        )));
    }
    Ok(())
}

pub fn check_dir_exists(path: &Path, name: &str) -> Result<()> {
    if !path.is_dir() {
        return Err(MetaRegError::InvalidArgument(format!(
            "Directory {path:?} passed to {name} does not exist"
        )));
    }
    Ok(())
}

pub fn check_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MetaRegError::InvalidArgument(format!(
            "{name} must not be empty"
        )));
    }
    Ok(())
}
