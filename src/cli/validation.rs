//! CLI argument validation functions
//!
//! Value parsers for arguments that clap cannot check on its own.

use chrono::NaiveDateTime;
use std::fs;
use std::path::PathBuf;

/// Accepted formats for `schedule --at`, in naive local time
const SEND_AT_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Validate that a file path is accessible (exists and is readable)
pub fn validate_config_file_path(path_str: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(format!("Configuration file does not exist: '{}'", path_str));
    }

    if !path.is_file() {
        return Err(format!("Configuration path is not a file: '{}'", path_str));
    }

    match fs::File::open(&path) {
        Ok(_) => Ok(path),
        Err(e) => Err(format!("Cannot read configuration file '{}': {}", path_str, e)),
    }
}

/// Validate rollback steps is a positive number
pub fn validate_rollback_steps(steps_str: &str) -> Result<u32, String> {
    let steps: u32 = steps_str
        .parse()
        .map_err(|_| format!("Rollback steps must be a valid positive number, got: '{}'", steps_str))?;

    if steps == 0 {
        return Err("Rollback steps must be greater than 0".to_string());
    }

    // Guard against accidental mass rollbacks
    if steps > 100 {
        return Err("Rollback steps cannot exceed 100 for safety reasons".to_string());
    }

    Ok(steps)
}

/// Validate the poll interval in seconds (1 to 86400)
pub fn validate_poll_interval(secs_str: &str) -> Result<u64, String> {
    let secs: u64 = secs_str
        .parse()
        .map_err(|_| format!("Poll interval must be a number of seconds, got: '{}'", secs_str))?;

    if secs == 0 {
        return Err("Poll interval must be at least 1 second".to_string());
    }

    if secs > 86_400 {
        return Err("Poll interval cannot exceed one day (86400 seconds)".to_string());
    }

    Ok(secs)
}

/// Validate the worker count (1 to 256)
pub fn validate_workers(workers_str: &str) -> Result<usize, String> {
    let workers: usize = workers_str
        .parse()
        .map_err(|_| format!("Workers must be a positive number, got: '{}'", workers_str))?;

    if workers == 0 {
        return Err("Workers must be greater than 0".to_string());
    }

    if workers > 256 {
        return Err("Workers cannot exceed 256".to_string());
    }

    Ok(workers)
}

/// Parse `YYYY-MM-DD HH:MM[:SS]` into a naive local timestamp
pub fn parse_send_at(value: &str) -> Result<NaiveDateTime, String> {
    let value = value.trim();

    SEND_AT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| {
            format!(
                "Send time must look like 'YYYY-MM-DD HH:MM' or 'YYYY-MM-DD HH:MM:SS', got: '{}'",
                value
            )
        })
}
