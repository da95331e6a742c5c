//! Configuration validation functions
//!
//! This module validates connection options before any socket is created,
//! so a bad naming pattern is reported as a configuration error instead of
//! an obscure bind failure.

use crate::error::{CtrlError, Result};
use std::path::Path;

/// Capacity of `sockaddr_un.sun_path` minus the trailing NUL
const MAX_SOCKET_PATH_LEN: usize = 107;

/// Random characters appended to the pattern for each local socket
const RANDOM_SUFFIX_LEN: usize = 6;

/// Largest datagram a Unix socket buffer will reasonably hold
const MAX_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Validate the local socket name prefix (non-empty, a single path component)
pub fn validate_temp_file_pattern(pattern: &str) -> Result<()> {
    if pattern.is_empty() {
        return Err(CtrlError::Config(
            "Temporary file pattern cannot be empty".to_string(),
        ));
    }

    if pattern.contains('/') || pattern.contains('\0') {
        return Err(CtrlError::Config(format!(
            "Temporary file pattern '{}' must not contain '/' or NUL",
            pattern
        )));
    }

    Ok(())
}

/// Validate the per-datagram read limit
pub fn validate_read_buffer_size(size: usize) -> Result<()> {
    if !(1..=MAX_READ_BUFFER_SIZE).contains(&size) {
        return Err(CtrlError::Config(format!(
            "Read buffer size {} is out of valid range (1-{})",
            size, MAX_READ_BUFFER_SIZE
        )));
    }
    Ok(())
}

/// Validate that generated socket names fit in a Unix socket address
pub fn validate_socket_name(dir: &Path, pattern: &str) -> Result<()> {
    let len = dir.join(pattern).as_os_str().len() + RANDOM_SUFFIX_LEN;
    if len > MAX_SOCKET_PATH_LEN {
        return Err(CtrlError::Config(format!(
            "Local socket path {:?} would be {} bytes, exceeding the {} byte limit",
            dir.join(pattern),
            len,
            MAX_SOCKET_PATH_LEN
        )));
    }
    Ok(())
}
