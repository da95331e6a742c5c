//! Configuration management
//!
//! This module holds the options that shape how a [`ControlInterface`]
//! talks to the daemon, and the TOML file format the command-line binary
//! reads them from.
//!
//! [`ControlInterface`]: crate::control::ControlInterface

mod toml_parser;
mod validation;

pub use toml_parser::ConfigFile;
pub use validation::{validate_read_buffer_size, validate_socket_name, validate_temp_file_pattern};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Largest datagram the reference daemons send in a single reply
pub const DEFAULT_READ_BUFFER_SIZE: usize = 2048;

/// Options used to construct a control interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// File name prefix used to generate local socket addresses
    #[serde(default = "default_temp_file_pattern")]
    pub temp_file_pattern: String,

    /// Directory holding local sockets; the system temp dir when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,

    /// Maximum number of bytes read from a single datagram
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    /// How long `listen` waits for DETACH to be written before giving up
    #[serde(default = "default_detach_timeout_ms")]
    pub detach_timeout_ms: u64,
}

impl ConnectionOptions {
    /// Set the local socket name prefix
    pub fn with_temp_file_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.temp_file_pattern = pattern.into();
        self
    }

    /// Set the directory local sockets are created in
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Set the per-datagram read limit
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Directory local sockets are created in
    pub fn socket_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Deadline budget for the best-effort DETACH
    pub fn detach_timeout(&self) -> Duration {
        Duration::from_millis(self.detach_timeout_ms)
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        validation::validate_temp_file_pattern(&self.temp_file_pattern)?;
        validation::validate_read_buffer_size(self.read_buffer_size)?;
        validation::validate_socket_name(&self.socket_dir(), &self.temp_file_pattern)?;
        Ok(())
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            temp_file_pattern: default_temp_file_pattern(),
            temp_dir: None,
            read_buffer_size: default_read_buffer_size(),
            detach_timeout_ms: default_detach_timeout_ms(),
        }
    }
}

// Default value functions for serde
fn default_temp_file_pattern() -> String {
    "wpa_ctrl".to_string()
}

fn default_read_buffer_size() -> usize {
    DEFAULT_READ_BUFFER_SIZE
}

fn default_detach_timeout_ms() -> u64 {
    1000
}
