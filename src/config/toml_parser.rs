//! TOML configuration file parser
//!
//! The command-line binary can read the daemon socket path and connection
//! options from a file instead of flags:
//!
//! ```toml
//! ctrl_interface = "/run/wpa_supplicant/wlan0"
//!
//! [connection]
//! temp_file_pattern = "wpa_ctrl"
//! read_buffer_size = 4096
//! ```

use crate::config::ConnectionOptions;
use crate::error::{CtrlError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// TOML configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Daemon control interface socket path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctrl_interface: Option<PathBuf>,

    /// Connection options
    #[serde(default)]
    pub connection: ConnectionOptions,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            CtrlError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn parse(toml: &str) -> Result<Self> {
        let config: ConfigFile = toml::from_str(toml)
            .map_err(|e| CtrlError::Config(format!("Failed to parse TOML config: {}", e)))?;

        config.connection.validate()?;
        Ok(config)
    }
}
