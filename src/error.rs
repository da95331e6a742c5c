//! Error types for wpa-ctrl
//!
//! This module defines the error types used throughout the library.
//! We use `thiserror` for ergonomic error definitions and `anyhow` for
//! error propagation in the command-line binary.

use crate::context::Cancellation;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for control interface operations
#[derive(Error, Debug)]
pub enum CtrlError {
    /// Binding the local socket or connecting to the daemon failed
    #[error("Failed to connect to {path:?}: {source}")]
    Connect {
        /// Socket path that could not be bound or reached
        path: PathBuf,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// The caller's context was cancelled or its deadline passed
    #[error(transparent)]
    Cancelled(#[from] Cancellation),

    /// The daemon answered with something the protocol does not allow
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport was already closed
    #[error("Transport is closed")]
    Closed,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using CtrlError
pub type Result<T> = std::result::Result<T, CtrlError>;

impl CtrlError {
    /// Returns the cancellation sub-kind if the error was caused by a context firing
    pub fn cancellation(&self) -> Option<Cancellation> {
        match self {
            CtrlError::Cancelled(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Whether the error was caused by cancellation or an elapsed deadline
    pub fn is_cancellation(&self) -> bool {
        self.cancellation().is_some()
    }
}

impl From<toml::de::Error> for CtrlError {
    fn from(err: toml::de::Error) -> Self {
        CtrlError::Config(err.to_string())
    }
}
