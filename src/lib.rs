//! wpa-ctrl: client for the wpa_supplicant/hostapd control interface
//!
//! The daemon exposes its control surface on a Unix datagram socket that
//! accepts line-oriented text commands and answers with text replies. Clients
//! may also attach to receive unsolicited, priority-tagged event lines.
//!
//! # Architecture
//!
//! - [`ControlInterface`] owns one request transport, serialized by a lock,
//!   and opens a separate transport for every event subscription.
//! - Every blocking socket call takes a [`Context`] and can be abandoned when
//!   it is cancelled or its deadline passes. After an abandoned request the
//!   request transport is replaced so a late reply cannot leak into the next
//!   exchange.
//!
//! # Modules
//!
//! - `config`: Connection options and the TOML config file
//! - `context`: Cancellation tokens with deadlines
//! - `control`: Transports, request channel, event subscription
//! - `error`: Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod control;
pub mod error;

// Re-export commonly used types
pub use config::ConnectionOptions;
pub use context::{Cancellation, Context};
pub use control::{ControlInterface, Event, EventPriority};
pub use error::{CtrlError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
