//! Control interface client
//!
//! This module provides the client side of the wpa_supplicant/hostapd control
//! interface: a Unix datagram socket accepting text commands and returning
//! text replies, optionally pushing events to attached clients.
//!
//! ```no_run
//! use wpa_ctrl::{Context, ControlInterface};
//! use std::time::Duration;
//!
//! # async fn demo() -> wpa_ctrl::Result<()> {
//! let ctrl = ControlInterface::connect("/run/wpa_supplicant/wlan0")?;
//! let ctx = Context::new().with_timeout(Duration::from_secs(5));
//!
//! let reply = ctrl.send_request(&ctx, "PING").await?;
//! assert_eq!(reply, "PONG\n");
//!
//! let err = ctrl
//!     .listen(&ctx, |event| println!("{} - {}", event.priority, event.data))
//!     .await;
//! println!("stopped listening: {:?}", err);
//! ctrl.close().await
//! # }
//! ```

mod channel;
mod events;
mod transport;

pub use events::{Event, EventPriority};
pub use transport::Transport;

use crate::config::ConnectionOptions;
use crate::context::Context;
use crate::error::Result;
use channel::RequestChannel;
use std::path::{Path, PathBuf};
use tracing::info;

/// A control interface to a wpa_supplicant/hostapd daemon
///
/// Requests share one long-lived transport and are served one at a time.
/// Every [`listen`](Self::listen) call opens its own transport.
#[derive(Debug)]
pub struct ControlInterface {
    ctrl_iface_path: PathBuf,
    options: ConnectionOptions,
    requests: RequestChannel,
}

impl ControlInterface {
    /// Connect to the daemon socket at `path` with default options
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_with_options(path, ConnectionOptions::default())
    }

    /// Connect to the daemon socket at `path`
    pub fn connect_with_options(path: impl AsRef<Path>, options: ConnectionOptions) -> Result<Self> {
        options.validate()?;

        let ctrl_iface_path = path.as_ref().to_path_buf();
        let requests = RequestChannel::connect(&ctrl_iface_path, &options)?;
        info!("Connected to control interface at {:?}", ctrl_iface_path);

        Ok(Self {
            ctrl_iface_path,
            options,
            requests,
        })
    }

    /// Daemon socket path
    pub fn path(&self) -> &Path {
        &self.ctrl_iface_path
    }

    /// Options this interface was built with
    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Send a command and return the daemon's reply verbatim
    ///
    /// If `ctx` fires before the reply arrives, the request transport is
    /// replaced so the next call does not read this call's late reply.
    pub async fn send_request(&self, ctx: &Context, command: &str) -> Result<String> {
        self.requests.send(ctx, command).await
    }

    /// Listen to daemon events until `ctx` fires or the connection fails
    ///
    /// `handler` runs on the caller's task, once per event, in arrival order.
    /// Returns the error that ended the subscription.
    pub async fn listen<F>(&self, ctx: &Context, handler: F) -> Result<()>
    where
        F: FnMut(Event),
    {
        Err(events::listen(&self.ctrl_iface_path, &self.options, ctx, handler).await)
    }

    /// Close the request transport
    pub async fn close(self) -> Result<()> {
        info!("Closing control interface at {:?}", self.ctrl_iface_path);
        self.requests.close().await
    }
}
