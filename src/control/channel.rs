//! Solicited request/reply channel
//!
//! One [`Transport`] guarded by a single async mutex. The lock is held for the
//! whole write+read exchange and for any replacement of the transport that
//! follows it, so no caller can observe a half-replaced channel.

use crate::config::ConnectionOptions;
use crate::context::Context;
use crate::control::transport::Transport;
use crate::error::Result;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Serialized command/reply exchanges over one transport
#[derive(Debug)]
pub(crate) struct RequestChannel {
    remote: PathBuf,
    options: ConnectionOptions,
    /// `None` after a failed reconnection or an abandoned exchange
    transport: Mutex<Option<Transport>>,
}

impl RequestChannel {
    /// Connect the channel's first transport
    pub(crate) fn connect(remote: &Path, options: &ConnectionOptions) -> Result<Self> {
        let transport = Transport::connect(remote, options)?;
        Ok(Self {
            remote: remote.to_path_buf(),
            options: options.clone(),
            transport: Mutex::new(Some(transport)),
        })
    }

    /// Send `command` and wait for the single reply datagram
    ///
    /// A cancellation-class failure poisons the transport: it is closed and
    /// replaced before the lock is released, and the original error is
    /// returned. Other failures leave the transport in place.
    pub(crate) async fn send(&self, ctx: &Context, command: &str) -> Result<String> {
        let mut guard = self.transport.lock().await;

        let transport = match guard.take() {
            Some(transport) => transport,
            None => {
                debug!("No request transport, connecting to {:?}", self.remote);
                Transport::connect(&self.remote, &self.options)?
            }
        };

        match exchange(&transport, ctx, command).await {
            Err(err) if err.is_cancellation() => {
                debug!("Request {:?} abandoned: {}", command, err);
                *guard = self.replace(transport);
                Err(err)
            }
            result => {
                *guard = Some(transport);
                result
            }
        }
    }

    /// Close the current transport, if any
    pub(crate) async fn close(&self) -> Result<()> {
        match self.transport.lock().await.take() {
            Some(mut transport) => transport.close(),
            None => Ok(()),
        }
    }

    fn replace(&self, mut broken: Transport) -> Option<Transport> {
        if let Err(e) = broken.close() {
            warn!("Error closing request transport: {}", e);
        }

        match Transport::connect(&self.remote, &self.options) {
            Ok(transport) => Some(transport),
            Err(e) => {
                warn!("Error opening new request transport: {}", e);
                None
            }
        }
    }
}

async fn exchange(transport: &Transport, ctx: &Context, command: &str) -> Result<String> {
    transport.write(ctx, command.as_bytes()).await?;
    let reply = transport.read(ctx).await?;
    Ok(String::from_utf8_lossy(&reply).into_owned())
}
