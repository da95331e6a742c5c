//! Cancellable Unix datagram transport
//!
//! A [`Transport`] is one datagram socket bound to a fresh local path and
//! connected to the daemon's control socket.
//!
//! # Cancellation
//!
//! Every write and read runs on its own spawned task while the caller waits on
//! whichever finishes first: the task or the caller's [`Context`]. When the
//! context wins, only the *wait* is abandoned. The spawned task is detached and
//! keeps its socket call pending, so a late reply can still be consumed by it.
//! Detached tasks also watch the transport's shutdown token, which fires on
//! [`Transport::close`] or drop. Closing the transport is therefore the only
//! thing that bounds the leak.

use crate::config::ConnectionOptions;
use crate::context::Context;
use crate::error::{CtrlError, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use tokio::net::UnixDatagram;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One bound and connected datagram socket to the daemon
#[derive(Debug)]
pub struct Transport {
    /// Released on close; detached tasks hold clones until shutdown fires
    socket: Option<Arc<UnixDatagram>>,
    /// Unlinked when the transport is closed
    local: Option<TempPath>,
    local_path: PathBuf,
    remote_path: PathBuf,
    read_buffer_size: usize,
    shutdown: CancellationToken,
}

impl Transport {
    /// Bind a socket at a fresh local path and connect it to `remote`
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(remote: &Path, options: &ConnectionOptions) -> Result<Self> {
        let dir = options.socket_dir();
        let bound = tempfile::Builder::new()
            .prefix(&options.temp_file_pattern)
            .make_in(&dir, |path| UnixDatagram::bind(path))
            .map_err(|source| CtrlError::Connect {
                path: dir.clone(),
                source,
            })?;
        let (socket, local) = bound.into_parts();
        let local_path = local.to_path_buf();

        socket.connect(remote).map_err(|source| CtrlError::Connect {
            path: remote.to_path_buf(),
            source,
        })?;

        debug!("Connected {:?} -> {:?}", local_path, remote);

        Ok(Self {
            socket: Some(Arc::new(socket)),
            local: Some(local),
            local_path,
            remote_path: remote.to_path_buf(),
            read_buffer_size: options.read_buffer_size,
            shutdown: CancellationToken::new(),
        })
    }

    /// Local socket path this transport is bound to
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Daemon socket path this transport is connected to
    pub fn remote_path(&self) -> &Path {
        &self.remote_path
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }

    /// Send one datagram, giving up when `ctx` fires
    pub async fn write(&self, ctx: &Context, payload: &[u8]) -> Result<usize> {
        let socket = self.open_socket()?;
        if let Some(reason) = ctx.err() {
            return Err(reason.into());
        }

        let shutdown = self.shutdown.clone();
        let payload = payload.to_vec();
        let task = tokio::spawn(async move {
            tokio::select! {
                result = socket.send(&payload) => Some(result),
                _ = shutdown.cancelled() => None,
            }
        });

        race(ctx, task).await
    }

    /// Receive one datagram, giving up when `ctx` fires
    ///
    /// Datagrams longer than the configured read buffer are truncated by the
    /// socket layer.
    pub async fn read(&self, ctx: &Context) -> Result<Vec<u8>> {
        let socket = self.open_socket()?;
        if let Some(reason) = ctx.err() {
            return Err(reason.into());
        }

        let shutdown = self.shutdown.clone();
        let mut buf = vec![0u8; self.read_buffer_size];
        let task = tokio::spawn(async move {
            let received = tokio::select! {
                result = socket.recv(&mut buf) => result,
                _ = shutdown.cancelled() => return None,
            };
            Some(received.map(|read| {
                buf.truncate(read);
                buf
            }))
        });

        race(ctx, task).await
    }

    /// Stop detached I/O tasks, release the socket and unlink its path
    ///
    /// The descriptor is freed as soon as the stopped tasks let go of it.
    /// Closing twice returns [`CtrlError::Closed`].
    pub fn close(&mut self) -> Result<()> {
        self.socket.take().ok_or(CtrlError::Closed)?;
        self.shutdown.cancel();
        debug!("Closing {:?}", self.local_path);
        if let Some(local) = self.local.take() {
            local.close()?;
        }
        Ok(())
    }

    fn open_socket(&self) -> Result<Arc<UnixDatagram>> {
        self.socket.as_ref().map(Arc::clone).ok_or(CtrlError::Closed)
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Wait for the I/O task or the context, whichever finishes first
///
/// Dropping the losing `JoinHandle` detaches the task rather than aborting it.
async fn race<T>(ctx: &Context, task: JoinHandle<Option<io::Result<T>>>) -> Result<T> {
    tokio::select! {
        biased;
        reason = ctx.done() => Err(reason.into()),
        joined = task => match joined {
            Ok(Some(result)) => result.map_err(CtrlError::Io),
            Ok(None) => Err(CtrlError::Closed),
            Err(e) => Err(CtrlError::Io(io::Error::other(e))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Cancellation;
    use std::time::Duration;
    use tempfile::TempDir;

    fn peer(dir: &TempDir) -> (PathBuf, std::os::unix::net::UnixDatagram) {
        let path = dir.path().join("daemon.sock");
        let socket = std::os::unix::net::UnixDatagram::bind(&path).unwrap();
        (path, socket)
    }

    fn options(dir: &TempDir) -> ConnectionOptions {
        ConnectionOptions::default()
            .with_temp_file_pattern("transport-test")
            .with_temp_dir(dir.path())
    }

    #[tokio::test]
    async fn test_connect_missing_daemon() {
        let dir = TempDir::new().unwrap();
        let remote = dir.path().join("absent.sock");

        let err = Transport::connect(&remote, &options(&dir)).unwrap_err();
        match err {
            CtrlError::Connect { path, .. } => assert_eq!(path, remote),
            other => panic!("expected connect error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_local_path_naming_and_cleanup() {
        let dir = TempDir::new().unwrap();
        let (remote, _peer) = peer(&dir);

        let mut transport = Transport::connect(&remote, &options(&dir)).unwrap();
        let local = transport.local_path().to_path_buf();
        assert!(local.starts_with(dir.path()));
        assert!(local
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("transport-test"));
        assert!(local.exists());
        assert_eq!(transport.remote_path(), remote.as_path());

        transport.close().unwrap();
        assert!(!local.exists());
        assert!(matches!(transport.close(), Err(CtrlError::Closed)));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let (remote, peer) = peer(&dir);
        let transport = Transport::connect(&remote, &options(&dir)).unwrap();
        let ctx = Context::new().with_timeout(Duration::from_secs(2));

        let written = transport.write(&ctx, b"PING").await.unwrap();
        assert_eq!(written, 4);

        let mut buf = [0u8; 64];
        let (read, from) = peer.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..read], b"PING");
        peer.send_to(b"PONG\n", from.as_pathname().unwrap()).unwrap();

        assert_eq!(transport.read(&ctx).await.unwrap(), b"PONG\n");
    }

    #[tokio::test]
    async fn test_read_truncates_to_buffer_size() {
        let dir = TempDir::new().unwrap();
        let (remote, peer) = peer(&dir);
        let transport =
            Transport::connect(&remote, &options(&dir).with_read_buffer_size(4)).unwrap();

        peer.send_to(b"SCAN_RESULTS", transport.local_path()).unwrap();

        let ctx = Context::new().with_timeout(Duration::from_secs(2));
        assert_eq!(transport.read(&ctx).await.unwrap(), b"SCAN");
    }

    #[tokio::test]
    async fn test_expired_context_does_not_block() {
        let dir = TempDir::new().unwrap();
        let (remote, peer) = peer(&dir);
        let transport = Transport::connect(&remote, &options(&dir)).unwrap();

        let ctx = Context::new();
        ctx.cancel();

        let err = transport.write(&ctx, b"PING").await.unwrap_err();
        assert_eq!(err.cancellation(), Some(Cancellation::Canceled));
        let err = transport.read(&ctx).await.unwrap_err();
        assert_eq!(err.cancellation(), Some(Cancellation::Canceled));

        // Nothing reached the peer.
        peer.set_nonblocking(true).unwrap();
        let mut buf = [0u8; 16];
        assert!(peer.recv(&mut buf).is_err());
    }

    #[tokio::test]
    async fn test_read_deadline() {
        let dir = TempDir::new().unwrap();
        let (remote, _peer) = peer(&dir);
        let transport = Transport::connect(&remote, &options(&dir)).unwrap();

        let ctx = Context::new().with_timeout(Duration::from_millis(20));
        let err = transport.read(&ctx).await.unwrap_err();
        assert_eq!(err.cancellation(), Some(Cancellation::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_io_after_close() {
        let dir = TempDir::new().unwrap();
        let (remote, _peer) = peer(&dir);
        let mut transport = Transport::connect(&remote, &options(&dir)).unwrap();
        transport.close().unwrap();

        let ctx = Context::new();
        assert!(matches!(
            transport.write(&ctx, b"PING").await,
            Err(CtrlError::Closed)
        ));
        assert!(matches!(transport.read(&ctx).await, Err(CtrlError::Closed)));
    }

    #[tokio::test]
    async fn test_close_releases_socket_held_by_detached_read() {
        let dir = TempDir::new().unwrap();
        let (remote, _peer) = peer(&dir);
        let mut transport = Transport::connect(&remote, &options(&dir)).unwrap();
        let socket = Arc::downgrade(transport.socket.as_ref().unwrap());

        // Leaves a read task detached and still holding the socket.
        let ctx = Context::new().with_timeout(Duration::from_millis(10));
        assert!(transport.read(&ctx).await.unwrap_err().is_cancellation());
        assert!(socket.upgrade().is_some());

        transport.close().unwrap();
        assert!(transport.is_closed());

        for _ in 0..100 {
            if socket.upgrade().is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(socket.upgrade().is_none());
    }
}
