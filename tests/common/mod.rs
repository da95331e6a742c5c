//! Mock control interface daemon shared by the integration tests
//!
//! The daemon answers `ATTACH` with a configurable reply followed by a fixed
//! list of events, answers `DETACH` with `OK\n`, and echoes everything else
//! back after an optional delay. Every received command is forwarded to the
//! test so it can check what actually reached the socket.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::UnixDatagram;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How the mock daemon responds
#[derive(Debug, Clone)]
pub struct Behavior {
    /// Delay before echoing a command back
    pub delay: Duration,
    /// Reply to `ATTACH`
    pub attach_reply: String,
    /// Events pushed right after a successful `ATTACH`
    pub events: Vec<String>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            attach_reply: "OK\n".to_string(),
            events: Vec::new(),
        }
    }
}

/// A running mock daemon bound to a temporary socket path
pub struct MockDaemon {
    /// Daemon control socket path
    pub path: PathBuf,
    commands: mpsc::UnboundedReceiver<String>,
    task: JoinHandle<()>,
    _dir: Option<TempDir>,
}

impl MockDaemon {
    /// Echo daemon replying after `delay`
    pub fn echo(delay: Duration) -> Self {
        Self::spawn(Behavior {
            delay,
            ..Behavior::default()
        })
    }

    /// Daemon pushing `events` after acknowledging `ATTACH`
    pub fn events(events: &[&str]) -> Self {
        Self::spawn(Behavior {
            events: events.iter().map(|e| e.to_string()).collect(),
            ..Behavior::default()
        })
    }

    /// Daemon with the given behavior in a fresh temporary directory
    pub fn spawn(behavior: Behavior) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut daemon = Self::spawn_at(&dir.path().join("ctrl.sock"), behavior);
        daemon._dir = Some(dir);
        daemon
    }

    /// Daemon with the given behavior bound at `path`
    pub fn spawn_at(path: &Path, behavior: Behavior) -> Self {
        let socket = UnixDatagram::bind(path).expect("Failed to bind mock daemon socket");
        let (tx, commands) = mpsc::unbounded_channel();
        let task = tokio::spawn(serve(socket, behavior, tx));

        Self {
            path: path.to_path_buf(),
            commands,
            task,
            _dir: None,
        }
    }

    /// Next command the daemon received, or `None` if none arrives within 2s
    pub async fn next_command(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(2), self.commands.recv())
            .await
            .ok()
            .flatten()
    }

    /// Stop serving and remove the socket so new connections fail
    ///
    /// Returns once the serving task has been torn down and its socket closed.
    pub async fn stop(&mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
        let _ = std::fs::remove_file(&self.path);
    }
}

impl Drop for MockDaemon {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(socket: UnixDatagram, behavior: Behavior, commands: mpsc::UnboundedSender<String>) {
    let mut buf = vec![0u8; 2048];
    loop {
        let Ok((read, from)) = socket.recv_from(&mut buf).await else {
            return;
        };
        let command = String::from_utf8_lossy(&buf[..read]).into_owned();
        let _ = commands.send(command.clone());

        let Some(peer) = from.as_pathname() else {
            continue;
        };

        // Send failures mean the client went away; keep serving others.
        match command.as_str() {
            "ATTACH" => {
                let _ = socket.send_to(behavior.attach_reply.as_bytes(), peer).await;
                if behavior.attach_reply == "OK\n" {
                    for event in &behavior.events {
                        let _ = socket.send_to(event.as_bytes(), peer).await;
                    }
                }
            }
            "DETACH" => {
                let _ = socket.send_to(b"OK\n", peer).await;
            }
            _ => {
                if !behavior.delay.is_zero() {
                    tokio::time::sleep(behavior.delay).await;
                }
                let _ = socket.send_to(&buf[..read], peer).await;
            }
        }
    }
}
