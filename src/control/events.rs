//! Unsolicited daemon events
//!
//! Once a client sends `ATTACH` and gets `OK\n` back, the daemon pushes event
//! datagrams of the form `<P>payload`, where `P` is a priority digit. Each
//! subscription uses its own transport so event traffic never waits behind
//! solicited requests.
//!
//! See <https://w1.fi/wpa_supplicant/devel/ctrl_iface_page.html>.

use crate::config::ConnectionOptions;
use crate::context::Context;
use crate::control::transport::Transport;
use crate::error::{CtrlError, Result};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

const ATTACH: &str = "ATTACH";
const DETACH: &str = "DETACH";
const ATTACH_OK: &str = "OK\n";

/// Priority tag carried by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventPriority {
    /// `<0>`: message dumps
    MsgDump,
    /// `<1>`
    Debug,
    /// `<2>`
    Info,
    /// `<3>`
    Warning,
    /// `<4>`
    Error,
    /// `<5>` through `<9>`, which the daemon never assigns a level name
    Other(u8),
    /// The datagram carried no priority prefix
    Unknown,
}

impl EventPriority {
    /// Map a wire digit (`0..=9`) to its priority
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            0 => Some(Self::MsgDump),
            1 => Some(Self::Debug),
            2 => Some(Self::Info),
            3 => Some(Self::Warning),
            4 => Some(Self::Error),
            5..=9 => Some(Self::Other(digit)),
            _ => None,
        }
    }

    /// Numeric priority as used on the wire; `-1` for [`EventPriority::Unknown`]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::MsgDump => 0,
            Self::Debug => 1,
            Self::Info => 2,
            Self::Warning => 3,
            Self::Error => 4,
            Self::Other(digit) => i32::from(digit),
            Self::Unknown => -1,
        }
    }
}

impl std::fmt::Display for EventPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MsgDump => write!(f, "dump"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Other(digit) => write!(f, "{}", digit),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// An unsolicited message from the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    /// Priority parsed from the `<P>` prefix
    pub priority: EventPriority,
    /// Payload with the prefix removed
    pub data: String,
}

impl Event {
    /// Create an event
    pub fn new(priority: EventPriority, data: impl Into<String>) -> Self {
        Self {
            priority,
            data: data.into(),
        }
    }

    /// Split one raw datagram into priority and payload
    ///
    /// Any `<d>` prefix with a single digit is stripped. Datagrams without one
    /// are kept verbatim with priority [`EventPriority::Unknown`].
    pub fn parse(datagram: &[u8]) -> Self {
        match datagram {
            [b'<', digit @ b'0'..=b'9', b'>', rest @ ..] => {
                let priority =
                    EventPriority::from_digit(digit - b'0').unwrap_or(EventPriority::Unknown);
                Self::new(priority, String::from_utf8_lossy(rest))
            }
            _ => Self::new(EventPriority::Unknown, String::from_utf8_lossy(datagram)),
        }
    }
}

/// Lifecycle of one `listen` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubscriptionState {
    /// Opening the dedicated transport
    Connecting,
    /// Waiting for the `ATTACH` acknowledgement
    Attaching,
    /// Delivering events to the handler
    Streaming,
    /// Sending the best-effort `DETACH`
    Detaching,
    /// Transport released
    Closed,
    /// Ended before streaming started
    Errored,
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Attaching => write!(f, "attaching"),
            Self::Streaming => write!(f, "streaming"),
            Self::Detaching => write!(f, "detaching"),
            Self::Closed => write!(f, "closed"),
            Self::Errored => write!(f, "errored"),
        }
    }
}

/// An event subscription on its own transport
struct Subscription {
    transport: Transport,
    detach_timeout: std::time::Duration,
    state: SubscriptionState,
}

impl Subscription {
    fn transition(&mut self, next: SubscriptionState) {
        debug!("Event subscription {} -> {}", self.state, next);
        self.state = next;
    }

    async fn run<F>(&mut self, ctx: &Context, handler: F) -> CtrlError
    where
        F: FnMut(Event),
    {
        self.transition(SubscriptionState::Attaching);
        if let Err(e) = self.attach(ctx).await {
            self.transition(SubscriptionState::Errored);
            return e;
        }

        self.transition(SubscriptionState::Streaming);
        let err = self.stream(ctx, handler).await;

        self.transition(SubscriptionState::Detaching);
        self.detach().await;
        err
    }

    async fn attach(&self, ctx: &Context) -> Result<()> {
        self.transport.write(ctx, ATTACH.as_bytes()).await?;

        let reply = match self.transport.read(ctx).await {
            Ok(reply) => reply,
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                return Err(CtrlError::Protocol(format!(
                    "failed to read ATTACH reply: {}",
                    e
                )))
            }
        };

        if reply != ATTACH_OK.as_bytes() {
            return Err(CtrlError::Protocol(format!(
                "failed to attach to events: {}",
                String::from_utf8_lossy(&reply)
            )));
        }

        Ok(())
    }

    /// Deliver events until a read fails; the handler runs inline, so the
    /// next datagram is only read after it returns.
    async fn stream<F>(&self, ctx: &Context, mut handler: F) -> CtrlError
    where
        F: FnMut(Event),
    {
        loop {
            match self.transport.read(ctx).await {
                Ok(datagram) => handler(Event::parse(&datagram)),
                Err(e) => return e,
            }
        }
    }

    /// Uses a fresh context: the caller's has usually fired already.
    async fn detach(&self) {
        let ctx = Context::new().with_timeout(self.detach_timeout);
        if let Err(e) = self.transport.write(&ctx, DETACH.as_bytes()).await {
            warn!("Error sending DETACH request: {}", e);
        }
    }

    fn close(mut self) {
        if let Err(e) = self.transport.close() {
            warn!("Error closing event transport: {}", e);
        }
        self.transition(SubscriptionState::Closed);
    }
}

/// Attach on a dedicated transport and feed events to `handler` until `ctx`
/// fires or a read fails, then detach and close
///
/// Always ends with the error that stopped the stream.
pub(crate) async fn listen<F>(
    remote: &Path,
    options: &ConnectionOptions,
    ctx: &Context,
    handler: F,
) -> CtrlError
where
    F: FnMut(Event),
{
    debug!("Event subscription {}", SubscriptionState::Connecting);
    let transport = match Transport::connect(remote, options) {
        Ok(transport) => transport,
        Err(e) => {
            debug!(
                "Event subscription {} -> {}",
                SubscriptionState::Connecting,
                SubscriptionState::Errored
            );
            return e;
        }
    };

    let mut subscription = Subscription {
        transport,
        detach_timeout: options.detach_timeout(),
        state: SubscriptionState::Connecting,
    };

    let err = subscription.run(ctx, handler).await;
    subscription.close();
    err
}
