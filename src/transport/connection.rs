//! Underlying hub connection contract.
//!
//! A [`HubConnection`] is the live wire connection a session drives. It owns
//! the transport I/O, runs it on its own background tasks, and reports
//! everything that happens through callbacks:
//!
//! - lifecycle changes arrive as [`ConnectionSignal`]s on the signal handler
//! - hub events arrive as [`EventPayload`]s on per-event payload handlers
//!
//! Callbacks may fire from any task or thread, possibly concurrently. The
//! session re-marshals them onto its ordered delivery queue.
//!
//! # Request Decoration
//!
//! Every HTTP request a connection issues is built as an [`OutboundRequest`]
//! and passed through the installed [`Credentials`] before it is sent.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::Span;
use url::Url;

use crate::config::{ClientTransport, Credentials, HeaderMap};
use crate::error::Result;
use crate::identifiers::ConnectionHandle;
use crate::protocol::EventPayload;

// ============================================================================
// Types
// ============================================================================

/// Lifecycle callback type.
pub type SignalHandler = Arc<dyn Fn(ConnectionSignal) + Send + Sync>;

/// Hub event callback type.
pub type PayloadHandler = Arc<dyn Fn(EventPayload) + Send + Sync>;

// ============================================================================
// LinkState
// ============================================================================

/// Last known state of the underlying connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkState {
    /// Handshake in progress.
    Connecting,
    /// Handshake completed, transport up.
    Connected,
    /// Transport dropped, recovering.
    Reconnecting,
    /// Not connected.
    #[default]
    Disconnected,
}

// ============================================================================
// ConnectionSignal
// ============================================================================

/// Lifecycle notification raised by the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSignal {
    /// Handshake completed.
    Connected,
    /// Transport dropped, recovery started.
    Reconnecting,
    /// Transport recovered.
    Reconnected,
    /// Connection closed.
    Closed,
    /// Transport is lagging.
    Slow,
    /// Transport reported an error.
    Error(String),
}

// ============================================================================
// OutboundRequest
// ============================================================================

/// Kind of HTTP request a connection issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Transport negotiation.
    Negotiate,
    /// Transport connect (handshake).
    Connect,
    /// Long-polling receive.
    Poll,
    /// Hub method invocation.
    Send,
    /// Connection teardown.
    Abort,
}

/// An HTTP request about to be sent by a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// Request kind.
    pub kind: RequestKind,
    /// Target URL.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
}

impl OutboundRequest {
    /// Creates a request with no headers.
    #[inline]
    #[must_use]
    pub fn new(kind: RequestKind, url: Url) -> Self {
        Self {
            kind,
            url,
            headers: HeaderMap::default(),
        }
    }
}

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Validated input for building a connection.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Handshake URL, query string included.
    pub url: Url,
    /// Hub the connection talks to.
    pub hub_name: String,
    /// Logging/negotiation context of the connection.
    pub span: Span,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url.as_str())
            .field("hub_name", &self.hub_name)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// HubConnection
// ============================================================================

/// A live wire connection to one hub.
///
/// Configuration calls (`set_credentials`, `set_signal_handler`,
/// `subscribe`) are made before `start`. Subscriptions stay bound to the
/// connection object across `stop` / `start` cycles.
#[async_trait]
pub trait HubConnection: Send + Sync {
    /// Installs the credentials applied to every outbound request.
    fn set_credentials(&self, credentials: Option<Arc<dyn Credentials>>);

    /// Installs the lifecycle callback.
    fn set_signal_handler(&self, handler: SignalHandler);

    /// Registers a callback for hub event `event`.
    fn subscribe(&self, event: &str, handler: PayloadHandler);

    /// Performs the handshake.
    ///
    /// `transport` forces a transport; `None` negotiates one.
    ///
    /// # Errors
    ///
    /// Returns an error if negotiation or the handshake fails.
    async fn start(&self, transport: Option<ClientTransport>) -> Result<ConnectionHandle>;

    /// Tears the connection down. Raises [`ConnectionSignal::Closed`].
    ///
    /// # Errors
    ///
    /// Returns an error if the teardown request fails.
    async fn stop(&self) -> Result<()>;

    /// Returns the last known state. Never blocks.
    fn state(&self) -> LinkState;

    /// Returns the handle assigned by the hub, if connected.
    fn connection_id(&self) -> Option<ConnectionHandle>;

    /// Invokes hub method `method`, returning its payload if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the hub or the transport reports a failure.
    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Option<Value>>;
}

// ============================================================================
// HubConnector
// ============================================================================

/// Builds connections.
///
/// Building must not perform I/O; the handshake happens in
/// [`HubConnection::start`].
pub trait HubConnector: Send + Sync {
    /// Builds a connection for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the connector
    /// cannot serve `config`.
    fn build(&self, config: ConnectionConfig) -> Result<Arc<dyn HubConnection>>;
}

// ============================================================================
// Tests
// ============================================================================
