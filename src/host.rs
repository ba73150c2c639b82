//! Host application bridge.
//!
//! The host talks to a [`Session`] over two channels:
//!
//! | Direction | Shape | Types |
//! |-----------|-------|-------|
//! | Host → session | Request / response | [`HostRequest`], each with a result sink |
//! | Session → host | Fire-and-forget | [`HostEvents`] callbacks |
//!
//! [`HostBridge::serve`] drains the request channel and answers each request
//! on its own task, so a slow invocation never holds up `isConnected` or
//! `stop`. [`HostClient`] is the typed sending half.
//!
//! # Example
//!
//! ```ignore
//! use hub_session::{ConnectionOptions, HostClient, LoopbackHub, Session};
//! use tokio::sync::mpsc;
//!
//! let (events, mut rx) = mpsc::unbounded_channel();
//! let session = Session::builder().connector(LoopbackHub::new()).host(events).build()?;
//! let (client, _bridge) = HostClient::spawn(session.into(), 16);
//!
//! let handle = client.connect(ConnectionOptions::new("https://h/signalr", "chat")).await?;
//! while let Some(event) = rx.recv().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::config::ConnectionOptions;
use crate::error::{Error, Result};
use crate::identifiers::ConnectionHandle;
use crate::protocol::{InboundMessage, InvokeRequest, StatusChangeEvent};
use crate::session::Session;

// ============================================================================
// Outbound: HostEvents
// ============================================================================

/// Receives everything the session pushes to the host.
///
/// Calls arrive one at a time, in delivery order, from the session's
/// delivery task. Implementations must not block.
pub trait HostEvents: Send + Sync + 'static {
    /// A connection status changed.
    fn on_status_change(&self, event: StatusChangeEvent);

    /// A subscribed hub event arrived.
    fn on_new_message(&self, event_name: String, arguments: Vec<String>);
}

/// An item pushed to the host, for channel-based hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum HostEvent {
    /// `onStatusChange`.
    StatusChange(StatusChangeEvent),
    /// `onNewMessage`.
    NewMessage(InboundMessage),
}

impl HostEvents for mpsc::UnboundedSender<HostEvent> {
    fn on_status_change(&self, event: StatusChangeEvent) {
        if self.send(HostEvent::StatusChange(event)).is_err() {
            trace!("Host event receiver dropped");
        }
    }

    fn on_new_message(&self, event_name: String, arguments: Vec<String>) {
        let message = InboundMessage::new(event_name, arguments);
        if self.send(HostEvent::NewMessage(message)).is_err() {
            trace!("Host event receiver dropped");
        }
    }
}

// ============================================================================
// Inbound: HostRequest
// ============================================================================

/// Reply channel for one host request.
pub type ResultSink<T> = oneshot::Sender<Result<T>>;

/// A request from the host.
#[derive(Debug)]
pub enum HostRequest {
    /// `connect(options)`.
    Connect {
        options: ConnectionOptions,
        reply: ResultSink<ConnectionHandle>,
    },
    /// `reconnect()`.
    Reconnect { reply: ResultSink<ConnectionHandle> },
    /// `stop()`.
    Stop { reply: ResultSink<()> },
    /// `isConnected()`. Never fails.
    IsConnected { reply: oneshot::Sender<bool> },
    /// `invokeMethod(methodName, arguments)`.
    InvokeMethod {
        request: InvokeRequest,
        reply: ResultSink<String>,
    },
}

impl HostRequest {
    /// Returns the host-facing operation name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Reconnect { .. } => "reconnect",
            Self::Stop { .. } => "stop",
            Self::IsConnected { .. } => "isConnected",
            Self::InvokeMethod { .. } => "invokeMethod",
        }
    }
}

// ============================================================================
// HostBridge
// ============================================================================

/// Serves host requests against one session.
#[derive(Debug, Clone)]
pub struct HostBridge {
    session: Arc<Session>,
}

impl HostBridge {
    /// Creates a bridge for `session`.
    #[inline]
    #[must_use]
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Answers requests until every sender is dropped.
    pub async fn serve(self, mut requests: mpsc::Receiver<HostRequest>) {
        while let Some(request) = requests.recv().await {
            trace!(op = request.name(), "Host request received");
            let session = Arc::clone(&self.session);
            tokio::spawn(Self::answer(session, request));
        }

        debug!("Host request channel closed");
    }

    /// Answers one request.
    async fn answer(session: Arc<Session>, request: HostRequest) {
        let op = request.name();

        let delivered = match request {
            HostRequest::Connect { options, reply } => {
                reply.send(session.connect(options).await).is_ok()
            }
            HostRequest::Reconnect { reply } => reply.send(session.reconnect().await).is_ok(),
            HostRequest::Stop { reply } => reply.send(session.stop().await).is_ok(),
            HostRequest::IsConnected { reply } => reply.send(session.is_connected()).is_ok(),
            HostRequest::InvokeMethod { request, reply } => {
                reply.send(session.invoke(request).await).is_ok()
            }
        };

        if !delivered {
            debug!(op, "Host went away before the reply");
        }
    }
}

// ============================================================================
// HostClient
// ============================================================================

/// Typed sender for [`HostRequest`]s.
#[derive(Debug, Clone)]
pub struct HostClient {
    tx: mpsc::Sender<HostRequest>,
}

impl HostClient {
    /// Wraps an existing request channel.
    #[inline]
    #[must_use]
    pub fn new(tx: mpsc::Sender<HostRequest>) -> Self {
        Self { tx }
    }

    /// Spawns a [`HostBridge`] for `session` and returns its client.
    ///
    /// The bridge stops once every clone of the client is dropped.
    #[must_use]
    pub fn spawn(session: Arc<Session>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(HostBridge::new(session).serve(rx));
        (Self::new(tx), task)
    }

    /// Connects with `options`.
    ///
    /// # Errors
    ///
    /// See [`Session::connect`]; [`Error::ConnectionClosed`] if the bridge
    /// is gone.
    pub async fn connect(&self, options: ConnectionOptions) -> Result<ConnectionHandle> {
        let (reply, rx) = oneshot::channel();
        self.send(HostRequest::Connect { options, reply }).await?;
        rx.await?
    }

    /// Re-runs the handshake.
    ///
    /// # Errors
    ///
    /// See [`Session::reconnect`].
    pub async fn reconnect(&self) -> Result<ConnectionHandle> {
        let (reply, rx) = oneshot::channel();
        self.send(HostRequest::Reconnect { reply }).await?;
        rx.await?
    }

    /// Stops the connection.
    ///
    /// # Errors
    ///
    /// See [`Session::stop`].
    pub async fn stop(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(HostRequest::Stop { reply }).await?;
        rx.await?
    }

    /// Returns whether the session is connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the bridge is gone.
    pub async fn is_connected(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(HostRequest::IsConnected { reply }).await?;
        Ok(rx.await?)
    }

    /// Invokes hub method `method_name`.
    ///
    /// # Errors
    ///
    /// See [`Session::invoke_method`].
    pub async fn invoke_method(
        &self,
        method_name: impl Into<String>,
        arguments: Vec<String>,
    ) -> Result<String> {
        let (reply, rx) = oneshot::channel();
        let request = InvokeRequest::new(method_name, arguments);
        self.send(HostRequest::InvokeMethod { request, reply }).await?;
        rx.await?
    }

    async fn send(&self, request: HostRequest) -> Result<()> {
        self.tx.send(request).await.map_err(|_| Error::ConnectionClosed)
    }
}

// ============================================================================
// Tests
// ============================================================================
