//! In-process loopback hub.
//!
//! [`LoopbackHub`] is a [`HubConnector`] whose connections never leave the
//! process. It plays the hub side for host integration tests and demos:
//!
//! - records every outbound request, credentials applied
//! - assigns a fresh UUID handle on every handshake
//! - pushes hub events, JSON or raw text
//! - simulates transport drop, recovery, lag, errors and server close
//! - fails the next handshake on demand
//! - pushes queued events mid-handshake, before the connection reports itself
//!   connected
//! - answers invocations through registered async responders
//!
//! # Example
//!
//! ```ignore
//! use hub_session::transport::LoopbackHub;
//! use serde_json::json;
//!
//! let hub = LoopbackHub::new();
//! hub.respond("send", |args| async move { Ok(Some(json!(format!("echo {}", args.len())))) });
//!
//! // ... connect a session with `hub.clone()` as its connector ...
//!
//! hub.push_event("chatMessage", json!(["alice", "hi"]));
//! hub.drop_transport();
//! hub.heal_transport();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::config::{ClientTransport, Credentials, ForcedTransport};
use crate::error::{Error, Result};
use crate::identifiers::ConnectionHandle;
use crate::protocol::EventPayload;

use super::connection::{
    ConnectionConfig, ConnectionSignal, HubConnection, HubConnector, LinkState, OutboundRequest,
    PayloadHandler, RequestKind, SignalHandler,
};

// ============================================================================
// Types
// ============================================================================

/// Async invocation responder.
pub type Responder = Arc<
    dyn Fn(Vec<Value>) -> BoxFuture<'static, std::result::Result<Option<Value>, String>>
        + Send
        + Sync,
>;

/// Hub-side shared state.
#[derive(Default)]
struct HubInner {
    /// Every request issued by any connection, in order.
    requests: Mutex<Vec<OutboundRequest>>,
    /// Connections built so far, oldest first.
    connections: Mutex<Vec<Arc<LoopbackConnection>>>,
    /// Invocation responders by method name.
    responders: RwLock<FxHashMap<String, Responder>>,
    /// Failure message for the next handshake.
    handshake_failure: Mutex<Option<String>>,
    /// Transport forced on each successful handshake.
    transports: Mutex<Vec<Option<ForcedTransport>>>,
    /// Events pushed during the next successful handshake.
    handshake_events: Mutex<Vec<(String, EventPayload)>>,
}

// ============================================================================
// LoopbackHub
// ============================================================================

/// In-process hub and connector.
///
/// Cloning shares the same hub.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    inner: Arc<HubInner>,
}

impl LoopbackHub {
    /// Creates an empty hub.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an async responder for hub method `method`.
    ///
    /// Returning `Err(message)` fails the invocation with `message`.
    pub fn respond<F, Fut>(&self, method: impl Into<String>, responder: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Option<Value>, String>> + Send + 'static,
    {
        let responder: Responder = Arc::new(move |args| responder(args).boxed());
        self.inner.responders.write().insert(method.into(), responder);
    }

    /// Fails the next handshake with `message`.
    pub fn fail_next_handshake(&self, message: impl Into<String>) {
        *self.inner.handshake_failure.lock() = Some(message.into());
    }

    /// Queues hub event `event` for the next successful handshake.
    ///
    /// It is pushed once the handle is assigned and before `Connected` is
    /// raised, as a hub does when it sends right after accepting a
    /// connection.
    pub fn push_on_handshake(&self, event: impl Into<String>, payload: impl Into<EventPayload>) {
        self.inner
            .handshake_events
            .lock()
            .push((event.into(), payload.into()));
    }

    /// Returns every request issued so far.
    #[must_use]
    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.inner.requests.lock().clone()
    }

    /// Returns the requests of `kind` issued so far.
    #[must_use]
    pub fn requests_of(&self, kind: RequestKind) -> Vec<OutboundRequest> {
        self.inner
            .requests
            .lock()
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    /// Returns the transport forced on each successful handshake.
    #[must_use]
    pub fn transports(&self) -> Vec<Option<ForcedTransport>> {
        self.inner.transports.lock().clone()
    }

    /// Returns the number of connections built.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.connections.lock().len()
    }

    /// Returns the connection built `index`-th, oldest first.
    #[must_use]
    pub fn connection(&self, index: usize) -> Option<Arc<LoopbackConnection>> {
        self.inner.connections.lock().get(index).cloned()
    }

    /// Returns the most recently built connection.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<LoopbackConnection>> {
        self.inner.connections.lock().last().cloned()
    }

    /// Pushes hub event `event` on the latest connection.
    pub fn push_event(&self, event: &str, payload: impl Into<EventPayload>) {
        if let Some(connection) = self.latest() {
            connection.push_event(event, payload);
        }
    }

    /// Drops the transport of the latest connection.
    pub fn drop_transport(&self) {
        if let Some(connection) = self.latest() {
            connection.drop_transport();
        }
    }

    /// Recovers the transport of the latest connection.
    pub fn heal_transport(&self) {
        if let Some(connection) = self.latest() {
            connection.heal_transport();
        }
    }

    /// Reports lag on the latest connection.
    pub fn report_slow(&self) {
        if let Some(connection) = self.latest() {
            connection.report_slow();
        }
    }

    /// Reports a transport error on the latest connection.
    pub fn report_error(&self, message: impl Into<String>) {
        if let Some(connection) = self.latest() {
            connection.report_error(message);
        }
    }

    /// Closes the latest connection from the hub side.
    pub fn close(&self) {
        if let Some(connection) = self.latest() {
            connection.close();
        }
    }
}

impl HubConnector for LoopbackHub {
    fn build(&self, config: ConnectionConfig) -> Result<Arc<dyn HubConnection>> {
        let connection = Arc::new(LoopbackConnection::new(Arc::downgrade(&self.inner), config));
        self.inner.connections.lock().push(Arc::clone(&connection));
        Ok(connection)
    }
}

// ============================================================================
// LoopbackConnection
// ============================================================================

/// A connection to a [`LoopbackHub`].
///
/// Besides the [`HubConnection`] contract, it exposes the hub-side controls
/// for its own transport.
pub struct LoopbackConnection {
    /// Owning hub.
    hub: Weak<HubInner>,
    /// Build input.
    config: ConnectionConfig,
    /// Installed credentials.
    credentials: RwLock<Option<Arc<dyn Credentials>>>,
    /// Installed lifecycle callback.
    signal_handler: RwLock<Option<SignalHandler>>,
    /// Event callbacks by event name.
    subscriptions: RwLock<FxHashMap<String, Vec<PayloadHandler>>>,
    /// Last known state.
    state: Mutex<LinkState>,
    /// Handle assigned on the last handshake.
    handle: Mutex<Option<ConnectionHandle>>,
}

impl LoopbackConnection {
    /// Creates a disconnected connection.
    fn new(hub: Weak<HubInner>, config: ConnectionConfig) -> Self {
        Self {
            hub,
            config,
            credentials: RwLock::new(None),
            signal_handler: RwLock::new(None),
            subscriptions: RwLock::new(FxHashMap::default()),
            state: Mutex::new(LinkState::Disconnected),
            handle: Mutex::new(None),
        }
    }

    /// Returns the build input.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Returns the subscribed event names, sorted.
    #[must_use]
    pub fn subscribed_events(&self) -> Vec<String> {
        let mut events: Vec<_> = self.subscriptions.read().keys().cloned().collect();
        events.sort();
        events
    }

    /// Returns the number of handlers bound to `event`.
    #[must_use]
    pub fn handler_count(&self, event: &str) -> usize {
        self.subscriptions.read().get(event).map_or(0, Vec::len)
    }

    /// Returns `true` if credentials are installed.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.credentials.read().is_some()
    }

    /// Pushes hub event `event` to its handlers.
    pub fn push_event(&self, event: &str, payload: impl Into<EventPayload>) {
        let handlers = self
            .subscriptions
            .read()
            .get(event)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!(event, "Loopback event has no subscribers");
            return;
        }

        let payload = payload.into();
        for handler in handlers {
            handler(payload.clone());
        }
    }

    /// Pushes hub event `event` with raw, undecoded payload text.
    pub fn push_raw(&self, event: &str, text: impl Into<String>) {
        self.push_event(event, EventPayload::Text(text.into()));
    }

    /// Drops the transport: `Reconnecting`.
    pub fn drop_transport(&self) {
        *self.state.lock() = LinkState::Reconnecting;
        self.emit(ConnectionSignal::Reconnecting);
    }

    /// Recovers the transport: `Reconnected`.
    pub fn heal_transport(&self) {
        *self.state.lock() = LinkState::Connected;
        self.emit(ConnectionSignal::Reconnected);
    }

    /// Reports lag: `Slow`.
    pub fn report_slow(&self) {
        self.emit(ConnectionSignal::Slow);
    }

    /// Reports a transport error.
    pub fn report_error(&self, message: impl Into<String>) {
        self.emit(ConnectionSignal::Error(message.into()));
    }

    /// Closes from the hub side: `Closed`, even if already closed.
    pub fn close(&self) {
        *self.state.lock() = LinkState::Disconnected;
        *self.handle.lock() = None;
        self.emit(ConnectionSignal::Closed);
    }

    /// Raises `signal` on the lifecycle callback.
    pub fn emit(&self, signal: ConnectionSignal) {
        let handler = self.signal_handler.read().clone();
        if let Some(handler) = handler {
            handler(signal);
        }
    }

    /// Records a request, credentials applied.
    fn record(&self, kind: RequestKind, endpoint: &str) {
        let mut url: Url = self.config.url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(endpoint);
        }

        let mut request = OutboundRequest::new(kind, url);
        if let Some(credentials) = self.credentials.read().as_ref() {
            credentials.prepare_request(&mut request);
        }

        if let Some(hub) = self.hub.upgrade() {
            hub.requests.lock().push(request);
        }
    }
}

#[async_trait]
impl HubConnection for LoopbackConnection {
    fn set_credentials(&self, credentials: Option<Arc<dyn Credentials>>) {
        *self.credentials.write() = credentials;
    }

    fn set_signal_handler(&self, handler: SignalHandler) {
        *self.signal_handler.write() = Some(handler);
    }

    fn subscribe(&self, event: &str, handler: PayloadHandler) {
        self.subscriptions
            .write()
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    async fn start(&self, transport: Option<ClientTransport>) -> Result<ConnectionHandle> {
        if let Some(handle) = self.connection_id()
            && self.state() == LinkState::Connected
        {
            return Ok(handle);
        }

        *self.state.lock() = LinkState::Connecting;
        self.record(RequestKind::Negotiate, "negotiate");

        let hub = self.hub.upgrade().ok_or_else(|| Error::handshake("hub is gone"))?;

        let failure = hub.handshake_failure.lock().take();
        if let Some(message) = failure {
            *self.state.lock() = LinkState::Disconnected;
            self.emit(ConnectionSignal::Error(message.clone()));
            return Err(Error::handshake(message));
        }

        let forced = transport.as_ref().map(ClientTransport::kind);
        self.record(RequestKind::Connect, "connect");
        hub.transports.lock().push(forced);

        let handle = ConnectionHandle::new(Uuid::new_v4().to_string())
            .ok_or_else(|| Error::handshake("hub returned an empty connection id"))?;

        self.config.span.in_scope(|| {
            debug!(
                handle = %handle,
                transport = forced.map_or("negotiated", ForcedTransport::wire_name),
                "Loopback handshake completed"
            );
        });

        *self.handle.lock() = Some(handle.clone());

        let early = std::mem::take(&mut *hub.handshake_events.lock());
        for (event, payload) in early {
            self.push_event(&event, payload);
        }

        *self.state.lock() = LinkState::Connected;
        self.emit(ConnectionSignal::Connected);

        Ok(handle)
    }

    async fn stop(&self) -> Result<()> {
        if self.state() == LinkState::Disconnected {
            return Ok(());
        }

        self.record(RequestKind::Abort, "abort");
        self.close();
        Ok(())
    }

    fn state(&self) -> LinkState {
        *self.state.lock()
    }

    fn connection_id(&self) -> Option<ConnectionHandle> {
        self.handle.lock().clone()
    }

    async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Option<Value>> {
        if self.state() != LinkState::Connected {
            return Err(Error::transport("loopback transport is not connected"));
        }

        self.record(RequestKind::Send, "send");

        let responder = self
            .hub
            .upgrade()
            .and_then(|hub| hub.responders.read().get(method).cloned());

        match responder {
            Some(responder) => responder(args)
                .await
                .map_err(|message| Error::invocation(method, message)),
            None => Err(Error::invocation(
                method,
                format!("'{method}' method could not be resolved"),
            )),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
