//! Session facade.
//!
//! [`Session`] is the single entry point the host drives. It composes the
//! connection state machine, the event dispatcher and the invoker over one
//! ordered delivery queue.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::{ConnectionOptions, SessionConfig};
use crate::error::{Error, Result};
use crate::host::HostEvents;
use crate::identifiers::ConnectionHandle;
use crate::protocol::InvokeRequest;
use crate::transport::HubConnector;

use super::builder::SessionBuilder;
use super::dispatch::DeliveryQueue;
use super::invoker::Invoker;
use super::state::{ConnectionStateMachine, SessionState, Shared};

// ============================================================================
// Session
// ============================================================================

/// A client session with one hub connection at a time.
///
/// Create with [`Session::builder()`].
///
/// # Example
///
/// ```ignore
/// use hub_session::{ConnectionOptions, LoopbackHub, Session, Transport};
/// use tokio::sync::mpsc;
///
/// let (events, mut rx) = mpsc::unbounded_channel();
/// let session = Session::builder()
///     .connector(LoopbackHub::new())
///     .host(events)
///     .build()?;
///
/// let options = ConnectionOptions::new("https://example.com/signalr", "chat")
///     .with_hub_method("chatMessage")
///     .with_transport(Transport::LongPolling);
///
/// let handle = session.connect(options).await?;
/// let reply = session.invoke_method("send", vec!["hello".into()]).await?;
/// session.stop().await?;
/// ```
pub struct Session {
    /// Settings applied to every connection.
    config: SessionConfig,
    /// State shared with connection callbacks.
    shared: Arc<Shared>,
    /// Connection lifecycle.
    machine: ConnectionStateMachine,
    /// Invocation tracking.
    invoker: Invoker,
    /// Options of the last accepted `connect`.
    options: RwLock<Option<ConnectionOptions>>,
}

// ============================================================================
// Session - Constructors
// ============================================================================

impl Session {
    /// Creates a session builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Creates a session. Spawns the delivery task.
    pub(crate) fn new(
        connector: Arc<dyn HubConnector>,
        host: Arc<dyn HostEvents>,
        config: SessionConfig,
    ) -> Self {
        let shared = Arc::new(Shared::new(DeliveryQueue::spawn(host)));
        let machine = ConnectionStateMachine::new(connector, Arc::clone(&shared));
        let invoker = Invoker::new(config.invoke_timeout, config.max_pending_invocations);

        Self {
            config,
            shared,
            machine,
            invoker,
            options: RwLock::new(None),
        }
    }
}

// ============================================================================
// Session - Lifecycle
// ============================================================================

impl Session {
    /// Connects to the hub described by `options`.
    ///
    /// Credentials, transport and subscriptions are installed before the
    /// handshake. `CONNECTED` follows on the host channel.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] / [`Error::Url`] if `options` are invalid
    /// - [`Error::AlreadyConnected`] if a connection is live
    /// - [`Error::Handshake`] if the handshake fails (no status event)
    pub async fn connect(&self, options: ConnectionOptions) -> Result<ConnectionHandle> {
        let result = self.machine.start(&options).await;

        if !matches!(&result, Err(e) if e.is_config_error()) {
            *self.options.write() = Some(options);
        }

        result
    }

    /// Re-runs the handshake on the configured connection.
    ///
    /// Subscriptions and transport carry over from `connect`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if `connect` was never accepted
    /// - [`Error::AlreadyConnected`] if a handshake or recovery is running
    /// - [`Error::Handshake`] if the handshake fails
    pub async fn reconnect(&self) -> Result<ConnectionHandle> {
        self.machine.restart().await
    }

    /// Stops the connection.
    ///
    /// `DISCONNECTED` follows on the host channel. In-flight invocations are
    /// not cancelled.
    ///
    /// # Errors
    ///
    /// Returns the teardown failure, if any.
    pub async fn stop(&self) -> Result<()> {
        self.machine.stop().await
    }

    /// Returns `true` iff a connection exists and is connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.machine.is_connected()
    }
}

// ============================================================================
// Session - Invocation
// ============================================================================

impl Session {
    /// Invokes hub method `method_name` with string `arguments`.
    ///
    /// Resolves with the returned payload as text: an empty string when the
    /// hub returned nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if not connected (no network call issued)
    /// - [`Error::Invocation`] if the call fails or too many are outstanding
    /// - [`Error::InvocationTimeout`] if no result arrives in time
    pub async fn invoke_method(
        &self,
        method_name: impl Into<String>,
        arguments: Vec<String>,
    ) -> Result<String> {
        self.invoke(InvokeRequest::new(method_name, arguments)).await
    }

    /// Invokes `request`. See [`invoke_method`](Self::invoke_method).
    ///
    /// # Errors
    ///
    /// Same as [`invoke_method`](Self::invoke_method).
    pub async fn invoke(&self, request: InvokeRequest) -> Result<String> {
        let connection = self.machine.live_connection().inspect_err(|_| {
            debug!(method = %request.method_name, "Invocation rejected, not connected");
        })?;

        if request.method_name.trim().is_empty() {
            return Err(Error::invocation(
                request.method_name,
                "Method name is required",
            ));
        }

        self.invoker
            .invoke(connection.as_ref(), self.shared.queue(), request)
            .await
    }

    /// Returns the number of outstanding invocations.
    #[inline]
    #[must_use]
    pub fn pending_invocations(&self) -> usize {
        self.invoker.pending_count()
    }
}

// ============================================================================
// Session - Accessors
// ============================================================================

impl Session {
    /// Returns the primary lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    /// Returns the handle of the current connection, if assigned.
    #[inline]
    #[must_use]
    pub fn connection_handle(&self) -> Option<ConnectionHandle> {
        self.machine.handle()
    }

    /// Returns the options of the last accepted `connect`.
    #[must_use]
    pub fn options(&self) -> Option<ConnectionOptions> {
        self.options.read().clone()
    }

    /// Returns the session settings.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

// ============================================================================
// Trait Implementations
// ============================================================================

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("connection_handle", &self.connection_handle())
            .field("pending_invocations", &self.pending_invocations())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::{Value, json};
    use tokio::sync::{Notify, mpsc};
    use tokio::time::timeout;

    use crate::config::{ForcedTransport, Transport};
    use crate::host::HostEvent;
    use crate::protocol::{ConnectionStatus, InboundMessage, StatusChangeEvent};
    use crate::transport::{ConnectionSignal, LoopbackHub, RequestKind};

    type Events = mpsc::UnboundedReceiver<HostEvent>;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn session(hub: &LoopbackHub) -> (Arc<Session>, Events) {
        init_tracing();
        let (events, rx) = mpsc::unbounded_channel();
        let session = Session::builder()
            .connector(hub.clone())
            .host(events)
            .build()
            .expect("build session");
        (Arc::new(session), rx)
    }

    fn options() -> ConnectionOptions {
        ConnectionOptions::new("https://example.com/signalr", "chat")
            .with_hub_methods(["chatMessage", "ping", "tick"])
    }

    async fn next(events: &mut Events) -> HostEvent {
        timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    async fn next_status(events: &mut Events) -> StatusChangeEvent {
        match next(events).await {
            HostEvent::StatusChange(event) => event,
            other => panic!("expected status change, got {other:?}"),
        }
    }

    /// Pushes a marker event and asserts nothing else was queued before it.
    async fn expect_quiet(hub: &LoopbackHub, events: &mut Events) {
        hub.push_event("tick", json!(["marker"]));
        match next(events).await {
            HostEvent::NewMessage(message) => {
                assert_eq!(message.event_name, "tick");
                assert_eq!(message.arguments, vec!["marker"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_emits_connected_with_handle() {
        let hub = LoopbackHub::new();
        let (session, mut events) = session(&hub);

        let handle = session.connect(options()).await.expect("connect");
        assert!(!handle.as_str().is_empty());
        assert!(session.is_connected());
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.connection_handle(), Some(handle.clone()));
        assert_eq!(hub.transports(), vec![None]);

        let event = next_status(&mut events).await;
        assert_eq!(event.status, ConnectionStatus::Connected);
        assert_eq!(event.connection_handle, Some(handle));
        assert_eq!(event.error_message, None);
    }

    #[tokio::test]
    async fn test_inbound_events_are_normalized() {
        let hub = LoopbackHub::new();
        let (session, mut events) = session(&hub);
        session.connect(options()).await.expect("connect");
        next_status(&mut events).await;

        hub.push_event("chatMessage", json!(["alice", "hi"]));
        hub.push_event("ping", Value::Null);
        hub.push_event("chatMessage", json!({"from": "bob"}));
        hub.latest().expect("connection").push_raw("chatMessage", "not json");
        hub.push_event("unsubscribed", json!(["x"]));

        let expected = [
            InboundMessage::new("chatMessage", vec!["alice".into(), "hi".into()]),
            InboundMessage::new("ping", vec![]),
            InboundMessage::new("chatMessage", vec![r#"{"from":"bob"}"#.into()]),
            InboundMessage::new("chatMessage", vec!["not json".into()]),
        ];
        for message in expected {
            assert_eq!(next(&mut events).await, HostEvent::NewMessage(message));
        }
        expect_quiet(&hub, &mut events).await;
    }

    #[tokio::test]
    async fn test_invoke_while_disconnected_issues_no_call() {
        let hub = LoopbackHub::new();
        hub.respond("send", |_| async { Ok(Some(json!("ok"))) });
        let (session, _events) = session(&hub);

        let err = session.invoke_method("send", vec!["hello".into()]).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));

        session.connect(options()).await.expect("connect");
        session.stop().await.expect("stop");

        let err = session.invoke_method("send", vec!["hello".into()]).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert!(hub.requests_of(RequestKind::Send).is_empty());
    }

    #[tokio::test]
    async fn test_invoke_returns_text() {
        let hub = LoopbackHub::new();
        hub.respond("send", |args| async move {
            Ok(Some(json!(format!("echo: {}", args[0].as_str().unwrap_or_default()))))
        });
        hub.respond("stats", |_| async { Ok(Some(json!({"users": 2}))) });
        let (session, _events) = session(&hub);
        session.connect(options()).await.expect("connect");

        let reply = session.invoke_method("send", vec!["hello".into()]).await.expect("send");
        assert_eq!(reply, "echo: hello");

        let reply = session.invoke_method("stats", vec![]).await.expect("stats");
        assert_eq!(reply, r#"{"users":2}"#);

        let err = session.invoke_method("", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::Invocation { .. }));

        let err = session.invoke_method("missing", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::Invocation { ref method, .. } if method == "missing"));
    }

    #[tokio::test]
    async fn test_self_healing_drop() {
        let hub = LoopbackHub::new();
        let (session, mut events) = session(&hub);
        session.connect(options()).await.expect("connect");

        hub.drop_transport();
        assert!(!session.is_connected());
        hub.heal_transport();
        assert!(session.is_connected());

        let statuses = [
            next_status(&mut events).await.status,
            next_status(&mut events).await.status,
            next_status(&mut events).await.status,
        ];
        assert_eq!(
            statuses,
            [
                ConnectionStatus::Connected,
                ConnectionStatus::Reconnecting,
                ConnectionStatus::Connected,
            ]
        );
        expect_quiet(&hub, &mut events).await;
    }

    #[tokio::test]
    async fn test_stop_delivers_one_disconnected() {
        let hub = LoopbackHub::new();
        let (session, mut events) = session(&hub);
        let handle = session.connect(options()).await.expect("connect");
        next_status(&mut events).await;

        session.stop().await.expect("stop");
        assert!(!session.is_connected());
        assert_eq!(session.connection_handle(), None);

        // Late duplicate close from the transport.
        hub.close();

        let event = next_status(&mut events).await;
        assert_eq!(event.status, ConnectionStatus::Disconnected);
        assert_ne!(event.connection_handle, Some(handle));
        expect_quiet(&hub, &mut events).await;
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_late_recovery_after_stop_is_ignored() {
        let hub = LoopbackHub::new();
        let (session, mut events) = session(&hub);
        session.connect(options()).await.expect("connect");
        session.stop().await.expect("stop");

        let stopped = hub.latest().expect("connection");
        stopped.emit(ConnectionSignal::Reconnected);
        stopped.emit(ConnectionSignal::Connected);

        assert_eq!(next_status(&mut events).await.status, ConnectionStatus::Connected);
        assert_eq!(next_status(&mut events).await.status, ConnectionStatus::Disconnected);
        expect_quiet(&hub, &mut events).await;

        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_connected());

        session.connect(options()).await.expect("connect after stop");
        assert_eq!(next_status(&mut events).await.status, ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_event_during_handshake_is_delivered() {
        let hub = LoopbackHub::new();
        hub.push_on_handshake("chatMessage", json!(["server", "welcome"]));
        let (session, mut events) = session(&hub);

        let handle = session.connect(options()).await.expect("connect");

        assert_eq!(
            next(&mut events).await,
            HostEvent::NewMessage(InboundMessage::new(
                "chatMessage",
                vec!["server".into(), "welcome".into()]
            ))
        );
        let event = next_status(&mut events).await;
        assert_eq!(event.status, ConnectionStatus::Connected);
        assert_eq!(event.connection_handle, Some(handle));
    }

    #[tokio::test]
    async fn test_advisory_statuses() {
        let hub = LoopbackHub::new();
        let (session, mut events) = session(&hub);
        let handle = session.connect(options()).await.expect("connect");
        next_status(&mut events).await;

        hub.report_slow();
        hub.report_error("socket reset");

        let slow = next_status(&mut events).await;
        assert_eq!(slow.status, ConnectionStatus::ConnectionSlow);
        assert_eq!(slow.connection_handle, Some(handle));

        let error = next_status(&mut events).await;
        assert_eq!(error.status, ConnectionStatus::ConnectionError);
        assert_eq!(error.connection_handle, None);
        assert_eq!(error.error_message.as_deref(), Some("socket reset"));

        assert!(session.is_connected());
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_credentials_only_with_headers() {
        let hub = LoopbackHub::new();
        let (session, _events) = session(&hub);
        session
            .connect(options().with_headers(Default::default()))
            .await
            .expect("connect");

        assert!(!hub.latest().expect("connection").has_credentials());
        assert!(hub.requests().iter().all(|r| r.headers.is_empty()));

        session.stop().await.expect("stop");
        session
            .connect(options().with_header("Authorization", "Bearer t"))
            .await
            .expect("connect");

        let latest = hub.latest().expect("connection");
        assert!(latest.has_credentials());
        let connect = hub.requests_of(RequestKind::Connect);
        assert_eq!(
            connect.last().and_then(|r| r.headers.get("Authorization")).map(String::as_str),
            Some("Bearer t")
        );
    }

    #[tokio::test]
    async fn test_query_string_reaches_handshake() {
        let hub = LoopbackHub::new();
        let (session, _events) = session(&hub);
        session
            .connect(options().with_query_string("?token=abc"))
            .await
            .expect("connect");

        let negotiate = hub.requests_of(RequestKind::Negotiate);
        assert_eq!(negotiate[0].url.query(), Some("token=abc"));
        assert_eq!(negotiate[0].url.path(), "/signalr/negotiate");
    }

    #[tokio::test]
    async fn test_concurrent_invokes_resolve_independently() {
        let hub = LoopbackHub::new();
        let gate = Arc::new(Notify::new());
        let wait = Arc::clone(&gate);
        hub.respond("slow", move |_| {
            let wait = Arc::clone(&wait);
            async move {
                wait.notified().await;
                Ok(Some(json!("slow done")))
            }
        });
        hub.respond("fast", |_| async { Ok(Some(json!("fast done"))) });
        let (session, _events) = session(&hub);
        session.connect(options()).await.expect("connect");

        let slow = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.invoke_method("slow", vec![]).await })
        };
        while session.pending_invocations() == 0 {
            tokio::task::yield_now().await;
        }

        let fast = session.invoke_method("fast", vec![]).await.expect("fast");
        assert_eq!(fast, "fast done");
        assert!(!slow.is_finished());

        gate.notify_one();
        assert_eq!(slow.await.expect("join").expect("slow"), "slow done");
    }

    #[tokio::test]
    async fn test_stale_connection_is_ignored() {
        let hub = LoopbackHub::new();
        let (session, mut events) = session(&hub);

        let first = session.connect(options()).await.expect("first connect");
        hub.close();
        let second = session.connect(options()).await.expect("second connect");
        assert_ne!(first, second);
        assert_eq!(hub.connection_count(), 2);

        assert_eq!(next_status(&mut events).await.status, ConnectionStatus::Connected);
        assert_eq!(next_status(&mut events).await.status, ConnectionStatus::Disconnected);
        let event = next_status(&mut events).await;
        assert_eq!(event.status, ConnectionStatus::Connected);
        assert_eq!(event.connection_handle, Some(second));

        let stale = hub.connection(0).expect("first connection");
        stale.push_event("chatMessage", json!(["late"]));
        stale.close();
        assert!(session.is_connected());

        expect_quiet(&hub, &mut events).await;
    }

    #[tokio::test]
    async fn test_connect_while_live_fails() {
        let hub = LoopbackHub::new();
        let (session, _events) = session(&hub);
        session.connect(options()).await.expect("connect");

        let err = session.connect(options()).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyConnected));
        assert_eq!(hub.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_options() {
        let hub = LoopbackHub::new();
        let (session, _events) = session(&hub);

        let err = session
            .connect(ConnectionOptions::new("ftp://example.com", "chat"))
            .await
            .unwrap_err();
        assert!(err.is_config_error());

        let err = session
            .connect(ConnectionOptions::new("https://example.com", " "))
            .await
            .unwrap_err();
        assert!(err.is_config_error());

        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.options().is_none());
        assert_eq!(hub.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_handshake_failure_emits_no_status() {
        let hub = LoopbackHub::new();
        hub.fail_next_handshake("negotiate returned 503");
        let (session, mut events) = session(&hub);

        let err = session.connect(options()).await.unwrap_err();
        assert!(matches!(err, Error::Handshake { .. }));
        assert_eq!(session.state(), SessionState::ConnectionError);
        assert!(!session.is_connected());

        expect_quiet(&hub, &mut events).await;

        let handle = session.reconnect().await.expect("reconnect");
        let event = next_status(&mut events).await;
        assert_eq!(event.status, ConnectionStatus::Connected);
        assert_eq!(event.connection_handle, Some(handle));
    }

    #[tokio::test]
    async fn test_reconnect_preserves_subscriptions_and_transport() {
        let hub = LoopbackHub::new();
        let (session, mut events) = session(&hub);

        let first = session
            .connect(options().with_transport(Transport::LongPolling))
            .await
            .expect("connect");
        session.stop().await.expect("stop");
        let second = session.reconnect().await.expect("reconnect");

        assert_ne!(first, second);
        assert_eq!(hub.connection_count(), 1);
        assert_eq!(
            hub.transports(),
            vec![Some(ForcedTransport::LongPolling), Some(ForcedTransport::LongPolling)]
        );
        assert_eq!(hub.latest().expect("connection").handler_count("chatMessage"), 1);

        let statuses = [
            next_status(&mut events).await.status,
            next_status(&mut events).await.status,
            next_status(&mut events).await.status,
        ];
        assert_eq!(
            statuses,
            [
                ConnectionStatus::Connected,
                ConnectionStatus::Disconnected,
                ConnectionStatus::Connected,
            ]
        );

        hub.push_event("chatMessage", json!(["again"]));
        assert_eq!(
            next(&mut events).await,
            HostEvent::NewMessage(InboundMessage::new("chatMessage", vec!["again".into()]))
        );
    }

    #[tokio::test]
    async fn test_reconnect_edge_cases() {
        let hub = LoopbackHub::new();
        let (session, _events) = session(&hub);

        let err = session.reconnect().await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));

        let handle = session.connect(options()).await.expect("connect");
        assert_eq!(session.reconnect().await.expect("reconnect"), handle);
        assert_eq!(hub.requests_of(RequestKind::Connect).len(), 1);

        hub.drop_transport();
        let err = session.reconnect().await.unwrap_err();
        assert!(matches!(err, Error::AlreadyConnected));
    }

    #[tokio::test]
    async fn test_stop_without_connection() {
        let hub = LoopbackHub::new();
        let (session, _events) = session(&hub);
        session.stop().await.expect("stop is a no-op");
        assert!(!session.is_connected());
    }
}
