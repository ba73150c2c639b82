//! Connection state machine.
//!
//! Owns the live [`HubConnection`] and tracks its lifecycle:
//!
//! ```text
//! Idle ──► Connecting ──► Connected ◄──► Reconnecting
//!              │              │               │
//!              ▼              └──────┬────────┘
//!       ConnectionError              ▼
//!                               Disconnected
//! ```
//!
//! `CONNECTION_SLOW` and `CONNECTION_ERROR` are advisory and never move the
//! primary state.
//!
//! Every `start` builds a new connection object under a new [`Generation`].
//! Callbacks carry the generation they were registered under, so late
//! callbacks from a superseded connection are recognized and dropped.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, info_span, warn};

use crate::config::{ClientTransport, ConnectionOptions, attach_credentials, select_transport};
use crate::error::{Error, Result};
use crate::identifiers::{ConnectionHandle, Generation};
use crate::protocol::{ConnectionStatus, InboundMessage, StatusChangeEvent};
use crate::transport::{
    ConnectionConfig, ConnectionSignal, HubConnection, HubConnector, LinkState, SignalHandler,
};

use super::dispatch::{self, Delivery, DeliveryQueue};

// ============================================================================
// SessionState
// ============================================================================

/// Primary lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No connection attempt yet.
    #[default]
    Idle,
    /// Handshake in progress.
    Connecting,
    /// Connected.
    Connected,
    /// Transport dropped, recovering on its own.
    Reconnecting,
    /// Connection closed.
    Disconnected,
    /// Last handshake failed.
    ConnectionError,
}

impl SessionState {
    /// Returns `true` while a connection is being established or is up.
    #[inline]
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Reconnecting)
    }
}

// ============================================================================
// Transitions
// ============================================================================

/// Applies `signal` to `current`.
///
/// Returns the next state and the status to report, if any. Handshake-time
/// errors and closes are not reported: the caller of `start` gets them.
/// `Connected` is only accepted while connecting and `Reconnected` only while
/// reconnecting, so a late recovery after a close cannot revive the session.
fn transition(
    current: SessionState,
    signal: &ConnectionSignal,
) -> (SessionState, Option<ConnectionStatus>) {
    use SessionState as S;

    match signal {
        ConnectionSignal::Connected => match current {
            S::Connecting => (S::Connected, Some(ConnectionStatus::Connected)),
            other => (other, None),
        },

        ConnectionSignal::Reconnected => match current {
            S::Reconnecting => (S::Connected, Some(ConnectionStatus::Connected)),
            other => (other, None),
        },

        ConnectionSignal::Reconnecting => match current {
            S::Connected => (S::Reconnecting, Some(ConnectionStatus::Reconnecting)),
            other => (other, None),
        },

        ConnectionSignal::Closed => match current {
            S::Connected | S::Reconnecting => (S::Disconnected, Some(ConnectionStatus::Disconnected)),
            other => (other, None),
        },

        ConnectionSignal::Slow => match current {
            S::Connected | S::Reconnecting => (current, Some(ConnectionStatus::ConnectionSlow)),
            other => (other, None),
        },

        ConnectionSignal::Error(_) => match current {
            S::Connected | S::Reconnecting => (current, Some(ConnectionStatus::ConnectionError)),
            other => (other, None),
        },
    }
}

// ============================================================================
// Shared
// ============================================================================

/// State shared with connection callbacks.
///
/// Callbacks hold it weakly; it lives as long as the session.
pub(crate) struct Shared {
    /// Primary lifecycle state.
    state: Mutex<SessionState>,
    /// Generation of the current connection object.
    generation: AtomicU64,
    /// Ordered delivery context.
    queue: DeliveryQueue,
}

impl Shared {
    /// Creates shared state around `queue`.
    pub(crate) fn new(queue: DeliveryQueue) -> Self {
        Self {
            state: Mutex::new(SessionState::Idle),
            generation: AtomicU64::new(Generation::INITIAL.as_u64()),
            queue,
        }
    }

    /// Returns `true` if `generation` is the current one.
    #[inline]
    fn is_current(&self, generation: Generation) -> bool {
        self.generation.load(Ordering::Acquire) == generation.as_u64()
    }

    /// Returns the primary state.
    #[inline]
    pub(crate) fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Returns the ordered delivery context.
    #[inline]
    pub(crate) fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }

    /// Posts a normalized hub event from connection `generation`.
    pub(crate) fn deliver_message(&self, generation: Generation, message: InboundMessage) {
        if !self.is_current(generation) {
            debug!(%generation, event = %message.event_name, "Dropping event from superseded connection");
            return;
        }

        if self.queue.post(Delivery::Message(message)).is_err() {
            debug!("Delivery queue closed, dropping hub event");
        }
    }

    /// Applies a lifecycle signal from connection `generation`.
    fn handle_signal(
        &self,
        generation: Generation,
        signal: ConnectionSignal,
        handle: Option<ConnectionHandle>,
    ) {
        let mut state = self.state.lock();

        if !self.is_current(generation) {
            debug!(%generation, ?signal, "Dropping signal from superseded connection");
            return;
        }

        let previous = *state;
        let (next, status) = transition(previous, &signal);
        *state = next;

        let Some(status) = status else {
            debug!(?signal, ?previous, "Signal not reported");
            return;
        };

        let event = match signal {
            ConnectionSignal::Error(message) => {
                warn!(error = %message, "Hub transport error");
                StatusChangeEvent::error(message)
            }
            _ => StatusChangeEvent::new(status, handle),
        };

        debug!(?previous, ?next, ?status, "Connection status changed");

        // Posted under the state lock so status order matches transition order.
        if self.queue.post(Delivery::Status(event)).is_err() {
            debug!("Delivery queue closed, dropping status change");
        }
    }

    /// Opens a new connection attempt and returns its generation.
    fn begin_attempt(&self) -> Result<Generation> {
        let mut state = self.state.lock();
        if state.is_live() {
            return Err(Error::AlreadyConnected);
        }

        *state = SessionState::Connecting;
        let raw = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        Ok(Generation::from_raw(raw))
    }

    /// Marks the attempt of `generation` as failed.
    fn fail_attempt(&self, generation: Generation) {
        let mut state = self.state.lock();
        if self.is_current(generation) && *state == SessionState::Connecting {
            *state = SessionState::ConnectionError;
        }
    }
}

// ============================================================================
// ActiveConnection
// ============================================================================

/// The connection object a session currently owns.
#[derive(Clone)]
struct ActiveConnection {
    /// The connection.
    connection: Arc<dyn HubConnection>,
    /// Transport chosen at `start`, reused by `restart`.
    transport: Option<ClientTransport>,
    /// Generation the connection was built under.
    generation: Generation,
    /// Hub name, for logging.
    hub_name: String,
}

// ============================================================================
// ConnectionStateMachine
// ============================================================================

/// Drives one connection at a time through its lifecycle.
pub(crate) struct ConnectionStateMachine {
    /// State shared with callbacks.
    shared: Arc<Shared>,
    /// Builds connection objects.
    connector: Arc<dyn HubConnector>,
    /// Current connection object, if one was built.
    active: RwLock<Option<ActiveConnection>>,
}

impl ConnectionStateMachine {
    /// Creates an idle state machine.
    pub(crate) fn new(connector: Arc<dyn HubConnector>, shared: Arc<Shared>) -> Self {
        Self {
            shared,
            connector,
            active: RwLock::new(None),
        }
    }

    /// Builds, configures and starts a new connection.
    ///
    /// Credentials, transport and event handlers are all installed before the
    /// handshake is issued.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] / [`Error::Url`] if `options` are invalid
    /// - [`Error::AlreadyConnected`] if a connection is live
    /// - [`Error::Handshake`] if the handshake fails
    pub(crate) async fn start(&self, options: &ConnectionOptions) -> Result<ConnectionHandle> {
        let url = options.handshake_url()?;
        let subscriptions = options.subscriptions();
        let generation = self.shared.begin_attempt()?;

        let span = info_span!(
            "hub_connection",
            hub = %options.hub_name,
            generation = generation.as_u64()
        );
        let config = ConnectionConfig {
            url: url.clone(),
            hub_name: options.hub_name.clone(),
            span: span.clone(),
        };

        let connection = match self.connector.build(config) {
            Ok(connection) => connection,
            Err(e) => {
                *self.active.write() = None;
                self.shared.fail_attempt(generation);
                return Err(e);
            }
        };

        connection.set_credentials(attach_credentials(options.headers.as_ref()));
        let transport = select_transport(options.transport, &span);
        connection.set_signal_handler(signal_handler(
            Arc::downgrade(&self.shared),
            Arc::downgrade(&connection),
            generation,
        ));
        dispatch::bind_events(
            connection.as_ref(),
            &subscriptions,
            &Arc::downgrade(&self.shared),
            generation,
        );

        *self.active.write() = Some(ActiveConnection {
            connection: Arc::clone(&connection),
            transport: transport.clone(),
            generation,
            hub_name: options.hub_name.clone(),
        });

        info!(
            hub = %options.hub_name,
            url = %url,
            transport = %options.transport,
            subscriptions = subscriptions.len(),
            %generation,
            "Starting hub connection"
        );

        self.handshake(connection.as_ref(), transport, generation).await
    }

    /// Re-issues the handshake on the configured connection.
    ///
    /// Subscriptions stay bound; the transport chosen at `start` is reused.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if no connection was ever configured
    /// - [`Error::AlreadyConnected`] if a handshake or recovery is in progress
    /// - [`Error::Handshake`] if the handshake fails
    pub(crate) async fn restart(&self) -> Result<ConnectionHandle> {
        let active = self.active.read().clone().ok_or(Error::NotConnected)?;

        {
            let mut state = self.shared.state.lock();
            match *state {
                SessionState::Connected => {
                    if let Some(handle) = active.connection.connection_id() {
                        debug!(%handle, "Restart requested while connected");
                        return Ok(handle);
                    }
                }
                SessionState::Connecting | SessionState::Reconnecting => {
                    return Err(Error::AlreadyConnected);
                }
                _ => {}
            }
            *state = SessionState::Connecting;
        }

        info!(hub = %active.hub_name, generation = %active.generation, "Restarting hub connection");

        self.handshake(
            active.connection.as_ref(),
            active.transport.clone(),
            active.generation,
        )
        .await
    }

    /// Tears down the connection.
    ///
    /// `DISCONNECTED` is reported later, by the connection's close callback.
    ///
    /// # Errors
    ///
    /// Returns the teardown error, if any. The teardown is attempted anyway.
    pub(crate) async fn stop(&self) -> Result<()> {
        let Some(active) = self.active.read().clone() else {
            debug!("Stop requested with no connection");
            return Ok(());
        };

        info!(hub = %active.hub_name, generation = %active.generation, "Stopping hub connection");

        active.connection.stop().await.inspect_err(|e| {
            warn!(error = %e, hub = %active.hub_name, "Hub connection teardown failed");
        })
    }

    /// Returns `true` iff a connection exists and its last known state is
    /// exactly connected.
    #[must_use]
    pub(crate) fn is_connected(&self) -> bool {
        self.active
            .read()
            .as_ref()
            .is_some_and(|a| a.connection.state() == LinkState::Connected)
    }

    /// Returns the connection if it is connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] otherwise.
    pub(crate) fn live_connection(&self) -> Result<Arc<dyn HubConnection>> {
        self.active
            .read()
            .as_ref()
            .filter(|a| a.connection.state() == LinkState::Connected)
            .map(|a| Arc::clone(&a.connection))
            .ok_or(Error::NotConnected)
    }

    /// Returns the primary state.
    #[inline]
    #[must_use]
    pub(crate) fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Returns the handle of the current connection, if assigned.
    #[must_use]
    pub(crate) fn handle(&self) -> Option<ConnectionHandle> {
        self.active
            .read()
            .as_ref()
            .and_then(|a| a.connection.connection_id())
    }

    /// Runs the handshake and settles the attempt.
    async fn handshake(
        &self,
        connection: &dyn HubConnection,
        transport: Option<ClientTransport>,
        generation: Generation,
    ) -> Result<ConnectionHandle> {
        match connection.start(transport).await {
            Ok(handle) => {
                info!(%handle, %generation, "Hub connection started");
                Ok(handle)
            }
            Err(e) => {
                self.shared.fail_attempt(generation);
                warn!(error = %e, %generation, "Hub handshake failed");
                Err(match e {
                    Error::Handshake { .. } => e,
                    other => Error::handshake(other.to_string()),
                })
            }
        }
    }
}

// ============================================================================
// Signal Handler
// ============================================================================

/// Builds the lifecycle callback for a connection of `generation`.
fn signal_handler(
    shared: Weak<Shared>,
    connection: Weak<dyn HubConnection>,
    generation: Generation,
) -> SignalHandler {
    Arc::new(move |signal: ConnectionSignal| {
        let Some(shared) = shared.upgrade() else {
            return;
        };

        let handle = connection.upgrade().and_then(|c| c.connection_id());
        shared.handle_signal(generation, signal, handle);
    })
}

// ============================================================================
// Tests
// ============================================================================
