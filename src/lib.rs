//! Hub Session - Persistent real-time hub client.
//!
//! This library keeps a long-lived connection to a remote hub endpoint,
//! tracks its health, dispatches server-pushed events to the host and
//! issues hub method invocations with asynchronous results.
//!
//! # Architecture
//!
//! The client sits between a host application and a hub connection:
//!
//! - **Host**: Drives the session through requests, receives status changes
//!   and hub events on one ordered channel
//! - **Connection**: Owns transport I/O, reports lifecycle signals and event
//!   payloads through callbacks
//!
//! Key design principles:
//!
//! - Each [`Session`] owns at most one connection at a time
//! - Every callback is re-marshaled onto a single ordered delivery task
//! - Each started connection has a generation; late callbacks from a
//!   superseded one are dropped
//! - Payload normalization is total: it never fails
//!
//! # Quick Start
//!
//! ```ignore
//! use hub_session::{ConnectionOptions, HostEvent, LoopbackHub, Result, Session};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (events, mut rx) = mpsc::unbounded_channel();
//!     let session = Session::builder()
//!         .connector(LoopbackHub::new())
//!         .host(events)
//!         .build()?;
//!
//!     let options = ConnectionOptions::new("https://example.com/signalr", "chat")
//!         .with_hub_method("chatMessage");
//!     let handle = session.connect(options).await?;
//!     println!("Connected as {handle}");
//!
//!     while let Some(event) = rx.recv().await {
//!         if let HostEvent::NewMessage(message) = event {
//!             println!("{}: {:?}", message.event_name, message.arguments);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Connection options, transports, credentials, settings |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`host`] | Host bridge: requests in, events out |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Status, message and payload types |
//! | [`session`] | [`Session`] facade and state machine |
//! | [`transport`] | Connection seam and loopback hub |

// ============================================================================
// Modules
// ============================================================================

/// Connection options and session settings.
///
/// Transport selection and request credentials live here too.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Host application bridge.
pub mod host;

/// Type-safe identifiers for session entities.
pub mod identifiers;

/// Status, message and payload types.
pub mod protocol;

/// Session facade and connection state machine.
///
/// Use [`Session::builder()`] to create a configured session.
pub mod session;

/// Hub connection seam.
///
/// Defines the connection contract and the in-process loopback hub.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration types
pub use config::{ConnectionOptions, Credentials, HeaderCredentials, SessionConfig, Transport};

// Error types
pub use error::{Error, Result};

// Host types
pub use host::{HostBridge, HostClient, HostEvent, HostEvents, HostRequest, ResultSink};

// Identifier types
pub use identifiers::{ConnectionHandle, Generation, InvocationId};

// Protocol types
pub use protocol::{ConnectionStatus, InboundMessage, InvokeRequest, StatusChangeEvent};

// Session types
pub use session::{Session, SessionBuilder, SessionState};

// Transport types
pub use transport::{HubConnection, HubConnector, LoopbackHub};
