//! Hub connection transport layer.
//!
//! The session never touches the wire directly. It drives a
//! [`HubConnection`] built by a [`HubConnector`]; the connection owns the
//! transport I/O and reports back through callbacks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Session (Rust) │      HubConnection           │  Hub endpoint   │
//! │                 │  negotiate / connect / send  │                 │
//! │  state machine  │◄────────────────────────────►│  methods        │
//! │  delivery queue │   signals + event payloads   │  pushed events  │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `HubConnector::build` - Create the connection object (no I/O)
//! 2. `set_credentials` / `set_signal_handler` / `subscribe` - Configure it
//! 3. `start` - Negotiate and handshake, returns the handle
//! 4. `invoke` - Call hub methods while connected
//! 5. `stop` - Tear down, raises `Closed`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Connection and connector contracts |
//! | `loopback` | In-process hub for tests and demos |

// ============================================================================
// Submodules
// ============================================================================

/// Connection and connector contracts.
pub mod connection;

/// In-process loopback hub.
pub mod loopback;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{
    ConnectionConfig, ConnectionSignal, HubConnection, HubConnector, LinkState, OutboundRequest,
    PayloadHandler, RequestKind, SignalHandler,
};
pub use loopback::{LoopbackConnection, LoopbackHub};
