//! Connection configuration.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnectionOptions`] | Per-connect options: URL, hub, headers, subscriptions |
//! | [`SessionConfig`] | Session-wide settings: invoke timeout, pending cap |
//! | [`Transport`] | Transport preference and [`select_transport`] |
//! | [`Credentials`] | Request decoration and [`attach_credentials`] |

// ============================================================================
// Submodules
// ============================================================================

/// Request credentials.
pub mod credentials;

/// Per-connect options.
pub mod options;

/// Session-wide settings.
pub mod session;

/// Transport preference and selection.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

pub use credentials::{Credentials, HeaderCredentials, HeaderMap, attach_credentials};
pub use options::ConnectionOptions;
pub use session::SessionConfig;
pub use transport::{ClientTransport, ForcedTransport, Transport, select_transport};
