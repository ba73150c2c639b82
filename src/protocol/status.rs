//! Connection status notifications.
//!
//! Status changes are pushed to the host, never polled.
//!
//! # Format
//!
//! ```json
//! {
//!   "connectionId": "c0ffee",
//!   "status": "CONNECTED",
//!   "errorMessage": null
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::ConnectionHandle;

// ============================================================================
// ConnectionStatus
// ============================================================================

/// Status reported to the host.
///
/// `ConnectionSlow` and `ConnectionError` are advisory: they are raised on
/// top of the lifecycle states and do not replace them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    /// Handshake completed or transport recovered.
    Connected,
    /// Transport dropped, automatic recovery in progress.
    Reconnecting,
    /// Connection closed.
    Disconnected,
    /// Transport is lagging.
    ConnectionSlow,
    /// Transport reported an error.
    ConnectionError,
}

impl ConnectionStatus {
    /// Returns `true` for the advisory statuses.
    #[inline]
    #[must_use]
    pub const fn is_advisory(self) -> bool {
        matches!(self, Self::ConnectionSlow | Self::ConnectionError)
    }
}

// ============================================================================
// StatusChangeEvent
// ============================================================================

/// A status change pushed to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeEvent {
    /// Handle of the connection, if one was assigned.
    #[serde(rename = "connectionId")]
    pub connection_handle: Option<ConnectionHandle>,

    /// The new status.
    pub status: ConnectionStatus,

    /// Error description, only for [`ConnectionStatus::ConnectionError`].
    pub error_message: Option<String>,
}

impl StatusChangeEvent {
    /// Creates a lifecycle status event.
    #[inline]
    #[must_use]
    pub fn new(status: ConnectionStatus, connection_handle: Option<ConnectionHandle>) -> Self {
        Self {
            connection_handle,
            status,
            error_message: None,
        }
    }

    /// Creates a `CONNECTION_ERROR` event.
    ///
    /// Carries no handle since the error may predate the handshake.
    #[inline]
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            connection_handle: None,
            status: ConnectionStatus::ConnectionError,
            error_message: Some(message.into()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
