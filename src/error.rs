//! Error types for the hub session client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use hub_session::{Result, Session};
//!
//! async fn example(session: &Session) -> Result<()> {
//!     let reply = session.invoke_method("send", vec!["hello".into()]).await?;
//!     println!("hub replied: {reply}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants | Surfaced |
//! |----------|----------|----------|
//! | Configuration | [`Error::Config`], [`Error::AlreadyConnected`] | Synchronously from `connect` |
//! | Handshake | [`Error::Handshake`] | To the caller of `start` / `restart` only |
//! | Transport | [`Error::Transport`], [`Error::ConnectionClosed`] | As `CONNECTION_ERROR` status events |
//! | Invocation | [`Error::Invocation`], [`Error::InvocationTimeout`] | To that call's result sink only |
//! | Availability | [`Error::NotConnected`] | Synchronously, no network call issued |
//! | External | [`Error::Json`], [`Error::Url`], [`Error::ChannelClosed`] | Wherever they occur |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when connection options are invalid or incomplete.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// A live connection already exists for this session.
    ///
    /// Returned by `connect` while the current connection is connecting,
    /// connected or reconnecting.
    #[error("Session already has a live connection")]
    AlreadyConnected,

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Handshake with the hub failed.
    ///
    /// Returned from `start` / `restart`; never broadcast as a status event.
    #[error("Handshake failed: {message}")]
    Handshake {
        /// Description of the handshake failure.
        message: String,
    },

    /// Post-handshake transport failure.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// No live connection is available.
    ///
    /// Returned when an operation that needs a connection runs while none is
    /// connected. No network call is attempted.
    #[error("Not connected")]
    NotConnected,

    /// Connection closed while an operation was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Invocation Errors
    // ========================================================================
    /// A hub method invocation failed.
    #[error("Invocation of '{method}' failed: {message}")]
    Invocation {
        /// The hub method that was invoked.
        method: String,
        /// Failure description reported by the hub or the transport.
        message: String,
    },

    /// A hub method invocation did not complete in time.
    #[error("Invocation of '{method}' timed out after {timeout_ms}ms")]
    InvocationTimeout {
        /// The hub method that was invoked.
        method: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a handshake error.
    #[inline]
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an invocation error.
    #[inline]
    pub fn invocation(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invocation {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Creates an invocation timeout error.
    #[inline]
    pub fn invocation_timeout(method: impl Into<String>, timeout_ms: u64) -> Self {
        Self::InvocationTimeout {
            method: method.into(),
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::InvocationTimeout { .. })
    }

    /// Returns `true` if this is a configuration error.
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::AlreadyConnected | Self::Url(_))
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Handshake { .. }
                | Self::Transport { .. }
                | Self::NotConnected
                | Self::ConnectionClosed
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Handshake { .. }
                | Self::Transport { .. }
                | Self::NotConnected
                | Self::InvocationTimeout { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::handshake("negotiate returned 503");
        assert_eq!(err.to_string(), "Handshake failed: negotiate returned 503");
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("hub name is required");
        assert_eq!(err.to_string(), "Configuration error: hub name is required");
        assert!(err.is_config_error());
    }

    #[test]
    fn test_invocation_display() {
        let err = Error::invocation("send", "hub threw");
        assert_eq!(err.to_string(), "Invocation of 'send' failed: hub threw");

        let err = Error::invocation_timeout("send", 1500);
        assert_eq!(err.to_string(), "Invocation of 'send' timed out after 1500ms");
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::invocation_timeout("send", 5000);
        let other_err = Error::invocation("send", "boom");

        assert!(timeout_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::handshake("x").is_connection_error());
        assert!(Error::transport("x").is_connection_error());
        assert!(Error::NotConnected.is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(!Error::config("x").is_connection_error());
        assert!(!Error::invocation("m", "x").is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::NotConnected.is_recoverable());
        assert!(Error::invocation_timeout("m", 10).is_recoverable());
        assert!(!Error::config("x").is_recoverable());
        assert!(!Error::AlreadyConnected.is_recoverable());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_from_url_error() {
        let url_err = url::Url::parse("not a url").unwrap_err();
        let err: Error = url_err.into();
        assert!(matches!(err, Error::Url(_)));
        assert!(err.is_config_error());
    }
}
