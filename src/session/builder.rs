//! Builder pattern for session configuration.
//!
//! Provides a fluent API for configuring and creating [`Session`] instances.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use hub_session::{LoopbackHub, Session};
//! use tokio::sync::mpsc;
//!
//! let (events, _rx) = mpsc::unbounded_channel();
//! let session = Session::builder()
//!     .connector(LoopbackHub::new())
//!     .host(events)
//!     .invoke_timeout(Duration::from_secs(10))
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::host::HostEvents;
use crate::transport::HubConnector;

use super::core::Session;

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for configuring a [`Session`].
///
/// Use [`Session::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct SessionBuilder {
    /// Builds the underlying connections.
    connector: Option<Arc<dyn HubConnector>>,
    /// Receives status changes and hub events.
    host: Option<Arc<dyn HostEvents>>,
    /// Session settings.
    config: SessionConfig,
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl SessionBuilder {
    /// Creates a builder with no connector, no host and default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connector that builds hub connections.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl HubConnector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Sets a shared connector.
    #[inline]
    #[must_use]
    pub fn connector_arc(mut self, connector: Arc<dyn HubConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Sets the receiver of status changes and hub events.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl HostEvents) -> Self {
        self.host = Some(Arc::new(host));
        self
    }

    /// Sets a shared host receiver.
    #[inline]
    #[must_use]
    pub fn host_arc(mut self, host: Arc<dyn HostEvents>) -> Self {
        self.host = Some(host);
        self
    }

    /// Replaces the session settings.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the invocation timeout.
    #[inline]
    #[must_use]
    pub fn invoke_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_invoke_timeout(timeout);
        self
    }

    /// Sets the cap on outstanding invocations.
    #[inline]
    #[must_use]
    pub fn max_pending_invocations(mut self, max: usize) -> Self {
        self.config = self.config.with_max_pending_invocations(max);
        self
    }

    /// Builds the session with validation.
    ///
    /// Spawns the delivery task on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the connector or host is not set
    /// - [`Error::Config`] if the settings are invalid
    /// - [`Error::Config`] if called outside a Tokio runtime
    pub fn build(self) -> Result<Session> {
        let connector = self.connector.ok_or_else(|| {
            Error::config(
                "Connector is required. Use .connector() to set it.\n\
                 Example: Session::builder().connector(LoopbackHub::new())",
            )
        })?;

        let host = self.host.ok_or_else(|| {
            Error::config(
                "Host receiver is required. Use .host() to set it.\n\
                 Example: Session::builder().host(mpsc::unbounded_channel().0)",
            )
        })?;

        self.config.validate().map_err(Error::config)?;

        Handle::try_current().map_err(|_| {
            Error::config(
                "A Tokio runtime is required to build a session.\n\
                 Call .build() from within #[tokio::main] or a Runtime::block_on",
            )
        })?;

        Ok(Session::new(connector, host, self.config))
    }
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("connector", &self.connector.is_some())
            .field("host", &self.host.is_some())
            .field("config", &self.config)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc;
    use tokio_test::{assert_err, assert_ok};

    use crate::host::HostEvent;
    use crate::transport::LoopbackHub;

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = SessionBuilder::new();
        assert!(builder.connector.is_none());
        assert!(builder.host.is_none());
        assert_eq!(builder.config, SessionConfig::default());
    }

    #[test]
    fn test_setting_overrides() {
        let builder = SessionBuilder::new()
            .invoke_timeout(Duration::from_secs(5))
            .max_pending_invocations(4);
        assert_eq!(builder.config.invoke_timeout, Duration::from_secs(5));
        assert_eq!(builder.config.max_pending_invocations, 4);
    }

    #[test]
    fn test_build_requires_connector() {
        let (events, _rx) = mpsc::unbounded_channel::<HostEvent>();
        let err = assert_err!(SessionBuilder::new().host(events).build());
        assert!(err.is_config_error());
        assert!(err.to_string().contains("Connector is required"));
    }

    #[test]
    fn test_build_requires_host() {
        let err = SessionBuilder::new().connector(LoopbackHub::new()).build().unwrap_err();
        assert!(err.to_string().contains("Host receiver is required"));
    }

    #[test]
    fn test_build_rejects_zero_timeout() {
        let (events, _rx) = mpsc::unbounded_channel::<HostEvent>();
        let err = SessionBuilder::new()
            .connector(LoopbackHub::new())
            .host(events)
            .invoke_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_build_outside_runtime_fails() {
        let (events, _rx) = mpsc::unbounded_channel::<HostEvent>();
        let err = assert_err!(
            SessionBuilder::new()
                .connector(LoopbackHub::new())
                .host(events)
                .build()
        );
        assert!(err.is_config_error());
        assert!(err.to_string().contains("Tokio runtime is required"));
    }

    #[tokio::test]
    async fn test_build_succeeds() {
        let (events, _rx) = mpsc::unbounded_channel::<HostEvent>();
        let session = assert_ok!(
            SessionBuilder::new()
                .connector(LoopbackHub::new())
                .host(events)
                .build()
        );
        assert!(!session.is_connected());
        assert_eq!(session.config().max_pending_invocations, 100);
    }
}
