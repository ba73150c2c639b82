//! Session-wide settings.
//!
//! Unlike [`ConnectionOptions`](super::ConnectionOptions), which are supplied
//! per `connect`, these settings are fixed when the session is built.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for a hub method invocation.
pub const DEFAULT_INVOKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on concurrently outstanding invocations.
pub const DEFAULT_MAX_PENDING_INVOCATIONS: usize = 100;

// ============================================================================
// SessionConfig
// ============================================================================

/// Settings applied to every connection a session makes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum time to wait for an invocation result.
    pub invoke_timeout: Duration,

    /// Maximum number of invocations outstanding at once.
    pub max_pending_invocations: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionConfig {
    /// Creates settings with the defaults.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            invoke_timeout: DEFAULT_INVOKE_TIMEOUT,
            max_pending_invocations: DEFAULT_MAX_PENDING_INVOCATIONS,
        }
    }

    /// Sets the invocation timeout.
    #[inline]
    #[must_use]
    pub fn with_invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = timeout;
        self
    }

    /// Sets the cap on outstanding invocations.
    #[inline]
    #[must_use]
    pub fn with_max_pending_invocations(mut self, max: usize) -> Self {
        self.max_pending_invocations = max;
        self
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.invoke_timeout.is_zero() {
            return Err("Invoke timeout must be greater than zero".to_string());
        }
        if self.max_pending_invocations == 0 {
            return Err("Max pending invocations must be greater than zero".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
