//! Type-safe identifiers for session entities.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time.
//!
//! | Type | Origin | Purpose |
//! |------|--------|---------|
//! | [`ConnectionHandle`] | Assigned by the hub | Identifies one live connection |
//! | [`Generation`] | Local counter | Identifies one started connection object |
//! | [`InvocationId`] | Local counter | Correlates an invocation in logs |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// ConnectionHandle
// ============================================================================

/// Opaque connection identifier assigned by the hub during the handshake.
///
/// Never empty: an empty identifier from the hub is represented as the
/// absence of a handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionHandle(String);

impl ConnectionHandle {
    /// Creates a handle from the identifier the hub returned.
    ///
    /// Returns `None` if the identifier is empty.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() { None } else { Some(Self(id)) }
    }

    /// Returns the handle as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the handle, returning the inner string.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConnectionHandle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Identifies one started connection object within a session.
///
/// Bumped every time the session builds a new connection. Callbacks tagged
/// with an older generation belong to a superseded connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    /// The generation before any connection was built.
    pub const INITIAL: Self = Self(0);

    /// Creates a generation from a raw counter value.
    #[inline]
    #[must_use]
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the following generation.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw counter value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// InvocationId
// ============================================================================

/// Global counter for invocation IDs.
static NEXT_INVOCATION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier for one outbound invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvocationId(u64);

impl InvocationId {
    /// Allocates the next invocation ID.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_INVOCATION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw counter value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
