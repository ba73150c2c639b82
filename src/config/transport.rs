//! Transport preference and selection.
//!
//! Maps the caller's [`Transport`] preference to the strategy handed to the
//! connection when it starts.
//!
//! | Preference | Strategy |
//! |------------|----------|
//! | [`Transport::Auto`] | `None`, the connection negotiates on its own |
//! | [`Transport::ServerSentEvents`] | Forced [`ForcedTransport::ServerSentEvents`] |
//! | [`Transport::LongPolling`] | Forced [`ForcedTransport::LongPolling`] |
//!
//! Selection has no error path. Unknown preference strings coming from the
//! host channel deserialize to [`Transport::Auto`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{Span, debug};

// ============================================================================
// Transport
// ============================================================================

/// Wire transport preference for a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Transport {
    /// Let the connection negotiate the best available transport.
    #[default]
    Auto,
    /// Force Server-Sent-Events.
    ServerSentEvents,
    /// Force long-polling.
    LongPolling,
}

impl Transport {
    /// Parses a preference leniently.
    ///
    /// Accepts the serialized names plus the short forms `sse` and
    /// `longPolling`, case-insensitively. Anything else is [`Transport::Auto`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let normalized: String = value
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "serversentevents" | "sse" => Self::ServerSentEvents,
            "longpolling" => Self::LongPolling,
            _ => Self::Auto,
        }
    }

    /// Maps a host enum index: `0` auto, `1` SSE, `2` long-polling.
    ///
    /// Any other index is [`Transport::Auto`].
    #[must_use]
    pub const fn from_index(index: u64) -> Self {
        match index {
            1 => Self::ServerSentEvents,
            2 => Self::LongPolling,
            _ => Self::Auto,
        }
    }

    /// Returns `true` if the connection should negotiate the transport itself.
    #[inline]
    #[must_use]
    pub const fn is_auto(self) -> bool {
        matches!(self, Self::Auto)
    }
}

impl From<&str> for Transport {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl<'de> Deserialize<'de> for Transport {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(match &raw {
            Value::String(name) => Self::parse(name),
            Value::Number(index) => index.as_u64().map_or(Self::Auto, Self::from_index),
            _ => Self::Auto,
        })
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::ServerSentEvents => "serverSentEvents",
            Self::LongPolling => "longPolling",
        };
        f.write_str(name)
    }
}

// ============================================================================
// ForcedTransport
// ============================================================================

/// A transport the connection must use regardless of negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForcedTransport {
    /// Server-Sent-Events.
    ServerSentEvents,
    /// Long-polling.
    LongPolling,
}

impl ForcedTransport {
    /// Returns the transport name used on the wire (`transport=` query value).
    #[inline]
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::ServerSentEvents => "serverSentEvents",
            Self::LongPolling => "longPolling",
        }
    }
}

// ============================================================================
// ClientTransport
// ============================================================================

/// Transport strategy bound to a connection's logging context.
///
/// Log lines emitted by the transport are recorded inside `span`, which
/// carries the hub name and connection generation.
#[derive(Debug, Clone)]
pub struct ClientTransport {
    /// The forced transport.
    kind: ForcedTransport,
    /// Logging/negotiation context of the owning connection.
    span: Span,
}

impl ClientTransport {
    /// Creates a strategy for `kind` bound to `span`.
    #[inline]
    #[must_use]
    pub fn new(kind: ForcedTransport, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns the forced transport.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> ForcedTransport {
        self.kind
    }

    /// Returns the logging context this strategy is bound to.
    #[inline]
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Selects the transport strategy for a preference.
///
/// Returns `None` for [`Transport::Auto`]: no explicit strategy is built and
/// the connection runs its own capability negotiation.
#[must_use]
pub fn select_transport(preference: Transport, span: &Span) -> Option<ClientTransport> {
    let kind = match preference {
        Transport::Auto => None,
        Transport::ServerSentEvents => Some(ForcedTransport::ServerSentEvents),
        Transport::LongPolling => Some(ForcedTransport::LongPolling),
    };

    span.in_scope(|| match kind {
        Some(kind) => debug!(transport = kind.wire_name(), "Forcing transport"),
        None => debug!("Transport left to negotiation"),
    });

    kind.map(|kind| ClientTransport::new(kind, span.clone()))
}

// ============================================================================
// Tests
// ============================================================================
