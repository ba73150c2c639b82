//! Connection options.
//!
//! Describes which hub to connect to and how. Options are copied into the
//! session when `connect` is called and are immutable from then on.
//!
//! # Example
//!
//! ```ignore
//! use hub_session::{ConnectionOptions, Transport};
//!
//! let options = ConnectionOptions::new("https://chat.example.com/signalr", "chatHub")
//!     .with_query_string("room=lobby")
//!     .with_header("Authorization", "Bearer t0k3n")
//!     .with_hub_methods(["chatMessage", "userJoined"])
//!     .with_transport(Transport::LongPolling);
//!
//! let url = options.handshake_url()?;
//! // https://chat.example.com/signalr?room=lobby
//! ```
//!
//! The serde shape matches the host channel (camelCase keys):
//!
//! ```json
//! {
//!   "baseUrl": "https://chat.example.com/signalr",
//!   "queryString": "room=lobby",
//!   "headers": { "Authorization": "Bearer t0k3n" },
//!   "hubName": "chatHub",
//!   "hubMethods": ["chatMessage"],
//!   "transport": "AUTO"
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

use super::credentials::HeaderMap;
use super::transport::Transport;

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Options for connecting a session to a hub.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionOptions {
    /// Base URL of the hub endpoint (required, http or https).
    pub base_url: String,

    /// Query string appended to the handshake URL.
    pub query_string: Option<String>,

    /// Headers attached to every outbound request.
    pub headers: Option<HeaderMap>,

    /// Hub name (required).
    pub hub_name: String,

    /// Inbound event names to subscribe before the handshake.
    pub hub_methods: Vec<String>,

    /// Wire transport preference.
    pub transport: Transport,
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectionOptions {
    /// Creates options for `hub_name` at `base_url` with defaults elsewhere.
    #[inline]
    #[must_use]
    pub fn new(base_url: impl Into<String>, hub_name: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            hub_name: hub_name.into(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionOptions {
    /// Sets the query string appended to the handshake URL.
    ///
    /// A leading `?` is tolerated.
    #[inline]
    #[must_use]
    pub fn with_query_string(mut self, query: impl Into<String>) -> Self {
        self.query_string = Some(query.into());
        self
    }

    /// Adds a header attached to every request.
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(HeaderMap::default)
            .insert(name.into(), value.into());
        self
    }

    /// Replaces the header mapping.
    #[inline]
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Adds an inbound event subscription.
    #[inline]
    #[must_use]
    pub fn with_hub_method(mut self, event: impl Into<String>) -> Self {
        self.hub_methods.push(event.into());
        self
    }

    /// Adds multiple inbound event subscriptions.
    #[inline]
    #[must_use]
    pub fn with_hub_methods(mut self, events: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.hub_methods.extend(events.into_iter().map(Into::into));
        self
    }

    /// Sets the transport preference.
    #[inline]
    #[must_use]
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl ConnectionOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the base URL or hub name is missing, or the URL
    ///   is not http/https
    /// - [`Error::Url`] if the base URL does not parse
    pub fn validate(&self) -> Result<()> {
        self.handshake_url().map(|_| ())
    }

    /// Builds the handshake URL: the base URL plus the optional query string.
    ///
    /// # Errors
    ///
    /// Same as [`validate`](Self::validate).
    pub fn handshake_url(&self) -> Result<Url> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(Error::config("Base URL is required"));
        }
        if self.hub_name.trim().is_empty() {
            return Err(Error::config("Hub name is required"));
        }

        let mut url = Url::parse(base)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "Unsupported URL scheme '{}': expected http or https",
                url.scheme()
            )));
        }

        if let Some(query) = self.query() {
            let merged = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
                _ => query.to_string(),
            };
            url.set_query(Some(&merged));
        }

        Ok(url)
    }

    /// Returns the query string without a leading `?`, if non-empty.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query_string
            .as_deref()
            .map(|q| q.trim_start_matches('?'))
            .filter(|q| !q.is_empty())
    }

    /// Returns the subscriptions with duplicates removed, first-seen order.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        let mut seen = FxHashSet::default();
        self.hub_methods
            .iter()
            .filter(|event| seen.insert(event.as_str()))
            .cloned()
            .collect()
    }

    /// Returns `true` if a non-empty header mapping is configured.
    #[inline]
    #[must_use]
    pub fn has_headers(&self) -> bool {
        self.headers.as_ref().is_some_and(|h| !h.is_empty())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_default() {
        let options = ConnectionOptions::new("https://h/hub", "chat");
        assert_eq!(options.base_url, "https://h/hub");
        assert_eq!(options.hub_name, "chat");
        assert!(options.query_string.is_none());
        assert!(options.headers.is_none());
        assert!(options.hub_methods.is_empty());
        assert_eq!(options.transport, Transport::Auto);
    }

    #[test]
    fn test_builder_chain() {
        let options = ConnectionOptions::new("https://h/hub", "chat")
            .with_query_string("?room=1")
            .with_header("Authorization", "Bearer x")
            .with_hub_method("chatMessage")
            .with_transport(Transport::ServerSentEvents);

        assert_eq!(options.query(), Some("room=1"));
        assert!(options.has_headers());
        assert_eq!(options.hub_methods, vec!["chatMessage".to_string()]);
        assert_eq!(options.transport, Transport::ServerSentEvents);
    }

    #[test]
    fn test_handshake_url_appends_query() {
        let options = ConnectionOptions::new("https://h/hub", "chat").with_query_string("a=1");
        let url = options.handshake_url().expect("valid");
        assert_eq!(url.as_str(), "https://h/hub?a=1");
    }

    #[test]
    fn test_handshake_url_merges_existing_query() {
        let options =
            ConnectionOptions::new("https://h/hub?tenant=x", "chat").with_query_string("?a=1");
        let url = options.handshake_url().expect("valid");
        assert_eq!(url.query(), Some("tenant=x&a=1"));
    }

    #[test]
    fn test_empty_query_is_ignored() {
        let options = ConnectionOptions::new("https://h/hub", "chat").with_query_string("?");
        assert!(options.query().is_none());
        assert_eq!(options.handshake_url().expect("valid").query(), None);
    }

    #[test]
    fn test_validate_missing_base_url() {
        let err = ConnectionOptions::new("", "chat").validate().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_validate_missing_hub_name() {
        let err = ConnectionOptions::new("https://h/hub", " ").validate().unwrap_err();
        assert!(err.to_string().contains("Hub name"));
    }

    #[test]
    fn test_validate_bad_url() {
        let err = ConnectionOptions::new("not a url", "chat").validate().unwrap_err();
        assert!(matches!(err, Error::Url(_)));
    }

    #[test]
    fn test_validate_bad_scheme() {
        let err = ConnectionOptions::new("ftp://h/hub", "chat").validate().unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn test_subscriptions_dedupe_in_order() {
        let options = ConnectionOptions::new("https://h/hub", "chat")
            .with_hub_methods(["b", "a", "b", "c", "a"]);
        assert_eq!(options.subscriptions(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_empty_headers_are_not_headers() {
        let options =
            ConnectionOptions::new("https://h/hub", "chat").with_headers(HeaderMap::default());
        assert!(!options.has_headers());
    }

    #[test]
    fn test_deserialize_host_shape() {
        let json = r#"{
            "baseUrl": "https://h/hub",
            "headers": {},
            "hubName": "chat",
            "hubMethods": ["chatMessage"],
            "transport": "AUTO"
        }"#;

        let options: ConnectionOptions = serde_json::from_str(json).expect("parse");
        assert_eq!(options.base_url, "https://h/hub");
        assert_eq!(options.hub_methods, vec!["chatMessage".to_string()]);
        assert!(!options.has_headers());
        assert!(options.query_string.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_deserialize_missing_fields_fails_validation() {
        let options: ConnectionOptions = serde_json::from_str("{}").expect("parse");
        assert!(options.validate().is_err());
    }
}
