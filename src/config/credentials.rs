//! Request credentials.
//!
//! A [`Credentials`] object decorates every outbound request a connection
//! issues (negotiate, connect, poll, send, abort). The only built-in
//! implementation attaches a fixed header set.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::transport::OutboundRequest;

// ============================================================================
// Types
// ============================================================================

/// Header mapping, order-insensitive.
pub type HeaderMap = FxHashMap<String, String>;

// ============================================================================
// Credentials
// ============================================================================

/// Decorates outbound requests before they are sent.
pub trait Credentials: Send + Sync + fmt::Debug {
    /// Applies the credentials to `request`.
    fn prepare_request(&self, request: &mut OutboundRequest);
}

// ============================================================================
// HeaderCredentials
// ============================================================================

/// Credentials that attach a fixed header set to every request.
///
/// Headers already present on the request with the same name, compared
/// case-insensitively, are replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCredentials {
    headers: HeaderMap,
}

impl HeaderCredentials {
    /// Creates header credentials.
    #[inline]
    #[must_use]
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    /// Returns the attached headers.
    #[inline]
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl Credentials for HeaderCredentials {
    fn prepare_request(&self, request: &mut OutboundRequest) {
        // Header names are case-insensitive on the wire.
        request.headers.retain(|existing, _| {
            !self
                .headers
                .keys()
                .any(|name| name.eq_ignore_ascii_case(existing))
        });
        request.headers.extend(
            self.headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
    }
}

// ============================================================================
// Attachment
// ============================================================================

/// Builds the credentials object for an optional header mapping.
///
/// Returns `None` when `headers` is absent or empty, in which case no
/// credentials are installed on the connection.
#[must_use]
pub fn attach_credentials(headers: Option<&HeaderMap>) -> Option<Arc<dyn Credentials>> {
    let headers = headers.filter(|h| !h.is_empty())?;
    Some(Arc::new(HeaderCredentials::new(headers.clone())))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RequestKind;

    fn request() -> OutboundRequest {
        let url = url::Url::parse("https://hub.example/signalr/negotiate").expect("valid url");
        OutboundRequest::new(RequestKind::Negotiate, url)
    }

    #[test]
    fn test_absent_headers_install_nothing() {
        assert!(attach_credentials(None).is_none());
        assert!(attach_credentials(Some(&HeaderMap::default())).is_none());
    }

    #[test]
    fn test_headers_are_attached() {
        let mut headers = HeaderMap::default();
        headers.insert("Authorization".into(), "Bearer t0k3n".into());
        headers.insert("X-Tenant".into(), "acme".into());

        let credentials = attach_credentials(Some(&headers)).expect("installed");
        let mut req = request();
        credentials.prepare_request(&mut req);

        assert_eq!(req.headers, headers);
    }

    #[test]
    fn test_headers_replace_existing() {
        let mut headers = HeaderMap::default();
        headers.insert("Authorization".into(), "Bearer new".into());

        let mut req = request();
        req.headers.insert("Authorization".into(), "Bearer old".into());
        HeaderCredentials::new(headers).prepare_request(&mut req);

        assert_eq!(
            req.headers.get("Authorization").map(String::as_str),
            Some("Bearer new")
        );
    }

    #[test]
    fn test_replacement_ignores_name_case() {
        let mut headers = HeaderMap::default();
        headers.insert("Authorization".into(), "Bearer new".into());

        let mut req = request();
        req.headers.insert("authorization".into(), "Bearer old".into());
        req.headers.insert("Accept".into(), "application/json".into());
        HeaderCredentials::new(headers).prepare_request(&mut req);

        assert_eq!(req.headers.len(), 2);
        assert_eq!(
            req.headers.get("Authorization").map(String::as_str),
            Some("Bearer new")
        );
        assert!(!req.headers.contains_key("authorization"));
        assert_eq!(
            req.headers.get("Accept").map(String::as_str),
            Some("application/json")
        );
    }
}
