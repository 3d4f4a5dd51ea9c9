// crates/callgate-http/src/request.rs
// ============================================================================
// Module: Gateway Request
// Description: Transport-neutral view of an incoming gateway request.
// Purpose: Decouple dispatch from axum so it can be driven directly in tests.
// Dependencies: bytes, callgate-core
// ============================================================================

//! ## Overview
//! [`GatewayRequest`] carries only what dispatch needs: the route, the
//! `Origin` header, cookies, the peer address, and the body. The axum adapter
//! fills it from a live request; tests build it by hand.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::net::SocketAddr;

use bytes::Bytes;
use callgate_core::MultipartForm;
use callgate_core::RequestBody;

// ============================================================================
// SECTION: Payload
// ============================================================================

/// Request body as received from the transport.
#[derive(Debug, Clone, Default)]
pub enum RequestPayload {
    /// No body.
    #[default]
    Empty,
    /// Raw JSON body.
    Json(Bytes),
    /// Decoded multipart form.
    Multipart(MultipartForm),
}

impl RequestPayload {
    /// Returns the payload as a binder input.
    #[must_use]
    pub fn as_body(&self) -> RequestBody<'_> {
        match self {
            Self::Empty => RequestBody::Json(&[]),
            Self::Json(bytes) => RequestBody::Json(&bytes[..]),
            Self::Multipart(form) => RequestBody::Multipart(form),
        }
    }
}

// ============================================================================
// SECTION: Request
// ============================================================================

/// Incoming request as seen by the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct GatewayRequest {
    /// Route string (path or action name) addressing the callable.
    route: String,
    /// `Origin` header value, if sent.
    origin: Option<String>,
    /// Request cookies keyed by name (first occurrence wins).
    cookies: BTreeMap<String, String>,
    /// Peer socket address when known.
    peer: Option<SocketAddr>,
    /// Request body.
    payload: RequestPayload,
    /// Body size on the wire in bytes.
    body_bytes: usize,
}

impl GatewayRequest {
    /// Creates a request for `route` with no headers or body.
    #[must_use]
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            ..Self::default()
        }
    }

    /// Sets the `Origin` header.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Adds a cookie unless one with the same name is already present.
    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.entry(name.into()).or_insert_with(|| value.into());
        self
    }

    /// Adds every cookie from a `Cookie` header value.
    #[must_use]
    pub fn with_cookie_header(mut self, header: &str) -> Self {
        for (name, value) in parse_cookie_header(header) {
            self.cookies.entry(name).or_insert(value);
        }
        self
    }

    /// Sets the peer address.
    #[must_use]
    pub const fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Sets a JSON body.
    #[must_use]
    pub fn with_json(mut self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.body_bytes = body.len();
        self.payload = RequestPayload::Json(body);
        self
    }

    /// Sets a multipart body and its size on the wire.
    #[must_use]
    pub fn with_multipart(mut self, form: MultipartForm, body_bytes: usize) -> Self {
        self.body_bytes = body_bytes;
        self.payload = RequestPayload::Multipart(form);
        self
    }

    /// Returns the route string.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Returns the `Origin` header value, if sent.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Returns the named cookie value.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Returns the peer IP address as text.
    #[must_use]
    pub fn peer_ip(&self) -> Option<String> {
        self.peer.map(|peer| peer.ip().to_string())
    }

    /// Returns the request body.
    #[must_use]
    pub const fn payload(&self) -> &RequestPayload {
        &self.payload
    }

    /// Returns the body size on the wire in bytes.
    #[must_use]
    pub const fn body_bytes(&self) -> usize {
        self.body_bytes
    }
}

// ============================================================================
// SECTION: Cookies
// ============================================================================

/// Parses a `Cookie` header into name/value pairs in header order.
///
/// Pairs without `=` or with an empty name are skipped; surrounding double
/// quotes on values are removed.
#[must_use]
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|inner| inner.strip_suffix('"'))
                .unwrap_or(value);
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::GatewayRequest;
    use super::parse_cookie_header;

    #[test]
    fn cookie_header_parses_pairs_and_quotes() {
        let pairs = parse_cookie_header(r#"a=1; CSRF-TOKEN="v1.x.y" ; junk; =empty"#);
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("CSRF-TOKEN".to_string(), "v1.x.y".to_string()),
            ]
        );
    }

    #[test]
    fn first_cookie_occurrence_wins() {
        let request = GatewayRequest::new("jbind:x").with_cookie_header("t=first; t=second");
        assert_eq!(request.cookie("t"), Some("first"));
        assert_eq!(request.cookie("missing"), None);
    }
}
