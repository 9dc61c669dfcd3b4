//! Client identity resolution.

use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Header carrying the originating client chain from upstream proxies.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
/// Single-address header set by some proxies.
pub const X_REAL_IP: &str = "x-real-ip";
/// Identity used when a request carries no usable origin at all.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derives the rate-limit identity of a request.
///
/// Order: first non-empty `X-Forwarded-For` element, then `X-Real-IP`, then
/// the connection's peer IP. Malformed or non-UTF-8 header values are
/// skipped rather than rejected.
#[derive(Debug, Clone, Copy)]
pub struct IdentityResolver {
    trust_forwarded_for: bool,
}

impl IdentityResolver {
    pub fn new(trust_forwarded_for: bool) -> Self {
        Self {
            trust_forwarded_for,
        }
    }

    /// Resolve the identity for a request with `headers` arriving from `peer`.
    pub fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        if self.trust_forwarded_for {
            if let Some(identity) = forwarded_identity(headers) {
                return identity;
            }
        }

        match peer {
            // Port excluded: every new connection would otherwise be a new client
            Some(addr) => addr.ip().to_string(),
            None => UNKNOWN_CLIENT.to_string(),
        }
    }
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(true)
    }
}

fn forwarded_identity(headers: &HeaderMap) -> Option<String> {
    let forwarded_for = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .find(|s| !s.is_empty());

    forwarded_for
        .or_else(|| {
            headers
                .get(X_REAL_IP)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.10:54321".parse().unwrap())
    }

    #[test]
    fn test_peer_address_without_headers() {
        let resolver = IdentityResolver::default();
        assert_eq!(resolver.resolve(&HeaderMap::new(), peer()), "192.0.2.10");
    }

    #[test]
    fn test_forwarded_for_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.7"));

        let resolver = IdentityResolver::default();
        assert_eq!(resolver.resolve(&headers, peer()), "203.0.113.7");
    }

    #[test]
    fn test_first_non_empty_forwarded_element() {
        let mut headers = HeaderMap::new();
        headers.insert(
            X_FORWARDED_FOR,
            HeaderValue::from_static(" , 203.0.113.7, 10.0.0.1"),
        );

        let resolver = IdentityResolver::default();
        assert_eq!(resolver.resolve(&headers, peer()), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(""));
        headers.insert(X_REAL_IP, HeaderValue::from_static("198.51.100.4"));

        let resolver = IdentityResolver::default();
        assert_eq!(resolver.resolve(&headers, peer()), "198.51.100.4");
    }

    #[test]
    fn test_untrusted_headers_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.7"));

        let resolver = IdentityResolver::new(false);
        assert_eq!(resolver.resolve(&headers, peer()), "192.0.2.10");
    }

    #[test]
    fn test_non_utf8_header_is_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert(
            X_FORWARDED_FOR,
            HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap(),
        );

        let resolver = IdentityResolver::default();
        assert_eq!(resolver.resolve(&headers, peer()), "192.0.2.10");
    }

    #[test]
    fn test_no_origin_is_degenerate_identity() {
        let resolver = IdentityResolver::default();
        assert_eq!(resolver.resolve(&HeaderMap::new(), None), UNKNOWN_CLIENT);
    }
}
