//! Turning request metadata into the engine's [`RequestContext`].

use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;
use roomvote_engine::RequestContext;
use roomvote_types::CallerId;
use std::net::SocketAddr;

/// Header carrying the principal resolved by the upstream auth layer.
pub const CALLER_HEADER: &str = "x-caller-id";

const FORWARDED_FOR: &str = "x-forwarded-for";

/// The authenticated caller, if the auth layer supplied one.
pub fn caller(headers: &HeaderMap) -> Option<CallerId> {
    headers
        .get(CALLER_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| CallerId::new(v).ok())
}

/// Client address: first `X-Forwarded-For` hop, else the socket peer, else
/// `"unknown"`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn request_context(headers: &HeaderMap, peer: Option<SocketAddr>) -> RequestContext {
    RequestContext {
        caller: caller(headers),
        origin: Some(client_ip(headers, peer)),
        client_signature: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.10:4444".parse().unwrap())
    }

    #[test]
    fn forwarded_for_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_static("203.0.113.5, 10.0.0.1"));
        assert_eq!(client_ip(&headers, peer()), "203.0.113.5");
    }

    #[test]
    fn falls_back_to_peer_then_unknown() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, peer()), "192.0.2.10");
        assert_eq!(client_ip(&headers, None), "unknown");
    }

    #[test]
    fn blank_caller_header_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(CALLER_HEADER, HeaderValue::from_static("   "));
        assert!(caller(&headers).is_none());

        headers.insert(CALLER_HEADER, HeaderValue::from_static("user-1"));
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8"));
        let ctx = request_context(&headers, None);
        assert_eq!(ctx.caller.unwrap().as_str(), "user-1");
        assert_eq!(ctx.client_signature.as_deref(), Some("curl/8"));
        assert_eq!(ctx.origin.as_deref(), Some("unknown"));
    }
}
