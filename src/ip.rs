//! Client address extraction for per-IP rate limits.

use actix_web::HttpRequest;
use std::net::IpAddr;

/// Extract the real client IP address from an HTTP request.
///
/// Checks headers in order of preference:
/// 1. X-Forwarded-For (first IP in the list)
/// 2. X-Real-IP
/// 3. Remote peer address
pub fn extract_client_ip(req: &HttpRequest) -> Option<String> {
    if let Some(first) = header_str(req, "x-forwarded-for").and_then(|v| v.split(',').next()) {
        if let Some(ip) = parse_ip(first) {
            return Some(ip);
        }
    }

    if let Some(ip) = header_str(req, "x-real-ip").and_then(parse_ip) {
        return Some(ip);
    }

    req.peer_addr().map(|addr| addr.ip().to_string())
}

/// Same as `extract_client_ip`, with a fixed bucket for unknown callers.
pub fn client_ip_or_unknown(req: &HttpRequest) -> String {
    extract_client_ip(req).unwrap_or_else(|| "unknown".to_owned())
}

fn header_str<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

fn parse_ip(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    trimmed.parse::<IpAddr>().ok().map(|_| trimmed.to_owned())
}
