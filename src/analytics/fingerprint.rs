//! Client signal extraction from HTTP headers
//!
//! Derives the raw per-request signals used for deduplication and
//! enrichment: the client IP, the user-agent string and the referrer.
//! Nothing is normalised; the fingerprint compares values exactly.

use axum::http::{header, HeaderMap};

use crate::models::Fingerprint;

/// Used when no forwarding header identifies the client
pub const LOOPBACK_IP: &str = "127.0.0.1";

/// Client IP headers, most specific first
const CLIENT_IP_HEADERS: [&str; 2] = ["cf-connecting-ip", "x-real-ip"];

/// Raw request signals, captured once per redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorSignals {
    pub ip_address: String,
    pub user_agent: String,
    pub referrer: Option<String>,
}

impl VisitorSignals {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_client_ip(headers),
            user_agent: header_text(headers, header::USER_AGENT.as_str()).unwrap_or_default(),
            referrer: extract_referrer(headers),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.ip_address.clone(), self.user_agent.clone())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}

/// Header value as text, keeping non-ASCII bytes. Invalid UTF-8 sequences
/// become U+FFFD.
fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|h| String::from_utf8_lossy(h.as_bytes()).into_owned())
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// Extract the client IP address from HTTP headers
///
/// Checks the CDN header, then `X-Real-IP`, then the leftmost entry of
/// `X-Forwarded-For`, and falls back to loopback.
pub fn extract_client_ip(headers: &HeaderMap) -> String {
    for name in CLIENT_IP_HEADERS {
        if let Some(ip) = header_str(headers, name).and_then(non_empty) {
            return ip.to_string();
        }
    }

    header_str(headers, "x-forwarded-for")
        .and_then(|chain| chain.split(',').next())
        .and_then(non_empty)
        .unwrap_or(LOOPBACK_IP)
        .to_string()
}

/// `Referer`, or the correctly spelled `Referrer` some clients send
fn extract_referrer(headers: &HeaderMap) -> Option<String> {
    header_text(headers, header::REFERER.as_str())
        .or_else(|| header_text(headers, "referrer"))
        .as_deref()
        .and_then(non_empty)
        .map(str::to_string)
}
