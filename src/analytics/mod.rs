//! Click analytics
//!
//! Visitor signals and fingerprinting, best-effort enrichment (device,
//! geography, traffic source), windowed deduplication, and the report
//! aggregator behind the analytics API.

pub mod aggregator;
pub mod dedup;
pub mod enrichment;
pub mod fingerprint;
pub mod geoip;
pub mod models;
pub mod referrer;
pub mod user_agent;

pub use aggregator::AnalyticsService;
pub use dedup::{ClickClaim, ClickDeduplicator, DEDUP_WINDOW_SECS};
pub use enrichment::Enricher;
pub use fingerprint::{extract_client_ip, VisitorSignals};
pub use geoip::{GeoError, GeoIpLookup, GeoInfo, GeoResolver};
pub use models::{AnalyticsReport, Enrichment, GeoLocation};
pub use referrer::{classify_referrer, ReferrerClassifier};
pub use user_agent::{parse_user_agent, DeviceInfo};
