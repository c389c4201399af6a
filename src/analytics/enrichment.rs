//! Best-effort click enrichment
//!
//! Combines user-agent parsing, referrer classification and geolocation.
//! `enrich` cannot fail; every missing piece falls back to its default.

use crate::analytics::fingerprint::VisitorSignals;
use crate::analytics::geoip::GeoResolver;
use crate::analytics::models::Enrichment;
use crate::analytics::referrer::ReferrerClassifier;
use crate::analytics::user_agent::parse_user_agent;

#[derive(Clone)]
pub struct Enricher {
    geo: GeoResolver,
    referrers: ReferrerClassifier,
}

impl Enricher {
    pub fn new(geo: GeoResolver, referrers: ReferrerClassifier) -> Self {
        Self { geo, referrers }
    }

    /// No geolocation, no self-hosts
    pub fn offline() -> Self {
        Self::new(GeoResolver::disabled(), ReferrerClassifier::new())
    }

    pub fn geo(&self) -> &GeoResolver {
        &self.geo
    }

    pub async fn enrich(&self, signals: &VisitorSignals) -> Enrichment {
        let device = parse_user_agent(&signals.user_agent);
        let referrer_category = self.referrers.classify(signals.referrer.as_deref());
        let location = self.geo.resolve(&signals.ip_address).await;

        Enrichment {
            device_type: device.device_type,
            browser: device.browser,
            os: device.os,
            location,
            referrer_category,
        }
    }
}
