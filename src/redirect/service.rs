//! Redirect resolution and click recording
//!
//! Every call ends in a destination: the link's URL when the code resolves,
//! the fallback otherwise. Recording happens before the outcome is returned
//! and its failures never change where the visitor is sent.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::analytics::{ClickDeduplicator, Enricher, VisitorSignals};
use crate::models::{is_valid_short_code, Link, NewClickEvent};
use crate::storage::{ClickStore, LinkStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// New click: one event written and the counter incremented
    Counted,
    /// Same visitor inside the dedup window, nothing written
    Duplicate,
    /// Recording failed; the visitor is still redirected
    Skipped,
}

impl ClickOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClickOutcome::Counted => "counted",
            ClickOutcome::Duplicate => "duplicate",
            ClickOutcome::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    InvalidCode,
    NotFound,
    StoreUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    Found {
        destination: String,
        click: ClickOutcome,
        cache_hit: bool,
    },
    Fallback(FallbackReason),
}

pub struct RedirectService {
    links: Arc<dyn LinkStore>,
    clicks: Arc<dyn ClickStore>,
    dedup: ClickDeduplicator,
    enricher: Enricher,
}

impl RedirectService {
    pub fn new(links: Arc<dyn LinkStore>, clicks: Arc<dyn ClickStore>, enricher: Enricher) -> Self {
        Self {
            dedup: ClickDeduplicator::new(Arc::clone(&clicks)),
            links,
            clicks,
            enricher,
        }
    }

    pub async fn resolve(&self, short_code: &str, signals: &VisitorSignals) -> RedirectOutcome {
        self.resolve_at(short_code, signals, Utc::now().timestamp())
            .await
    }

    /// Resolve with an explicit clock, in unix seconds
    pub async fn resolve_at(
        &self,
        short_code: &str,
        signals: &VisitorSignals,
        now: i64,
    ) -> RedirectOutcome {
        if !is_valid_short_code(short_code) {
            debug!(short_code, "rejecting malformed short code");
            return RedirectOutcome::Fallback(FallbackReason::InvalidCode);
        }

        let lookup = match self.links.find_by_code_with_metadata(short_code).await {
            Ok(lookup) => lookup,
            Err(e) => {
                error!(short_code, "Link lookup failed: {}", e);
                return RedirectOutcome::Fallback(FallbackReason::StoreUnavailable);
            }
        };

        let Some(link) = lookup.link else {
            info!(short_code, "short code not found");
            return RedirectOutcome::Fallback(FallbackReason::NotFound);
        };

        let click = self.record_click(&link, signals, now).await;

        RedirectOutcome::Found {
            destination: link.destination_url,
            click,
            cache_hit: lookup.metadata.cache_hit,
        }
    }

    async fn record_click(&self, link: &Link, signals: &VisitorSignals, now: i64) -> ClickOutcome {
        let fingerprint = signals.fingerprint();

        let Some(claim) = self.dedup.try_claim(link.id, &fingerprint) else {
            // Reported as a duplicate even if the holder ends up skipping
            debug!(short_code = %link.short_code, "click for this visitor already in flight");
            return ClickOutcome::Duplicate;
        };

        let (duplicate, enrichment) = tokio::join!(
            self.dedup.is_duplicate(link.id, &fingerprint, now),
            self.enricher.enrich(signals),
        );

        match duplicate {
            Ok(true) => {
                debug!(short_code = %link.short_code, "duplicate click inside window");
                return ClickOutcome::Duplicate;
            }
            Ok(false) => {}
            Err(e) => {
                error!(short_code = %link.short_code, "Dedup query failed, click not recorded: {}", e);
                return ClickOutcome::Skipped;
            }
        }

        let event = NewClickEvent {
            link_id: link.id,
            fingerprint,
            clicked_at: now,
            device_type: enrichment.device_type,
            browser: enrichment.browser,
            os: enrichment.os,
            country: enrichment.location.country,
            city: enrichment.location.city,
            referrer: signals.referrer.clone().unwrap_or_default(),
            referrer_category: enrichment.referrer_category,
        };

        if let Err(e) = self.clicks.insert(&event).await {
            error!(short_code = %link.short_code, "Failed to store click event: {}", e);
            return ClickOutcome::Skipped;
        }

        if let Err(e) = self.links.increment_clicks(link.id).await {
            error!(short_code = %link.short_code, "Click event stored but counter increment failed: {}", e);
            return ClickOutcome::Skipped;
        }

        drop(claim);
        ClickOutcome::Counted
    }
}
