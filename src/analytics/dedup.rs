//! Click deduplication over a trailing 15-minute window
//!
//! A click is a duplicate if the event store already holds an event for the
//! same link and fingerprint in `[now - 900s, now]`. The store query and the
//! later insert are not atomic, so within this process a claim set makes
//! concurrent identical requests collapse to a single click. Across processes
//! the window stays best-effort.
//!
//! A request that finds the pair already claimed reports a duplicate without
//! waiting for the holder. If the holder then fails to store its event, that
//! burst of requests records no click at all; the next request after the
//! claim is released is checked against the store as usual.

use dashmap::DashSet;
use std::sync::Arc;

use crate::models::Fingerprint;
use crate::storage::{ClickStore, StorageResult};

pub const DEDUP_WINDOW_SECS: i64 = 15 * 60;

type ClaimKey = (i64, Fingerprint);

pub struct ClickDeduplicator {
    clicks: Arc<dyn ClickStore>,
    in_flight: Arc<DashSet<ClaimKey>>,
}

/// Exclusive right to record a click for one (link, fingerprint).
/// Released on drop.
#[derive(Debug)]
pub struct ClickClaim {
    key: ClaimKey,
    in_flight: Arc<DashSet<ClaimKey>>,
}

impl Drop for ClickClaim {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

impl ClickDeduplicator {
    pub fn new(clicks: Arc<dyn ClickStore>) -> Self {
        Self {
            clicks,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Whether a click at `now` falls inside the window of an earlier one.
    /// Events stamped after `now` are not considered.
    pub async fn is_duplicate(
        &self,
        link_id: i64,
        fingerprint: &Fingerprint,
        now: i64,
    ) -> StorageResult<bool> {
        self.clicks
            .exists_since(link_id, fingerprint, now - DEDUP_WINDOW_SECS, now)
            .await
    }

    /// Claim (link, fingerprint) for recording. `None` means another request
    /// for the same pair is being recorded right now.
    pub fn try_claim(&self, link_id: i64, fingerprint: &Fingerprint) -> Option<ClickClaim> {
        let key = (link_id, fingerprint.clone());
        self.in_flight.insert(key.clone()).then(|| ClickClaim {
            key,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Number of pairs currently being recorded
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}
