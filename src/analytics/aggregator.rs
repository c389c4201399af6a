//! On-demand analytics reports for an owner's links
//!
//! Reads the link registry and the click event store and folds them into an
//! `AnalyticsReport`. Never on the redirect path, and never fails: if a store
//! cannot be read the report comes back zero-filled.

use chrono::DateTime;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error};

use crate::analytics::models::{
    AnalyticsReport, BreakdownEntry, LinkPerformance, ReportSummary, TimelinePoint, TopLink,
};
use crate::models::{ClickEvent, DeviceType, Link, ReferrerCategory};
use crate::storage::{ClickStore, LinkStore, TimeRange};

const DEVICE_ORDER: [DeviceType; 3] = [DeviceType::Mobile, DeviceType::Desktop, DeviceType::Tablet];
const SOURCE_ORDER: [ReferrerCategory; 5] = [
    ReferrerCategory::Direct,
    ReferrerCategory::SocialMedia,
    ReferrerCategory::Email,
    ReferrerCategory::Search,
    ReferrerCategory::Other,
];
const TOP_COUNTRIES: usize = 5;
const TOP_LINKS: usize = 10;
const HIGH_PERFORMANCE_MIN: i64 = 51;
const MEDIUM_PERFORMANCE_MIN: i64 = 10;

pub struct AnalyticsService {
    links: Arc<dyn LinkStore>,
    clicks: Arc<dyn ClickStore>,
}

impl AnalyticsService {
    pub fn new(links: Arc<dyn LinkStore>, clicks: Arc<dyn ClickStore>) -> Self {
        Self { links, clicks }
    }

    pub async fn summarize(&self, owner_id: &str, range: TimeRange) -> AnalyticsReport {
        let links = match self.links.list_by_owner(owner_id).await {
            Ok(links) => links,
            Err(e) => {
                error!(owner_id, "Failed to load links for analytics: {}", e);
                return AnalyticsReport::empty();
            }
        };

        let ids: Vec<i64> = links.iter().map(|l| l.id).collect();
        let events = if ids.is_empty() {
            Vec::new()
        } else {
            match self.clicks.events_for_links(&ids, range).await {
                Ok(events) => events,
                Err(e) => {
                    error!(owner_id, "Failed to load click events for analytics: {}", e);
                    return AnalyticsReport::empty();
                }
            }
        };

        debug!(owner_id, links = links.len(), events = events.len(), "building analytics report");
        build_report(&links, &events)
    }
}

impl AnalyticsReport {
    /// Report for an owner with no links and no events
    pub fn empty() -> Self {
        build_report(&[], &[])
    }
}

/// Fold links (registry order, newest first) and events into a report
pub fn build_report(links: &[Link], events: &[ClickEvent]) -> AnalyticsReport {
    let total_links = links.len() as u64;
    let total_clicks: i64 = links.iter().map(|l| l.clicks).sum();
    let total_events = events.len() as u64;

    let average_clicks_per_link = if total_links == 0 {
        0.0
    } else {
        (total_clicks as f64 / total_links as f64 * 10.0).round() / 10.0
    };

    let mut device_counts: HashMap<DeviceType, u64> = HashMap::new();
    let mut source_counts: HashMap<ReferrerCategory, u64> = HashMap::new();
    let mut country_counts: HashMap<&str, u64> = HashMap::new();
    let mut daily: BTreeMap<String, u64> = BTreeMap::new();
    let mut monthly: BTreeMap<String, u64> = BTreeMap::new();

    for event in events {
        *device_counts.entry(event.device_type).or_default() += 1;
        *source_counts.entry(event.referrer_category).or_default() += 1;
        *country_counts.entry(event.country.as_str()).or_default() += 1;

        if let Some(ts) = DateTime::from_timestamp(event.clicked_at, 0) {
            *daily.entry(ts.format("%Y-%m-%d").to_string()).or_default() += 1;
            *monthly.entry(ts.format("%Y-%m").to_string()).or_default() += 1;
        }
    }

    let devices = breakdown(
        DEVICE_ORDER
            .iter()
            .map(|d| (d.as_str().to_string(), device_counts.get(d).copied().unwrap_or(0)))
            .collect(),
        total_events,
    );

    let traffic_sources = breakdown(
        SOURCE_ORDER
            .iter()
            .map(|s| (s.as_str().to_string(), source_counts.get(s).copied().unwrap_or(0)))
            .collect(),
        total_events,
    );

    let mut countries: Vec<(&str, u64)> = country_counts.into_iter().collect();
    countries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let countries = breakdown(
        countries
            .into_iter()
            .take(TOP_COUNTRIES)
            .map(|(name, count)| (name.to_string(), count))
            .collect(),
        total_events,
    );

    // sort_by is stable, so equal counters keep registry order
    let mut ranked: Vec<&Link> = links.iter().collect();
    ranked.sort_by(|a, b| b.clicks.cmp(&a.clicks));
    let top_links = ranked
        .into_iter()
        .take(TOP_LINKS)
        .map(|l| TopLink {
            short_code: l.short_code.clone(),
            name: l.name.clone(),
            destination_url: l.destination_url.clone(),
            clicks: l.clicks,
            created_at: l.created_at,
        })
        .collect();

    let mut link_performance = LinkPerformance::default();
    for link in links {
        match link.clicks {
            c if c >= HIGH_PERFORMANCE_MIN => link_performance.high += 1,
            c if c >= MEDIUM_PERFORMANCE_MIN => link_performance.medium += 1,
            _ => link_performance.low += 1,
        }
    }

    AnalyticsReport {
        summary: ReportSummary {
            total_links,
            total_clicks,
            average_clicks_per_link,
            total_events,
        },
        devices,
        traffic_sources,
        countries,
        top_links,
        daily_clicks: timeline(daily),
        monthly_clicks: timeline(monthly),
        link_performance,
    }
}

fn timeline(buckets: BTreeMap<String, u64>) -> Vec<TimelinePoint> {
    buckets
        .into_iter()
        .map(|(period, clicks)| TimelinePoint { period, clicks })
        .collect()
}

fn breakdown(counts: Vec<(String, u64)>, total: u64) -> Vec<BreakdownEntry> {
    let only_counts: Vec<u64> = counts.iter().map(|(_, c)| *c).collect();
    let percentages = rounded_percentages(&only_counts, total);

    counts
        .into_iter()
        .zip(percentages)
        .map(|((name, count), percentage)| BreakdownEntry {
            name,
            count,
            percentage,
        })
        .collect()
}

/// Nearest-whole percentages of `total`. If rounding pushes the sum above
/// 100, the rounded-up entries with the smallest fractional parts are taken
/// back down first. A zero total gives all zeros.
pub fn rounded_percentages(counts: &[u64], total: u64) -> Vec<u32> {
    if total == 0 {
        return vec![0; counts.len()];
    }

    // (percentage, remainder); the fractional part is remainder / total
    let mut parts: Vec<(u64, u64)> = counts
        .iter()
        .map(|&c| {
            let scaled = c * 100;
            let (whole, rem) = (scaled / total, scaled % total);
            if rem * 2 >= total {
                (whole + 1, rem)
            } else {
                (whole, rem)
            }
        })
        .collect();

    let mut sum: u64 = parts.iter().map(|(p, _)| p).sum();
    if sum > 100 {
        let mut rounded_up: Vec<usize> = (0..parts.len())
            .filter(|&i| parts[i].1 * 2 >= total && parts[i].1 > 0)
            .collect();
        rounded_up.sort_by_key(|&i| parts[i].1);

        for i in rounded_up {
            if sum <= 100 {
                break;
            }
            parts[i].0 -= 1;
            sum -= 1;
        }
    }

    parts.into_iter().map(|(p, _)| p as u32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Fingerprint;

    fn link(id: i64, code: &str, clicks: i64) -> Link {
        Link {
            id,
            short_code: code.to_string(),
            destination_url: format!("https://example.com/{}", code),
            owner_id: "owner".to_string(),
            name: None,
            created_at: 1_700_000_000 - id,
            clicks,
        }
    }

    fn event(
        link_id: i64,
        clicked_at: i64,
        device_type: DeviceType,
        referrer_category: ReferrerCategory,
        country: &str,
    ) -> ClickEvent {
        ClickEvent {
            id: clicked_at,
            link_id,
            fingerprint: Fingerprint::new("203.0.113.1", "ua"),
            clicked_at,
            device_type,
            browser: "Unknown".to_string(),
            os: "Unknown".to_string(),
            country: country.to_string(),
            city: "Unknown".to_string(),
            referrer: String::new(),
            referrer_category,
        }
    }

    #[test]
    fn test_percentages_round_to_nearest() {
        assert_eq!(rounded_percentages(&[1, 1, 2], 4), vec![25, 25, 50]);
        assert_eq!(rounded_percentages(&[2, 1], 3), vec![67, 33]);
    }

    #[test]
    fn test_percentages_never_exceed_hundred() {
        // 16.67 + 16.67 + 16.67 + 16.67 + 16.67 + 16.67 rounds to 17 * 6 = 102
        let p = rounded_percentages(&[1, 1, 1, 1, 1, 1], 6);
        assert_eq!(p.iter().sum::<u32>(), 100);

        // 33.33 * 3 rounds down already
        let p = rounded_percentages(&[1, 1, 1], 3);
        assert_eq!(p, vec![33, 33, 33]);

        // 12.5 * 8 rounds up to 104
        let p = rounded_percentages(&[1; 8], 8);
        assert!(p.iter().sum::<u32>() <= 100);
    }

    #[test]
    fn test_percentages_zero_total() {
        assert_eq!(rounded_percentages(&[0, 0, 0], 0), vec![0, 0, 0]);
    }

    #[test]
    fn test_empty_report() {
        let report = AnalyticsReport::empty();
        assert_eq!(report.summary, ReportSummary::default());
        assert_eq!(report.devices.len(), 3);
        assert_eq!(report.traffic_sources.len(), 5);
        assert!(report.devices.iter().all(|d| d.count == 0 && d.percentage == 0));
        assert!(report.countries.is_empty());
        assert!(report.top_links.is_empty());
        assert!(report.daily_clicks.is_empty());
    }

    #[test]
    fn test_summary_and_breakdowns() {
        let links = vec![link(2, "bbb", 3), link(1, "aaa", 0)];
        let events = vec![
            event(2, 1_704_067_200, DeviceType::Mobile, ReferrerCategory::Search, "United States"),
            event(2, 1_704_070_800, DeviceType::Desktop, ReferrerCategory::Direct, "United States"),
            event(2, 1_706_745_600, DeviceType::Mobile, ReferrerCategory::SocialMedia, "Germany"),
        ];

        let report = build_report(&links, &events);

        assert_eq!(report.summary.total_links, 2);
        assert_eq!(report.summary.total_clicks, 3);
        assert_eq!(report.summary.average_clicks_per_link, 1.5);
        assert_eq!(report.summary.total_events, 3);

        let names: Vec<&str> = report.traffic_sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Direct", "Social Media", "Email", "Search", "Other"]);

        let mobile = &report.devices[0];
        assert_eq!((mobile.name.as_str(), mobile.count, mobile.percentage), ("Mobile", 2, 67));

        assert_eq!(report.countries[0].name, "United States");
        assert_eq!(report.countries[0].count, 2);

        assert_eq!(
            report.daily_clicks,
            vec![
                TimelinePoint { period: "2024-01-01".to_string(), clicks: 2 },
                TimelinePoint { period: "2024-02-01".to_string(), clicks: 1 },
            ]
        );
        assert_eq!(
            report.monthly_clicks.iter().map(|p| p.period.as_str()).collect::<Vec<_>>(),
            vec!["2024-01", "2024-02"]
        );
    }

    #[test]
    fn test_countries_top_five_ties_by_name() {
        let events: Vec<ClickEvent> = ["Peru", "Chile", "Brazil", "Spain", "Kenya", "Japan", "Japan"]
            .iter()
            .enumerate()
            .map(|(i, c)| event(1, 1_704_067_200 + i as i64, DeviceType::Desktop, ReferrerCategory::Direct, c))
            .collect();

        let report = build_report(&[link(1, "aaa", 7)], &events);
        let names: Vec<&str> = report.countries.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Japan", "Brazil", "Chile", "Kenya", "Peru"]);
    }

    #[test]
    fn test_top_links_stable_and_bands() {
        let links = vec![
            link(4, "ddd", 10),
            link(3, "ccc", 60),
            link(2, "bbb", 10),
            link(1, "aaa", 9),
        ];

        let report = build_report(&links, &[]);
        let codes: Vec<&str> = report.top_links.iter().map(|l| l.short_code.as_str()).collect();
        assert_eq!(codes, vec!["ccc", "ddd", "bbb", "aaa"]);
        assert_eq!(
            report.link_performance,
            LinkPerformance { high: 1, medium: 2, low: 1 }
        );
    }

    #[test]
    fn test_top_links_capped_at_ten() {
        let links: Vec<Link> = (1..=12).map(|i| link(i, &format!("c{i}"), i)).collect();
        let report = build_report(&links, &[]);
        assert_eq!(report.top_links.len(), 10);
        assert_eq!(report.top_links[0].clicks, 12);
    }
}
