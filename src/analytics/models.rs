//! Data models for analytics

use serde::{Deserialize, Serialize};

use crate::analytics::geoip::GeoInfo;
use crate::models::{DeviceType, ReferrerCategory};

pub const UNKNOWN_LOCATION: &str = "Unknown";

/// Resolved location stored with a click event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Country name, or the provider's code when it has no known name
    pub country: String,
    pub city: String,
}

impl GeoLocation {
    pub fn unknown() -> Self {
        Self {
            country: UNKNOWN_LOCATION.to_string(),
            city: UNKNOWN_LOCATION.to_string(),
        }
    }

    pub fn from_info(info: GeoInfo) -> Self {
        let country = info
            .country
            .map(|c| country_name(&c).map(str::to_string).unwrap_or(c))
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());
        let city = info
            .city
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());
        Self { country, city }
    }
}

impl Default for GeoLocation {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Display names for the most common ISO 3166-1 alpha-2 codes
pub fn country_name(code: &str) -> Option<&'static str> {
    let name = match code.to_ascii_uppercase().as_str() {
        "US" => "United States",
        "GB" => "United Kingdom",
        "CA" => "Canada",
        "AU" => "Australia",
        "DE" => "Germany",
        "FR" => "France",
        "IN" => "India",
        "JP" => "Japan",
        "BR" => "Brazil",
        "NG" => "Nigeria",
        "CN" => "China",
        "NL" => "Netherlands",
        "ES" => "Spain",
        "IT" => "Italy",
        "MX" => "Mexico",
        _ => return None,
    };
    Some(name)
}

/// Everything derived from a request besides the fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub device_type: DeviceType,
    pub browser: String,
    pub os: String,
    pub location: GeoLocation,
    pub referrer_category: ReferrerCategory,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_links: u64,
    /// Sum of the links' click counters
    pub total_clicks: i64,
    pub average_clicks_per_link: f64,
    /// Click events in the requested time range
    pub total_events: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub name: String,
    pub count: u64,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopLink {
    pub short_code: String,
    pub name: Option<String>,
    pub destination_url: String,
    pub clicks: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePoint {
    /// `YYYY-MM-DD` for daily buckets, `YYYY-MM` for monthly ones
    pub period: String,
    pub clicks: u64,
}

/// Link counts by lifetime clicks: high > 50, medium 10..=50, low < 10
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPerformance {
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub summary: ReportSummary,
    pub devices: Vec<BreakdownEntry>,
    pub traffic_sources: Vec<BreakdownEntry>,
    pub countries: Vec<BreakdownEntry>,
    pub top_links: Vec<TopLink>,
    pub daily_clicks: Vec<TimelinePoint>,
    pub monthly_clicks: Vec<TimelinePoint>,
    pub link_performance: LinkPerformance,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_code_maps_to_name() {
        let location = GeoLocation::from_info(GeoInfo {
            country: Some("gb".to_string()),
            city: Some("London".to_string()),
        });
        assert_eq!(location.country, "United Kingdom");
        assert_eq!(location.city, "London");
    }

    #[test]
    fn test_unmapped_code_passes_through() {
        let location = GeoLocation::from_info(GeoInfo {
            country: Some("KE".to_string()),
            city: None,
        });
        assert_eq!(location.country, "KE");
        assert_eq!(location.city, UNKNOWN_LOCATION);
    }

    #[test]
    fn test_empty_info_is_unknown() {
        assert_eq!(GeoLocation::from_info(GeoInfo::default()), GeoLocation::unknown());
    }
}
