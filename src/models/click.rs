use serde::{Deserialize, Serialize};
use std::fmt;

/// Visitor identity used for deduplication: the exact client IP and the
/// exact user-agent string. Two requests are the same visitor only if both
/// match byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub ip_address: String,
    pub user_agent: String,
}

impl Fingerprint {
    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            user_agent: user_agent.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Mobile,
    Desktop,
    Tablet,
    Unknown,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "Mobile",
            DeviceType::Desktop => "Desktop",
            DeviceType::Tablet => "Tablet",
            DeviceType::Unknown => "Unknown",
        }
    }

    /// Parse a stored value; anything unrecognised becomes `Unknown`
    pub fn from_stored(value: &str) -> Self {
        match value {
            "Mobile" => DeviceType::Mobile,
            "Desktop" => DeviceType::Desktop,
            "Tablet" => DeviceType::Tablet,
            _ => DeviceType::Unknown,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferrerCategory {
    Direct,
    Search,
    #[serde(rename = "Social Media")]
    SocialMedia,
    Email,
    Other,
}

impl ReferrerCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferrerCategory::Direct => "Direct",
            ReferrerCategory::Search => "Search",
            ReferrerCategory::SocialMedia => "Social Media",
            ReferrerCategory::Email => "Email",
            ReferrerCategory::Other => "Other",
        }
    }

    /// Parse a stored value; anything unrecognised becomes `Other`
    pub fn from_stored(value: &str) -> Self {
        match value {
            "Direct" => ReferrerCategory::Direct,
            "Search" => ReferrerCategory::Search,
            "Social Media" => ReferrerCategory::SocialMedia,
            "Email" => ReferrerCategory::Email,
            _ => ReferrerCategory::Other,
        }
    }
}

impl fmt::Display for ReferrerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A click accepted by the deduplicator, before it has been stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewClickEvent {
    pub link_id: i64,
    pub fingerprint: Fingerprint,
    pub clicked_at: i64,
    pub device_type: DeviceType,
    pub browser: String,
    pub os: String,
    pub country: String,
    pub city: String,
    pub referrer: String,
    pub referrer_category: ReferrerCategory,
}

/// Stored, immutable click record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClickEvent {
    pub id: i64,
    pub link_id: i64,
    pub fingerprint: Fingerprint,
    pub clicked_at: i64,
    pub device_type: DeviceType,
    pub browser: String,
    pub os: String,
    pub country: String,
    pub city: String,
    pub referrer: String,
    pub referrer_category: ReferrerCategory,
}

/// Row shape shared by the SQL backends
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ClickEventRow {
    pub id: i64,
    pub link_id: i64,
    pub ip_address: String,
    pub user_agent: String,
    pub clicked_at: i64,
    pub device_type: String,
    pub browser: String,
    pub os: String,
    pub country: String,
    pub city: String,
    pub referrer: String,
    pub referrer_category: String,
}

impl From<ClickEventRow> for ClickEvent {
    fn from(row: ClickEventRow) -> Self {
        Self {
            id: row.id,
            link_id: row.link_id,
            fingerprint: Fingerprint::new(row.ip_address, row.user_agent),
            clicked_at: row.clicked_at,
            device_type: DeviceType::from_stored(&row.device_type),
            browser: row.browser,
            os: row.os,
            country: row.country,
            city: row.city,
            referrer: row.referrer,
            referrer_category: ReferrerCategory::from_stored(&row.referrer_category),
        }
    }
}
