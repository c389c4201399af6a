//! User-agent parsing into device type, browser and OS
//!
//! Browser and OS names come from woothee. Device type combines woothee's
//! category with keyword patterns, because woothee reports tablets as
//! smartphones. Anything unrecognised is a Desktop with Unknown names.

use woothee::parser::Parser;

use crate::models::DeviceType;

pub const UNKNOWN: &str = "Unknown";

const TABLET_PATTERNS: [&str; 5] = ["ipad", "tablet", "kindle", "silk/", "playbook"];
const MOBILE_PATTERNS: [&str; 7] = [
    "mobile",
    "iphone",
    "ipod",
    "android",
    "blackberry",
    "opera mini",
    "windows phone",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_type: DeviceType,
    pub browser: String,
    pub os: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            device_type: DeviceType::Desktop,
            browser: UNKNOWN.to_string(),
            os: UNKNOWN.to_string(),
        }
    }
}

fn known(value: &str) -> String {
    if value.is_empty() || value == "UNKNOWN" {
        UNKNOWN.to_string()
    } else {
        value.to_string()
    }
}

pub fn parse_user_agent(user_agent: &str) -> DeviceInfo {
    if user_agent.trim().is_empty() {
        return DeviceInfo::default();
    }

    let parsed = Parser::new().parse(user_agent);
    let category = parsed.as_ref().map(|r| r.category).unwrap_or_default();

    DeviceInfo {
        device_type: classify_device(user_agent, category),
        browser: parsed.as_ref().map(|r| known(r.name)).unwrap_or_else(|| known("")),
        os: parsed.as_ref().map(|r| known(r.os)).unwrap_or_else(|| known("")),
    }
}

fn classify_device(user_agent: &str, category: &str) -> DeviceType {
    let ua = user_agent.to_ascii_lowercase();

    if TABLET_PATTERNS.iter().any(|p| ua.contains(p))
        || (ua.contains("android") && !ua.contains("mobile"))
    {
        return DeviceType::Tablet;
    }

    if matches!(category, "smartphone" | "mobilephone")
        || MOBILE_PATTERNS.iter().any(|p| ua.contains(p))
    {
        return DeviceType::Mobile;
    }

    DeviceType::Desktop
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const SAFARI_IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const ANDROID_PHONE: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";
    const ANDROID_TABLET: &str = "Mozilla/5.0 (Linux; Android 13; SM-X700) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    #[test]
    fn test_desktop_chrome() {
        let info = parse_user_agent(CHROME_WINDOWS);
        assert_eq!(info.device_type, DeviceType::Desktop);
        assert_eq!(info.browser, "Chrome");
        assert!(info.os.starts_with("Windows"), "got {}", info.os);
    }

    #[test]
    fn test_iphone_is_mobile() {
        let info = parse_user_agent(SAFARI_IPHONE);
        assert_eq!(info.device_type, DeviceType::Mobile);
        assert_eq!(info.browser, "Safari");
    }

    #[test]
    fn test_ipad_is_tablet() {
        assert_eq!(parse_user_agent(SAFARI_IPAD).device_type, DeviceType::Tablet);
    }

    #[test]
    fn test_android_phone_and_tablet() {
        assert_eq!(parse_user_agent(ANDROID_PHONE).device_type, DeviceType::Mobile);
        assert_eq!(parse_user_agent(ANDROID_TABLET).device_type, DeviceType::Tablet);
    }

    #[test]
    fn test_unparseable_defaults_to_desktop() {
        let info = parse_user_agent("X");
        assert_eq!(info.device_type, DeviceType::Desktop);
        assert_eq!(info.browser, UNKNOWN);
        assert_eq!(info.os, UNKNOWN);
    }

    #[test]
    fn test_empty_user_agent() {
        assert_eq!(parse_user_agent(""), DeviceInfo::default());
        assert_eq!(parse_user_agent("   "), DeviceInfo::default());
    }
}
