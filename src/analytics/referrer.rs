//! Referrer → traffic source classification

use std::net::IpAddr;
use url::Url;

use crate::models::ReferrerCategory;

const SEARCH_KEYWORDS: [&str; 3] = ["google", "bing", "yahoo"];
const SOCIAL_KEYWORDS: [&str; 6] = [
    "facebook",
    "twitter",
    "instagram",
    "linkedin",
    "tiktok",
    "youtube",
];
const EMAIL_KEYWORDS: [&str; 3] = ["gmail", "outlook", "mail"];

/// Classifies referrers into traffic sources.
///
/// Referrals from local hosts, and from the service's own public hosts, are
/// collapsed into `Direct`.
#[derive(Debug, Clone, Default)]
pub struct ReferrerClassifier {
    self_hosts: Vec<String>,
}

impl ReferrerClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat referrals from these hosts (or from the hosts of these URLs)
    /// as self-referrals
    pub fn with_self_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let self_hosts = hosts
            .into_iter()
            .filter_map(|h| {
                let h = h.as_ref().trim();
                match Url::parse(h) {
                    Ok(url) => url.host_str().map(str::to_ascii_lowercase),
                    Err(_) => (!h.is_empty()).then(|| h.to_ascii_lowercase()),
                }
            })
            .collect();
        Self { self_hosts }
    }

    pub fn classify(&self, referrer: Option<&str>) -> ReferrerCategory {
        let Some(raw) = referrer.map(str::trim).filter(|r| !r.is_empty()) else {
            return ReferrerCategory::Direct;
        };

        let Ok(url) = Url::parse(raw) else {
            return ReferrerCategory::Direct;
        };

        let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
            return ReferrerCategory::Direct;
        };

        if is_local_host(&host) || self.self_hosts.iter().any(|h| *h == host) {
            return ReferrerCategory::Direct;
        }

        classify_host(&host)
    }
}

/// Classify a referrer with no self-hosts configured
pub fn classify_referrer(referrer: Option<&str>) -> ReferrerCategory {
    ReferrerClassifier::new().classify(referrer)
}

fn is_local_host(host: &str) -> bool {
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    let bare = host.trim_start_matches('[').trim_end_matches(']');
    bare.parse::<IpAddr>()
        .map(|ip| ip.is_loopback() || ip.is_unspecified())
        .unwrap_or(false)
}

fn classify_host(host: &str) -> ReferrerCategory {
    let matches = |keywords: &[&str]| keywords.iter().any(|k| host.contains(k));

    if matches(&SEARCH_KEYWORDS) {
        ReferrerCategory::Search
    } else if matches(&SOCIAL_KEYWORDS) {
        ReferrerCategory::SocialMedia
    } else if matches(&EMAIL_KEYWORDS) {
        ReferrerCategory::Email
    } else {
        ReferrerCategory::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documented_examples() {
        assert_eq!(
            classify_referrer(Some("https://www.google.com/search?q=x")),
            ReferrerCategory::Search
        );
        assert_eq!(classify_referrer(Some("")), ReferrerCategory::Direct);
        assert_eq!(classify_referrer(None), ReferrerCategory::Direct);
        assert_eq!(
            classify_referrer(Some("https://facebook.com/some/post")),
            ReferrerCategory::SocialMedia
        );
        assert_eq!(
            classify_referrer(Some("http://localhost:3000/")),
            ReferrerCategory::Direct
        );
        assert_eq!(
            classify_referrer(Some("https://random-blog.example.com")),
            ReferrerCategory::Other
        );
    }

    #[test]
    fn test_unparseable_referrer_is_direct() {
        assert_eq!(classify_referrer(Some("not a url")), ReferrerCategory::Direct);
        assert_eq!(classify_referrer(Some("google.com")), ReferrerCategory::Direct);
    }

    #[test]
    fn test_loopback_addresses_are_direct() {
        for referrer in [
            "http://127.0.0.1:8080/page",
            "http://[::1]:3000/",
            "http://0.0.0.0/",
            "http://app.localhost/",
        ] {
            assert_eq!(
                classify_referrer(Some(referrer)),
                ReferrerCategory::Direct,
                "{referrer}"
            );
        }
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(
            classify_referrer(Some("https://WWW.BING.COM/")),
            ReferrerCategory::Search
        );
        assert_eq!(
            classify_referrer(Some("https://m.YouTube.com/watch")),
            ReferrerCategory::SocialMedia
        );
    }

    #[test]
    fn test_search_takes_precedence_over_email() {
        // "mail.google.com" contains both "google" and "mail"
        assert_eq!(
            classify_referrer(Some("https://mail.google.com/mail/u/0/")),
            ReferrerCategory::Search
        );
        assert_eq!(
            classify_referrer(Some("https://outlook.live.com/")),
            ReferrerCategory::Email
        );
        assert_eq!(
            classify_referrer(Some("https://mail.proton.me/")),
            ReferrerCategory::Email
        );
    }

    #[test]
    fn test_self_referral_collapses_to_direct() {
        let classifier = ReferrerClassifier::with_self_hosts(["https://sho.rt", "links.example.org"]);
        assert_eq!(
            classifier.classify(Some("https://sho.rt/abc")),
            ReferrerCategory::Direct
        );
        assert_eq!(
            classifier.classify(Some("https://links.example.org/x")),
            ReferrerCategory::Direct
        );
        assert_eq!(
            classifier.classify(Some("https://other.example.org/x")),
            ReferrerCategory::Other
        );
    }
}
