//! IP geolocation for click enrichment
//!
//! Providers answer lookups for public addresses: an external HTTP API
//! (ip-api.com style JSON) or a local MaxMind City database. `GeoResolver`
//! sits in front of them and owns the policy: private and loopback
//! addresses never reach a provider, each lookup is a single attempt bounded
//! by a timeout, and every failure yields the fixed default location.

use anyhow::{Context, Result};
use async_trait::async_trait;
use ipnet::IpNet;
use maxminddb::{geoip2, Mmap, Reader};
use moka::future::Cache;
use std::net::IpAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analytics::models::GeoLocation;
use crate::config::{GeoIpConfig, GeoIpProviderKind};

const GEOIP_CACHE_TTL_SECS: u64 = 15 * 60;

const PRIVATE_RANGES: [&str; 9] = [
    "0.0.0.0/8",
    "10.0.0.0/8",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
];

/// Raw provider answer. `country` is an ISO code or a name, as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoInfo {
    pub country: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeoError {
    #[error("geolocation is disabled")]
    Disabled,
    #[error("no location data for this address")]
    NotFound,
    #[error("geolocation provider returned HTTP {0}")]
    Status(u16),
    #[error("geolocation provider unavailable: {0}")]
    Upstream(String),
    #[error("geolocation lookup timed out")]
    Timeout,
    #[error("could not decode geolocation response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait GeoIpLookup: Send + Sync {
    async fn lookup(&self, ip: IpAddr) -> Result<GeoInfo, GeoError>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}

/// External HTTP API provider with a result cache.
///
/// Only successful answers are cached; concurrent lookups of the same
/// address share one request.
pub struct ExternalApiProvider {
    client: reqwest::Client,
    api_url_template: String,
    cache: Cache<IpAddr, GeoInfo>,
}

impl ExternalApiProvider {
    /// `api_url_template` uses `{ip}` as the placeholder, e.g.
    /// `http://ip-api.com/json/{ip}?fields=status,countryCode,city`
    pub fn new(api_url_template: &str, timeout: Duration, cache_entries: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build GeoIP HTTP client")?;

        let cache = Cache::builder()
            .max_capacity(cache_entries)
            .time_to_live(Duration::from_secs(GEOIP_CACHE_TTL_SECS))
            .build();

        Ok(Self {
            client,
            api_url_template: api_url_template.to_string(),
            cache,
        })
    }

    async fn fetch(&self, ip: IpAddr) -> Result<GeoInfo, GeoError> {
        let url = self.api_url_template.replace("{ip}", &ip.to_string());

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                GeoError::Timeout
            } else {
                GeoError::Upstream(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeoError::Status(status.as_u16()));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GeoError::Decode(e.to_string()))?;

        // ip-api.com reports failures in-band: {"status": "fail", ...}
        if json["status"].as_str() == Some("fail") {
            return Err(GeoError::NotFound);
        }

        let country = json["countryCode"]
            .as_str()
            .or_else(|| json["country_code"].as_str())
            .or_else(|| json["country"].as_str())
            .filter(|s| !s.is_empty())
            .map(String::from);

        let city = json["city"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(String::from);

        Ok(GeoInfo { country, city })
    }
}

#[async_trait]
impl GeoIpLookup for ExternalApiProvider {
    async fn lookup(&self, ip: IpAddr) -> Result<GeoInfo, GeoError> {
        self.cache
            .try_get_with(ip, self.fetch(ip))
            .await
            .map_err(|e| (*e).clone())
    }

    fn name(&self) -> &'static str {
        "external-api"
    }
}

/// Local MaxMind GeoLite2-City / GeoIP2-City database
pub struct MaxMindProvider {
    city_reader: Arc<Reader<Mmap>>,
}

impl MaxMindProvider {
    pub fn new(city_path: &str) -> Result<Self> {
        // SAFETY: the database file is opened read-only and is not expected
        // to be modified while the process runs.
        let reader = unsafe { Reader::open_mmap(city_path) }
            .with_context(|| format!("Failed to open GeoIP City database at {}", city_path))?;

        Ok(Self {
            city_reader: Arc::new(reader),
        })
    }
}

#[async_trait]
impl GeoIpLookup for MaxMindProvider {
    async fn lookup(&self, ip: IpAddr) -> Result<GeoInfo, GeoError> {
        let result = self
            .city_reader
            .lookup(ip)
            .map_err(|e| GeoError::Decode(e.to_string()))?;

        let city = result
            .decode::<geoip2::City>()
            .map_err(|e| GeoError::Decode(e.to_string()))?
            .ok_or(GeoError::NotFound)?;

        Ok(GeoInfo {
            country: city.country.iso_code.map(|s| s.to_string()),
            city: city.city.names.english.map(|s| s.to_string()),
        })
    }

    fn name(&self) -> &'static str {
        "maxmind"
    }
}

/// Provider used when geolocation is switched off
pub struct DisabledProvider;

#[async_trait]
impl GeoIpLookup for DisabledProvider {
    async fn lookup(&self, _ip: IpAddr) -> Result<GeoInfo, GeoError> {
        Err(GeoError::Disabled)
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

fn private_ranges() -> &'static [IpNet] {
    static RANGES: OnceLock<Vec<IpNet>> = OnceLock::new();
    RANGES.get_or_init(|| {
        PRIVATE_RANGES
            .iter()
            .filter_map(|cidr| cidr.parse().ok())
            .collect()
    })
}

/// Loopback, private, link-local and unspecified addresses, including
/// IPv4-mapped IPv6 forms of them
pub fn is_private_or_local(ip: IpAddr) -> bool {
    let ip = match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    };
    ip.is_unspecified() || private_ranges().iter().any(|net| net.contains(&ip))
}

/// Geolocation policy in front of a provider
#[derive(Clone)]
pub struct GeoResolver {
    provider: Arc<dyn GeoIpLookup>,
    timeout: Duration,
}

impl GeoResolver {
    pub fn new(provider: Arc<dyn GeoIpLookup>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledProvider), Duration::from_millis(1))
    }

    /// Build the configured provider. A MaxMind database that cannot be
    /// opened falls back to the external API.
    pub fn from_config(config: &GeoIpConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.timeout_ms);

        let provider: Arc<dyn GeoIpLookup> = match config.provider {
            GeoIpProviderKind::None => Arc::new(DisabledProvider),
            GeoIpProviderKind::External => Arc::new(ExternalApiProvider::new(
                &config.api_url,
                timeout,
                config.cache_entries,
            )?),
            GeoIpProviderKind::Maxmind => {
                let path = config.city_db_path.as_deref().unwrap_or_default();
                match MaxMindProvider::new(path) {
                    Ok(provider) => Arc::new(provider),
                    Err(e) => {
                        warn!(
                            "GeoIP: failed to load MaxMind database at {}: {:#}, falling back to external API",
                            path, e
                        );
                        Arc::new(ExternalApiProvider::new(
                            &config.api_url,
                            timeout,
                            config.cache_entries,
                        )?)
                    }
                }
            }
        };

        info!("GeoIP: initialized with {} provider", provider.name());
        Ok(Self::new(provider, timeout))
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Resolve a raw client IP string. Never fails: private, unparseable
    /// or unresolvable addresses give `GeoLocation::unknown()`.
    pub async fn resolve(&self, ip: &str) -> GeoLocation {
        let Ok(addr) = ip.trim().parse::<IpAddr>() else {
            debug!(ip, "client ip is not an address, skipping geolocation");
            return GeoLocation::unknown();
        };

        if is_private_or_local(addr) {
            return GeoLocation::unknown();
        }

        match tokio::time::timeout(self.timeout, self.provider.lookup(addr)).await {
            Ok(Ok(info)) => GeoLocation::from_info(info),
            Ok(Err(GeoError::Disabled)) => GeoLocation::unknown(),
            Ok(Err(e)) => {
                debug!(ip, provider = self.provider.name(), error = %e, "geolocation lookup failed");
                GeoLocation::unknown()
            }
            Err(_) => {
                warn!(ip, provider = self.provider.name(), timeout_ms = self.timeout.as_millis() as u64, "geolocation lookup timed out");
                GeoLocation::unknown()
            }
        }
    }
}
