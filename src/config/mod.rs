use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub redirect_server: ServerConfig,
    pub redirect: RedirectConfig,
    pub cache: CacheConfig,
    pub geoip: GeoIpConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectConfig {
    /// Where visitors land when a short code cannot be resolved
    pub fallback_url: String,
    /// HTTP status used for redirects (301, 302, 303, 307 or 308)
    pub status_code: u16,
    /// Public base URL of the redirect server. Its host counts as a
    /// self-referral when classifying referrers.
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: u64,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoIpProviderKind {
    External,
    Maxmind,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoIpConfig {
    pub provider: GeoIpProviderKind,
    /// URL template for the external provider, `{ip}` is substituted
    pub api_url: String,
    /// Path to a GeoLite2-City / GeoIP2-City .mmdb file
    pub city_db_path: Option<String>,
    pub timeout_ms: u64,
    pub cache_entries: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Header set by the upstream auth layer carrying the caller's owner id
    pub owner_header: String,
}

impl RedirectConfig {
    pub const SUPPORTED_STATUS_CODES: [u16; 5] = [301, 302, 303, 307, 308];

    const fn default_status_code() -> u16 {
        302
    }

    /// Whether the fallback lands on the redirect server's own root, which
    /// serves the health check rather than a home page
    pub fn fallback_hits_health_check(&self) -> bool {
        let fallback = self.fallback_url.trim().trim_end_matches('/');
        fallback.is_empty()
            || self
                .public_base_url
                .as_deref()
                .map(|base| base.trim().trim_end_matches('/'))
                .is_some_and(|base| base.eq_ignore_ascii_case(fallback))
    }
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            fallback_url: "/".to_string(),
            status_code: Self::default_status_code(),
            public_base_url: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl_secs: 300,
        }
    }
}

impl GeoIpConfig {
    pub const DEFAULT_API_URL: &'static str =
        "http://ip-api.com/json/{ip}?fields=status,countryCode,city";
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            provider: GeoIpProviderKind::External,
            api_url: Self::DEFAULT_API_URL.to_string(),
            city_db_path: None,
            timeout_ms: 1500,
            cache_entries: 10_000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            owner_header: "x-user-id".to_string(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend = match env_or("DATABASE_BACKEND", "sqlite").to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url = env_or("DATABASE_URL", "sqlite://./linkmeter.db?mode=rwc");
        let max_connections = env_parse("DATABASE_MAX_CONNECTIONS", 10u32)?;

        let api_host = env_or("API_HOST", "127.0.0.1");
        let api_port = env_parse("API_PORT", 8080u16)?;

        let redirect_host = env_or("REDIRECT_HOST", "127.0.0.1");
        let redirect_port = env_parse("REDIRECT_PORT", 3000u16)?;

        let redirect_defaults = RedirectConfig::default();
        let mut status_code = env_parse("REDIRECT_STATUS", redirect_defaults.status_code)?;
        if !RedirectConfig::SUPPORTED_STATUS_CODES.contains(&status_code) {
            tracing::warn!(
                "Unsupported REDIRECT_STATUS '{status_code}', falling back to 302. Supported values: 301, 302, 303, 307, 308"
            );
            status_code = RedirectConfig::default_status_code();
        }

        let cache_defaults = CacheConfig::default();
        let geoip_defaults = GeoIpConfig::default();

        let provider = match env_or("GEOIP_PROVIDER", "external").to_lowercase().as_str() {
            "external" | "api" => GeoIpProviderKind::External,
            "maxmind" | "mmdb" => GeoIpProviderKind::Maxmind,
            "none" | "disabled" => GeoIpProviderKind::None,
            other => {
                tracing::warn!(
                    "Unknown GEOIP_PROVIDER '{other}', falling back to 'external'. Supported values: external, maxmind, none"
                );
                GeoIpProviderKind::External
            }
        };

        let city_db_path = std::env::var("GEOIP_CITY_DB_PATH").ok();
        if provider == GeoIpProviderKind::Maxmind && city_db_path.is_none() {
            anyhow::bail!("GEOIP_CITY_DB_PATH must be set when GEOIP_PROVIDER=maxmind");
        }

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            redirect_server: ServerConfig {
                host: redirect_host,
                port: redirect_port,
            },
            redirect: RedirectConfig {
                fallback_url: env_or("FALLBACK_URL", &redirect_defaults.fallback_url),
                status_code,
                public_base_url: std::env::var("PUBLIC_BASE_URL").ok(),
            },
            cache: CacheConfig {
                max_entries: env_parse("CACHE_MAX_ENTRIES", cache_defaults.max_entries)?,
                ttl_secs: env_parse("CACHE_TTL_SECS", cache_defaults.ttl_secs)?,
            },
            geoip: GeoIpConfig {
                provider,
                api_url: env_or("GEOIP_API_URL", &geoip_defaults.api_url),
                city_db_path,
                timeout_ms: env_parse("GEOIP_TIMEOUT_MS", geoip_defaults.timeout_ms)?,
                cache_entries: env_parse("GEOIP_CACHE_ENTRIES", geoip_defaults.cache_entries)?,
            },
            auth: AuthConfig {
                owner_header: env_or("OWNER_HEADER", &AuthConfig::default().owner_header)
                    .to_lowercase(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redirect(fallback: &str, public_base_url: Option<&str>) -> RedirectConfig {
        RedirectConfig {
            fallback_url: fallback.to_string(),
            public_base_url: public_base_url.map(str::to_string),
            ..RedirectConfig::default()
        }
    }

    #[test]
    fn test_default_fallback_hits_health_check() {
        assert!(RedirectConfig::default().fallback_hits_health_check());
    }

    #[test]
    fn test_public_base_root_fallback_hits_health_check() {
        assert!(redirect("https://sho.rt/", Some("https://sho.rt")).fallback_hits_health_check());
        assert!(redirect("https://SHO.rt", Some("https://sho.rt/")).fallback_hits_health_check());
    }

    #[test]
    fn test_home_page_fallback_is_fine() {
        assert!(!redirect("https://example.org/", Some("https://sho.rt")).fallback_hits_health_check());
        assert!(!redirect("https://sho.rt/welcome", Some("https://sho.rt")).fallback_hits_health_check());
        assert!(!redirect("https://example.org", None).fallback_hits_health_check());
    }
}
