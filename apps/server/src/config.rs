//! Environment-driven server configuration.

use std::time::Duration;

use bioquest_inat::{DEFAULT_BASE_URL, DEFAULT_REQUESTS_PER_MINUTE};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8088";
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_RECOMMENDATION_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_CACHE_SWEEP_SECS: u64 = 60 * 60;
const DEFAULT_SYNC_PAGE_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub data_dir: String,
    pub inat_api_url: String,
    /// Serve fixture data instead of calling iNaturalist.
    pub mock_mode: bool,
    pub requests_per_minute: u32,
    pub recommendation_ttl: Duration,
    pub cache_sweep_interval: Duration,
    pub sync_page_delay: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let secs = |key: &str, default: u64| {
            get(key)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        };

        let forced_mock = get("BIOQUEST_MOCK_MODE")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            listen_addr: get("BIOQUEST_LISTEN_ADDR")
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            data_dir: get("BIOQUEST_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            inat_api_url: get("INAT_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            mock_mode: forced_mock || get("INAT_CLIENT_ID").is_none(),
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            recommendation_ttl: Duration::from_secs(secs(
                "BIOQUEST_RECOMMENDATION_TTL_SECS",
                DEFAULT_RECOMMENDATION_TTL_SECS,
            )),
            cache_sweep_interval: Duration::from_secs(
                secs("BIOQUEST_CACHE_SWEEP_SECS", DEFAULT_CACHE_SWEEP_SECS).max(1),
            ),
            sync_page_delay: Duration::from_millis(secs(
                "BIOQUEST_SYNC_PAGE_DELAY_MS",
                DEFAULT_SYNC_PAGE_DELAY_MS,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_fall_back_to_mock_mode() {
        let cfg = config(&[]);
        assert_eq!(cfg.listen_addr, "0.0.0.0:8088");
        assert_eq!(cfg.data_dir, "./data");
        assert_eq!(cfg.inat_api_url, DEFAULT_BASE_URL);
        assert!(cfg.mock_mode);
        assert_eq!(cfg.recommendation_ttl, Duration::from_secs(86_400));
        assert_eq!(cfg.cache_sweep_interval, Duration::from_secs(3_600));
        assert_eq!(cfg.sync_page_delay, Duration::from_millis(500));
    }

    #[test]
    fn client_id_enables_the_real_source_unless_forced() {
        let cfg = config(&[
            ("INAT_CLIENT_ID", "abc"),
            ("INAT_API_URL", " https://example.test/v1/ "),
            ("BIOQUEST_SYNC_PAGE_DELAY_MS", "0"),
            ("BIOQUEST_DATA_DIR", "  "),
        ]);
        assert!(!cfg.mock_mode);
        assert_eq!(cfg.inat_api_url, "https://example.test/v1");
        assert_eq!(cfg.sync_page_delay, Duration::ZERO);
        assert_eq!(cfg.data_dir, "./data");

        let forced = config(&[("INAT_CLIENT_ID", "abc"), ("BIOQUEST_MOCK_MODE", "TRUE")]);
        assert!(forced.mock_mode);
    }

    #[test]
    fn unparsable_numbers_use_defaults() {
        let cfg = config(&[("BIOQUEST_CACHE_SWEEP_SECS", "soon")]);
        assert_eq!(cfg.cache_sweep_interval, Duration::from_secs(3_600));
    }
}
