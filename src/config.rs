//! Environment-driven configuration

use std::env;
use std::time::Duration;

use crate::services::probe::{DEFAULT_CACHE_TTL, DEFAULT_PROBE_TIMEOUT};

#[derive(Clone, Debug)]
pub struct ObserverConfig {
    /// Ledger registry endpoint serving the gateway listing.
    pub ledger_api_url: String,
    /// Bulk geolocation feed; `None` disables enrichment.
    pub geo_api_url: Option<String>,
    /// Budget for a single probe attempt.
    pub probe_timeout: Duration,
    /// Additional attempts after the first failed probe.
    pub probe_max_retries: u32,
    /// Lifetime of cached probe outcomes.
    pub probe_cache_ttl: Duration,
    /// Upper bound on simultaneous in-flight probe sequences; 0 means
    /// unbounded.
    pub max_concurrent_probes: usize,
}

impl ObserverConfig {
    pub fn from_env() -> Self {
        Self {
            ledger_api_url: env::var("LEDGER_API_URL")
                .unwrap_or_else(|_| "https://api.gatewayexplorer.example/gateways".to_string()),
            geo_api_url: env::var("GEO_API_URL").ok().filter(|url| !url.trim().is_empty()),
            probe_timeout: env_duration_secs("PROBE_TIMEOUT_SECS", DEFAULT_PROBE_TIMEOUT),
            probe_max_retries: env_parse("PROBE_MAX_RETRIES", 3),
            probe_cache_ttl: env_duration_secs("PROBE_CACHE_TTL_SECS", DEFAULT_CACHE_TTL),
            max_concurrent_probes: env_parse("MAX_CONCURRENT_PROBES", 0),
        }
    }
}

fn env_duration_secs(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}
