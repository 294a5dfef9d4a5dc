//! Data models for the gateway observatory backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Membership state recorded on the network ledger.
///
/// Anything other than `joined`/`leaving` is preserved verbatim so the
/// status resolver can surface unexpected registry values instead of
/// coercing them silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LedgerStatus {
    Joined,
    Leaving,
    Other(String),
}

impl From<String> for LedgerStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "joined" => LedgerStatus::Joined,
            "leaving" => LedgerStatus::Leaving,
            _ => LedgerStatus::Other(raw),
        }
    }
}

impl From<LedgerStatus> for String {
    fn from(status: LedgerStatus) -> Self {
        match status {
            LedgerStatus::Joined => "joined".to_string(),
            LedgerStatus::Leaving => "leaving".to_string(),
            LedgerStatus::Other(raw) => raw,
        }
    }
}

/// Operational status derived from ledger status plus probe evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedStatus {
    Ok,
    Offline,
    Unknown,
}

impl ResolvedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolvedStatus::Ok => "ok",
            ResolvedStatus::Offline => "offline",
            ResolvedStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ResolvedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which gateway endpoint a probe targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    Info,
    Healthcheck,
}

impl EndpointKind {
    pub fn path(&self) -> &'static str {
        match self {
            EndpointKind::Info => "/ar-io/info",
            EndpointKind::Healthcheck => "/ar-io/healthcheck",
        }
    }
}

/// Outcome of a single HTTP probe, transient per address + endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// The gateway answered; payload is present when the body was JSON.
    Http { status: u16, payload: Option<Value> },
    Timeout,
    SslError,
    NetworkError,
    NoResponse,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Http { status, .. } if (200..300).contains(status))
    }

    /// Terminal failures are never retried: a timeout already consumed the
    /// full per-attempt budget and TLS failures are deterministic.
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, ProbeOutcome::Timeout | ProbeOutcome::SslError)
    }
}

/// Geolocation attributes for a gateway. All fields are best-effort.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoInfo {
    pub ip: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub isp: String,
    pub org: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Canonical gateway entity, one per network participant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Gateway {
    /// Probe base URL derived from protocol/fqdn/port; empty when the
    /// record carried no usable settings.
    pub address: String,
    /// Hostname parsed from `address`, or the raw string when parsing fails.
    pub domain: String,
    pub label: String,
    pub note: String,
    pub wallet_owner: String,
    pub wallet_observer: String,
    pub properties_id: String,
    pub ledger_status: LedgerStatus,
    pub resolved_status: ResolvedStatus,
    /// Version tag discovered from the info endpoint, `unknown` otherwise.
    pub release: String,
    pub minimum_delegated_stake: u64,
    pub reward_auto_stake: bool,
    pub delegated_staking: bool,
    pub reward_share_ratio: f64,
    pub geo: GeoInfo,
}

/// Immutable result of one pipeline run. Consumers receive clones; a
/// refresh replaces the whole snapshot rather than mutating it in place.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySnapshot {
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub gateways: Vec<Gateway>,
}

impl GatewaySnapshot {
    pub fn new(gateways: Vec<Gateway>) -> Self {
        Self {
            generated_at: Utc::now(),
            total: gateways.len(),
            gateways,
        }
    }
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}
