//! Record normalization
//!
//! The registry has served two schemas over its lifetime: a legacy
//! flat-key export and the nested ledger/SDK shape. Both are mapped into
//! the one canonical [`Gateway`] entity here. Normalization never fails;
//! any absent field takes a documented default instead.

use serde::Deserialize;
use serde_json::Value;

use crate::models::{Gateway, GeoInfo, LedgerStatus, ProbeOutcome};
use crate::status;

/// Tagged union of the two known raw schemas.
///
/// The ledger variant is distinguished by its mandatory `settings`
/// object; everything in the legacy variant is optional, so it must stay
/// the last candidate.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawGatewayRecord {
    Ledger(LedgerRecord),
    Legacy(LegacyRecord),
}

/// Nested ledger/SDK schema.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    pub settings: GatewaySettings,
    #[serde(default)]
    pub gateway_address: Option<String>,
    #[serde(default)]
    pub observer_address: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub info: Option<Value>,
    #[serde(default)]
    pub healthcheck: Option<Value>,
    #[serde(default)]
    pub ipgeo: Option<RawGeo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySettings {
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub fqdn: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub properties: Option<String>,
    #[serde(default)]
    pub min_delegated_stake: Option<Value>,
    #[serde(default)]
    pub auto_stake: Option<Value>,
    #[serde(default)]
    pub allow_delegated_staking: Option<Value>,
    #[serde(default)]
    pub delegate_reward_share_ratio: Option<Value>,
}

/// Legacy flat-key schema. Field names carry both the historical
/// display-style keys and their camelCase successors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyRecord {
    #[serde(rename = "Label", alias = "label", default)]
    pub label: Option<String>,
    #[serde(rename = "Address", alias = "address", default)]
    pub address: Option<String>,
    #[serde(rename = "Owner Wallet", alias = "wallet", default)]
    pub owner_wallet: Option<String>,
    #[serde(rename = "Observer Wallet", alias = "observerWallet", default)]
    pub observer_wallet: Option<String>,
    #[serde(rename = "Properties ID", alias = "propertiesId", default)]
    pub properties_id: Option<String>,
    #[serde(rename = "Status", alias = "status", default)]
    pub status: Option<String>,
    #[serde(
        rename = "Minimum Delegated Stake (ARIO)",
        alias = "minimumDelegatedStake",
        alias = "stake",
        default
    )]
    pub minimum_delegated_stake: Option<Value>,
    #[serde(rename = "Reward Auto Stake", alias = "rewardAutoStake", default)]
    pub reward_auto_stake: Option<Value>,
    #[serde(rename = "Delegated Staking", alias = "delegatedStaking", default)]
    pub delegated_staking: Option<Value>,
    #[serde(rename = "Reward Share Ratio", alias = "rewardShareRatio", default)]
    pub reward_share_ratio: Option<Value>,
    #[serde(rename = "Note", alias = "note", default)]
    pub note: Option<String>,
    #[serde(default)]
    pub info: Option<Value>,
    #[serde(default)]
    pub healthcheck: Option<Value>,
    #[serde(default)]
    pub ipgeo: Option<RawGeo>,
}

/// Raw geolocation blob as the registry embeds it. Two layouts exist: a
/// flat one and one nested under `location`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGeo {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(rename = "regionName", alias = "region", default)]
    pub region: Option<String>,
    #[serde(default)]
    pub isp: Option<String>,
    #[serde(default)]
    pub org: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub location: Option<RawGeoLocation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGeoLocation {
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub state_prov: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub latitude: Option<Value>,
    #[serde(default)]
    pub longitude: Option<Value>,
}

/// Map one raw record into exactly one canonical gateway.
pub fn normalize(raw: &RawGatewayRecord) -> Gateway {
    match raw {
        RawGatewayRecord::Ledger(record) => normalize_ledger(record),
        RawGatewayRecord::Legacy(record) => normalize_legacy(record),
    }
}

fn normalize_ledger(record: &LedgerRecord) -> Gateway {
    let settings = &record.settings;
    let address = derive_address(settings);
    let domain = derive_domain(&address);
    let ledger_status =
        LedgerStatus::from(record.status.clone().unwrap_or_else(|| "unknown".to_string()));

    let info_probe = embedded_probe(record.info.as_ref());
    let health_probe = embedded_probe(record.healthcheck.as_ref());
    let resolved_status = status::resolve(
        &ledger_status,
        info_probe.as_ref(),
        health_probe.as_ref(),
        !address.is_empty(),
    );

    Gateway {
        release: release_from_info(record.info.as_ref()),
        label: settings.label.clone().unwrap_or_else(|| "Unknown".to_string()),
        note: settings.note.clone().unwrap_or_else(|| "Unknown".to_string()),
        wallet_owner: record.gateway_address.clone().unwrap_or_default(),
        wallet_observer: record.observer_address.clone().unwrap_or_default(),
        properties_id: settings.properties.clone().unwrap_or_default(),
        minimum_delegated_stake: coerce_u64(settings.min_delegated_stake.as_ref()),
        reward_auto_stake: coerce_bool(settings.auto_stake.as_ref()),
        delegated_staking: coerce_bool(settings.allow_delegated_staking.as_ref()),
        reward_share_ratio: coerce_f64(settings.delegate_reward_share_ratio.as_ref()),
        geo: map_geo(record.ipgeo.as_ref()),
        address,
        domain,
        ledger_status,
        resolved_status,
    }
}

fn normalize_legacy(record: &LegacyRecord) -> Gateway {
    let address = record.address.clone().unwrap_or_default();
    let domain = derive_domain(&address);
    let ledger_status =
        LedgerStatus::from(record.status.clone().unwrap_or_else(|| "unknown".to_string()));

    let info_probe = embedded_probe(record.info.as_ref());
    let health_probe = embedded_probe(record.healthcheck.as_ref());
    let resolved_status = status::resolve(
        &ledger_status,
        info_probe.as_ref(),
        health_probe.as_ref(),
        !address.is_empty(),
    );

    Gateway {
        release: release_from_info(record.info.as_ref()),
        label: record.label.clone().unwrap_or_else(|| "Unknown".to_string()),
        note: record.note.clone().unwrap_or_else(|| "Unknown".to_string()),
        wallet_owner: record.owner_wallet.clone().unwrap_or_default(),
        wallet_observer: record.observer_wallet.clone().unwrap_or_default(),
        properties_id: record.properties_id.clone().unwrap_or_default(),
        minimum_delegated_stake: coerce_u64(record.minimum_delegated_stake.as_ref()),
        reward_auto_stake: coerce_bool(record.reward_auto_stake.as_ref()),
        delegated_staking: coerce_bool(record.delegated_staking.as_ref()),
        reward_share_ratio: coerce_f64(record.reward_share_ratio.as_ref()),
        geo: map_geo(record.ipgeo.as_ref()),
        address,
        domain,
        ledger_status,
        resolved_status,
    }
}

/// `protocol://fqdn:port`, empty when the settings carry no fqdn.
fn derive_address(settings: &GatewaySettings) -> String {
    match settings.fqdn.as_deref() {
        Some(fqdn) if !fqdn.is_empty() => {
            let protocol = settings.protocol.as_deref().unwrap_or("https");
            let port = settings.port.unwrap_or(443);
            format!("{protocol}://{fqdn}:{port}")
        }
        _ => String::new(),
    }
}

/// Hostname of the address, falling back to the raw string when the
/// address is not a parseable URL.
fn derive_domain(address: &str) -> String {
    if address.is_empty() {
        return String::new();
    }
    reqwest::Url::parse(address)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| address.to_string())
}

/// An embedded, non-null info/healthcheck object means the upstream
/// collector reached the endpoint; treat it as a successful probe whose
/// payload is the object itself.
fn embedded_probe(value: Option<&Value>) -> Option<ProbeOutcome> {
    match value {
        Some(Value::Null) | None => None,
        Some(payload) => Some(ProbeOutcome::Http {
            status: 200,
            payload: Some(payload.clone()),
        }),
    }
}

fn release_from_info(info: Option<&Value>) -> String {
    info.and_then(|v| v.get("release"))
        .map(|release| match release {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn map_geo(raw: Option<&RawGeo>) -> GeoInfo {
    let Some(raw) = raw else {
        return GeoInfo::default();
    };
    let location = raw.location.as_ref();

    GeoInfo {
        ip: raw.ip.clone().unwrap_or_default(),
        country: location
            .and_then(|l| l.country_name.clone())
            .or_else(|| raw.country.clone())
            .unwrap_or_default(),
        region: location
            .and_then(|l| l.state_prov.clone())
            .or_else(|| raw.region.clone())
            .unwrap_or_default(),
        city: location
            .and_then(|l| l.city.clone())
            .or_else(|| raw.city.clone())
            .unwrap_or_default(),
        isp: location
            .and_then(|l| l.organization.clone())
            .or_else(|| raw.isp.clone())
            .unwrap_or_default(),
        org: raw.org.clone().unwrap_or_default(),
        lat: location
            .and_then(|l| coerce_opt_f64(l.latitude.as_ref()))
            .or(raw.lat),
        lon: location
            .and_then(|l| coerce_opt_f64(l.longitude.as_ref()))
            .or(raw.lon),
    }
}

// The legacy export is loose about scalar types: stakes arrive as numbers
// or digit strings, flags as booleans or "true"/"false" strings.

fn coerce_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn coerce_f64(value: Option<&Value>) -> f64 {
    coerce_opt_f64(value).unwrap_or(0.0)
}

fn coerce_opt_f64(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes"),
        _ => false,
    }
}
