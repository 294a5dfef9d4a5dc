//! Decentralization metrics engine
//!
//! Pure, stateless computation over a resolved gateway collection:
//! distribution tables, four Nakamoto coefficients and a composite
//! decentralization score. Each invocation works on the snapshot it is
//! handed; nothing is cached between runs.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{Gateway, ResolvedStatus};

/// Majority-control threshold for count-weighted dimensions.
const MAJORITY_THRESHOLD: f64 = 0.51;
/// Proof-of-stake control threshold for the stake dimension.
const STAKE_THRESHOLD: f64 = 0.3333;

// Composite score weights, summing to 1.0.
const COUNTRY_WEIGHT: f64 = 0.20;
const REGION_WEIGHT: f64 = 0.15;
const CITY_WEIGHT: f64 = 0.15;
const ISP_WEIGHT: f64 = 0.20;
const HEALTH_WEIGHT: f64 = 0.15;
const STAKE_WEIGHT: f64 = 0.15;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMetrics {
    pub summary: SummaryStats,
    pub distributions: Distributions,
    pub nakamoto: NakamotoResult,
    /// Composite decentralization score in [0, 1].
    pub decentralization_score: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub unknown: usize,
    pub total_stake: u64,
    pub avg_stake_per_gateway: f64,
    pub unique_wallets: usize,
    pub unique_countries: usize,
    pub unique_regions: usize,
    pub unique_cities: usize,
    pub unique_isps: usize,
}

/// Category value -> gateway count tables.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distributions {
    pub status: HashMap<String, usize>,
    pub country: HashMap<String, usize>,
    pub region: HashMap<String, usize>,
    pub city: HashMap<String, usize>,
    pub isp: HashMap<String, usize>,
    pub release: HashMap<String, usize>,
    pub stake: HashMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NakamotoResult {
    pub owner_wallet_coeff: usize,
    pub stake_coeff: usize,
    pub country_coeff: usize,
    pub isp_coeff: usize,
    pub analysis: NakamotoAnalysis,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NakamotoAnalysis {
    pub total_gateways: usize,
    pub unique_owners: usize,
    pub total_stake: u64,
    pub interpretation: String,
}

/// Compute the full metrics set for one gateway collection.
pub fn compute_metrics(gateways: &[Gateway]) -> NetworkMetrics {
    if gateways.is_empty() {
        return NetworkMetrics {
            summary: SummaryStats::default(),
            distributions: Distributions::default(),
            nakamoto: NakamotoResult {
                analysis: NakamotoAnalysis {
                    interpretation: "No data available".to_string(),
                    ..NakamotoAnalysis::default()
                },
                ..NakamotoResult::default()
            },
            decentralization_score: 0.0,
        };
    }

    let total = gateways.len();
    let online = count_status(gateways, ResolvedStatus::Ok);
    let offline = count_status(gateways, ResolvedStatus::Offline);
    let unknown = count_status(gateways, ResolvedStatus::Unknown);
    let total_stake: u64 = gateways.iter().map(|g| g.minimum_delegated_stake).sum();

    let summary = SummaryStats {
        total,
        online,
        offline,
        unknown,
        total_stake,
        avg_stake_per_gateway: total_stake as f64 / total as f64,
        unique_wallets: unique_count(gateways, |g| fallback(&g.wallet_owner, "unknown")),
        unique_countries: unique_count(gateways, |g| fallback(&g.geo.country, "Unknown")),
        unique_regions: unique_count(gateways, |g| fallback(&g.geo.region, "Unknown")),
        unique_cities: unique_count(gateways, |g| fallback(&g.geo.city, "Unknown")),
        unique_isps: unique_count(gateways, |g| fallback(&g.geo.isp, "Unknown ISP")),
    };

    let distributions = Distributions {
        status: distribution(gateways, |g| g.resolved_status.as_str().to_string()),
        country: distribution(gateways, |g| fallback(&g.geo.country, "Unknown")),
        region: distribution(gateways, |g| fallback(&g.geo.region, "Unknown")),
        city: distribution(gateways, |g| fallback(&g.geo.city, "Unknown")),
        isp: distribution(gateways, |g| fallback(&g.geo.isp, "Unknown ISP")),
        release: distribution(gateways, |g| fallback(&g.release, "unknown")),
        stake: distribution(gateways, |g| {
            stake_bucket(g.minimum_delegated_stake).to_string()
        }),
    };

    let nakamoto = compute_nakamoto(gateways, &summary);
    let decentralization_score = decentralization_score(&summary);

    NetworkMetrics {
        summary,
        distributions,
        nakamoto,
        decentralization_score,
    }
}

/// Closed-open stake buckets on the lower bound.
pub fn stake_bucket(stake: u64) -> &'static str {
    match stake {
        0..=9_999 => "Under 10K ARIO",
        10_000..=49_999 => "10K-50K ARIO",
        50_000..=99_999 => "50K-100K ARIO",
        100_000..=499_999 => "100K-500K ARIO",
        500_000..=999_999 => "500K-1M ARIO",
        _ => "1M+ ARIO",
    }
}

fn compute_nakamoto(gateways: &[Gateway], summary: &SummaryStats) -> NakamotoResult {
    let owner_wallet_coeff = coefficient(
        group_counts(gateways, |g| fallback(&g.wallet_owner, "unknown")),
        MAJORITY_THRESHOLD,
    );
    let country_coeff = coefficient(
        group_counts(gateways, |g| fallback(&g.geo.country, "Unknown")),
        MAJORITY_THRESHOLD,
    );
    let isp_coeff = coefficient(
        group_counts(gateways, |g| fallback(&g.geo.isp, "Unknown ISP")),
        MAJORITY_THRESHOLD,
    );
    let stake_coeff = coefficient(
        group_weights(
            gateways,
            |g| fallback(&g.wallet_owner, "unknown"),
            |g| g.minimum_delegated_stake as f64,
        ),
        STAKE_THRESHOLD,
    );

    let average = (owner_wallet_coeff + stake_coeff + country_coeff + isp_coeff) as f64 / 4.0;

    NakamotoResult {
        owner_wallet_coeff,
        stake_coeff,
        country_coeff,
        isp_coeff,
        analysis: NakamotoAnalysis {
            total_gateways: summary.total,
            unique_owners: summary.unique_wallets,
            total_stake: summary.total_stake,
            interpretation: interpret(average, summary.total),
        },
    }
}

/// Minimal number of top-weighted groups whose cumulative weight reaches
/// the threshold share of the total. Group order is first-encountered;
/// the descending sort is stable, so equal weights keep that order.
fn coefficient(mut weights: Vec<f64>, threshold_fraction: f64) -> usize {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0;
    }
    weights.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let threshold = total * threshold_fraction;
    let mut cumulative = 0.0;
    let mut groups = 0;
    for weight in weights {
        cumulative += weight;
        groups += 1;
        if cumulative >= threshold {
            break;
        }
    }
    groups
}

/// Group weights in first-encountered order, one gateway = weight 1.
fn group_counts<F>(gateways: &[Gateway], key: F) -> Vec<f64>
where
    F: Fn(&Gateway) -> String,
{
    group_weights(gateways, key, |_| 1.0)
}

fn group_weights<F, W>(gateways: &[Gateway], key: F, weight: W) -> Vec<f64>
where
    F: Fn(&Gateway) -> String,
    W: Fn(&Gateway) -> f64,
{
    let mut order: Vec<f64> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for gateway in gateways {
        let slot = *index.entry(key(gateway)).or_insert_with(|| {
            order.push(0.0);
            order.len() - 1
        });
        order[slot] += weight(gateway);
    }
    order
}

fn decentralization_score(summary: &SummaryStats) -> f64 {
    let total = summary.total as f64;

    let country_ratio = summary.unique_countries as f64 / total;
    let region_ratio = summary.unique_regions as f64 / total;
    let city_ratio = summary.unique_cities as f64 / total;
    let isp_ratio = summary.unique_isps as f64 / total;
    let health_ratio = summary.online as f64 / total;
    let stake_ratio = if summary.total_stake > 0 {
        (1.0 - summary.avg_stake_per_gateway / summary.total_stake as f64).clamp(0.0, 1.0)
    } else {
        0.5
    };

    COUNTRY_WEIGHT * country_ratio
        + REGION_WEIGHT * region_ratio
        + CITY_WEIGHT * city_ratio
        + ISP_WEIGHT * isp_ratio
        + HEALTH_WEIGHT * health_ratio
        + STAKE_WEIGHT * stake_ratio
}

/// Risk band for the average of the four coefficients.
fn interpret(average: f64, total_gateways: usize) -> String {
    if total_gateways == 0 {
        return "No data available".to_string();
    }
    let share_of_total = average / total_gateways as f64 * 100.0;

    if average <= 3.0 {
        "High Centralization Risk - Network control concentrated in very few entities".to_string()
    } else if average <= 10.0 {
        "Medium Centralization Risk - Concerning concentration levels".to_string()
    } else if average <= 25.0 {
        "Low Centralization Risk - Reasonable distribution levels".to_string()
    } else if share_of_total >= 15.0 {
        "Good Decentralization - Control widely distributed".to_string()
    } else {
        "Excellent Decentralization - Very well distributed control structure".to_string()
    }
}

fn count_status(gateways: &[Gateway], status: ResolvedStatus) -> usize {
    gateways
        .iter()
        .filter(|g| g.resolved_status == status)
        .count()
}

/// Unique values per dimension, with missing values counted under the
/// same placeholder the distribution tables use.
fn unique_count<F>(gateways: &[Gateway], key: F) -> usize
where
    F: Fn(&Gateway) -> String,
{
    gateways
        .iter()
        .map(key)
        .collect::<std::collections::HashSet<_>>()
        .len()
}

fn distribution<F>(gateways: &[Gateway], key: F) -> HashMap<String, usize>
where
    F: Fn(&Gateway) -> String,
{
    let mut table = HashMap::new();
    for gateway in gateways {
        *table.entry(key(gateway)).or_insert(0) += 1;
    }
    table
}

fn fallback(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::models::{GeoInfo, LedgerStatus};

    fn gateway(wallet: &str, country: &str, isp: &str, stake: u64, status: ResolvedStatus) -> Gateway {
        Gateway {
            address: format!("https://{wallet}.example:443"),
            domain: format!("{wallet}.example"),
            label: "Unknown".to_string(),
            note: "Unknown".to_string(),
            wallet_owner: wallet.to_string(),
            wallet_observer: String::new(),
            properties_id: String::new(),
            ledger_status: LedgerStatus::Joined,
            resolved_status: status,
            release: "unknown".to_string(),
            minimum_delegated_stake: stake,
            reward_auto_stake: false,
            delegated_staking: false,
            reward_share_ratio: 0.0,
            geo: GeoInfo {
                country: country.to_string(),
                region: "r1".to_string(),
                city: "c1".to_string(),
                isp: isp.to_string(),
                ..GeoInfo::default()
            },
        }
    }

    #[test]
    fn test_owner_wallet_coefficient() {
        // wallets {A:3, B:2, C:1}, total 6, threshold 3.06 -> 2 groups
        let mut gateways = Vec::new();
        for _ in 0..3 {
            gateways.push(gateway("A", "US", "ISP-1", 0, ResolvedStatus::Ok));
        }
        for _ in 0..2 {
            gateways.push(gateway("B", "US", "ISP-1", 0, ResolvedStatus::Ok));
        }
        gateways.push(gateway("C", "US", "ISP-1", 0, ResolvedStatus::Ok));

        let metrics = compute_metrics(&gateways);
        assert_eq!(metrics.nakamoto.owner_wallet_coeff, 2);
    }

    #[test]
    fn test_stake_coefficient() {
        // stakes {X:100, Y:50, Z:10}, total 160, threshold ~53.3 -> X alone
        let gateways = vec![
            gateway("X", "US", "ISP-1", 100, ResolvedStatus::Ok),
            gateway("Y", "DE", "ISP-2", 50, ResolvedStatus::Ok),
            gateway("Z", "FR", "ISP-3", 10, ResolvedStatus::Ok),
        ];

        let metrics = compute_metrics(&gateways);
        assert_eq!(metrics.nakamoto.stake_coeff, 1);
    }

    #[test]
    fn test_stake_coefficient_zero_when_no_stake() {
        let gateways = vec![
            gateway("A", "US", "ISP-1", 0, ResolvedStatus::Ok),
            gateway("B", "DE", "ISP-2", 0, ResolvedStatus::Ok),
        ];
        let metrics = compute_metrics(&gateways);
        assert_eq!(metrics.nakamoto.stake_coeff, 0);
    }

    #[test]
    fn test_coefficient_never_exceeds_group_count() {
        let gateways = vec![
            gateway("A", "US", "ISP-1", 1, ResolvedStatus::Ok),
            gateway("B", "DE", "ISP-2", 1, ResolvedStatus::Ok),
            gateway("C", "FR", "ISP-3", 1, ResolvedStatus::Ok),
        ];
        let metrics = compute_metrics(&gateways);
        assert!(metrics.nakamoto.owner_wallet_coeff <= 3);
        assert!(metrics.nakamoto.country_coeff <= 3);
        assert!(metrics.nakamoto.isp_coeff <= 3);
        assert!(metrics.nakamoto.stake_coeff <= 3);
    }

    #[test]
    fn test_stake_buckets() {
        assert_eq!(stake_bucket(0), "Under 10K ARIO");
        assert_eq!(stake_bucket(9_999), "Under 10K ARIO");
        assert_eq!(stake_bucket(10_000), "10K-50K ARIO");
        assert_eq!(stake_bucket(49_999), "10K-50K ARIO");
        assert_eq!(stake_bucket(50_000), "50K-100K ARIO");
        assert_eq!(stake_bucket(100_000), "100K-500K ARIO");
        assert_eq!(stake_bucket(500_000), "500K-1M ARIO");
        assert_eq!(stake_bucket(999_999), "500K-1M ARIO");
        assert_eq!(stake_bucket(1_000_000), "1M+ ARIO");
    }

    #[test]
    fn test_distributions_count_every_gateway() {
        let gateways = vec![
            gateway("A", "US", "ISP-1", 5_000, ResolvedStatus::Ok),
            gateway("B", "US", "ISP-2", 20_000, ResolvedStatus::Offline),
            gateway("C", "DE", "ISP-1", 20_000, ResolvedStatus::Unknown),
        ];
        let metrics = compute_metrics(&gateways);

        assert_eq!(metrics.distributions.country["US"], 2);
        assert_eq!(metrics.distributions.country["DE"], 1);
        assert_eq!(metrics.distributions.status["ok"], 1);
        assert_eq!(metrics.distributions.status["offline"], 1);
        assert_eq!(metrics.distributions.status["unknown"], 1);
        assert_eq!(metrics.distributions.stake["Under 10K ARIO"], 1);
        assert_eq!(metrics.distributions.stake["10K-50K ARIO"], 2);
        assert_eq!(metrics.summary.total_stake, 45_000);
    }

    #[test]
    fn test_missing_geo_counts_under_its_placeholder() {
        // gateways with no geolocation land in one "Unknown" group for
        // both the distribution tables and the unique counts
        let gateways = vec![
            gateway("A", "", "", 0, ResolvedStatus::Ok),
            gateway("B", "", "", 0, ResolvedStatus::Ok),
            gateway("C", "DE", "ISP-1", 0, ResolvedStatus::Ok),
        ];
        let metrics = compute_metrics(&gateways);

        assert_eq!(metrics.distributions.country["Unknown"], 2);
        assert_eq!(metrics.distributions.country["DE"], 1);
        assert_eq!(metrics.summary.unique_countries, 2);
        assert_eq!(metrics.distributions.isp["Unknown ISP"], 2);
        assert_eq!(metrics.summary.unique_isps, 2);
    }

    #[test]
    fn test_score_within_unit_interval() {
        let gateways = vec![
            gateway("A", "US", "ISP-1", 100_000, ResolvedStatus::Ok),
            gateway("B", "DE", "ISP-2", 50_000, ResolvedStatus::Ok),
            gateway("C", "FR", "ISP-3", 10_000, ResolvedStatus::Offline),
        ];
        let metrics = compute_metrics(&gateways);
        assert!(metrics.decentralization_score >= 0.0);
        assert!(metrics.decentralization_score <= 1.0);
    }

    #[test]
    fn test_zero_total_stake_uses_neutral_ratio() {
        let gateways = vec![gateway("A", "US", "ISP-1", 0, ResolvedStatus::Ok)];
        let metrics = compute_metrics(&gateways);
        // every diversity ratio is 1, health is 1, stake ratio pinned at 0.5
        let expected = 0.20 + 0.15 + 0.15 + 0.20 + 0.15 + 0.15 * 0.5;
        assert!((metrics.decentralization_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_empty_collection() {
        let metrics = compute_metrics(&[]);
        assert_eq!(metrics.summary.total, 0);
        assert_eq!(metrics.decentralization_score, 0.0);
        assert_eq!(metrics.nakamoto.owner_wallet_coeff, 0);
        assert_eq!(metrics.nakamoto.analysis.interpretation, "No data available");
    }

    #[test]
    fn test_interpretation_bands() {
        assert!(interpret(2.0, 100).starts_with("High Centralization Risk"));
        assert!(interpret(7.0, 100).starts_with("Medium Centralization Risk"));
        assert!(interpret(20.0, 100).starts_with("Low Centralization Risk"));
        assert!(interpret(30.0, 100).starts_with("Good Decentralization"));
        assert!(interpret(30.0, 1000).starts_with("Excellent Decentralization"));
    }
}
