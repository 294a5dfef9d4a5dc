//! Status resolution state machine
//!
//! Turns ledger status plus probe evidence into one of the three
//! externally visible states. Pure: identical inputs always yield the
//! same resolution. The ledger status dominates probe evidence; a
//! `leaving` gateway is offline no matter what its endpoints answered.

use crate::models::{LedgerStatus, ProbeOutcome, ResolvedStatus};

/// Resolve the operational status of one gateway.
///
/// `info` and `health` are `None` when the corresponding probe was never
/// attempted, which is evidentially different from a probe that ran and
/// failed.
pub fn resolve(
    ledger_status: &LedgerStatus,
    info: Option<&ProbeOutcome>,
    health: Option<&ProbeOutcome>,
    address_present: bool,
) -> ResolvedStatus {
    match ledger_status {
        LedgerStatus::Leaving => ResolvedStatus::Offline,
        LedgerStatus::Joined => resolve_joined(info, health, address_present),
        LedgerStatus::Other(raw) => passthrough(raw),
    }
}

fn resolve_joined(
    info: Option<&ProbeOutcome>,
    health: Option<&ProbeOutcome>,
    address_present: bool,
) -> ResolvedStatus {
    if let Some(info) = info {
        if let Some(status) = classify(info, true) {
            return status;
        }
    } else if let Some(health) = health {
        // Healthcheck fallback never promotes to ok; it only confirms
        // down or inconclusive signals.
        if let Some(status) = classify(health, false) {
            return status;
        }
    }

    if info.is_none() && health.is_none() {
        // No probe was attempted at all. With an address this is missing
        // evidence; without one the gateway is unreachable by definition.
        return if address_present {
            ResolvedStatus::Unknown
        } else {
            ResolvedStatus::Offline
        };
    }

    // A probe ran but produced evidence outside the classified buckets
    // (4xx, 5xx other than 503/504, generic network failure).
    ResolvedStatus::Unknown
}

fn classify(outcome: &ProbeOutcome, allow_ok: bool) -> Option<ResolvedStatus> {
    match outcome {
        ProbeOutcome::Http { status: 200, .. } if allow_ok => Some(ResolvedStatus::Ok),
        ProbeOutcome::Http { status, .. }
            if matches!(status, 503 | 504) || (300..=308).contains(status) =>
        {
            Some(ResolvedStatus::Offline)
        }
        ProbeOutcome::Timeout | ProbeOutcome::SslError => Some(ResolvedStatus::Unknown),
        _ => None,
    }
}

/// Ledger statuses outside `joined`/`leaving` are expected to already name
/// a canonical state. Anything else is a data-quality defect: flag it and
/// fall back to unknown rather than coercing silently.
fn passthrough(raw: &str) -> ResolvedStatus {
    match raw {
        "ok" => ResolvedStatus::Ok,
        "offline" => ResolvedStatus::Offline,
        "unknown" => ResolvedStatus::Unknown,
        other => {
            tracing::warn!(ledger_status = other, "unrecognized ledger status value");
            ResolvedStatus::Unknown
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn http(status: u16) -> ProbeOutcome {
        ProbeOutcome::Http {
            status,
            payload: None,
        }
    }

    #[test]
    fn test_leaving_dominates_probe_evidence() {
        let status = resolve(&LedgerStatus::Leaving, Some(&http(200)), Some(&http(200)), true);
        assert_eq!(status, ResolvedStatus::Offline);
    }

    #[test]
    fn test_joined_with_ok_info_probe() {
        let status = resolve(&LedgerStatus::Joined, Some(&http(200)), None, true);
        assert_eq!(status, ResolvedStatus::Ok);
    }

    #[test]
    fn test_joined_with_unavailable_buckets() {
        for code in [503u16, 504, 300, 301, 308] {
            let status = resolve(&LedgerStatus::Joined, Some(&http(code)), None, true);
            assert_eq!(status, ResolvedStatus::Offline, "status {code}");
        }
    }

    #[test]
    fn test_joined_with_inconclusive_failures() {
        let status = resolve(&LedgerStatus::Joined, Some(&ProbeOutcome::Timeout), None, true);
        assert_eq!(status, ResolvedStatus::Unknown);

        let status = resolve(&LedgerStatus::Joined, Some(&ProbeOutcome::SslError), None, true);
        assert_eq!(status, ResolvedStatus::Unknown);
    }

    #[test]
    fn test_healthcheck_fallback_when_info_absent() {
        let status = resolve(&LedgerStatus::Joined, None, Some(&http(503)), true);
        assert_eq!(status, ResolvedStatus::Offline);

        let status = resolve(&LedgerStatus::Joined, None, Some(&ProbeOutcome::Timeout), true);
        assert_eq!(status, ResolvedStatus::Unknown);

        // The fallback never promotes to ok.
        let status = resolve(&LedgerStatus::Joined, None, Some(&http(200)), true);
        assert_eq!(status, ResolvedStatus::Unknown);
    }

    #[test]
    fn test_joined_without_any_probe_attempt() {
        let status = resolve(&LedgerStatus::Joined, None, None, true);
        assert_eq!(status, ResolvedStatus::Unknown);

        let status = resolve(&LedgerStatus::Joined, None, None, false);
        assert_eq!(status, ResolvedStatus::Offline);
    }

    #[test]
    fn test_unclassified_probe_evidence_is_unknown() {
        for outcome in [http(404), http(500), ProbeOutcome::NetworkError, ProbeOutcome::NoResponse] {
            let status = resolve(&LedgerStatus::Joined, Some(&outcome), None, true);
            assert_eq!(status, ResolvedStatus::Unknown, "outcome {outcome:?}");
        }
    }

    #[test]
    fn test_passthrough_of_canonical_values() {
        let ok = LedgerStatus::Other("ok".to_string());
        assert_eq!(resolve(&ok, None, None, true), ResolvedStatus::Ok);

        let offline = LedgerStatus::Other("offline".to_string());
        assert_eq!(resolve(&offline, None, None, true), ResolvedStatus::Offline);

        let garbage = LedgerStatus::Other("banana".to_string());
        assert_eq!(resolve(&garbage, None, None, true), ResolvedStatus::Unknown);
    }

    #[test]
    fn test_five_gateway_scenario() {
        let ledger = [
            LedgerStatus::Joined,
            LedgerStatus::Joined,
            LedgerStatus::Joined,
            LedgerStatus::Leaving,
            LedgerStatus::Joined,
        ];
        let info = [
            Some(http(200)),
            Some(http(503)),
            Some(ProbeOutcome::Timeout),
            None,
            Some(http(200)),
        ];
        let expected = [
            ResolvedStatus::Ok,
            ResolvedStatus::Offline,
            ResolvedStatus::Unknown,
            ResolvedStatus::Offline,
            ResolvedStatus::Ok,
        ];

        for i in 0..5 {
            let status = resolve(&ledger[i], info[i].as_ref(), None, true);
            assert_eq!(status, expected[i], "gateway {i}");
        }
    }

    #[test]
    fn test_resolve_is_pure() {
        let first = resolve(&LedgerStatus::Joined, Some(&http(503)), Some(&http(200)), true);
        let second = resolve(&LedgerStatus::Joined, Some(&http(503)), Some(&http(200)), true);
        assert_eq!(first, second);
    }
}
