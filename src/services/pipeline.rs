//! Pipeline orchestration
//!
//! One run: fetch the ledger listing, normalize it, probe every joined
//! gateway concurrently, resolve statuses, then enrich with geolocation.
//! The run completes all-or-nothing; there is no partial result surface.
//! Individual probe failures are absorbed into statuses, geolocation
//! failure degrades to no enrichment, and only list acquisition may
//! surface an error.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::models::{EndpointKind, Gateway, LedgerStatus, ProbeOutcome};
use crate::normalizer;
use crate::services::geo::GeoProvider;
use crate::services::ledger::LedgerClient;
use crate::services::probe::ProbeRunner;
use crate::status;

// Progress ranges reserved per milestone: list fetch below 20, probing
// between 20 and 95, geolocation above 95.
const PROBE_PROGRESS_FLOOR: u64 = 20;
const PROBE_PROGRESS_CEIL: u64 = 95;

/// Receives human-readable step labels and 0-100 progress values.
pub trait ProgressSink: Send + Sync {
    fn step(&self, _label: &str) {}
    fn progress(&self, _percent: u8) {}
}

/// Sink for callers that do not care about progress.
pub struct NoopProgress;

impl ProgressSink for NoopProgress {}

/// Sink that reports progress through the log.
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn step(&self, label: &str) {
        tracing::info!(step = label, "pipeline step");
    }

    fn progress(&self, percent: u8) {
        tracing::debug!(percent, "pipeline progress");
    }
}

/// Both probe outcomes for one gateway, info first.
struct ProbePair {
    info: ProbeOutcome,
    health: ProbeOutcome,
}

pub struct Pipeline {
    ledger: Arc<dyn LedgerClient>,
    geo: Arc<dyn GeoProvider>,
    prober: Arc<ProbeRunner>,
    limiter: Option<Arc<Semaphore>>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// `max_concurrent_probes = 0` leaves the fan-out unbounded.
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        geo: Arc<dyn GeoProvider>,
        prober: Arc<ProbeRunner>,
        max_concurrent_probes: usize,
    ) -> Self {
        let limiter = match max_concurrent_probes {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        Self {
            ledger,
            geo,
            prober,
            limiter,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that aborts in-flight runs when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute one full pipeline run, returning the resolved collection
    /// in the ledger's original order.
    pub async fn run(&self, progress: &dyn ProgressSink) -> Result<Vec<Gateway>, PipelineError> {
        progress.step("Fetching gateway list");
        progress.progress(5);

        let page = self.fetch_full_listing().await?;
        progress.progress(PROBE_PROGRESS_FLOOR as u8);

        let mut gateways: Vec<Gateway> = page.items.iter().map(normalizer::normalize).collect();
        let total = gateways.len();
        tracing::info!(total, "gateway listing normalized");

        progress.step("Probing gateways");
        let pairs = self.probe_all(&gateways, progress).await;
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        for (gateway, pair) in gateways.iter_mut().zip(pairs) {
            let Some(pair) = pair else {
                // Skipped gateways keep the resolution derived from the
                // raw record (leaving, or joined without an address).
                continue;
            };
            if let ProbeOutcome::Http {
                status: 200,
                payload: Some(payload),
            } = &pair.info
            {
                if let Some(release) = payload.get("release") {
                    gateway.release = match release {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                }
            }
            gateway.resolved_status = status::resolve(
                &gateway.ledger_status,
                Some(&pair.info),
                Some(&pair.health),
                true,
            );
        }

        progress.step("Fetching geolocation data");
        progress.progress(PROBE_PROGRESS_CEIL as u8);
        self.enrich_geo(&mut gateways).await;

        progress.progress(100);
        Ok(gateways)
    }

    /// Fetch once to learn the total, then re-fetch with `limit = total`
    /// when the first page was incomplete.
    async fn fetch_full_listing(
        &self,
    ) -> Result<crate::services::ledger::GatewayPage, PipelineError> {
        let page = self.ledger.list_gateways(None).await?;
        if (page.items.len() as u64) < page.total_items {
            tracing::info!(
                fetched = page.items.len(),
                total = page.total_items,
                "first page incomplete, re-fetching full listing"
            );
            return Ok(self.ledger.list_gateways(Some(page.total_items)).await?);
        }
        Ok(page)
    }

    /// Fan the per-gateway probe sequences out concurrently. Every
    /// gateway gets a slot in the result vector; skipped ones complete
    /// immediately with `None` and still count towards progress.
    async fn probe_all(
        &self,
        gateways: &[Gateway],
        progress: &dyn ProgressSink,
    ) -> Vec<Option<ProbePair>> {
        let total = gateways.len();
        let mut results: Vec<Option<ProbePair>> = Vec::with_capacity(total);
        results.resize_with(total, || None);
        if total == 0 {
            progress.progress(PROBE_PROGRESS_CEIL as u8);
            return results;
        }

        let mut tasks: JoinSet<(usize, Option<ProbePair>)> = JoinSet::new();
        for (index, gateway) in gateways.iter().enumerate() {
            let eligible = gateway.ledger_status == LedgerStatus::Joined
                && !gateway.address.is_empty();
            if !eligible {
                tasks.spawn(async move { (index, None) });
                continue;
            }

            let address = gateway.address.clone();
            let prober = Arc::clone(&self.prober);
            let limiter = self.limiter.clone();
            let cancel = self.cancel.clone();
            tasks.spawn(async move {
                let _permit = match limiter {
                    Some(semaphore) => match semaphore.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => return (index, None),
                    },
                    None => None,
                };
                if cancel.is_cancelled() {
                    return (index, None);
                }
                let pair = tokio::select! {
                    _ = cancel.cancelled() => None,
                    pair = probe_gateway(prober, address) => Some(pair),
                };
                (index, pair)
            });
        }

        let mut completed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            completed += 1;
            match joined {
                Ok((index, pair)) => results[index] = pair,
                Err(err) => {
                    tracing::error!(error = %err, "gateway probe task failed");
                }
            }
            let span = PROBE_PROGRESS_CEIL - PROBE_PROGRESS_FLOOR;
            let percent =
                PROBE_PROGRESS_FLOOR + (completed as u64 * span) / total as u64;
            progress.progress(percent as u8);
        }

        results
    }

    async fn enrich_geo(&self, gateways: &mut [Gateway]) {
        let lookup: HashMap<_, _> = match self.geo.lookup_all().await {
            Ok(lookup) => lookup,
            Err(err) => {
                tracing::warn!(error = %err, "geolocation fetch failed, continuing without enrichment");
                HashMap::new()
            }
        };
        if lookup.is_empty() {
            return;
        }
        for gateway in gateways.iter_mut() {
            if let Some(geo) = lookup.get(&gateway.address) {
                gateway.geo = geo.clone();
            }
        }
    }
}

/// The two probes of one gateway run sequentially, info first.
async fn probe_gateway(prober: Arc<ProbeRunner>, address: String) -> ProbePair {
    let info = prober.probe(&address, EndpointKind::Info).await;
    let health = prober.probe(&address, EndpointKind::Healthcheck).await;
    ProbePair { info, health }
}
