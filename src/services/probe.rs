//! Gateway probing: cache, transport and retry loop
//!
//! One [`ProbeRunner`] is owned by the pipeline instance; its cache is the
//! only shared mutable state of a run. Entries are immutable snapshots,
//! so a race between concurrent misses costs a redundant network call and
//! nothing else.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::models::{EndpointKind, ProbeOutcome};

/// Probe results stay valid for half an hour; a down gateway is not
/// re-hammered within that window.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Fixed budget for a single probe attempt.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

struct CacheEntry {
    data: ProbeOutcome,
    fetched_at: Instant,
}

/// Time-bounded memo of probe outcomes keyed by `(address, endpoint)`.
///
/// Expiry is checked lazily on access; stale entries are replaced by the
/// next write rather than evicted. Last write wins, concurrent misses are
/// not deduplicated, and there is no size bound: key cardinality is
/// limited by the gateway count.
pub struct ProbeCache {
    ttl: Duration,
    entries: Mutex<HashMap<(String, EndpointKind), CacheEntry>>,
}

impl ProbeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, address: &str, kind: EndpointKind) -> Option<ProbeOutcome> {
        let entries = self.entries.lock().await;
        entries
            .get(&(address.to_string(), kind))
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.data.clone())
    }

    pub async fn put(&self, address: &str, kind: EndpointKind, data: ProbeOutcome) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            (address.to_string(), kind),
            CacheEntry {
                data,
                fetched_at: Instant::now(),
            },
        );
    }
}

/// Issues one HTTP GET and classifies the result. Implemented over
/// reqwest in production; tests inject deterministic fakes.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    async fn fetch(&self, url: &str) -> ProbeOutcome;
}

/// reqwest-backed transport with the per-attempt timeout baked into the
/// client.
pub struct HttpProbeTransport {
    http: reqwest::Client,
}

impl HttpProbeTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ProbeTransport for HttpProbeTransport {
    async fn fetch(&self, url: &str) -> ProbeOutcome {
        match self.http.get(url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let payload = response.json::<serde_json::Value>().await.ok();
                ProbeOutcome::Http { status, payload }
            }
            Err(err) => classify_transport_error(&err),
        }
    }
}

fn classify_transport_error(err: &reqwest::Error) -> ProbeOutcome {
    if err.is_timeout() {
        ProbeOutcome::Timeout
    } else if is_tls_failure(err) {
        ProbeOutcome::SslError
    } else if err.is_connect() || err.is_request() {
        ProbeOutcome::NetworkError
    } else {
        ProbeOutcome::NoResponse
    }
}

/// reqwest does not expose TLS failures as a dedicated kind; walk the
/// source chain and match on the message.
fn is_tls_failure(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(current) = source {
        let message = current.to_string().to_ascii_lowercase();
        if message.contains("certificate")
            || message.contains("tls")
            || message.contains("ssl")
            || message.contains("handshake")
        {
            return true;
        }
        source = current.source();
    }
    false
}

/// Sequential retry without backoff. Pluggable so tests can pin the
/// attempt budget.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

/// Cache-aware prober for a single `(address, endpoint)` pair.
pub struct ProbeRunner {
    transport: Arc<dyn ProbeTransport>,
    cache: ProbeCache,
    retry: RetryPolicy,
}

impl ProbeRunner {
    pub fn new(transport: Arc<dyn ProbeTransport>, cache_ttl: Duration, retry: RetryPolicy) -> Self {
        Self {
            transport,
            cache: ProbeCache::new(cache_ttl),
            retry,
        }
    }

    /// Probe one endpoint of one gateway, consulting and populating the
    /// cache. Failures are cached too so a down gateway is not re-probed
    /// within the TTL window.
    pub async fn probe(&self, address: &str, kind: EndpointKind) -> ProbeOutcome {
        if let Some(hit) = self.cache.get(address, kind).await {
            tracing::debug!(address, endpoint = kind.path(), "probe cache hit");
            return hit;
        }

        let url = format!("{}{}", address.trim_end_matches('/'), kind.path());
        let mut outcome = self.transport.fetch(&url).await;
        let mut retries_left = self.retry.max_retries;

        while retries_left > 0 && should_retry(&outcome) {
            outcome = self.transport.fetch(&url).await;
            retries_left -= 1;
        }

        self.cache.put(address, kind, outcome.clone()).await;
        outcome
    }
}

fn should_retry(outcome: &ProbeOutcome) -> bool {
    !outcome.is_success() && !outcome.is_terminal_failure()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transport that always yields the same outcome and counts calls.
    struct FixedTransport {
        outcome: ProbeOutcome,
        calls: AtomicUsize,
    }

    impl FixedTransport {
        fn new(outcome: ProbeOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProbeTransport for FixedTransport {
        async fn fetch(&self, _url: &str) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn http(status: u16) -> ProbeOutcome {
        ProbeOutcome::Http {
            status,
            payload: None,
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_network() {
        let transport = FixedTransport::new(http(200));
        let runner = ProbeRunner::new(transport.clone(), DEFAULT_CACHE_TTL, RetryPolicy::default());

        let first = runner.probe("https://gw.example.net:443", EndpointKind::Info).await;
        let second = runner.probe("https://gw.example.net:443", EndpointKind::Info).await;

        assert_eq!(first, second);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_endpoints_are_cached_independently() {
        let transport = FixedTransport::new(http(200));
        let runner = ProbeRunner::new(transport.clone(), DEFAULT_CACHE_TTL, RetryPolicy::default());

        runner.probe("https://gw.example.net:443", EndpointKind::Info).await;
        runner.probe("https://gw.example.net:443", EndpointKind::Healthcheck).await;

        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let transport = FixedTransport::new(http(200));
        let runner = ProbeRunner::new(transport.clone(), Duration::ZERO, RetryPolicy::default());

        runner.probe("https://gw.example.net:443", EndpointKind::Info).await;
        runner.probe("https://gw.example.net:443", EndpointKind::Info).await;

        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_cached_too() {
        let transport = FixedTransport::new(ProbeOutcome::Timeout);
        let runner = ProbeRunner::new(transport.clone(), DEFAULT_CACHE_TTL, RetryPolicy::default());

        let first = runner.probe("https://down.example.net:443", EndpointKind::Info).await;
        let second = runner.probe("https://down.example.net:443", EndpointKind::Info).await;

        assert_eq!(first, ProbeOutcome::Timeout);
        assert_eq!(second, ProbeOutcome::Timeout);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_success_is_retried_to_budget() {
        let transport = FixedTransport::new(http(500));
        let runner = ProbeRunner::new(
            transport.clone(),
            DEFAULT_CACHE_TTL,
            RetryPolicy { max_retries: 3 },
        );

        let outcome = runner.probe("https://flaky.example.net:443", EndpointKind::Info).await;

        assert_eq!(outcome, http(500));
        // 1 initial attempt + 3 retries
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test]
    async fn test_ssl_error_short_circuits_retries() {
        let transport = FixedTransport::new(ProbeOutcome::SslError);
        let runner = ProbeRunner::new(
            transport.clone(),
            DEFAULT_CACHE_TTL,
            RetryPolicy { max_retries: 3 },
        );

        let outcome = runner.probe("https://badcert.example.net:443", EndpointKind::Info).await;

        assert_eq!(outcome, ProbeOutcome::SslError);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_not_retried() {
        let transport = FixedTransport::new(ProbeOutcome::Timeout);
        let runner = ProbeRunner::new(
            transport.clone(),
            DEFAULT_CACHE_TTL,
            RetryPolicy { max_retries: 3 },
        );

        runner.probe("https://slow.example.net:443", EndpointKind::Info).await;
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_success_needs_one_attempt() {
        let transport = FixedTransport::new(http(200));
        let runner = ProbeRunner::new(
            transport.clone(),
            DEFAULT_CACHE_TTL,
            RetryPolicy { max_retries: 3 },
        );

        runner.probe("https://gw.example.net:443", EndpointKind::Info).await;
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_zero_retry_policy() {
        let transport = FixedTransport::new(http(503));
        let runner = ProbeRunner::new(
            transport.clone(),
            DEFAULT_CACHE_TTL,
            RetryPolicy { max_retries: 0 },
        );

        runner.probe("https://gw.example.net:443", EndpointKind::Info).await;
        assert_eq!(transport.calls(), 1);
    }
}
