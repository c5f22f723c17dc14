//! Agent resolution against the external Identity Resolver.
//!
//! Webhook payloads name the acting user by their provider-side username
//! (e.g. a GitHub login). The Identity Resolver maps that to a canonical
//! account name. Resolution is strictly best-effort: from the orchestrator's
//! point of view [`AgentResolver::resolve`] always succeeds, and any
//! underlying network or lookup error surfaces as `None` — an unresolved
//! agent never aborts a publish.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::types::ProviderKind;

/// Best-effort mapping from a provider username to a canonical account name.
#[async_trait]
pub trait AgentResolver: Send + Sync {
    /// Resolves `agent_key` for the given provider. `None` means the agent
    /// is unknown or the resolver was unreachable; both are acceptable.
    async fn resolve(&self, kind: ProviderKind, agent_key: &str) -> Option<String>;
}

/// HTTP client for the Identity Resolver's user-search endpoint.
///
/// Queries `GET <base>/v1/search/users?<provider>_username=<key>` and treats
/// a result set with exactly one entry as a successful resolution. Zero or
/// several matches are ambiguous and resolve to `None`.
pub struct HttpResolver {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<UserRecord>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    username: String,
}

impl HttpResolver {
    /// Default request budget.
    ///
    /// Resolution is best-effort and must never be the dominant latency
    /// factor of a request, so the budget stays sub-second.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

    /// Creates a resolver for the given base URL.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client construction cannot fail with these options");
        HttpResolver {
            client,
            base_url: base_url.into(),
        }
    }

    async fn search(&self, kind: ProviderKind, agent_key: &str) -> reqwest::Result<SearchResponse> {
        let url = format!("{}/v1/search/users", self.base_url.trim_end_matches('/'));
        let param = format!("{kind}_username");
        self.client
            .get(url)
            .query(&[(param.as_str(), agent_key)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl AgentResolver for HttpResolver {
    async fn resolve(&self, kind: ProviderKind, agent_key: &str) -> Option<String> {
        match self.search(kind, agent_key).await {
            Ok(response) => match response.result.as_slice() {
                [user] => Some(user.username.clone()),
                other => {
                    debug!(
                        provider = %kind,
                        agent_key,
                        matches = other.len(),
                        "agent did not resolve to exactly one account"
                    );
                    None
                }
            },
            Err(e) => {
                debug!(provider = %kind, agent_key, error = %e, "agent resolution failed");
                None
            }
        }
    }
}

/// Resolver used when no Identity Resolver is configured.
///
/// Every agent stays unresolved; messages are published with `agent: null`.
pub struct NullResolver;

#[async_trait]
impl AgentResolver for NullResolver {
    async fn resolve(&self, _kind: ProviderKind, _agent_key: &str) -> Option<String> {
        None
    }
}

/// TTL cache over any [`AgentResolver`].
///
/// Negative results are cached too: an unknown agent stays unknown for one
/// TTL window. Staleness is acceptable — the cache is a latency concern, not
/// a correctness one.
pub struct CachedResolver<R> {
    inner: R,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Option<String>,
    inserted_at: Instant,
}

impl<R> CachedResolver<R> {
    /// Default time-to-live for cached resolutions.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

    pub fn new(inner: R, ttl: Duration) -> Self {
        CachedResolver {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn cache_key(kind: ProviderKind, agent_key: &str) -> String {
        format!("{kind}:{agent_key}")
    }

    fn lookup(&self, key: &str) -> Option<Option<String>> {
        let entries = self.entries.lock().expect("cache lock poisoned");
        let entry = entries.get(key)?;
        if entry.inserted_at.elapsed() < self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    fn store(&self, key: String, value: Option<String>) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }
}

#[async_trait]
impl<R: AgentResolver> AgentResolver for CachedResolver<R> {
    async fn resolve(&self, kind: ProviderKind, agent_key: &str) -> Option<String> {
        let key = Self::cache_key(kind, agent_key);

        if let Some(cached) = self.lookup(&key) {
            return cached;
        }

        let value = self.inner.resolve(kind, agent_key).await;
        self.store(key, value.clone());
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Resolver stub returning a fixed mapping and counting calls.
    struct CountingResolver {
        calls: AtomicU32,
        known: &'static str,
    }

    impl CountingResolver {
        fn new(known: &'static str) -> Self {
            CountingResolver {
                calls: AtomicU32::new(0),
                known,
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AgentResolver for std::sync::Arc<CountingResolver> {
        async fn resolve(&self, _kind: ProviderKind, agent_key: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (agent_key == self.known).then(|| format!("fas-{agent_key}"))
        }
    }

    fn counting_cache(
        ttl: Duration,
    ) -> (std::sync::Arc<CountingResolver>, CachedResolver<std::sync::Arc<CountingResolver>>) {
        let inner = std::sync::Arc::new(CountingResolver::new("alice"));
        let cached = CachedResolver::new(inner.clone(), ttl);
        (inner, cached)
    }

    #[tokio::test]
    async fn cache_hit_skips_inner_resolver() {
        let (inner, cached) = counting_cache(Duration::from_secs(60));

        let first = cached.resolve(ProviderKind::GitHub, "alice").await;
        let second = cached.resolve(ProviderKind::GitHub, "alice").await;

        assert_eq!(first.as_deref(), Some("fas-alice"));
        assert_eq!(second.as_deref(), Some("fas-alice"));
        assert_eq!(inner.call_count(), 1);
    }

    #[tokio::test]
    async fn negative_results_are_cached() {
        let (inner, cached) = counting_cache(Duration::from_secs(60));

        assert_eq!(cached.resolve(ProviderKind::GitHub, "mallory").await, None);
        assert_eq!(cached.resolve(ProviderKind::GitHub, "mallory").await, None);
        assert_eq!(inner.call_count(), 1);
    }

    #[tokio::test]
    async fn distinct_providers_cached_separately() {
        let (inner, cached) = counting_cache(Duration::from_secs(60));

        cached.resolve(ProviderKind::GitHub, "alice").await;
        cached.resolve(ProviderKind::Forgejo, "alice").await;
        assert_eq!(inner.call_count(), 2);
    }

    #[tokio::test]
    async fn zero_ttl_never_serves_from_cache() {
        let (inner, cached) = counting_cache(Duration::ZERO);

        cached.resolve(ProviderKind::GitHub, "alice").await;
        cached.resolve(ProviderKind::GitHub, "alice").await;
        assert_eq!(inner.call_count(), 2);
    }
}
