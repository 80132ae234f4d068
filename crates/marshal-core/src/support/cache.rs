//! Time-bounded cache over the assembled support chain.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::types::{CodeValidation, StructureDefinition};

use super::SupportChain;

/// What a cache entry answers; part of the cache key so a profile and a
/// code lookup can never collide on identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    Profile,
    Code,
}

#[derive(Clone)]
enum CachedAnswer {
    Profile(Option<StructureDefinition>),
    Code(Option<CodeValidation>),
}

struct CacheEntry {
    answer: CachedAnswer,
    stamped_at: Instant,
}

impl CacheEntry {
    fn new(answer: CachedAnswer) -> Self {
        Self {
            answer,
            stamped_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.stamped_at.elapsed() > ttl
    }
}

/// Caching decorator handed to the validation engine in place of the bare
/// chain.
///
/// Keys are `(lookup kind, identity)`; entries expire after the configured
/// TTL and are recomputed from the chain on the next lookup. Negative
/// answers are cached under the same TTL, keeping repeated unknown-profile
/// lookups off the network. The map is unbounded: the key space is bounded
/// by the distinct profiles and codes validation traffic references, not
/// by request volume. Concurrent lookups for the same cold key may both
/// reach the chain; both store equivalent answers.
pub struct CachingSupport {
    inner: SupportChain,
    ttl: Duration,
    entries: DashMap<(LookupKind, String), CacheEntry>,
}

impl std::fmt::Debug for CachingSupport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingSupport")
            .field("ttl", &self.ttl)
            .field("cached_entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl CachingSupport {
    pub fn new(inner: SupportChain, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: DashMap::new(),
        }
    }

    /// The wrapped chain, for introspection (provider names in logs).
    pub fn chain(&self) -> &SupportChain {
        &self.inner
    }

    pub fn cached_entries(&self) -> usize {
        self.entries.len()
    }

    pub async fn resolve_profile(&self, url: &str) -> Option<StructureDefinition> {
        let key = (LookupKind::Profile, url.to_string());
        if let Some(entry) = self.entries.get(&key)
            && !entry.is_expired(self.ttl)
            && let CachedAnswer::Profile(answer) = &entry.answer
        {
            tracing::trace!(url = %url, "profile lookup served from cache");
            return answer.clone();
        }

        let answer = self.inner.resolve_profile(url).await;
        self.entries
            .insert(key, CacheEntry::new(CachedAnswer::Profile(answer.clone())));
        answer
    }

    pub async fn validate_code(
        &self,
        system: Option<&str>,
        code: &str,
        value_set_url: Option<&str>,
    ) -> Option<CodeValidation> {
        let identity = format!(
            "{}|{}|{}",
            system.unwrap_or(""),
            code,
            value_set_url.unwrap_or("")
        );
        let key = (LookupKind::Code, identity);
        if let Some(entry) = self.entries.get(&key)
            && !entry.is_expired(self.ttl)
            && let CachedAnswer::Code(answer) = &entry.answer
        {
            tracing::trace!(code = %code, "code lookup served from cache");
            return answer.clone();
        }

        let answer = self.inner.validate_code(system, code, value_set_url).await;
        self.entries
            .insert(key, CacheEntry::new(CachedAnswer::Code(answer.clone())));
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support::{SnapshotGeneratingSupport, ValidationSupport};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ValidationSupport for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        async fn validate_code(
            &self,
            _system: Option<&str>,
            _code: &str,
            _value_set_url: Option<&str>,
        ) -> Option<CodeValidation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some(CodeValidation::valid())
        }
    }

    fn cached_chain(calls: Arc<AtomicUsize>, ttl: Duration) -> CachingSupport {
        let chain = SupportChain::new(
            vec![Arc::new(CountingProvider { calls })],
            Arc::new(SnapshotGeneratingSupport::new()),
        );
        CachingSupport::new(chain, ttl)
    }

    #[tokio::test]
    async fn repeated_lookups_within_ttl_hit_the_chain_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = cached_chain(calls.clone(), Duration::from_secs(60));

        for _ in 0..3 {
            let answer = cache
                .validate_code(Some("http://example.org/cs"), "a", None)
                .await
                .unwrap();
            assert!(answer.valid);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.cached_entries(), 1);
    }

    #[tokio::test]
    async fn expiry_recomputes_from_the_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = cached_chain(calls.clone(), Duration::from_millis(20));

        cache.validate_code(None, "a", None).await;
        cache.validate_code(None, "a", None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.validate_code(None, "a", None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn distinct_identities_are_cached_separately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = cached_chain(calls.clone(), Duration::from_secs(60));

        cache.validate_code(Some("http://a"), "x", None).await;
        cache.validate_code(Some("http://b"), "x", None).await;
        cache.validate_code(Some("http://a"), "x", Some("http://vs")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn negative_profile_answers_are_cached() {
        let cache = cached_chain(Arc::new(AtomicUsize::new(0)), Duration::from_secs(60));
        assert!(cache.resolve_profile("http://example.org/sd/nope").await.is_none());
        assert_eq!(cache.cached_entries(), 1);
        assert!(cache.resolve_profile("http://example.org/sd/nope").await.is_none());
    }
}
