use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use signet_kv::KeyValueStore;
use signet_sign::{effective_expiry, SignedUrlGenerator};
use signet_types::{is_plain_url, KeyCodec, ObjectReference, RequestParams};

use crate::config::{cache_ttl_secs, ResolverConfig};
use crate::error::{ResolveError, ResolveResult};

/// Per-call counters, one bucket per path a token can take.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResolveStats {
    /// Plain URLs copied through.
    pub plain: usize,
    /// Served from the cache.
    pub hits: usize,
    /// Generated after a cache miss.
    pub generated: usize,
    /// Cache misses whose generation failed.
    pub failed: usize,
    /// Tokens that did not decode to a resolvable reference.
    pub invalid: usize,
}

/// Full result of [`CacheAsideResolver::resolve_detailed`].
#[derive(Debug)]
pub struct ResolveOutcome {
    /// One entry per input token, in input order. Empty means unresolved.
    pub urls: Vec<String>,
    /// The last non-fatal error seen while fetching or generating.
    pub last_error: Option<ResolveError>,
    pub stats: ResolveStats,
}

/// A decoded token waiting on the cache.
struct Pending {
    slot: usize,
    key: String,
    reference: ObjectReference,
}

/// Resolves tokens to signed URLs, consulting the cache first and writing
/// freshly generated URLs back to it.
///
/// Cheap to clone; clones share the store and the signer connector.
#[derive(Clone, Debug)]
pub struct CacheAsideResolver {
    store: KeyValueStore,
    generator: SignedUrlGenerator,
    config: ResolverConfig,
}

impl CacheAsideResolver {
    pub fn new(store: KeyValueStore, generator: SignedUrlGenerator, config: ResolverConfig) -> Self {
        Self {
            store,
            generator,
            config,
        }
    }

    pub fn store(&self) -> &KeyValueStore {
        &self.store
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `tokens` into URLs valid for `expiry`.
    ///
    /// The output always has one entry per token, in order. Plain URLs are
    /// copied through, cache hits are returned as stored, misses are
    /// generated with up to `retry_attempts` tries, and anything that
    /// cannot be resolved is left empty. The returned error is the last
    /// one encountered and never means the whole call failed.
    pub async fn resolve(
        &self,
        tokens: &[String],
        expiry: Duration,
        retry_attempts: i64,
    ) -> (Vec<String>, Option<ResolveError>) {
        let outcome = self.resolve_detailed(tokens, expiry, retry_attempts).await;
        (outcome.urls, outcome.last_error)
    }

    /// [`resolve`](Self::resolve) with per-path counters.
    ///
    /// `expiry` is capped to what a signed URL can carry before it is used
    /// for signing or for the cache TTL.
    ///
    /// Dropping the returned future aborts in-flight generation. Cache
    /// writes already scheduled are not rolled back.
    pub async fn resolve_detailed(
        &self,
        tokens: &[String],
        expiry: Duration,
        retry_attempts: i64,
    ) -> ResolveOutcome {
        let expiry = effective_expiry(expiry);
        let mut urls = vec![String::new(); tokens.len()];
        let mut stats = ResolveStats::default();
        let mut last_error = None;

        let mut pending = Vec::new();
        for (slot, token) in tokens.iter().enumerate() {
            if is_plain_url(token) {
                urls[slot] = token.clone();
                stats.plain += 1;
                continue;
            }
            match KeyCodec::decode(token) {
                Ok(reference) if reference.is_resolvable() => pending.push(Pending {
                    slot,
                    key: self.config.cache_key(&reference).into_string(),
                    reference,
                }),
                Ok(reference) => {
                    debug!(slot, %reference, "token has no bucket or object, skipped");
                    stats.invalid += 1;
                }
                Err(e) => {
                    debug!(slot, error = %e, "token skipped");
                    stats.invalid += 1;
                }
            }
        }

        if !pending.is_empty() {
            let keys: Vec<String> = pending.iter().map(|p| p.key.clone()).collect();
            let cached = match self.store.batch_get(&keys, self.config.batch_size).await {
                Ok(values) => values,
                Err(e) => {
                    warn!(keys = keys.len(), error = %e, "cache lookup failed, generating every token");
                    last_error = Some(ResolveError::Cache(e));
                    vec![String::new(); keys.len()]
                }
            };

            let mut misses = Vec::new();
            for (p, value) in pending.into_iter().zip(cached) {
                if value.is_empty() {
                    misses.push(p);
                } else {
                    urls[p.slot] = value;
                    stats.hits += 1;
                }
            }

            if !misses.is_empty() {
                if let Some(e) = self
                    .generate_misses(misses, expiry, retry_attempts, &mut urls, &mut stats)
                    .await
                {
                    last_error = Some(e);
                }
            }
        }

        info!(
            tokens = tokens.len(),
            plain = stats.plain,
            hits = stats.hits,
            generated = stats.generated,
            failed = stats.failed,
            invalid = stats.invalid,
            "tokens resolved"
        );
        ResolveOutcome {
            urls,
            last_error,
            stats,
        }
    }

    /// One task per miss. Each task owns its slot index and hands the URL
    /// back through the join, so `urls` is only written here.
    ///
    /// The cache key ignores request parameters, so cached URLs are signed
    /// without them.
    async fn generate_misses(
        &self,
        misses: Vec<Pending>,
        expiry: Duration,
        retry_attempts: i64,
        urls: &mut [String],
        stats: &mut ResolveStats,
    ) -> Option<ResolveError> {
        let generator = self.generator.clone().with_attempts(retry_attempts);
        let ttl = cache_ttl_secs(expiry);
        let mut last_error = None;
        let mut tasks = JoinSet::new();

        for miss in misses {
            let generator = generator.clone();
            let store = self.store.clone();
            tasks.spawn(async move {
                let result = generator
                    .generate_with_params(&miss.reference, expiry, &RequestParams::new())
                    .await;
                if let Ok(url) = &result {
                    if ttl == 0 {
                        debug!(key = %miss.key, "expiry under 2s, not caching");
                    } else if let Err(e) = store.put_async(miss.key.clone(), url.clone(), ttl) {
                        warn!(key = %miss.key, error = %e, "cache write not scheduled");
                    }
                }
                (miss.slot, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, Ok(url))) => {
                    urls[slot] = url;
                    stats.generated += 1;
                }
                Ok((slot, Err(e))) => {
                    warn!(slot, error = %e, "leaving slot unresolved");
                    stats.failed += 1;
                    last_error = Some(ResolveError::Sign(e));
                }
                Err(join_err) => {
                    error!(error = %join_err, "generation task failed");
                    stats.failed += 1;
                    last_error = Some(ResolveError::Task(join_err.to_string()));
                }
            }
        }
        last_error
    }

    /// Resolve a single token without touching the cache.
    ///
    /// Plain URLs are returned as given. The reference's own request
    /// parameters are carried into the signature.
    pub async fn resolve_one(&self, token: &str, expiry: Duration) -> ResolveResult<String> {
        if is_plain_url(token) {
            return Ok(token.to_string());
        }
        let reference = KeyCodec::decode(token)?;
        if !reference.is_resolvable() {
            return Err(ResolveError::Unresolvable(reference.to_string()));
        }
        let url = self
            .generator
            .clone()
            .with_attempts(self.config.retry_attempts)
            .generate(&reference, expiry)
            .await?;
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use signet_kv::{KvBackend, KvError, KvResult, Lookup, MemoryBackend, Namespace};
    use signet_sign::{ObjectSigner, SignError, SignResult, SignerConnector};

    /// Memory backend that records traffic and can fail chosen groups.
    #[derive(Default)]
    struct RecordingBackend {
        inner: MemoryBackend,
        batch_calls: AtomicUsize,
        puts: Mutex<Vec<(String, String, u32)>>,
        /// A batch group containing this key fails.
        fail_group_with: Option<String>,
        unreachable: bool,
        /// Writes wait this long before landing.
        put_delay: Option<Duration>,
    }

    #[async_trait]
    impl KvBackend for RecordingBackend {
        async fn get(&self, ns: &Namespace, key: &str) -> KvResult<Option<String>> {
            self.inner.get(ns, key).await
        }

        async fn put(&self, ns: &Namespace, key: &str, value: &str, ttl_secs: u32) -> KvResult<()> {
            if let Some(delay) = self.put_delay {
                tokio::time::sleep(delay).await;
            }
            self.puts
                .lock()
                .unwrap()
                .push((key.to_string(), value.to_string(), ttl_secs));
            self.inner.put(ns, key, value, ttl_secs).await
        }

        async fn delete(&self, ns: &Namespace, key: &str) -> KvResult<bool> {
            self.inner.delete(ns, key).await
        }

        async fn batch_get(&self, ns: &Namespace, keys: &[String]) -> KvResult<Vec<Lookup>> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            if self.unreachable {
                return Err(KvError::Connection("connection refused".into()));
            }
            if let Some(bad) = &self.fail_group_with {
                if keys.contains(bad) {
                    return Err(KvError::Backend("group read failed".into()));
                }
            }
            self.inner.batch_get(ns, keys).await
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    /// Signs `https://signed/<bucket><object>?exp=<secs>&n=<params>`; fails
    /// every connect when `broken`.
    #[derive(Default)]
    struct CountingConnector {
        connects: AtomicUsize,
        broken: bool,
    }

    struct EchoSigner;

    #[async_trait]
    impl ObjectSigner for EchoSigner {
        async fn presign_get(
            &self,
            bucket: &str,
            object: &str,
            expiry: Duration,
            params: &RequestParams,
        ) -> SignResult<String> {
            Ok(format!(
                "https://signed/{bucket}{object}?exp={}&n={}",
                expiry.as_secs(),
                params.len()
            ))
        }
    }

    #[async_trait]
    impl SignerConnector for CountingConnector {
        async fn connect(&self, _host: &str, _region: &str) -> SignResult<Arc<dyn ObjectSigner>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.broken {
                Err(SignError::Connection("endpoint down".into()))
            } else {
                Ok(Arc::new(EchoSigner))
            }
        }
    }

    /// Signs instantly, except objects containing "slow", which take a
    /// minute. Counts finished signatures.
    #[derive(Default)]
    struct SlowConnector {
        signed: Arc<AtomicUsize>,
    }

    struct SlowSigner {
        signed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ObjectSigner for SlowSigner {
        async fn presign_get(
            &self,
            bucket: &str,
            object: &str,
            _expiry: Duration,
            _params: &RequestParams,
        ) -> SignResult<String> {
            if object.contains("slow") {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            self.signed.fetch_add(1, Ordering::SeqCst);
            Ok(format!("https://signed/{bucket}{object}"))
        }
    }

    #[async_trait]
    impl SignerConnector for SlowConnector {
        async fn connect(&self, _host: &str, _region: &str) -> SignResult<Arc<dyn ObjectSigner>> {
            Ok(Arc::new(SlowSigner {
                signed: self.signed.clone(),
            }))
        }
    }

    struct Harness {
        resolver: CacheAsideResolver,
        backend: Arc<RecordingBackend>,
        connector: Arc<CountingConnector>,
    }

    fn harness_with(backend: RecordingBackend, connector: CountingConnector, batch_size: usize) -> Harness {
        let backend = Arc::new(backend);
        let connector = Arc::new(connector);
        let store = KeyValueStore::new(backend.clone(), Namespace::new("wealth", "test"));
        let config = ResolverConfig {
            batch_size,
            ..Default::default()
        };
        let resolver = CacheAsideResolver::new(store, SignedUrlGenerator::new(connector.clone()), config);
        Harness {
            resolver,
            backend,
            connector,
        }
    }

    fn harness() -> Harness {
        harness_with(RecordingBackend::default(), CountingConnector::default(), 100)
    }

    fn token(bucket: &str, object: &str) -> String {
        KeyCodec::encode(&ObjectReference::new(bucket, object)).unwrap()
    }

    fn key_for(h: &Harness, bucket: &str, object: &str) -> String {
        h.resolver
            .config()
            .cache_key(&ObjectReference::new(bucket, object))
            .into_string()
    }

    fn connects(h: &Harness) -> usize {
        h.connector.connects.load(Ordering::SeqCst)
    }

    async fn wait_for_puts(h: &Harness, n: usize) {
        for _ in 0..200 {
            if h.backend.puts.lock().unwrap().len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {n} cache writes");
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn plain_urls_skip_cache_and_generator() {
        let h = harness();
        let tokens = vec![
            "https://cdn.example.com/a.png".to_string(),
            "HTTP://cdn.example.com/b.png".to_string(),
        ];
        let (urls, err) = h.resolver.resolve(&tokens, HOUR, 3).await;
        assert_eq!(urls, tokens);
        assert!(err.is_none());
        assert_eq!(h.backend.batch_calls.load(Ordering::SeqCst), 0);
        assert_eq!(connects(&h), 0);
    }

    #[tokio::test]
    async fn miss_generates_once_and_writes_back_half_ttl() {
        let h = harness();
        let tokens = vec![token("photos", "/a.png")];
        let (urls, err) = h.resolver.resolve(&tokens, HOUR, 3).await;
        assert!(err.is_none());
        assert_eq!(urls, vec!["https://signed/photos/a.png?exp=3600&n=0".to_string()]);
        assert_eq!(connects(&h), 1);

        wait_for_puts(&h, 1).await;
        let key = key_for(&h, "photos", "/a.png");
        assert_eq!(
            *h.backend.puts.lock().unwrap(),
            vec![(key.clone(), urls[0].clone(), 1800)]
        );
        assert_eq!(h.resolver.store().get(&key).await.unwrap(), urls[0]);
    }

    #[tokio::test]
    async fn warm_cache_is_idempotent() {
        let h = harness();
        let tokens = vec![token("b", "/1"), token("b", "/2")];
        let (first, _) = h.resolver.resolve(&tokens, HOUR, 1).await;
        wait_for_puts(&h, 2).await;
        assert_eq!(connects(&h), 2);

        let outcome = h.resolver.resolve_detailed(&tokens, HOUR, 1).await;
        assert_eq!(outcome.urls, first);
        assert_eq!(outcome.stats.hits, 2);
        assert_eq!(connects(&h), 2);
    }

    #[tokio::test]
    async fn failed_group_is_regenerated() {
        let backend = RecordingBackend {
            fail_group_with: Some(
                ResolverConfig::default()
                    .cache_key(&ObjectReference::new("b", "/2"))
                    .into_string(),
            ),
            ..Default::default()
        };
        let h = harness_with(backend, CountingConnector::default(), 2);

        let tokens: Vec<String> = (0..6).map(|i| token("b", &format!("/{i}"))).collect();
        for i in 0..6 {
            let key = key_for(&h, "b", &format!("/{i}"));
            h.resolver.store().put(&key, &format!("cached-{i}"), 0).await.unwrap();
        }

        let outcome = h.resolver.resolve_detailed(&tokens, HOUR, 1).await;
        assert!(outcome.last_error.is_none());
        assert_eq!(h.backend.batch_calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.urls[0], "cached-0");
        assert_eq!(outcome.urls[1], "cached-1");
        assert_eq!(outcome.urls[2], "https://signed/b/2?exp=3600&n=0");
        assert_eq!(outcome.urls[3], "https://signed/b/3?exp=3600&n=0");
        assert_eq!(outcome.urls[4], "cached-4");
        assert_eq!(outcome.urls[5], "cached-5");
        assert_eq!(outcome.stats.hits, 4);
        assert_eq!(outcome.stats.generated, 2);
        assert_eq!(connects(&h), 2);
    }

    #[tokio::test]
    async fn output_keeps_input_order_across_paths() {
        let h = harness();
        let cached_key = key_for(&h, "b", "/hit");
        h.resolver.store().put(&cached_key, "from-cache", 0).await.unwrap();

        let tokens = vec![
            "https://plain/x".to_string(),
            "not-a-token".to_string(),
            token("b", "/hit"),
            "ostart:!!!:oend".to_string(),
            token("b", "/miss"),
            token("", "/no-bucket"),
        ];
        let outcome = h.resolver.resolve_detailed(&tokens, HOUR, 1).await;
        assert_eq!(outcome.urls.len(), tokens.len());
        assert_eq!(outcome.urls[0], "https://plain/x");
        assert_eq!(outcome.urls[1], "");
        assert_eq!(outcome.urls[2], "from-cache");
        assert_eq!(outcome.urls[3], "");
        assert_eq!(outcome.urls[4], "https://signed/b/miss?exp=3600&n=0");
        assert_eq!(outcome.urls[5], "");
        assert_eq!(
            outcome.stats,
            ResolveStats {
                plain: 1,
                hits: 1,
                generated: 1,
                failed: 0,
                invalid: 3,
            }
        );
        assert!(outcome.last_error.is_none());
    }

    #[tokio::test]
    async fn generation_failure_leaves_slot_empty() {
        let connector = CountingConnector {
            broken: true,
            ..Default::default()
        };
        let h = harness_with(RecordingBackend::default(), connector, 100);
        let tokens = vec!["https://plain/x".to_string(), token("b", "/o")];
        let outcome = h.resolver.resolve_detailed(&tokens, HOUR, 3).await;
        assert_eq!(outcome.urls, vec!["https://plain/x".to_string(), String::new()]);
        assert_eq!(outcome.stats.failed, 1);
        assert_eq!(connects(&h), 3);
        assert!(matches!(
            outcome.last_error,
            Some(ResolveError::Sign(SignError::Generation { attempts: 3, .. }))
        ));
        assert!(h.backend.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_cache_still_generates() {
        let backend = RecordingBackend {
            unreachable: true,
            ..Default::default()
        };
        let h = harness_with(backend, CountingConnector::default(), 100);
        let (urls, err) = h.resolver.resolve(&[token("b", "/o")], HOUR, 1).await;
        assert_eq!(urls, vec!["https://signed/b/o?exp=3600&n=0".to_string()]);
        assert!(matches!(err, Some(ResolveError::Cache(KvError::Connection(_)))));
    }

    #[tokio::test]
    async fn sub_two_second_expiry_is_not_cached() {
        let h = harness();
        let (urls, _) = h.resolver.resolve(&[token("b", "/o")], Duration::from_secs(1), 1).await;
        assert_eq!(urls[0], "https://signed/b/o?exp=1&n=0");
        assert!(h.backend.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn param_variants_share_one_unsigned_entry() {
        let h = harness();
        let png = KeyCodec::encode(
            &ObjectReference::new("b", "/o").with_param("response-content-type", "image/png"),
        )
        .unwrap();
        let (first, _) = h.resolver.resolve(&[png], HOUR, 1).await;
        assert_eq!(first[0], "https://signed/b/o?exp=3600&n=0");
        wait_for_puts(&h, 1).await;

        let outcome = h.resolver.resolve_detailed(&[token("b", "/o")], HOUR, 1).await;
        assert_eq!(outcome.urls, first);
        assert_eq!(outcome.stats.hits, 1);
        assert_eq!(connects(&h), 1);
    }

    #[tokio::test]
    async fn long_expiry_is_capped_before_caching() {
        let h = harness();
        let month = Duration::from_secs(30 * 24 * 3600);
        let (urls, _) = h.resolver.resolve(&[token("b", "/o")], month, 1).await;
        assert_eq!(urls[0], "https://signed/b/o?exp=604800&n=0");
        wait_for_puts(&h, 1).await;
        assert_eq!(h.backend.puts.lock().unwrap()[0].2, 302400);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_resolve_aborts_generation_but_keeps_scheduled_writes() {
        let backend = Arc::new(RecordingBackend {
            put_delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let connector = SlowConnector::default();
        let signed = connector.signed.clone();
        let store = KeyValueStore::new(backend.clone(), Namespace::new("wealth", "test"));
        let resolver = CacheAsideResolver::new(
            store,
            SignedUrlGenerator::new(Arc::new(connector)),
            ResolverConfig::default(),
        );

        let tokens = vec![token("b", "/fast"), token("b", "/slow")];
        let call = tokio::time::timeout(
            Duration::from_secs(1),
            resolver.resolve_detailed(&tokens, HOUR, 1),
        )
        .await;
        assert!(call.is_err());
        assert!(backend.puts.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(signed.load(Ordering::SeqCst), 1);
        let fast_key = ResolverConfig::default()
            .cache_key(&ObjectReference::new("b", "/fast"))
            .into_string();
        let puts = backend.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].0, fast_key);
    }

    #[tokio::test]
    async fn resolve_one_paths() {
        let h = harness();
        assert_eq!(
            h.resolver.resolve_one("https://plain/x", HOUR).await.unwrap(),
            "https://plain/x"
        );
        assert!(matches!(
            h.resolver.resolve_one("nope", HOUR).await,
            Err(ResolveError::InvalidToken(_))
        ));
        assert!(matches!(
            h.resolver.resolve_one(&token("", "/o"), HOUR).await,
            Err(ResolveError::Unresolvable(_))
        ));

        let with_params = KeyCodec::encode(
            &ObjectReference::new("b", "/o").with_param("response-content-type", "image/png"),
        )
        .unwrap();
        let url = h.resolver.resolve_one(&with_params, HOUR).await.unwrap();
        assert_eq!(url, "https://signed/b/o?exp=3600&n=1");
        assert_eq!(h.backend.batch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_input_is_empty_output() {
        let h = harness();
        let (urls, err) = h.resolver.resolve(&[], HOUR, 1).await;
        assert!(urls.is_empty());
        assert!(err.is_none());
        assert_eq!(h.backend.batch_calls.load(Ordering::SeqCst), 0);
    }
}
