//! Generic cache-aside CRUD repository

use futures::FutureExt;
use futures::future::BoxFuture;
use lms_http::{HttpClient, HttpError, QueryParams};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::hooks::{NoHooks, RepositoryHooks};
use super::inflight::InFlight;
use super::keys::{CacheKeys, KeyHash};
use crate::cache::{Cache, compile_glob};
use crate::error::CoreError;
use crate::handler::{AppError, DefaultErrorHandler, ErrorContext, ErrorHandler};

/// Per-repository settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Entity name used as the cache key prefix
    pub entity: String,
    /// Collection path, relative to the client's base URL
    pub endpoint: String,
    /// TTL for cached reads
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    #[serde(default)]
    pub key_hash: KeyHash,
    /// Share one fetch between concurrent misses on the same key
    #[serde(default = "default_single_flight")]
    pub single_flight: bool,
}

fn default_cache_ttl_ms() -> u64 {
    5 * 60 * 1000
}

fn default_single_flight() -> bool {
    true
}

impl RepositoryConfig {
    pub fn new(entity: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            endpoint: endpoint.into(),
            cache_ttl_ms: default_cache_ttl_ms(),
            key_hash: KeyHash::default(),
            single_flight: default_single_flight(),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_ms = ttl.as_millis() as u64;
        self
    }

    pub fn with_key_hash(mut self, key_hash: KeyHash) -> Self {
        self.key_hash = key_hash;
        self
    }

    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

/// Cache-aside CRUD over one REST collection.
///
/// Reads check the cache first and fill it on a miss. Mutations always go
/// to the network and invalidate the entity's cached lists and counts,
/// plus its by-id entry for updates and deletes. Cache failures are logged
/// and treated as misses.
///
/// Every invalidation bumps a generation counter. A fetch started before
/// the bump still answers its own callers but never writes to the cache,
/// and later reads never join it.
pub struct BaseRepository<T, C = T, U = C>
where
    T: Send + Sync + 'static,
    C: Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    config: RepositoryConfig,
    keys: CacheKeys,
    client: Arc<HttpClient>,
    cache: Option<Arc<dyn Cache>>,
    error_handler: Arc<dyn ErrorHandler>,
    hooks: Arc<dyn RepositoryHooks<T, C, U>>,
    inflight: InFlight,
    generation: Arc<AtomicU64>,
    _marker: PhantomData<fn() -> (T, C, U)>,
}

impl<T, C, U> BaseRepository<T, C, U>
where
    T: DeserializeOwned + Send + Sync + 'static,
    C: Serialize + Send + Sync + 'static,
    U: Serialize + Send + Sync + 'static,
{
    pub fn new(config: RepositoryConfig, client: Arc<HttpClient>) -> Self {
        debug!(
            "Created repository for {} at {} (cache ttl: {:?})",
            config.entity,
            config.endpoint,
            config.cache_ttl()
        );

        Self {
            keys: CacheKeys::new(config.entity.clone(), config.key_hash),
            config,
            client,
            cache: None,
            error_handler: Arc::new(DefaultErrorHandler),
            hooks: Arc::new(NoHooks),
            inflight: InFlight::new(),
            generation: Arc::new(AtomicU64::new(0)),
            _marker: PhantomData,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = handler;
        self
    }

    pub fn with_hooks(mut self, hooks: impl RepositoryHooks<T, C, U> + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    /// List the collection, optionally filtered
    pub async fn get_all(&self, params: QueryParams) -> Result<Vec<T>, AppError> {
        let key = self.keys.all(&params);
        self.read_through(key, self.config.endpoint.clone(), params)
            .await
            .map_err(|e| self.fail(e, "get_all", None))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<T, AppError> {
        let key = self.keys.by_id(id);
        self.read_through(key, self.item_path(id), QueryParams::new())
            .await
            .map_err(|e| self.fail(e, "get_by_id", Some(id)))
    }

    /// Number of matching records, from `GET {endpoint}/count`
    pub async fn count(&self, filters: QueryParams) -> Result<u64, AppError> {
        let key = self.keys.count(&filters);
        let path = format!("{}/count", self.config.endpoint.trim_end_matches('/'));
        self.read_through::<CountResponse>(key, path, filters)
            .await
            .map(|r| r.count)
            .map_err(|e| self.fail(e, "count", None))
    }

    /// Whether `id` exists; a 404 is `false`, not an error
    pub async fn exists(&self, id: &str) -> Result<bool, AppError> {
        if let Some(cache) = &self.cache {
            match cache.has(&self.keys.by_id(id)) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => warn!("Cache lookup failed for {}: {}", self.keys.by_id(id), e),
            }
        }

        match self.client.get(&self.item_path(id), QueryParams::new()).await {
            Ok(_) => Ok(true),
            Err(e) if e.status() == Some(404) => Ok(false),
            Err(e) => Err(self.fail(e.into(), "exists", Some(id))),
        }
    }

    pub async fn create(&self, mut data: C) -> Result<T, AppError> {
        let result = async {
            self.hooks.before_create(&mut data).await?;
            let body = serde_json::to_value(&data)?;
            let response = self.client.post(&self.config.endpoint, body).await?;
            self.invalidate(None);
            let entity: T = response.json()?;
            self.hooks.after_create(&entity).await?;
            Ok::<T, CoreError>(entity)
        }
        .await;

        result.map_err(|e| self.fail(e, "create", None))
    }

    pub async fn update(&self, id: &str, mut data: U) -> Result<T, AppError> {
        let result = async {
            self.hooks.before_update(id, &mut data).await?;
            let body = serde_json::to_value(&data)?;
            let response = self.client.patch(&self.item_path(id), body).await?;
            self.invalidate(Some(id));
            let entity: T = response.json()?;
            self.hooks.after_update(&entity).await?;
            Ok::<T, CoreError>(entity)
        }
        .await;

        result.map_err(|e| self.fail(e, "update", Some(id)))
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let result = async {
            self.hooks.before_delete(id).await?;
            self.client.delete(&self.item_path(id)).await?;
            self.invalidate(Some(id));
            self.hooks.after_delete(id).await?;
            Ok::<(), CoreError>(())
        }
        .await;

        result.map_err(|e| self.fail(e, "delete", Some(id)))
    }

    /// Drop every cached entry of this entity
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            match cache.delete_pattern(&self.keys.entity_pattern()) {
                Ok(removed) => debug!("Cleared {} cached {} entries", removed, self.config.entity),
                Err(e) => warn!("Failed to clear cache for {}: {}", self.config.entity, e),
            }
        }
    }

    fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), id)
    }

    async fn read_through<R: DeserializeOwned>(
        &self,
        key: String,
        path: String,
        params: QueryParams,
    ) -> Result<R, CoreError> {
        if let Some(hit) = self.cached::<R>(&key) {
            return Ok(hit);
        }

        let fetch = self.fetch_and_store(key.clone(), path, params);
        let value = if self.config.single_flight {
            self.inflight.run(&key, move || fetch).await?
        } else {
            fetch.await?
        };

        Ok(serde_json::from_value(value)?)
    }

    /// Cached value for `key`; any cache failure counts as a miss
    fn cached<R: DeserializeOwned>(&self, key: &str) -> Option<R> {
        let cache = self.cache.as_ref()?;
        let value = match cache.get(key) {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache read failed for {}, treating as miss: {}", key, e);
                return None;
            }
        };

        match serde_json::from_value(value) {
            Ok(hit) => {
                debug!("Cache hit for {}", key);
                Some(hit)
            }
            Err(e) => {
                warn!("Dropping undecodable cached value for {}: {}", key, e);
                if let Err(e) = cache.delete(key) {
                    warn!("Failed to delete {} from cache: {}", key, e);
                }
                None
            }
        }
    }

    fn fetch_and_store(
        &self,
        key: String,
        path: String,
        params: QueryParams,
    ) -> BoxFuture<'static, Result<Value, HttpError>> {
        let client = self.client.clone();
        let cache = self.cache.clone();
        let ttl = self.config.cache_ttl();
        let generation = self.generation.clone();
        let started = generation.load(Ordering::SeqCst);

        async move {
            let value = client.get(&path, params).await?.into_value();
            let Some(cache) = cache else {
                return Ok(value);
            };
            if generation.load(Ordering::SeqCst) != started {
                debug!("Not caching {}: invalidated while fetching", key);
            } else if let Err(e) = cache.set(&key, value.clone(), Some(ttl)) {
                warn!("Failed to cache {}: {}", key, e);
            }
            Ok(value)
        }
        .boxed()
    }

    /// Invalidate cached lists and counts, plus the item when `id` is given
    fn invalidate(&self, id: Option<&str>) {
        self.generation.fetch_add(1, Ordering::SeqCst);

        let mut patterns = self.keys.collection_patterns();
        if let Some(id) = id {
            patterns.push(self.keys.by_id_pattern(id));
        }

        for pattern in &patterns {
            match compile_glob(pattern) {
                Ok(re) => {
                    let forgotten = self.inflight.forget_matching(&re);
                    if forgotten > 0 {
                        debug!("Detached {} in-flight reads matching {}", forgotten, pattern);
                    }
                }
                Err(e) => warn!("Failed to detach in-flight reads for {}: {}", pattern, e),
            }
        }

        let Some(cache) = &self.cache else {
            return;
        };

        for pattern in patterns {
            match cache.delete_pattern(&pattern) {
                Ok(0) => {}
                Ok(removed) => debug!("Invalidated {} entries matching {}", removed, pattern),
                Err(e) => warn!("Failed to invalidate {}: {}", pattern, e),
            }
        }
    }

    fn fail(&self, error: CoreError, operation: &str, id: Option<&str>) -> AppError {
        let mut context = ErrorContext::new();
        context.insert("entity".to_string(), json!(self.config.entity));
        context.insert("operation".to_string(), json!(operation));
        context.insert("endpoint".to_string(), json!(self.config.endpoint));
        if let Some(id) = id {
            context.insert("id".to_string(), json!(id));
        }
        self.error_handler.handle(error, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, CacheStats, CacheStrategy, MemoryCache};
    use crate::error::CacheError;
    use async_trait::async_trait;
    use lms_http::{HttpClientConfig, HttpResponse, Method, PreparedRequest, RetryConfig, Transport};
    use lms_storage::StorageError;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Course {
        id: u32,
        title: String,
    }

    #[derive(Debug, Serialize)]
    struct NewCourse {
        title: String,
    }

    type CourseRepository = BaseRepository<Course, NewCourse, NewCourse>;

    /// Routes `METHOD path` to canned responses and records every call
    struct FakeBackend {
        routes: Mutex<HashMap<String, HttpResponse>>,
        calls: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl FakeBackend {
        fn new() -> Arc<Self> {
            Self::build(None)
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Self::build(Some(delay))
        }

        fn build(delay: Option<Duration>) -> Arc<Self> {
            Arc::new(Self {
                routes: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
                delay,
            })
        }

        fn route(&self, method: Method, path: &str, status: u16, body: Value) {
            self.routes.lock().insert(
                format!("{} {}", method, path),
                HttpResponse::json_body(status, body),
            );
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        fn count(&self, call: &str) -> usize {
            self.calls.lock().iter().filter(|c| c.as_str() == call).count()
        }
    }

    #[async_trait]
    impl Transport for FakeBackend {
        async fn send(&self, request: PreparedRequest) -> Result<HttpResponse, HttpError> {
            let call = format!("{} {}", request.method, request.url.path());
            self.calls.lock().push(call.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let response = self.routes.lock().get(&call).cloned();
            Ok(response.unwrap_or_else(|| HttpResponse::json_body(404, json!({"message": "no route"}))))
        }
    }

    /// Single course whose reads snapshot the title before a delay
    struct VersionedBackend {
        title: Mutex<String>,
        gets: AtomicUsize,
    }

    impl VersionedBackend {
        fn new(title: &str) -> Arc<Self> {
            Arc::new(Self {
                title: Mutex::new(title.to_string()),
                gets: AtomicUsize::new(0),
            })
        }

        fn course(&self) -> Value {
            json!({"id": 1, "title": self.title.lock().clone()})
        }
    }

    #[async_trait]
    impl Transport for VersionedBackend {
        async fn send(&self, request: PreparedRequest) -> Result<HttpResponse, HttpError> {
            match request.method {
                Method::Get => {
                    self.gets.fetch_add(1, Ordering::SeqCst);
                    let snapshot = self.course();
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(HttpResponse::json_body(200, snapshot))
                }
                Method::Patch => {
                    if let Some(title) = request.body.as_ref().and_then(|b| b["title"].as_str()) {
                        *self.title.lock() = title.to_string();
                    }
                    Ok(HttpResponse::json_body(200, self.course()))
                }
                _ => Ok(HttpResponse::json_body(404, json!({"message": "no route"}))),
            }
        }
    }

    /// Cache whose every operation fails
    struct BrokenCache;

    impl Cache for BrokenCache {
        fn name(&self) -> &str {
            "broken"
        }
        fn strategy(&self) -> CacheStrategy {
            CacheStrategy::LocalStorage
        }
        fn get(&self, _key: &str) -> Result<Option<Value>, CacheError> {
            Err(StorageError::Backend("disk full".into()).into())
        }
        fn set(&self, _key: &str, _value: Value, _ttl: Option<Duration>) -> Result<(), CacheError> {
            Err(StorageError::Backend("disk full".into()).into())
        }
        fn delete(&self, _key: &str) -> Result<bool, CacheError> {
            Err(StorageError::Backend("disk full".into()).into())
        }
        fn has(&self, _key: &str) -> Result<bool, CacheError> {
            Err(StorageError::Backend("disk full".into()).into())
        }
        fn clear(&self) -> Result<(), CacheError> {
            Err(StorageError::Backend("disk full".into()).into())
        }
        fn delete_pattern(&self, _pattern: &str) -> Result<usize, CacheError> {
            Err(StorageError::Backend("disk full".into()).into())
        }
        fn size(&self) -> Result<usize, CacheError> {
            Ok(0)
        }
        fn stats(&self) -> CacheStats {
            CacheStats::default()
        }
        fn purge_expired(&self) -> Result<usize, CacheError> {
            Ok(0)
        }
        fn destroy(&self) {}
    }

    struct RequireTitle;

    #[async_trait]
    impl RepositoryHooks<Course, NewCourse, NewCourse> for RequireTitle {
        async fn before_create(&self, data: &mut NewCourse) -> Result<(), CoreError> {
            if data.title.trim().is_empty() {
                return Err(CoreError::Hook("title is required".into()));
            }
            data.title = data.title.trim().to_string();
            Ok(())
        }
    }

    fn client(backend: Arc<dyn Transport>) -> Arc<HttpClient> {
        let config = HttpClientConfig {
            retry: RetryConfig {
                max_attempts: 1,
                ..RetryConfig::default()
            },
            ..HttpClientConfig::with_base_url("https://lms.example.com/rest/v1")
        };
        Arc::new(HttpClient::with_transport("test", config, backend).unwrap())
    }

    fn memory_cache() -> Arc<dyn Cache> {
        Arc::new(MemoryCache::new("repo", &CacheConfig::default()))
    }

    fn repository(backend: Arc<FakeBackend>) -> CourseRepository {
        BaseRepository::new(RepositoryConfig::new("course", "/courses"), client(backend))
            .with_cache(memory_cache())
    }

    fn seeded() -> Arc<FakeBackend> {
        let backend = FakeBackend::new();
        backend.route(
            Method::Get,
            "/rest/v1/courses/1",
            200,
            json!({"id": 1, "title": "Rust"}),
        );
        backend.route(
            Method::Get,
            "/rest/v1/courses",
            200,
            json!([{"id": 1, "title": "Rust"}]),
        );
        backend.route(Method::Get, "/rest/v1/courses/count", 200, json!({"count": 1}));
        backend.route(
            Method::Patch,
            "/rest/v1/courses/1",
            200,
            json!({"id": 1, "title": "Async Rust"}),
        );
        backend.route(
            Method::Post,
            "/rest/v1/courses",
            201,
            json!({"id": 2, "title": "Traits"}),
        );
        backend.route(Method::Delete, "/rest/v1/courses/1", 204, json!(null));
        backend
    }

    #[tokio::test]
    async fn test_get_by_id_is_cached() {
        let backend = seeded();
        let repo = repository(backend.clone());

        let first = repo.get_by_id("1").await.unwrap();
        let second = repo.get_by_id("1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.count("GET /rest/v1/courses/1"), 1);
    }

    #[tokio::test]
    async fn test_update_invalidates_item() {
        let backend = seeded();
        let repo = repository(backend.clone());

        repo.get_by_id("1").await.unwrap();
        let updated = repo
            .update(
                "1",
                NewCourse {
                    title: "Async Rust".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Async Rust");

        repo.get_by_id("1").await.unwrap();
        assert_eq!(backend.count("GET /rest/v1/courses/1"), 2);
        assert_eq!(backend.count("PATCH /rest/v1/courses/1"), 1);
    }

    #[tokio::test]
    async fn test_create_invalidates_lists_and_counts() {
        let backend = seeded();
        let repo = repository(backend.clone());

        repo.get_all(QueryParams::new()).await.unwrap();
        repo.count(QueryParams::new()).await.unwrap();
        repo.get_by_id("1").await.unwrap();

        let created = repo
            .create(NewCourse {
                title: "Traits".into(),
            })
            .await
            .unwrap();
        assert_eq!(created.id, 2);

        repo.get_all(QueryParams::new()).await.unwrap();
        repo.count(QueryParams::new()).await.unwrap();
        repo.get_by_id("1").await.unwrap();

        assert_eq!(backend.count("GET /rest/v1/courses"), 2);
        assert_eq!(backend.count("GET /rest/v1/courses/count"), 2);
        assert_eq!(backend.count("GET /rest/v1/courses/1"), 1);
    }

    #[tokio::test]
    async fn test_filtered_lists_are_cached_separately() {
        let backend = seeded();
        let repo = repository(backend.clone());
        let filtered = QueryParams::from([("published".to_string(), json!(true))]);

        repo.get_all(QueryParams::new()).await.unwrap();
        repo.get_all(filtered.clone()).await.unwrap();
        repo.get_all(filtered).await.unwrap();

        assert_eq!(backend.count("GET /rest/v1/courses"), 2);
    }

    #[tokio::test]
    async fn test_delete_invalidates() {
        let backend = seeded();
        let repo = repository(backend.clone());

        repo.get_by_id("1").await.unwrap();
        repo.delete("1").await.unwrap();
        repo.get_by_id("1").await.unwrap();

        assert_eq!(backend.count("GET /rest/v1/courses/1"), 2);
    }

    #[tokio::test]
    async fn test_exists_maps_404_to_false() {
        let backend = seeded();
        let repo: CourseRepository =
            BaseRepository::new(RepositoryConfig::new("course", "/courses"), client(backend));

        assert!(repo.exists("1").await.unwrap());
        assert!(!repo.exists("99").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_surfaces_other_errors() {
        let backend = seeded();
        backend.route(Method::Get, "/rest/v1/courses/5", 403, json!({"message": "forbidden"}));
        let repo = repository(backend);

        let err = repo.exists("5").await.unwrap_err();
        assert_eq!(err.status_code, 403);
        assert_eq!(err.context["operation"], json!("exists"));
    }

    #[tokio::test]
    async fn test_exists_uses_cached_item() {
        let backend = seeded();
        let repo = repository(backend.clone());

        repo.get_by_id("1").await.unwrap();
        assert!(repo.exists("1").await.unwrap());
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_count_unwraps_and_caches() {
        let backend = seeded();
        let repo = repository(backend.clone());

        assert_eq!(repo.count(QueryParams::new()).await.unwrap(), 1);
        assert_eq!(repo.count(QueryParams::new()).await.unwrap(), 1);
        assert_eq!(backend.count("GET /rest/v1/courses/count"), 1);
    }

    #[tokio::test]
    async fn test_not_found_becomes_app_error() {
        let repo = repository(seeded());

        let err = repo.get_by_id("404").await.unwrap_err();

        assert!(err.is_not_found());
        assert!(err.is_operational);
        assert_eq!(err.context["entity"], json!("course"));
        assert_eq!(err.context["id"], json!("404"));
    }

    #[tokio::test]
    async fn test_before_hook_vetoes_without_network() {
        let backend = seeded();
        let repo = repository(backend.clone()).with_hooks(RequireTitle);

        let err = repo
            .create(NewCourse {
                title: "   ".into(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.status_code, 400);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failing_cache_is_a_miss() {
        let backend = seeded();
        let repo: CourseRepository =
            BaseRepository::new(RepositoryConfig::new("course", "/courses"), client(backend.clone()))
                .with_cache(Arc::new(BrokenCache));

        repo.get_by_id("1").await.unwrap();
        repo.get_by_id("1").await.unwrap();
        repo.update(
            "1",
            NewCourse {
                title: "Async Rust".into(),
            },
        )
        .await
        .unwrap();

        assert_eq!(backend.count("GET /rest/v1/courses/1"), 2);
    }

    #[tokio::test]
    async fn test_undecodable_cached_value_is_refetched() {
        let backend = seeded();
        let cache = memory_cache();
        cache
            .set("course:byId:1", json!("not a course"), None)
            .unwrap();
        let repo: CourseRepository =
            BaseRepository::new(RepositoryConfig::new("course", "/courses"), client(backend.clone()))
                .with_cache(cache.clone());

        let course = repo.get_by_id("1").await.unwrap();

        assert_eq!(course.title, "Rust");
        assert_eq!(backend.count("GET /rest/v1/courses/1"), 1);
        assert_eq!(
            cache.get("course:byId:1").unwrap(),
            Some(json!({"id": 1, "title": "Rust"}))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_collapses_concurrent_misses() {
        let backend = FakeBackend::slow(Duration::from_millis(50));
        backend.route(
            Method::Get,
            "/rest/v1/courses/1",
            200,
            json!({"id": 1, "title": "Rust"}),
        );
        let repo = repository(backend.clone());

        let (a, b) = tokio::join!(repo.get_by_id("1"), repo.get_by_id("1"));

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(backend.count("GET /rest/v1/courses/1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_single_flight_misses_race() {
        let backend = FakeBackend::slow(Duration::from_millis(50));
        backend.route(
            Method::Get,
            "/rest/v1/courses/1",
            200,
            json!({"id": 1, "title": "Rust"}),
        );
        let repo: CourseRepository = BaseRepository::new(
            RepositoryConfig::new("course", "/courses").with_single_flight(false),
            client(backend.clone()),
        )
        .with_cache(memory_cache());

        let (a, b) = tokio::join!(repo.get_by_id("1"), repo.get_by_id("1"));

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(backend.count("GET /rest/v1/courses/1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_reads_expire_with_repository_ttl() {
        let backend = seeded();
        let repo: CourseRepository = BaseRepository::new(
            RepositoryConfig::new("course", "/courses").with_cache_ttl(Duration::from_secs(1)),
            client(backend.clone()),
        )
        .with_cache(memory_cache());

        repo.get_by_id("1").await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        repo.get_by_id("1").await.unwrap();

        assert_eq!(backend.count("GET /rest/v1/courses/1"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_after_update_ignores_older_fetch() {
        let backend = VersionedBackend::new("Rust");
        let cache = memory_cache();
        let repo: CourseRepository =
            BaseRepository::new(RepositoryConfig::new("course", "/courses"), client(backend.clone()))
                .with_cache(cache.clone());

        let reader = repo.get_by_id("1");
        let writer = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            repo.update(
                "1",
                NewCourse {
                    title: "Async Rust".into(),
                },
            )
            .await
            .unwrap();
            repo.get_by_id("1").await.unwrap()
        };
        let (before, after) = tokio::join!(reader, writer);

        assert_eq!(before.unwrap().title, "Rust");
        assert_eq!(after.title, "Async Rust");
        assert_eq!(backend.gets.load(Ordering::SeqCst), 2);
        assert_eq!(
            cache.get("course:byId:1").unwrap(),
            Some(json!({"id": 1, "title": "Async Rust"}))
        );
    }
}
