#![deny(missing_docs)]

//! # Reference Store
//!
//! Fetches and caches external specification documents, by URL or filesystem
//! path, and resolves `location#/json/pointer` references into schema
//! fragments.
//!
//! Caching is TTL-based (fixed five-minute validity window) with FIFO
//! eviction at a configurable size bound. A cache hit inside the window is
//! returned unconditionally; no conditional-GET revalidation is performed.

use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::oas::pointer::resolve_pointer;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Validity window for cached documents.
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Configuration for the reference store.
#[derive(Debug, Clone)]
pub struct ReferenceStoreConfig {
    /// Per-request timeout for HTTP fetches.
    pub timeout: Duration,
    /// Maximum number of redirects followed per fetch.
    pub redirect_limit: usize,
    /// Number of retries after the initial attempt.
    pub retry_count: u32,
    /// Linear backoff step: attempt `n` waits `n * retry_delay`.
    pub retry_delay: Duration,
    /// Maximum number of cached documents; oldest entries evict first.
    pub max_cache_size: usize,
    /// When set, only these hosts may be fetched over HTTP(S).
    pub allowed_domains: Option<Vec<String>>,
}

impl Default for ReferenceStoreConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            redirect_limit: 5,
            retry_count: 3,
            retry_delay: Duration::from_millis(200),
            max_cache_size: 32,
            allowed_domains: None,
        }
    }
}

/// A cached external document. Owned exclusively by the store.
struct CachedDocument {
    document: Arc<JsonValue>,
    fetched_at: Instant,
    #[allow(dead_code)]
    etag: Option<String>,
    #[allow(dead_code)]
    last_modified: Option<String>,
}

/// Fetches and caches external specification documents.
pub struct ReferenceStore {
    config: ReferenceStoreConfig,
    client: reqwest::Client,
    cache: RwLock<IndexMap<String, CachedDocument>>,
}

impl ReferenceStore {
    /// Creates a store with the given configuration.
    pub fn new(config: ReferenceStoreConfig) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.redirect_limit))
            .build()
            .map_err(|e| {
                EngineError::new(
                    ErrorCode::FetchFailed,
                    format!("failed to build HTTP client: {}", e),
                )
            })?;

        Ok(Self {
            config,
            client,
            cache: RwLock::new(IndexMap::new()),
        })
    }

    /// Creates a store with default configuration.
    pub fn with_defaults() -> EngineResult<Self> {
        Self::new(ReferenceStoreConfig::default())
    }

    /// Resolves a location plus optional fragment into a schema fragment.
    ///
    /// The failing location is attached to every error for diagnostics; no
    /// partial results are returned.
    pub async fn resolve(
        &self,
        location: &str,
        fragment: Option<&str>,
    ) -> EngineResult<JsonValue> {
        let document = self.resolve_document(location).await?;
        match fragment {
            Some(pointer) => {
                let node = resolve_pointer(&document, pointer).map_err(|e| {
                    EngineError::new(
                        ErrorCode::ReferenceNotFound,
                        format!("fragment '{}' not found in '{}'", pointer, location),
                    )
                    .caused_by(e)
                })?;
                Ok(node.clone())
            }
            None => Ok((*document).clone()),
        }
    }

    /// Resolves a location into the whole cached document.
    ///
    /// On a cache hit within the TTL window the cached document is returned
    /// unconditionally. On a miss the document is fetched, parsed, minimally
    /// validated, cached, and returned.
    pub async fn resolve_document(&self, location: &str) -> EngineResult<Arc<JsonValue>> {
        if let Some(document) = self.cache_lookup(location) {
            tracing::debug!(location, "reference store cache hit");
            return Ok(document);
        }

        self.check_domain(location)?;

        tracing::info!(location, "fetching external document");
        let (body, etag, last_modified) = self.fetch(location).await?;
        let document = parse_document_text(&body, location)?;
        validate_document_minimal(&document, location)?;

        let document = Arc::new(document);
        self.cache_insert(location, document.clone(), etag, last_modified);
        Ok(document)
    }

    /// Number of live cache entries.
    pub fn cache_size(&self) -> usize {
        self.cache.read().expect("cache lock poisoned").len()
    }

    /// Whether a location is currently cached (expired entries excluded).
    pub fn is_cached(&self, location: &str) -> bool {
        let cache = self.cache.read().expect("cache lock poisoned");
        cache
            .get(location)
            .map(|entry| entry.fetched_at.elapsed() < CACHE_TTL)
            .unwrap_or(false)
    }

    fn cache_lookup(&self, location: &str) -> Option<Arc<JsonValue>> {
        let mut cache = self.cache.write().expect("cache lock poisoned");
        match cache.get(location) {
            Some(entry) if entry.fetched_at.elapsed() < CACHE_TTL => {
                Some(entry.document.clone())
            }
            Some(_) => {
                // Expired: drop the entry so it refetches.
                cache.shift_remove(location);
                None
            }
            None => None,
        }
    }

    fn cache_insert(
        &self,
        location: &str,
        document: Arc<JsonValue>,
        etag: Option<String>,
        last_modified: Option<String>,
    ) {
        let mut cache = self.cache.write().expect("cache lock poisoned");
        while cache.len() >= self.config.max_cache_size {
            match cache.shift_remove_index(0) {
                Some((evicted, _)) => {
                    tracing::debug!(location = %evicted, "evicting oldest cached document");
                }
                None => break,
            }
        }
        cache.insert(
            location.to_string(),
            CachedDocument {
                document,
                fetched_at: Instant::now(),
                etag,
                last_modified,
            },
        );
    }

    fn check_domain(&self, location: &str) -> EngineResult<()> {
        let Some(allowed) = &self.config.allowed_domains else {
            return Ok(());
        };
        if !is_http_location(location) {
            return Ok(());
        }

        let url = url::Url::parse(location).map_err(|e| {
            EngineError::new(
                ErrorCode::FetchFailed,
                format!("invalid URL '{}': {}", location, e),
            )
        })?;
        let host = url.host_str().unwrap_or_default();
        if allowed.iter().any(|d| d.eq_ignore_ascii_case(host)) {
            Ok(())
        } else {
            Err(EngineError::new(
                ErrorCode::DomainNotAllowed,
                format!("domain '{}' is not allowed for '{}'", host, location),
            )
            .with_suggestion(format!(
                "add '{}' to the allowed domains or inline the referenced schema",
                host
            )))
        }
    }

    async fn fetch(
        &self,
        location: &str,
    ) -> EngineResult<(String, Option<String>, Option<String>)> {
        if is_http_location(location) {
            self.fetch_http(location).await
        } else {
            let path = location.strip_prefix("file://").unwrap_or(location);
            let body = tokio::fs::read_to_string(path).await.map_err(|e| {
                let code = if e.kind() == std::io::ErrorKind::NotFound {
                    ErrorCode::DocumentNotFound
                } else {
                    ErrorCode::FetchFailed
                };
                EngineError::new(code, format!("failed to read '{}': {}", location, e))
                    .with_suggestion("check that the referenced file exists and is readable")
            })?;
            Ok((body, None, None))
        }
    }

    /// HTTP GET with linear backoff: attempt `n` (1-based) sleeps
    /// `n * retry_delay` before retrying. Transport errors and 5xx responses
    /// retry; other failures return immediately.
    async fn fetch_http(
        &self,
        location: &str,
    ) -> EngineResult<(String, Option<String>, Option<String>)> {
        let mut last_error: Option<EngineError> = None;

        for attempt in 0..=self.config.retry_count {
            if attempt > 0 {
                let delay = self.config.retry_delay * attempt;
                tracing::warn!(
                    location,
                    attempt,
                    retries = self.config.retry_count,
                    "fetch failed, retrying in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
            }

            match self.client.get(location).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(EngineError::new(
                            ErrorCode::DocumentNotFound,
                            format!("document not found: '{}'", location),
                        ));
                    }
                    if status.is_server_error() {
                        last_error = Some(EngineError::new(
                            ErrorCode::FetchFailed,
                            format!("'{}' answered {}", location, status),
                        ));
                        continue;
                    }
                    if !status.is_success() {
                        return Err(EngineError::new(
                            ErrorCode::FetchFailed,
                            format!("'{}' answered {}", location, status),
                        ));
                    }

                    let etag = header_value(&response, reqwest::header::ETAG);
                    let last_modified = header_value(&response, reqwest::header::LAST_MODIFIED);
                    let body = response.text().await.map_err(|e| {
                        EngineError::new(
                            ErrorCode::FetchFailed,
                            format!("failed to read body of '{}': {}", location, e),
                        )
                    })?;
                    return Ok((body, etag, last_modified));
                }
                Err(e) => {
                    last_error = Some(EngineError::new(
                        ErrorCode::FetchFailed,
                        format!("failed to fetch '{}': {}", location, e),
                    ));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| {
                EngineError::new(
                    ErrorCode::FetchFailed,
                    format!("failed to fetch '{}'", location),
                )
            })
            .with_suggestion("check network reachability or raise the retry budget"))
    }
}

fn header_value(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn is_http_location(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Parses document text as JSON or YAML, by extension first, then sniffing.
fn parse_document_text(body: &str, location: &str) -> EngineResult<JsonValue> {
    let path = location.split(['?', '#']).next().unwrap_or(location);
    let parsed = if path.ends_with(".json") {
        serde_json::from_str(body).map_err(|e| format!("invalid JSON: {}", e))
    } else if path.ends_with(".yaml") || path.ends_with(".yml") {
        serde_yaml::from_str(body).map_err(|e| format!("invalid YAML: {}", e))
    } else {
        serde_json::from_str(body)
            .or_else(|_| serde_yaml::from_str(body))
            .map_err(|e| format!("neither JSON nor YAML: {}", e))
    };

    parsed.map_err(|msg| {
        EngineError::new(
            ErrorCode::ParseFailed,
            format!("failed to parse '{}': {}", location, msg),
        )
    })
}

/// Minimal validity check: a version field plus `info.title` and `info.version`.
fn validate_document_minimal(document: &JsonValue, location: &str) -> EngineResult<()> {
    let has_version = document.get("openapi").is_some() || document.get("swagger").is_some();
    if !has_version {
        return Err(EngineError::new(
            ErrorCode::ParseFailed,
            format!("'{}' has no top-level version field", location),
        )
        .with_suggestion("add an 'openapi' (or 'swagger') version field to the document"));
    }

    let info = document.get("info");
    let title = info.and_then(|i| i.get("title")).and_then(|t| t.as_str());
    let version = info.and_then(|i| i.get("version")).and_then(|v| v.as_str());
    if title.is_none() || version.is_none() {
        return Err(EngineError::new(
            ErrorCode::ParseFailed,
            format!("'{}' is missing info.title or info.version", location),
        )
        .with_suggestion("external documents must carry an info block with title and version"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_DOC: &str = r#"
openapi: 3.0.3
info:
  title: External
  version: "1.0"
components:
  schemas:
    Address:
      type: object
      properties:
        street:
          type: string
"#;

    fn write_spec(dir: &tempfile::TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_resolve_file_document_with_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let location = write_spec(&dir, "external.yaml", MINIMAL_DOC);

        let store = ReferenceStore::with_defaults().unwrap();
        let fragment = store
            .resolve(&location, Some("/components/schemas/Address"))
            .await
            .unwrap();

        assert_eq!(fragment["type"], "object");
        assert!(fragment["properties"]["street"].is_object());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_refetch_within_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let location = write_spec(&dir, "external.yaml", MINIMAL_DOC);

        let store = ReferenceStore::with_defaults().unwrap();
        let first = store.resolve_document(&location).await.unwrap();

        // Mutate the file on disk; the cached copy must win inside the TTL.
        write_spec(
            &dir,
            "external.yaml",
            &MINIMAL_DOC.replace("External", "Mutated"),
        );
        let second = store.resolve_document(&location).await.unwrap();

        assert_eq!(first["info"]["title"], "External");
        assert_eq!(second["info"]["title"], "External");
        assert_eq!(store.cache_size(), 1);
    }

    #[tokio::test]
    async fn test_fifo_eviction_at_cache_bound() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_spec(&dir, "a.yaml", MINIMAL_DOC);
        let second = write_spec(&dir, "b.yaml", MINIMAL_DOC);
        let third = write_spec(&dir, "c.yaml", MINIMAL_DOC);

        let store = ReferenceStore::new(ReferenceStoreConfig {
            max_cache_size: 2,
            ..ReferenceStoreConfig::default()
        })
        .unwrap();

        store.resolve_document(&first).await.unwrap();
        store.resolve_document(&second).await.unwrap();
        store.resolve_document(&third).await.unwrap();

        assert_eq!(store.cache_size(), 2);
        assert!(!store.is_cached(&first), "oldest entry should evict first");
        assert!(store.is_cached(&second));
        assert!(store.is_cached(&third));
    }

    #[tokio::test]
    async fn test_disallowed_domain_fails_before_io() {
        let store = ReferenceStore::new(ReferenceStoreConfig {
            allowed_domains: Some(vec!["api.example.com".to_string()]),
            ..ReferenceStoreConfig::default()
        })
        .unwrap();

        let err = store
            .resolve_document("https://evil.example.net/openapi.yaml")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DomainNotAllowed);
        assert!(err.message.contains("evil.example.net"));
    }

    #[tokio::test]
    async fn test_missing_file_reports_location() {
        let store = ReferenceStore::with_defaults().unwrap();
        let err = store
            .resolve_document("/definitely/not/here.yaml")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DocumentNotFound);
        assert!(err.message.contains("/definitely/not/here.yaml"));
    }

    #[tokio::test]
    async fn test_document_without_info_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let location = write_spec(&dir, "bad.yaml", "openapi: 3.0.0\ncomponents: {}\n");

        let store = ReferenceStore::with_defaults().unwrap();
        let err = store.resolve_document(&location).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ParseFailed);
        assert_eq!(store.cache_size(), 0, "invalid documents must not cache");
    }

    #[tokio::test]
    async fn test_unparseable_document_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let location = write_spec(&dir, "bad.json", "{not json at all");

        let store = ReferenceStore::with_defaults().unwrap();
        let err = store.resolve_document(&location).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ParseFailed);
    }
}
