//! Single-value time-to-live cache and the documentation source built on it.

use crate::config::DocsConfig;
use helpdesk_proto::{Error, Result};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Holds one value until its TTL runs out. Expired values are never returned.
#[derive(Debug)]
pub struct TtlCache<T> {
    ttl: Duration,
    slot: RwLock<Option<(T, Instant)>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    pub async fn get(&self) -> Option<T> {
        self.get_at(Instant::now()).await
    }

    pub async fn get_at(&self, now: Instant) -> Option<T> {
        let slot = self.slot.read().await;
        match slot.as_ref() {
            Some((value, expires_at)) if now < *expires_at => Some(value.clone()),
            _ => None,
        }
    }

    pub async fn insert(&self, value: T) {
        self.insert_at(value, Instant::now()).await;
    }

    pub async fn insert_at(&self, value: T, now: Instant) {
        *self.slot.write().await = Some((value, now + self.ttl));
    }

    /// Stores a value whose own lifetime may be shorter than the cache TTL,
    /// e.g. an access token carrying `expires_in`.
    pub async fn insert_for(&self, value: T, lifetime: Duration) {
        let expires_at = Instant::now() + lifetime.min(self.ttl);
        *self.slot.write().await = Some((value, expires_at));
    }

    pub async fn clear(&self) {
        *self.slot.write().await = None;
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Fetches product documentation as text for prompt enrichment.
pub struct DocsSource {
    url: String,
    api_key: Option<String>,
    http: reqwest::Client,
    cache: TtlCache<String>,
}

impl DocsSource {
    pub fn new(url: impl Into<String>, api_key: Option<String>, ttl: Duration) -> Self {
        Self {
            url: url.into(),
            api_key,
            http: reqwest::Client::new(),
            cache: TtlCache::new(ttl),
        }
    }

    /// `None` when no source URL is configured.
    pub fn from_config(config: &DocsConfig) -> Option<Self> {
        let url = config.source_url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }
        Some(Self::new(
            url,
            config.api_key.clone(),
            Duration::from_secs(config.ttl_secs),
        ))
    }

    /// Cached text, or a fresh fetch. Failures are logged and not cached.
    pub async fn fetch(&self) -> Option<String> {
        if let Some(text) = self.cache.get().await {
            debug!("docs served from cache");
            return Some(text);
        }
        match self.download().await {
            Ok(text) => {
                self.cache.insert(text.clone()).await;
                Some(text)
            }
            Err(e) => {
                warn!(error = %e, url = %self.url, "docs fetch failed");
                None
            }
        }
    }

    async fn download(&self) -> Result<String> {
        let mut request = self.http.get(&self.url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(|e| Error::transport("docs", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                service: "docs",
                status: status.as_u16(),
                body: String::new(),
            });
        }
        response.text().await.map_err(|e| Error::parse("docs", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_value_expires_after_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let start = Instant::now();
        cache.insert_at("docs".to_string(), start).await;
        assert_eq!(cache.get_at(start + Duration::from_secs(59)).await.as_deref(), Some("docs"));
        assert_eq!(cache.get_at(start + Duration::from_secs(60)).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_for_uses_shorter_lifetime() {
        let cache = TtlCache::new(Duration::from_secs(3600));
        cache.insert_for(1_u8, Duration::from_secs(10)).await;
        assert_eq!(cache.get().await, Some(1));
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get().await, None);
    }

    #[tokio::test]
    async fn test_docs_are_cached_and_failures_are_not() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer docs-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# Docs"))
            .expect(1)
            .mount(&server)
            .await;

        let docs = DocsSource::new(server.uri(), Some("docs-key".into()), Duration::from_secs(60));
        assert_eq!(docs.fetch().await.as_deref(), Some("# Docs"));
        assert_eq!(docs.fetch().await.as_deref(), Some("# Docs"));

        let broken = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&broken)
            .await;
        let docs = DocsSource::new(broken.uri(), None, Duration::from_secs(60));
        assert_eq!(docs.fetch().await, None);
        assert_eq!(docs.fetch().await, None);
    }

    #[test]
    fn test_from_config_requires_url() {
        assert!(DocsSource::from_config(&DocsConfig::default()).is_none());
    }
}
