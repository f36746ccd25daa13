//! Resolution result cache
//!
//! Keyed by chat, media kind and a digest of the normalized message plus the
//! sorted attachment descriptors. Entries expire after the TTL; when capacity
//! is exceeded the single oldest entry is evicted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::media::{Attachment, MediaKind, ResolutionResult};
use crate::semantic::normalize_message;

/// Identity of a cached resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub chat_id: String,
    pub kind: MediaKind,
    pub digest: String,
}

impl CacheKey {
    pub fn new(
        chat_id: impl Into<String>,
        kind: MediaKind,
        message: &str,
        attachments: &[Attachment],
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            kind,
            digest: request_digest(message, attachments),
        }
    }
}

/// Hex SHA-256 of the normalized message and sorted attachment descriptors
pub fn request_digest(message: &str, attachments: &[Attachment]) -> String {
    let mut descriptors: Vec<String> = attachments.iter().map(Attachment::descriptor).collect();
    descriptors.sort();

    let mut hasher = Sha256::new();
    hasher.update(normalize_message(message).as_bytes());
    for descriptor in &descriptors {
        hasher.update(b"\n");
        hasher.update(descriptor.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: ResolutionResult,
    inserted_at: Instant,
}

/// Counter snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

/// Shared TTL cache of resolution results
pub struct ResultCache {
    entries: DashMap<CacheKey, CacheEntry>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Whether a request is eligible for caching at all
    pub fn should_cache(
        &self,
        message: &str,
        attachments: &[Attachment],
        chat_id: Option<&str>,
    ) -> bool {
        self.config.enabled
            && chat_id.is_some_and(|id| !id.is_empty())
            && message.trim().chars().count() >= self.config.min_message_chars
            && attachments.len() <= self.config.max_attachments
    }

    pub fn get(&self, key: &CacheKey) -> Option<ResolutionResult> {
        self.get_at(key, Instant::now())
    }

    /// Lookup as of `now`; an expired entry is evicted and reported as a miss
    pub fn get_at(&self, key: &CacheKey, now: Instant) -> Option<ResolutionResult> {
        let ttl = self.config.ttl();
        let lookup = self.entries.get(key).map(|entry| {
            if now.saturating_duration_since(entry.inserted_at) < ttl {
                Some(entry.result.clone())
            } else {
                None
            }
        });

        match lookup {
            Some(Some(result)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(result)
            }
            Some(None) => {
                self.evict_if_expired(key, now);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Remove `key` only if its current entry is expired, so an entry
    /// refreshed concurrently survives
    fn evict_if_expired(&self, key: &CacheKey, now: Instant) -> bool {
        let ttl = self.config.ttl();
        let removed = self
            .entries
            .remove_if(key, |_, entry| now.saturating_duration_since(entry.inserted_at) >= ttl)
            .is_some();
        if removed {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    pub fn set(&self, key: CacheKey, result: ResolutionResult) {
        self.set_at(key, result, Instant::now());
    }

    pub fn set_at(&self, key: CacheKey, result: ResolutionResult, now: Instant) {
        self.entries.insert(
            key,
            CacheEntry {
                result,
                inserted_at: now,
            },
        );
        while self.entries.len() > self.config.capacity.max(1) {
            if !self.evict_oldest() {
                break;
            }
        }
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().inserted_at)
            .map(|entry| entry.key().clone());
        match oldest {
            Some(key) => {
                self.entries.remove(&key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Remove every entry of one chat; returns how many were removed
    pub fn clear_for_chat(&self, chat_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.chat_id != chat_id);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(chat_id, removed, "Cleared cached resolutions");
        }
        removed
    }

    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    /// Remove all entries older than the TTL as of `now`
    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let ttl = self.config.ttl();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.inserted_at) < ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, "Swept expired cache entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    /// Periodically sweep expired entries until `cancel` fires
    pub fn spawn_sweeper(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let period = self.config.sweep_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.sweep_expired();
                    }
                }
            }
            info!("Cache sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Strategy;
    use std::time::Duration;

    fn result(reasoning: &str) -> ResolutionResult {
        ResolutionResult::empty(Strategy::Default, reasoning)
    }

    fn key(chat: &str, message: &str) -> CacheKey {
        CacheKey::new(chat, MediaKind::Image, message, &[])
    }

    #[test]
    fn test_set_then_get_round_trip() {
        let cache = ResultCache::default();
        let start = Instant::now();
        cache.set_at(key("c1", "edit it"), result("r"), start);
        assert_eq!(
            cache.get_at(&key("c1", "edit it"), start + Duration::from_secs(1)),
            Some(result("r"))
        );
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_expired_entry_misses_and_is_evicted() {
        let cache = ResultCache::default();
        let start = Instant::now();
        cache.set_at(key("c1", "edit it"), result("r"), start);
        assert!(cache
            .get_at(&key("c1", "edit it"), start + Duration::from_secs(300))
            .is_none());
        assert!(cache.is_empty());
        let stats = cache.stats();
        assert_eq!((stats.misses, stats.evictions), (1, 1));
    }

    #[test]
    fn test_refreshed_entry_survives_stale_eviction() {
        let cache = ResultCache::default();
        let start = Instant::now();
        let stale_at = start + Duration::from_secs(300);
        cache.set_at(key("c1", "edit it"), result("old"), start);
        // Another writer refreshes the entry after the expired read
        cache.set_at(key("c1", "edit it"), result("new"), stale_at);

        assert!(!cache.evict_if_expired(&key("c1", "edit it"), stale_at));
        assert_eq!(cache.get_at(&key("c1", "edit it"), stale_at), Some(result("new")));
        assert_eq!(cache.stats().evictions, 0);

        assert!(cache.evict_if_expired(&key("c1", "edit it"), stale_at + Duration::from_secs(300)));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_digest_normalizes_message_and_attachment_order() {
        let a = Attachment::new("https://cdn/a.png", "image/png");
        let b = Attachment::new("https://cdn/b.png", "image/png");
        assert_eq!(
            request_digest("Edit  IT", &[a.clone(), b.clone()]),
            request_digest("edit it", &[b.clone(), a.clone()])
        );
        assert_ne!(request_digest("edit it", &[a]), request_digest("edit it", &[b]));
        assert_eq!(request_digest("x", &[]).len(), 64);
    }

    #[test]
    fn test_capacity_evicts_single_oldest() {
        let cache = ResultCache::new(CacheConfig {
            capacity: 2,
            ..CacheConfig::default()
        });
        let start = Instant::now();
        cache.set_at(key("c", "one"), result("1"), start);
        cache.set_at(key("c", "two"), result("2"), start + Duration::from_secs(1));
        cache.set_at(key("c", "three"), result("3"), start + Duration::from_secs(2));

        let later = start + Duration::from_secs(3);
        assert_eq!(cache.len(), 2);
        assert!(cache.get_at(&key("c", "one"), later).is_none());
        assert!(cache.get_at(&key("c", "two"), later).is_some());
        assert!(cache.get_at(&key("c", "three"), later).is_some());
    }

    #[test]
    fn test_clear_for_chat() {
        let cache = ResultCache::default();
        cache.set(key("a", "edit"), result("1"));
        cache.set(key("a", "more"), result("2"));
        cache.set(key("b", "edit"), result("3"));
        assert_eq!(cache.clear_for_chat("a"), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let cache = ResultCache::default();
        let start = Instant::now();
        cache.set_at(key("c", "old"), result("1"), start);
        cache.set_at(key("c", "new"), result("2"), start + Duration::from_secs(200));
        assert_eq!(cache.sweep_expired_at(start + Duration::from_secs(301)), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_should_cache_rules() {
        let cache = ResultCache::default();
        let many: Vec<Attachment> = (0..11)
            .map(|i| Attachment::new(format!("https://cdn/{i}.png"), "image/png"))
            .collect();
        assert!(cache.should_cache("edit it", &[], Some("chat")));
        assert!(!cache.should_cache("hi", &[], Some("chat")));
        assert!(!cache.should_cache("edit it", &[], None));
        assert!(!cache.should_cache("edit it", &many, Some("chat")));
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_cancel() {
        let cache = Arc::new(ResultCache::new(CacheConfig {
            sweep_interval_secs: 1,
            ..CacheConfig::default()
        }));
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&cache).spawn_sweeper(cancel.clone());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
