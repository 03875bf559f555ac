use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

/// How long a memory snapshot stays fresh before a re-fetch
pub const DEFAULT_MEMORY_TTL: Duration = Duration::from_secs(300);

/// Conversation-memory store, keyed by lead/conversation id
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn get_context(&self, subject_id: &str) -> anyhow::Result<Value>;
}

struct CacheEntry {
    value: Value,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

/// TTL-bounded read-through cache for memory snapshots. Eventually consistent
/// under concurrent misses: overlapping requests for the same uncached key may
/// each fetch and store, last write wins. No eviction beyond TTL expiry.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().unwrap();
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: &str, value: Value) {
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl: self.ttl,
            },
        );
    }

    /// Drop entries past their TTL
    pub fn purge_expired(&self) {
        let mut entries = self.entries.write().unwrap();
        entries.retain(|_, entry| !entry.is_expired());
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_TTL)
    }
}

/// Augments a request's context with prior conversation memory, degrading
/// silently when the store is unavailable.
pub struct ContextEnhancer {
    store: Arc<dyn MemoryStore>,
    cache: MemoryCache,
}

impl ContextEnhancer {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self {
            store,
            cache: MemoryCache::default(),
        }
    }

    pub fn with_ttl(store: Arc<dyn MemoryStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: MemoryCache::new(ttl),
        }
    }

    /// The identifying key for memory lookup and CRM sync. `lead_id` wins,
    /// `contact_id` is accepted as an alias.
    pub fn subject_id(context: &Map<String, Value>) -> Option<&str> {
        context
            .get("lead_id")
            .or_else(|| context.get("contact_id"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Returns the context with memory fields attached. Never errors past its
    /// own boundary: any retrieval failure logs and returns the original
    /// context unchanged. No identifying key means no cache consultation.
    pub async fn enhance(&self, context: &Map<String, Value>) -> Map<String, Value> {
        let Some(subject_id) = Self::subject_id(context) else {
            return context.clone();
        };

        let snapshot = match self.snapshot_for(subject_id).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                debug!(subject_id, error = %err, "memory store unavailable, continuing without");
                return context.clone();
            }
        };

        let mut enhanced = context.clone();
        enhanced.insert(
            "semantic_memory".to_string(),
            snapshot
                .get("relevant_knowledge")
                .cloned()
                .unwrap_or_else(|| json!("")),
        );
        enhanced.insert(
            "conversation_history".to_string(),
            snapshot
                .get("conversation_history")
                .cloned()
                .unwrap_or_else(|| json!([])),
        );
        enhanced.insert(
            "extracted_preferences".to_string(),
            snapshot
                .get("extracted_preferences")
                .cloned()
                .unwrap_or_else(|| json!({})),
        );
        enhanced
    }

    async fn snapshot_for(&self, subject_id: &str) -> anyhow::Result<Value> {
        let cache_key = format!("mem_ctx:{subject_id}");
        if let Some(cached) = self.cache.get(&cache_key) {
            return Ok(cached);
        }

        let snapshot = self.store.get_context(subject_id).await?;
        self.cache.insert(&cache_key, snapshot.clone());
        Ok(snapshot)
    }
}
