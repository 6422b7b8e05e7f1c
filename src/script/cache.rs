//! In-memory script cache keyed by `CacheKey`.
//!
//! Grounded on the `RwLock<HashMap<...>>` synchronization discipline used
//! for the in-memory vector store. No eviction: see the open-question
//! decision recorded for script caching.

use crate::script::types::{CacheKey, Script};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct ScriptCache {
    entries: RwLock<HashMap<CacheKey, Script>>,
}

impl ScriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Script> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn insert(&self, key: CacheKey, script: Script) {
        self.entries.write().await.insert(key, script);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_round_trip() {
        let cache = ScriptCache::new();
        let key = CacheKey::from_fields(&["a", "b"]);
        assert!(cache.get(&key).await.is_none());

        cache
            .insert(key.clone(), Script::Narration("hi".to_string()))
            .await;

        assert!(cache.get(&key).await.is_some());
        assert_eq!(cache.len().await, 1);
    }
}
