//! Bounded LRU cache of loaded voice states.
//!
//! Per-voice single-flight loads: concurrent requests for one cold voice
//! share a single load, while unrelated voices never serialize behind each
//! other. Entries are read-only after load and shared behind `Arc`, so
//! release is implicit; eviction only drops the cache's own reference.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use vox_core::{VoxError, VoxResult};
use vox_engine::{SpeechEngine, VoiceState};

type Slot = Arc<OnceCell<Arc<VoiceState>>>;

pub struct VoiceCache {
    engine: Arc<dyn SpeechEngine>,
    capacity: usize,
    slots: DashMap<String, Slot>,
    /// Recency order of loaded voices: front = least recently used.
    recency: Mutex<Vec<String>>,
}

impl VoiceCache {
    pub fn new(engine: Arc<dyn SpeechEngine>, capacity: usize) -> Self {
        Self {
            engine,
            capacity: capacity.max(1),
            slots: DashMap::new(),
            recency: Mutex::new(Vec::new()),
        }
    }

    /// Get the voice state, loading it if absent. Blocks only on the load
    /// of this particular voice.
    pub async fn acquire(&self, voice_id: &str) -> VoxResult<Arc<VoiceState>> {
        let slot: Slot = self
            .slots
            .entry(voice_id.to_string())
            .or_default()
            .clone();

        let state = slot
            .get_or_try_init(|| self.load_with_retry(voice_id))
            .await?
            .clone();

        self.touch(voice_id);
        Ok(state)
    }

    /// Number of loaded voices currently resident.
    pub fn len(&self) -> usize {
        self.recency.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recency.lock().is_empty()
    }

    /// Whether the voice is resident without triggering a load.
    pub fn contains(&self, voice_id: &str) -> bool {
        self.slots
            .get(voice_id)
            .map(|slot| slot.initialized())
            .unwrap_or(false)
    }

    /// One retry for failed loads. Unknown voices are deterministic and
    /// never retried; mid-generation failures are not this path's concern.
    async fn load_with_retry(&self, voice_id: &str) -> VoxResult<Arc<VoiceState>> {
        match self.load_once(voice_id).await {
            Ok(state) => Ok(state),
            Err(err @ VoxError::UnknownVoice(_)) => Err(err),
            Err(err) => {
                warn!(voice = voice_id, error = %err, "voice load failed, retrying once");
                self.load_once(voice_id).await
            }
        }
    }

    async fn load_once(&self, voice_id: &str) -> VoxResult<Arc<VoiceState>> {
        let engine = Arc::clone(&self.engine);
        let id = voice_id.to_string();
        let state = tokio::task::spawn_blocking(move || engine.load_voice(&id))
            .await
            .map_err(|e| VoxError::engine(format!("voice load task failed: {e}")))??;
        debug!(voice = voice_id, "voice state loaded");
        Ok(Arc::new(state))
    }

    /// Mark the voice most recently used and evict over capacity.
    fn touch(&self, voice_id: &str) {
        let mut recency = self.recency.lock();
        recency.retain(|v| v != voice_id);
        recency.push(voice_id.to_string());

        while recency.len() > self.capacity {
            let evicted = recency.remove(0);
            self.slots.remove(&evicted);
            info!(voice = %evicted, "evicted least-recently-used voice state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vox_engine::MockEngine;

    /// Engine wrapper that makes loads take real time, for contention tests.
    struct SlowLoadEngine {
        inner: MockEngine,
        delay: Duration,
    }

    impl SpeechEngine for SlowLoadEngine {
        fn voices(&self) -> Vec<String> {
            self.inner.voices()
        }

        fn load_voice(&self, voice_id: &str) -> VoxResult<VoiceState> {
            std::thread::sleep(self.delay);
            self.inner.load_voice(voice_id)
        }

        fn synthesize(&self, voice: &VoiceState, text: &str) -> VoxResult<vox_engine::ChunkStream> {
            self.inner.synthesize(voice, text)
        }
    }

    #[tokio::test]
    async fn test_repeated_acquire_loads_once() {
        let engine = Arc::new(MockEngine::new());
        let cache = VoiceCache::new(Arc::clone(&engine) as Arc<dyn SpeechEngine>, 4);

        for _ in 0..5 {
            cache.acquire("alba").await.unwrap();
        }
        assert_eq!(engine.load_count(), 1);
        assert!(cache.contains("alba"));
    }

    #[tokio::test]
    async fn test_lru_eviction_and_reload() {
        let engine = Arc::new(MockEngine::new());
        let cache = VoiceCache::new(Arc::clone(&engine) as Arc<dyn SpeechEngine>, 2);

        cache.acquire("alba").await.unwrap();
        cache.acquire("marius").await.unwrap();
        // "alba" is now LRU; loading a third voice evicts it.
        cache.acquire("javert").await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("alba"));
        assert!(cache.contains("marius"));
        assert!(cache.contains("javert"));
        assert_eq!(engine.load_count(), 3);

        // Re-requesting the evicted voice reloads it.
        cache.acquire("alba").await.unwrap();
        assert_eq!(engine.load_count(), 4);
    }

    #[tokio::test]
    async fn test_touch_refreshes_recency() {
        let engine = Arc::new(MockEngine::new());
        let cache = VoiceCache::new(Arc::clone(&engine) as Arc<dyn SpeechEngine>, 2);

        cache.acquire("alba").await.unwrap();
        cache.acquire("marius").await.unwrap();
        // Refresh "alba"; "marius" becomes LRU.
        cache.acquire("alba").await.unwrap();
        cache.acquire("javert").await.unwrap();

        assert!(cache.contains("alba"));
        assert!(!cache.contains("marius"));
    }

    #[tokio::test]
    async fn test_unknown_voice_does_not_enter_cache() {
        let engine = Arc::new(MockEngine::new());
        let cache = VoiceCache::new(Arc::clone(&engine) as Arc<dyn SpeechEngine>, 2);

        let err = cache.acquire("nonexistent").await.unwrap_err();
        assert!(matches!(err, VoxError::UnknownVoice(_)));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_same_voice_single_flight() {
        let inner = MockEngine::new();
        let engine = Arc::new(SlowLoadEngine {
            inner,
            delay: Duration::from_millis(100),
        });
        let cache = Arc::new(VoiceCache::new(
            Arc::clone(&engine) as Arc<dyn SpeechEngine>,
            4,
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(
                async move { cache.acquire("alba").await },
            ));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(engine.inner.load_count(), 1);
    }

    #[tokio::test]
    async fn test_distinct_voices_load_in_parallel() {
        let delay = Duration::from_millis(300);
        let engine = Arc::new(SlowLoadEngine {
            inner: MockEngine::new(),
            delay,
        });
        let cache = Arc::new(VoiceCache::new(
            Arc::clone(&engine) as Arc<dyn SpeechEngine>,
            4,
        ));

        let start = std::time::Instant::now();
        let a = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.acquire("alba").await })
        };
        let b = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.acquire("marius").await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // Sequential loads would take 2x the delay.
        assert!(start.elapsed() < delay * 2);
        assert_eq!(engine.inner.load_count(), 2);
    }
}
