//! Process-wide daemon state.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use vox_core::{DaemonConfig, HealthReport, ServiceState};
use vox_engine::SpeechEngine;

use crate::cache::VoiceCache;

/// Everything a request handler needs, constructed once at startup and
/// shared behind `Arc`. Teardown happens through graceful shutdown, not
/// process death.
pub struct DaemonContext {
    pub config: DaemonConfig,
    pub engine: Arc<dyn SpeechEngine>,
    /// Capability snapshot taken at startup; all incoming voice ids are
    /// validated against this set, never against the engine per-request.
    pub voices: BTreeSet<String>,
    pub cache: VoiceCache,
    pub activity: ActivityTracker,
    state: RwLock<ServiceState>,
}

impl DaemonContext {
    pub fn new(config: DaemonConfig, engine: Arc<dyn SpeechEngine>) -> Self {
        let voices: BTreeSet<String> = engine.voices().into_iter().collect();
        let cache = VoiceCache::new(Arc::clone(&engine), config.voice_cache_capacity);
        Self {
            config,
            engine,
            voices,
            cache,
            activity: ActivityTracker::new(),
            state: RwLock::new(ServiceState::Starting),
        }
    }

    pub fn state(&self) -> ServiceState {
        *self.state.read()
    }

    pub fn set_state(&self, state: ServiceState) {
        *self.state.write() = state;
    }

    pub fn knows_voice(&self, voice_id: &str) -> bool {
        self.voices.contains(voice_id)
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: self.state(),
            voices: self.voices.iter().cloned().collect(),
            idle_timeout_mins: self.config.idle_timeout_mins,
        }
    }
}

/// Last-activity clock shared between request handlers and the idle
/// monitor. Monotonically non-decreasing; only synthesis requests touch it.
pub struct ActivityTracker {
    origin: Instant,
    last_ms: AtomicU64,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    /// Record activity now. `fetch_max` keeps the timestamp monotonic under
    /// concurrent handlers.
    pub fn touch(&self) {
        let now = self.origin.elapsed().as_millis() as u64;
        self.last_ms.fetch_max(now, Ordering::Release);
    }

    /// Time elapsed since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        let now = self.origin.elapsed().as_millis() as u64;
        Duration::from_millis(now.saturating_sub(self.last_ms.load(Ordering::Acquire)))
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}
