//! Opaque per-voice synthesis context.

use std::sync::Arc;

/// Loaded per-voice state required to generate audio in that voice.
///
/// Expensive to construct, cheap to reuse, read-only after load. Owned by
/// the daemon's voice cache and shared behind `Arc` across concurrent
/// requests; nothing outside the engine inspects its contents.
#[derive(Debug, Clone)]
pub struct VoiceState {
    voice_id: String,
    pub(crate) base_hz: f32,
    pub(crate) timbre: Arc<[f32]>,
}

impl VoiceState {
    pub(crate) fn new(voice_id: impl Into<String>, base_hz: f32, timbre: Vec<f32>) -> Self {
        Self {
            voice_id: voice_id.into(),
            base_hz,
            timbre: timbre.into(),
        }
    }

    /// Identifier of the voice this state was built for.
    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }
}
