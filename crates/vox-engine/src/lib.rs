//! # vox-engine
//!
//! Adapter layer over the speech synthesis engine.
//!
//! The engine is an external capability: given text and a loaded voice, it
//! produces a lazy, finite, non-restartable sequence of audio chunks. This
//! crate defines that contract plus an opaque per-voice context, and ships
//! a deterministic mock backend so the whole pipeline runs (and is tested)
//! without model weights.

mod mock;
mod voice;

pub use mock::MockEngine;
pub use voice::VoiceState;

use vox_core::{AudioChunk, VoxResult, SAMPLE_RATE};

/// Built-in voice catalog, queried once at daemon startup.
pub const BUILTIN_VOICES: [&str; 8] = [
    "alba", "marius", "javert", "jean", "fantine", "cosette", "eponine", "azelma",
];

/// Voice used when the client does not specify one.
pub const DEFAULT_VOICE: &str = "alba";

/// Engine frame granularity: 80 ms of mono audio at 24 kHz.
pub const FRAME_SAMPLES: usize = 1920;

/// Lazy chunk sequence produced by a synthesis call.
///
/// Finite and non-restartable: once consumed it cannot be rewound, and a
/// mid-generation failure aborts the remainder of the sequence.
pub type ChunkStream = Box<dyn Iterator<Item = VoxResult<AudioChunk>> + Send>;

/// Contract every synthesis backend implements.
pub trait SpeechEngine: Send + Sync {
    /// The engine's voice catalog. Fixed for the engine's lifetime; callers
    /// snapshot it once at startup and validate voice ids against that
    /// snapshot.
    fn voices(&self) -> Vec<String>;

    /// Build the per-voice synthesis context. Expensive (tens of
    /// milliseconds); callers are expected to cache the result.
    fn load_voice(&self, voice_id: &str) -> VoxResult<VoiceState>;

    /// Lazily synthesize `text` in the given voice.
    ///
    /// Chunks carry contiguous sequence numbers from 0 and exactly one
    /// terminal chunk. Empty text yields a single final chunk with zero
    /// samples. Generation begins before the full utterance exists; the
    /// first chunk is available after one engine frame of compute.
    fn synthesize(&self, voice: &VoiceState, text: &str) -> VoxResult<ChunkStream>;

    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}
