//! Deterministic mock synthesis backend.
//!
//! Generates harmonically shaped tones from `(voice, text)` alone, so two
//! renderings of the same input are byte-identical regardless of chunking.
//! That property is what the stream-integrity tests lean on: streamed
//! delivery changes granularity, never content.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use vox_core::{AudioChunk, VoxError, VoxResult, SAMPLE_RATE};

use crate::voice::VoiceState;
use crate::{ChunkStream, SpeechEngine, BUILTIN_VOICES, FRAME_SAMPLES};

const CHARS_PER_FRAME: usize = 6;
const MIN_FRAMES: usize = 2;
const MAX_FRAMES: usize = 512;
const AMPLITUDE: f32 = 0.35;
const FADE_IN_SAMPLES: usize = 480;
const FADE_OUT_SAMPLES: usize = 960;

/// Deterministic engine used as the default backend and in tests.
#[derive(Debug, Default)]
pub struct MockEngine {
    loads: AtomicUsize,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `load_voice` calls served so far. Lets cache tests observe
    /// loads and reloads directly.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    /// Whole-utterance rendering: every non-final payload concatenated.
    /// The reference the streamed path is compared against.
    pub fn render_all(&self, voice: &VoiceState, text: &str) -> VoxResult<Vec<u8>> {
        let mut pcm = Vec::new();
        for chunk in self.synthesize(voice, text)? {
            pcm.extend_from_slice(&chunk?.samples);
        }
        Ok(pcm)
    }
}

impl SpeechEngine for MockEngine {
    fn voices(&self) -> Vec<String> {
        BUILTIN_VOICES.iter().map(|v| v.to_string()).collect()
    }

    fn load_voice(&self, voice_id: &str) -> VoxResult<VoiceState> {
        if !BUILTIN_VOICES.contains(&voice_id) {
            return Err(VoxError::UnknownVoice(voice_id.to_string()));
        }
        self.loads.fetch_add(1, Ordering::Relaxed);

        let seed = fnv1a(voice_id);
        let base_hz = 96.0 + (seed % 160) as f32;
        let timbre: Vec<f32> = (1..=4u64)
            .map(|k| {
                let v = ((seed >> (8 * k)) & 0xff) as f32 / 255.0;
                (0.3 + 0.7 * v) / k as f32
            })
            .collect();

        debug!(voice = voice_id, base_hz, "voice state built");
        Ok(VoiceState::new(voice_id, base_hz, timbre))
    }

    fn synthesize(&self, voice: &VoiceState, text: &str) -> VoxResult<ChunkStream> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Box::new(std::iter::once(Ok(AudioChunk::final_marker(0)))));
        }

        let frames = (text.chars().count() / CHARS_PER_FRAME + 1).clamp(MIN_FRAMES, MAX_FRAMES);
        Ok(Box::new(MockStream {
            voice: voice.clone(),
            text_seed: fnv1a(text),
            total_frames: frames as u32,
            next: 0,
        }))
    }
}

/// Lazy chunk producer. Each frame is a pure function of its absolute
/// sample positions, which keeps streamed and whole-utterance output
/// identical. After the content frames it emits one empty terminal marker.
struct MockStream {
    voice: VoiceState,
    text_seed: u64,
    total_frames: u32,
    next: u32,
}

impl Iterator for MockStream {
    type Item = VoxResult<AudioChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.total_frames {
            return None;
        }
        if self.next == self.total_frames {
            self.next += 1;
            return Some(Ok(AudioChunk::final_marker(self.total_frames)));
        }
        let seq = self.next;
        self.next += 1;

        let total_samples = self.total_frames as usize * FRAME_SAMPLES;
        let start = seq as usize * FRAME_SAMPLES;
        let mut samples = Vec::with_capacity(FRAME_SAMPLES * 2);

        let vibrato_phase = (self.text_seed % 628) as f32 / 100.0;
        for i in start..start + FRAME_SAMPLES {
            let t = i as f32 / SAMPLE_RATE as f32;
            let phase = std::f32::consts::TAU * self.voice.base_hz * t
                + 0.8 * (std::f32::consts::TAU * 2.5 * t + vibrato_phase).sin();

            let mut value = 0.0f32;
            for (k, weight) in self.voice.timbre.iter().enumerate() {
                value += weight * ((k + 1) as f32 * phase).sin();
            }
            value *= AMPLITUDE * envelope(i, total_samples);

            let sample = (value.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            samples.extend_from_slice(&sample.to_le_bytes());
        }

        Some(Ok(AudioChunk::new(seq, samples)))
    }
}

/// Attack/release envelope over the whole utterance.
fn envelope(i: usize, total: usize) -> f32 {
    let fade_in = FADE_IN_SAMPLES.min(total / 4).max(1);
    let fade_out = FADE_OUT_SAMPLES.min(total / 4).max(1);
    if i < fade_in {
        i as f32 / fade_in as f32
    } else if i + fade_out > total {
        (total - i) as f32 / fade_out as f32
    } else {
        1.0
    }
}

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in s.bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
