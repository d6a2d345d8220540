//! Core data types shared between the daemon and the client.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{VoxError, VoxResult};

/// Output sample rate in Hz (mono, 16-bit).
pub const SAMPLE_RATE: u32 = 24_000;

/// Bytes per PCM sample (i16 little-endian).
pub const BYTES_PER_SAMPLE: usize = 2;

/// A bounded, sequenced unit of generated audio.
///
/// Chunks are produced lazily by the engine and must be delivered in
/// sequence order. Exactly one chunk per stream carries `is_final`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Position in the stream, starting at 0 with no gaps.
    pub sequence: u32,
    /// PCM payload, i16 little-endian mono.
    pub samples: Vec<u8>,
    /// Terminal marker; set on the last chunk of the stream.
    pub is_final: bool,
}

impl AudioChunk {
    /// Create a non-final chunk.
    pub fn new(sequence: u32, samples: Vec<u8>) -> Self {
        Self {
            sequence,
            samples,
            is_final: false,
        }
    }

    /// Create the terminal chunk with no payload (minimal silent stream).
    pub fn final_marker(sequence: u32) -> Self {
        Self {
            sequence,
            samples: Vec::new(),
            is_final: true,
        }
    }

    /// Number of PCM samples in this chunk.
    pub fn num_samples(&self) -> usize {
        self.samples.len() / BYTES_PER_SAMPLE
    }

    /// Duration of this chunk in milliseconds.
    pub fn duration_ms(&self) -> f32 {
        self.num_samples() as f32 * 1000.0 / SAMPLE_RATE as f32
    }
}

/// Where the client routes received audio. Modes are mutually exclusive
/// per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    /// Live device playback.
    Play,
    /// Write a WAV file, no playback.
    File(PathBuf),
}

/// A single synthesis invocation. Immutable after creation.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice_id: String,
    pub sink: Sink,
}

impl SynthesisRequest {
    /// Create a request for live playback. The text must be non-empty
    /// after trimming.
    pub fn new(text: impl Into<String>, voice_id: impl Into<String>) -> VoxResult<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(VoxError::invalid_input("text must not be empty"));
        }
        Ok(Self {
            text,
            voice_id: voice_id.into(),
            sink: Sink::Play,
        })
    }

    /// Select the output sink.
    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sink = sink;
        self
    }
}

/// Lifecycle state of the daemon process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Starting,
    Ready,
    ShuttingDown,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceState::Starting => write!(f, "starting"),
            ServiceState::Ready => write!(f, "ready"),
            ServiceState::ShuttingDown => write!(f, "shutting_down"),
        }
    }
}

/// Health endpoint payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: ServiceState,
    pub voices: Vec<String>,
    pub idle_timeout_mins: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_accessors() {
        let chunk = AudioChunk::new(3, vec![0u8; 3840]);
        assert_eq!(chunk.num_samples(), 1920);
        assert!((chunk.duration_ms() - 80.0).abs() < f32::EPSILON);
        assert!(!chunk.is_final);

        let last = AudioChunk::final_marker(4);
        assert!(last.is_final);
        assert_eq!(last.num_samples(), 0);
    }

    #[test]
    fn test_request_rejects_empty_text() {
        assert!(SynthesisRequest::new("   ", "alba").is_err());
        assert!(SynthesisRequest::new("hello", "alba").is_ok());
    }

    #[test]
    fn test_request_sink_selection() {
        let req = SynthesisRequest::new("hello", "alba")
            .unwrap()
            .with_sink(Sink::File(PathBuf::from("out.wav")));
        assert_eq!(req.sink, Sink::File(PathBuf::from("out.wav")));
    }

    #[test]
    fn test_service_state_wire_names() {
        assert_eq!(
            serde_json::to_string(&ServiceState::Ready).unwrap(),
            "\"ready\""
        );
        assert_eq!(
            serde_json::to_string(&ServiceState::ShuttingDown).unwrap(),
            "\"shutting_down\""
        );
        let state: ServiceState = serde_json::from_str("\"starting\"").unwrap();
        assert_eq!(state, ServiceState::Starting);
    }

    #[test]
    fn test_health_report_roundtrip() {
        let report = HealthReport {
            status: ServiceState::Ready,
            voices: vec!["alba".to_string(), "marius".to_string()],
            idle_timeout_mins: 60,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"status\":\"ready\""));
        let back: HealthReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.voices.len(), 2);
        assert_eq!(back.idle_timeout_mins, 60);
    }
}
