//! # vox-core
//!
//! Shared foundation for the vox streaming TTS daemon and client.
//!
//! Provides:
//! - Core data types (chunks, requests, service state)
//! - Unified error taxonomy
//! - Wire framing for chunked audio streams
//! - Daemon configuration
//! - Logging setup

pub mod config;
pub mod error;
pub mod frame;
pub mod logging;
pub mod types;

pub use config::{default_daemon_log_file, DaemonConfig, LoggingConfig, DEFAULT_PORT};
pub use error::{VoxError, VoxResult};
pub use types::{
    AudioChunk, HealthReport, ServiceState, Sink, SynthesisRequest, BYTES_PER_SAMPLE, SAMPLE_RATE,
};
