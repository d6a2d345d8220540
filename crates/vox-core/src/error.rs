//! Unified error types for the vox daemon/client pipeline.

/// Main error type for daemon and client operations.
#[derive(Debug, thiserror::Error)]
pub enum VoxError {
    /// The daemon could not be reached, including after a launch attempt.
    #[error("service unreachable at {endpoint}: {reason}")]
    ConnectionUnavailable { endpoint: String, reason: String },

    /// The requested voice is not in the daemon's catalog.
    #[error("unknown voice '{0}'")]
    UnknownVoice(String),

    /// Upstream generation fault; aborts the stream it occurred in.
    #[error("engine failure: {0}")]
    EngineFailure(String),

    /// Output device unavailable or failed.
    #[error("playback device error: {0}")]
    PlaybackDevice(String),

    /// No first chunk within the configured bound.
    #[error("no audio received within {ms}ms")]
    RequestTimeout { ms: u64 },

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Malformed or truncated chunk stream.
    #[error("malformed audio stream: {0}")]
    Stream(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results with VoxError.
pub type VoxResult<T> = Result<T, VoxError>;

impl VoxError {
    /// Create an engine failure error with message.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::EngineFailure(msg.into())
    }

    /// Create a stream error with message.
    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream(msg.into())
    }

    /// Create an invalid input error with message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a playback device error with message.
    pub fn playback(msg: impl Into<String>) -> Self {
        Self::PlaybackDevice(msg.into())
    }

    /// Create a config error with message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Deterministic client errors are never worth retrying.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::UnknownVoice(_) | Self::InvalidInput(_))
    }
}
