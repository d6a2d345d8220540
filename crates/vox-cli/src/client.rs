//! Streaming synthesis client.
//!
//! Issues the request, decodes frames as they arrive, and routes samples to
//! the configured sink while recording timing milestones. Network receipt
//! and device playback overlap through the playback buffer.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use vox_core::frame::FrameReader;
use vox_core::{Sink, SynthesisRequest, VoxError, VoxResult};

use crate::playback::{PlaybackBuffer, StreamSource, PREBUFFER_SAMPLES};
use crate::sink::FileSink;

/// A request producing no audio within this bound is a stall, surfaced as
/// an error rather than retried silently.
pub const FIRST_CHUNK_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Install the ^C handler: stop pulling from the network and let already
/// buffered audio drain instead of dying mid-sample.
pub fn install_interrupt_handler() {
    let _ = ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::SeqCst));
}

fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Per-invocation timing milestones, for status reporting.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClientSession {
    pub connected_ms: Option<u128>,
    pub first_chunk_ms: Option<u128>,
    pub completed_ms: Option<u128>,
}

pub struct StreamingClient {
    base_url: String,
    quiet: bool,
}

impl StreamingClient {
    pub fn new(base_url: String, quiet: bool) -> Self {
        Self { base_url, quiet }
    }

    /// Run the request to completion.
    ///
    /// Exactly one whole-request retry on transport loss or truncation
    /// mid-stream (resynthesis, not resume). Client errors and stalls are
    /// surfaced immediately.
    pub fn synthesize(&self, request: &SynthesisRequest) -> VoxResult<ClientSession> {
        match self.attempt(request) {
            Ok(session) => Ok(session),
            Err(err) if retryable(&err) && !interrupted() => {
                debug!(error = %err, "stream interrupted, retrying whole request");
                self.status("connection lost, retrying");
                self.attempt(request)
            }
            Err(err) => Err(err),
        }
    }

    fn attempt(&self, request: &SynthesisRequest) -> VoxResult<ClientSession> {
        let start = Instant::now();
        let mut session = ClientSession::default();

        let url = format!(
            "{}/tts?text={}&voice={}",
            self.base_url,
            urlencoding::encode(&request.text),
            urlencoding::encode(&request.voice_id),
        );
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(FIRST_CHUNK_TIMEOUT)
            .build();

        let response = match agent.get(&url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let detail = response.into_string().unwrap_or_default();
                return Err(map_status_error(code, &request.voice_id, &detail));
            }
            Err(err) => {
                return Err(VoxError::ConnectionUnavailable {
                    endpoint: self.base_url.clone(),
                    reason: err.to_string(),
                });
            }
        };

        session.connected_ms = Some(start.elapsed().as_millis());
        self.status(&format!(
            "⚡ connected {}ms",
            session.connected_ms.unwrap_or(0)
        ));

        let mut frames = FrameReader::new(response.into_reader());
        match &request.sink {
            Sink::File(path) => self.stream_to_file(&mut frames, path, start, session),
            Sink::Play => self.stream_to_device(&mut frames, start, session),
        }
    }

    fn stream_to_file<R: Read>(
        &self,
        frames: &mut FrameReader<R>,
        path: &std::path::Path,
        start: Instant,
        mut session: ClientSession,
    ) -> VoxResult<ClientSession> {
        let mut sink = FileSink::create(path)?;

        loop {
            if interrupted() {
                break;
            }
            let chunk = match frames.next_frame() {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(err) => return Err(self.classify(err, &session)),
            };
            if session.first_chunk_ms.is_none() {
                session.first_chunk_ms = Some(start.elapsed().as_millis());
                self.status(&format!(
                    "⚡ first audio {}ms",
                    session.first_chunk_ms.unwrap_or(0)
                ));
            }
            sink.write_chunk(&chunk)?;
        }

        let path = sink.finalize()?;
        session.completed_ms = Some(start.elapsed().as_millis());
        self.status(&format!(
            "✓ saved {} {}ms",
            path.display(),
            session.completed_ms.unwrap_or(0)
        ));
        Ok(session)
    }

    fn stream_to_device<R: Read>(
        &self,
        frames: &mut FrameReader<R>,
        start: Instant,
        mut session: ClientSession,
    ) -> VoxResult<ClientSession> {
        let (_stream, handle) = rodio::OutputStream::try_default()
            .map_err(|e| VoxError::playback(format!("no audio output device: {e}")))?;
        let sink = rodio::Sink::try_new(&handle).map_err(|e| VoxError::playback(e.to_string()))?;

        let buffer = Arc::new(PlaybackBuffer::new());
        let mut playing = false;

        loop {
            if interrupted() {
                buffer.close();
                break;
            }
            let chunk = match frames.next_frame() {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(err) => {
                    buffer.close();
                    return Err(self.classify(err, &session));
                }
            };
            if session.first_chunk_ms.is_none() {
                session.first_chunk_ms = Some(start.elapsed().as_millis());
                self.status(&format!(
                    "⚡ first audio {}ms",
                    session.first_chunk_ms.unwrap_or(0)
                ));
            }
            buffer.push_pcm(&chunk.samples);

            // Start the device once the pre-buffer is met (or the stream is
            // already over for very short utterances).
            if !playing && (buffer.len() >= PREBUFFER_SAMPLES || chunk.is_final) {
                sink.append(StreamSource::new(Arc::clone(&buffer)));
                playing = true;
                self.status(&format!("▶ playing {}ms", start.elapsed().as_millis()));
            }
        }

        buffer.finish();
        if !playing {
            sink.append(StreamSource::new(Arc::clone(&buffer)));
        }
        // Drain everything received, including after an interrupt.
        sink.sleep_until_end();

        session.completed_ms = Some(start.elapsed().as_millis());
        self.status(&format!("✓ done {}ms", session.completed_ms.unwrap_or(0)));
        Ok(session)
    }

    /// A stall before the first chunk is a timeout, not a connection loss.
    fn classify(&self, err: VoxError, session: &ClientSession) -> VoxError {
        if session.first_chunk_ms.is_none() {
            if let VoxError::Io(ref io) = err {
                if matches!(
                    io.kind(),
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                ) {
                    return VoxError::RequestTimeout {
                        ms: FIRST_CHUNK_TIMEOUT.as_millis() as u64,
                    };
                }
            }
        }
        err
    }

    fn status(&self, message: &str) {
        if !self.quiet {
            eprintln!("{message}");
        }
    }
}

fn map_status_error(code: u16, voice_id: &str, detail: &str) -> VoxError {
    match code {
        400 if detail.contains("unknown voice") => VoxError::UnknownVoice(voice_id.to_string()),
        400 => VoxError::invalid_input(detail.to_string()),
        503 => VoxError::ConnectionUnavailable {
            endpoint: "daemon".to_string(),
            reason: "service is shutting down".to_string(),
        },
        _ => VoxError::engine(format!("server error {code}: {detail}")),
    }
}

/// One resynthesis attempt for interrupted or aborted streams; nothing else.
fn retryable(err: &VoxError) -> bool {
    matches!(
        err,
        VoxError::Stream(_) | VoxError::Io(_) | VoxError::EngineFailure(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_mapping() {
        let err = map_status_error(400, "ghost", "unknown voice 'ghost'");
        assert!(matches!(err, VoxError::UnknownVoice(_)));

        let err = map_status_error(400, "alba", "missing voice parameter");
        assert!(matches!(err, VoxError::InvalidInput(_)));

        let err = map_status_error(503, "alba", "shutting down");
        assert!(matches!(err, VoxError::ConnectionUnavailable { .. }));

        let err = map_status_error(500, "alba", "boom");
        assert!(matches!(err, VoxError::EngineFailure(_)));
    }

    #[test]
    fn test_retry_policy() {
        assert!(retryable(&VoxError::stream("truncated")));
        assert!(retryable(&VoxError::engine("aborted mid-stream")));
        assert!(!retryable(&VoxError::UnknownVoice("x".into())));
        assert!(!retryable(&VoxError::RequestTimeout { ms: 30000 }));
        assert!(!retryable(&VoxError::invalid_input("bad")));
    }

    #[test]
    fn test_stall_classified_as_timeout_only_before_first_chunk() {
        let client = StreamingClient::new("http://127.0.0.1:1".into(), true);
        let timeout_io = VoxError::Io(std::io::Error::from(std::io::ErrorKind::TimedOut));

        let fresh = ClientSession::default();
        assert!(matches!(
            client.classify(timeout_io, &fresh),
            VoxError::RequestTimeout { .. }
        ));

        let mid = ClientSession {
            first_chunk_ms: Some(12),
            ..Default::default()
        };
        let timeout_io = VoxError::Io(std::io::Error::from(std::io::ErrorKind::TimedOut));
        assert!(matches!(client.classify(timeout_io, &mid), VoxError::Io(_)));
    }
}
