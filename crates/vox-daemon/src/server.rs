//! HTTP server: health endpoint and the streaming synthesis endpoint.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vox_core::{frame, AudioChunk, ServiceState, VoxError, VoxResult, SAMPLE_RATE};

use crate::context::DaemonContext;
use crate::idle::IdleMonitor;

/// Frames buffered between the engine and the network writer before the
/// producer briefly waits for the client to drain.
const STREAM_CHANNEL_DEPTH: usize = 32;

/// The daemon's HTTP server.
pub struct VoxServer {
    ctx: Arc<DaemonContext>,
}

impl VoxServer {
    pub fn new(ctx: Arc<DaemonContext>) -> Self {
        Self { ctx }
    }

    /// Build the router; separated from `run` so tests can drive handlers
    /// without binding a socket.
    pub fn router(ctx: Arc<DaemonContext>) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/tts", get(tts_handler))
            .with_state(ctx)
    }

    /// Bind the well-known endpoint and serve until the idle monitor or a
    /// termination signal initiates shutdown. In-flight requests are
    /// drained before the endpoint is released.
    pub async fn run(self) -> VoxResult<()> {
        let addr = self.ctx.config.bind_addr();
        // Binding is the single-instance lock: if another daemon holds the
        // port, this one reports and exits, leaving the holder authoritative.
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| VoxError::ConnectionUnavailable {
                endpoint: addr.to_string(),
                reason: format!("bind failed: {e}"),
            })?;

        // Pre-load the default voice so the first request hits a warm cache.
        if let Err(err) = self.ctx.cache.acquire(vox_engine::DEFAULT_VOICE).await {
            warn!(error = %err, "default voice warmup failed");
        }
        self.ctx.set_state(ServiceState::Ready);

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let monitor = IdleMonitor::new(Arc::clone(&self.ctx), shutdown_tx.clone());
        let monitor_handle = tokio::spawn(monitor.run());

        let signal_ctx = Arc::clone(&self.ctx);
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("termination signal received, draining");
            signal_ctx.set_state(ServiceState::ShuttingDown);
            let _ = shutdown_tx.send(true);
        });

        let app = Self::router(Arc::clone(&self.ctx));
        info!(
            addr = %addr,
            voices = self.ctx.voices.len(),
            idle_timeout_mins = self.ctx.config.idle_timeout_mins,
            "voxd listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .await?;

        monitor_handle.abort();
        info!("in-flight requests drained, endpoint released");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TtsParams {
    text: Option<String>,
    voice: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Health probes deliberately do not count as activity: passive monitoring
/// must not keep the daemon alive forever.
async fn health_handler(State(ctx): State<Arc<DaemonContext>>) -> Response {
    Json(ctx.health()).into_response()
}

async fn tts_handler(
    State(ctx): State<Arc<DaemonContext>>,
    Query(params): Query<TtsParams>,
) -> Response {
    if ctx.state() == ServiceState::ShuttingDown {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "service is shutting down");
    }
    ctx.activity.touch();

    let Some(voice) = params.voice else {
        return error_response(StatusCode::BAD_REQUEST, "missing voice parameter");
    };
    if !ctx.knows_voice(&voice) {
        return error_response(StatusCode::BAD_REQUEST, format!("unknown voice '{voice}'"));
    }

    let text = params.text.unwrap_or_default().trim().to_string();
    let request_id = Uuid::new_v4();
    info!(%request_id, voice = %voice, text_len = text.len(), "synthesis request");

    if text.is_empty() {
        // Minimal valid silent stream: a lone terminal frame.
        debug!(%request_id, "empty text, silent stream");
        return stream_response(Body::from(frame::encode_frame(&AudioChunk::final_marker(0))));
    }

    let state = match ctx.cache.acquire(&voice).await {
        Ok(state) => state,
        Err(err) => {
            error!(%request_id, voice = %voice, error = %err, "voice load failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("voice load failed: {err}"),
            );
        }
    };

    // Build the lazy chunk sequence up front so pre-generation failures
    // still map to a status code instead of a broken stream.
    let chunks = match ctx.engine.synthesize(&state, &text) {
        Ok(chunks) => chunks,
        Err(err) => {
            error!(%request_id, error = %err, "synthesis failed to start");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("synthesis failed: {err}"),
            );
        }
    };

    let (tx, rx) = mpsc::channel::<Result<axum::body::Bytes, std::io::Error>>(STREAM_CHANNEL_DEPTH);

    // Drive the engine on the blocking pool, forwarding each frame as it is
    // produced. The whole utterance is never buffered.
    tokio::task::spawn_blocking(move || {
        let mut sent = 0u32;
        for item in chunks {
            match item {
                Ok(chunk) => {
                    let is_final = chunk.is_final;
                    let bytes = axum::body::Bytes::from(frame::encode_frame(&chunk));
                    if tx.blocking_send(Ok(bytes)).is_err() {
                        debug!(%request_id, "client went away mid-stream");
                        return;
                    }
                    sent += 1;
                    if is_final {
                        break;
                    }
                }
                Err(err) => {
                    // Mid-generation failure aborts the connection. The
                    // stream ends without a terminal frame, so the client
                    // sees truncation rather than a silently short result.
                    error!(%request_id, error = %err, "engine failure mid-stream");
                    let _ = tx.blocking_send(Err(std::io::Error::other(err.to_string())));
                    return;
                }
            }
        }
        debug!(%request_id, frames = sent, "stream complete");
    });

    stream_response(Body::from_stream(ReceiverStream::new(rx)))
}

fn stream_response(body: Body) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header("x-sample-rate", SAMPLE_RATE.to_string())
        .body(body)
        .expect("static headers are valid")
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
