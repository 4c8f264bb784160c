//! Streaming session lifecycle.
//!
//! A [`StreamSession`] opens one remote stream, pulls protocol events one at a time
//! and hands each to the transport, waiting for it to be accepted before pulling the
//! next. Nothing is buffered ahead of the transport, so a slow remote slows down the
//! producer instead of growing memory.
//!
//! A failed stream is never retried: the remote session cannot be resumed, and a new
//! attempt needs a fresh session id from the caller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::error::{LivenessError, Result};
use crate::framer::ProtocolEvent;

/// Parameters used to open the remote stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamParams {
    pub session_id: String,
    pub video_width: u32,
    pub video_height: u32,
    pub challenge_version: String,
}

/// Opens bidirectional streams to the remote analysis service.
///
/// Implementations hold only immutable, process-wide client configuration and are
/// shared across concurrent sessions.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn open(&self, params: &StreamParams) -> Result<Box<dyn EventSink>>;
}

/// The sending half of one open stream.
#[async_trait]
pub trait EventSink: Send {
    /// Resolves once the transport has accepted the event.
    async fn send(&mut self, event: ProtocolEvent) -> Result<()>;

    /// Signals the end of the event sequence and waits for the terminal response.
    async fn finish(self: Box<Self>) -> Result<Value>;

    /// Tears the stream down without waiting for a response.
    async fn abort(self: Box<Self>, reason: &str);
}

/// A completed submission. `response` is the remote payload, untouched.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamResult {
    pub session_id: String,
    pub events_sent: usize,
    pub chunks_sent: usize,
    pub bytes_sent: usize,
    pub response: Value,
}

pub type StreamOutcome = Result<StreamResult>;

#[derive(Debug, Default, Clone, Copy)]
struct SendStats {
    events: usize,
    chunks: usize,
    bytes: usize,
}

impl SendStats {
    fn record(&mut self, is_chunk: bool, size: usize) {
        self.events += 1;
        if is_chunk {
            self.chunks += 1;
            self.bytes += size;
        }
    }
}

/// Result of waiting on a transport operation under cancellation and timeout.
enum Step<T> {
    Done(Result<T>),
    TimedOut,
    Cancelled,
}

async fn guarded<T>(
    cancel_token: &CancellationToken,
    limit: Duration,
    operation: impl Future<Output = Result<T>>,
) -> Step<T> {
    tokio::select! {
        biased;
        _ = cancel_token.cancelled() => Step::Cancelled,
        result = tokio::time::timeout(limit, operation) => match result {
            Ok(result) => Step::Done(result),
            Err(_) => Step::TimedOut,
        },
    }
}

pub struct StreamSession {
    transport: Arc<dyn StreamTransport>,
    config: StreamConfig,
    cancel_token: CancellationToken,
}

impl StreamSession {
    pub fn new(transport: Arc<dyn StreamTransport>, config: StreamConfig) -> Self {
        Self {
            transport,
            config,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Ties the session to an external token, e.g. one cancelled on client disconnect.
    pub fn with_cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    /// Streams `events` to the remote service and returns its terminal response.
    pub async fn run<I>(
        &self,
        session_id: &str,
        video_width: u32,
        video_height: u32,
        events: I,
    ) -> StreamOutcome
    where
        I: IntoIterator<Item = ProtocolEvent> + Send,
        I::IntoIter: Send,
    {
        let params = StreamParams {
            session_id: session_id.to_string(),
            video_width,
            video_height,
            challenge_version: self.config.challenge_version.clone(),
        };

        let mut sink = match guarded(
            &self.cancel_token,
            self.config.open_timeout,
            self.transport.open(&params),
        )
        .await
        {
            Step::Done(Ok(sink)) => sink,
            Step::Done(Err(e)) => {
                warn!(session_id, error = %e, "Failed to open liveness stream");
                return Err(e);
            }
            Step::TimedOut => {
                warn!(session_id, "Timed out opening liveness stream");
                return Err(LivenessError::transport("timed out opening stream"));
            }
            Step::Cancelled => return Err(LivenessError::Cancelled),
        };

        info!(session_id, video_width, video_height, "Liveness stream opened");

        let mut stats = SendStats::default();
        for event in events {
            if self.config.pace_locally && event.is_video_chunk() && stats.chunks > 0 {
                let paced = tokio::select! {
                    biased;
                    _ = self.cancel_token.cancelled() => false,
                    _ = tokio::time::sleep(self.config.step()) => true,
                };
                if !paced {
                    sink.abort("cancelled").await;
                    info!(session_id, events_sent = stats.events, "Liveness stream cancelled");
                    return Err(LivenessError::Cancelled);
                }
            }

            let size = event.payload_len();
            let kind = event.kind();
            let is_chunk = event.is_video_chunk();
            let sent = guarded(&self.cancel_token, self.config.send_timeout, sink.send(event)).await;

            match sent {
                Step::Done(Ok(())) => stats.record(is_chunk, size),
                Step::Done(Err(e)) => {
                    warn!(
                        session_id,
                        events_sent = stats.events,
                        kind,
                        error = %e,
                        "Liveness stream failed mid-stream"
                    );
                    sink.abort("transport failure").await;
                    return Err(e);
                }
                Step::TimedOut => {
                    warn!(
                        session_id,
                        events_sent = stats.events,
                        kind,
                        size,
                        "Transport did not accept event in time"
                    );
                    sink.abort("send timeout").await;
                    return Err(LivenessError::transport(format!(
                        "timed out sending {kind} event after {} events",
                        stats.events
                    )));
                }
                Step::Cancelled => {
                    sink.abort("cancelled").await;
                    info!(session_id, events_sent = stats.events, "Liveness stream cancelled");
                    return Err(LivenessError::Cancelled);
                }
            }

            if stats.events % 50 == 0 {
                debug!(
                    session_id,
                    events_sent = stats.events,
                    bytes_sent = stats.bytes,
                    "Stream progress"
                );
            }
        }

        let response = match guarded(
            &self.cancel_token,
            self.config.response_timeout,
            sink.finish(),
        )
        .await
        {
            Step::Done(Ok(response)) => response,
            Step::Done(Err(e)) => {
                warn!(session_id, events_sent = stats.events, error = %e, "Liveness stream ended with an error");
                return Err(e);
            }
            Step::TimedOut => {
                return Err(LivenessError::transport(
                    "timed out waiting for the stream response",
                ));
            }
            Step::Cancelled => return Err(LivenessError::Cancelled),
        };

        info!(
            session_id,
            events_sent = stats.events,
            chunks_sent = stats.chunks,
            bytes_sent = stats.bytes,
            "Liveness stream completed"
        );

        Ok(StreamResult {
            session_id: session_id.to_string(),
            events_sent: stats.events,
            chunks_sent: stats.chunks,
            bytes_sent: stats.bytes,
            response,
        })
    }
}
