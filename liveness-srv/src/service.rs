//! Liveness session orchestration.

use std::sync::Arc;

use liveness_stream::pacer;
use liveness_stream::{
    Challenge, ConfidenceScale, LivenessError, SegmentDecoder, StreamConfig, StreamResult,
    StreamSession, StreamTransport, Verdict, decide, video_events,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::Result;
use crate::remote::{CreatedSession, LivenessApi};

/// A validated request to stream one recorded challenge.
#[derive(Debug, Clone)]
pub struct StreamSubmission {
    pub session_id: String,
    pub segments: Vec<String>,
    pub video_width: u32,
    pub video_height: u32,
    pub challenge: Challenge,
    /// Overrides the configured challenge version when set
    pub challenge_version: Option<String>,
}

/// Verdict plus the remote result it was derived from.
#[derive(Debug, Clone)]
pub struct ResultReport {
    pub verdict: Verdict,
    pub raw: Value,
}

pub struct LivenessService {
    api: Arc<dyn LivenessApi>,
    transport: Arc<dyn StreamTransport>,
    config: StreamConfig,
    confidence_scale: ConfidenceScale,
}

impl LivenessService {
    pub fn new(
        api: Arc<dyn LivenessApi>,
        transport: Arc<dyn StreamTransport>,
        config: StreamConfig,
    ) -> Self {
        Self {
            api,
            transport,
            config,
            confidence_scale: ConfidenceScale::default(),
        }
    }

    /// Sets the scale remote confidence scores are read on.
    pub fn with_confidence_scale(mut self, scale: ConfidenceScale) -> Self {
        self.confidence_scale = scale;
        self
    }

    pub async fn create_session(&self) -> Result<CreatedSession> {
        let session = self.api.create_session().await?;
        info!(session_id = %session.session_id, "Created liveness session");
        Ok(session)
    }

    /// Decodes and streams a submission. Size and format are checked before the
    /// transport is touched.
    pub async fn start_streaming(
        &self,
        submission: StreamSubmission,
        cancel_token: CancellationToken,
    ) -> Result<StreamResult> {
        let video = SegmentDecoder::new(self.config.max_video_bytes)
            .decode(&submission.segments)
            .inspect_err(|e| {
                warn!(session_id = %submission.session_id, error = %e, "Rejected liveness video");
            })?;

        let mut config = self.config.clone();
        if let Some(version) = submission.challenge_version {
            config.challenge_version = version;
        }

        let start_ts = pacer::now_millis();
        let events = video_events(
            submission.challenge,
            submission.video_width,
            submission.video_height,
            video,
            &config,
            start_ts,
        )?;

        info!(
            session_id = %submission.session_id,
            events = events.size_hint().0,
            "Starting liveness stream"
        );

        let result = StreamSession::new(self.transport.clone(), config)
            .with_cancel_token(cancel_token)
            .run(
                &submission.session_id,
                submission.video_width,
                submission.video_height,
                events,
            )
            .await?;
        Ok(result)
    }

    /// Fetches the analysis result and decides the verdict.
    pub async fn result(&self, session_id: &str) -> Result<ResultReport> {
        let result = self.api.fetch_result(session_id).await?;

        let verdict = result
            .confidence
            .ok_or_else(|| LivenessError::invalid_result("result has no Confidence"))
            .and_then(|raw| self.confidence_scale.normalize(raw))
            .and_then(|confidence| decide(confidence, result.status.as_deref()))
            .inspect_err(|e| {
                warn!(session_id, error = %e, "Unusable liveness result");
            })?;

        info!(
            session_id,
            confirmed = verdict.confirmed,
            confidence = verdict.confidence,
            "Liveness verdict"
        );

        Ok(ResultReport {
            verdict,
            raw: result.raw,
        })
    }

    pub async fn check_connectivity(&self) -> Result<Value> {
        self.api.check_connectivity().await
    }
}
