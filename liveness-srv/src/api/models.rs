//! API request and response models (DTOs).
//!
//! Request fields are camelCase. The PascalCase names used by earlier web clients
//! (`SessionId`, `VideoWidth`, ...) are accepted as aliases.

use liveness_stream::{Challenge, LivenessError, StreamResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::remote::CreatedSession;
use crate::service::{ResultReport, StreamSubmission};

// ============================================================================
// Sessions
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionResponse {
    pub message: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub result: Value,
}

impl From<CreatedSession> for CreateSessionResponse {
    fn from(session: CreatedSession) -> Self {
        Self {
            message: "Liveness session created successfully".to_string(),
            session_id: session.session_id,
            result: session.raw,
        }
    }
}

/// Challenge versions arrive either as a single string or as a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChallengeVersions {
    One(String),
    Many(Vec<String>),
}

impl ChallengeVersions {
    fn first(self) -> Option<String> {
        let version = match self {
            Self::One(version) => Some(version),
            Self::Many(versions) => versions.into_iter().next(),
        };
        version
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Body of `POST /api/sessions/stream`.
///
/// Every field is optional at the serde level so that missing fields are reported
/// together, as one validation error, instead of failing on the first one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartStreamingRequest {
    #[serde(alias = "SessionId")]
    pub session_id: Option<String>,
    #[serde(alias = "VideoChunks")]
    pub video_chunks: Option<Vec<String>>,
    #[serde(alias = "VideoWidth")]
    pub video_width: Option<u32>,
    #[serde(alias = "VideoHeight")]
    pub video_height: Option<u32>,
    #[serde(alias = "ChallengeVersions")]
    pub challenge_versions: Option<ChallengeVersions>,
    #[serde(alias = "ChallengeId")]
    pub challenge_id: Option<String>,
    #[serde(alias = "InitialFace")]
    pub initial_face: Option<Value>,
    #[serde(alias = "TargetFace")]
    pub target_face: Option<Value>,
    #[serde(alias = "ColorDisplayed")]
    pub color_displayed: Option<Value>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl StartStreamingRequest {
    /// Validates the request, listing every missing or invalid field.
    pub fn into_submission(self) -> Result<StreamSubmission, LivenessError> {
        let mut missing = Vec::new();

        let session_id = present(self.session_id);
        if session_id.is_none() {
            missing.push("sessionId");
        }
        let segments = self.video_chunks.filter(|chunks| !chunks.is_empty());
        if segments.is_none() {
            missing.push("videoChunks");
        }
        let video_width = self.video_width.filter(|w| *w > 0);
        if video_width.is_none() {
            missing.push("videoWidth");
        }
        let video_height = self.video_height.filter(|h| *h > 0);
        if video_height.is_none() {
            missing.push("videoHeight");
        }
        let challenge_id = present(self.challenge_id);
        if challenge_id.is_none() {
            missing.push("challengeId");
        }
        if self.initial_face.is_none() {
            missing.push("initialFace");
        }
        if self.target_face.is_none() {
            missing.push("targetFace");
        }
        if self.color_displayed.is_none() {
            missing.push("colorDisplayed");
        }

        match (
            session_id,
            segments,
            video_width,
            video_height,
            challenge_id,
            self.initial_face,
            self.target_face,
            self.color_displayed,
        ) {
            (
                Some(session_id),
                Some(segments),
                Some(video_width),
                Some(video_height),
                Some(challenge_id),
                Some(initial_face),
                Some(target_face),
                Some(color_displayed),
            ) => Ok(StreamSubmission {
                session_id,
                segments,
                video_width,
                video_height,
                challenge: Challenge {
                    challenge_id,
                    initial_face,
                    target_face,
                    color_displayed,
                },
                challenge_version: self.challenge_versions.and_then(ChallengeVersions::first),
            }),
            _ => Err(LivenessError::malformed(format!(
                "missing required fields: {}",
                missing.join(", ")
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StartStreamingResponse {
    pub message: String,
    pub result: StreamResult,
}

impl From<StreamResult> for StartStreamingResponse {
    fn from(result: StreamResult) -> Self {
        Self {
            message: "Liveness streaming started successfully".to_string(),
            result,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResultResponse {
    pub message: String,
    pub liveness_confirmed: bool,
    pub confidence: f64,
    pub status: String,
    pub details: Value,
}

impl From<ResultReport> for SessionResultResponse {
    fn from(report: ResultReport) -> Self {
        Self {
            message: "Liveness results fetched successfully".to_string(),
            liveness_confirmed: report.verdict.confirmed,
            confidence: report.verdict.confidence,
            status: report.verdict.raw_status,
            details: report.raw,
        }
    }
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoteHealthResponse {
    pub message: String,
    pub result: Value,
}
