//! JSON wire format of the liveness event stream.
//!
//! Every client event is one externally tagged JSON object:
//!
//! ```text
//! {"ClientSessionInformationEvent":{"Challenge":{"FaceMovementAndLightChallenge":{...}}}}
//! {"VideoEvent":{"VideoChunk":"<base64>","TimestampMillis":1700000000050,"ContentType":"application/octet-stream"}}
//! {"EndOfStream":{}}
//! ```
//!
//! Server messages are opaque JSON, except exceptions, which carry a top-level key
//! ending in `Exception` or a `__type` field.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::{LivenessError, Result};
use crate::framer::{ChallengeMetadata, ProtocolEvent};
use crate::session::StreamParams;

pub const VIDEO_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SessionInformation<'a> {
    challenge: ChallengeEnvelope<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ChallengeEnvelope<'a> {
    face_movement_and_light_challenge: &'a ChallengeMetadata,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct VideoChunkEvent {
    video_chunk: String,
    timestamp_millis: u64,
    content_type: &'static str,
}

#[derive(Serialize)]
enum ClientEvent<'a> {
    ClientSessionInformationEvent(SessionInformation<'a>),
    VideoEvent(VideoChunkEvent),
    EndOfStream {},
}

fn to_json(event: &ClientEvent<'_>) -> Result<String> {
    serde_json::to_string(event)
        .map_err(|e| LivenessError::transport(format!("failed to encode event: {e}")))
}

pub fn encode_event(event: &ProtocolEvent) -> Result<String> {
    match event {
        ProtocolEvent::SessionInfo(metadata) => {
            to_json(&ClientEvent::ClientSessionInformationEvent(SessionInformation {
                challenge: ChallengeEnvelope {
                    face_movement_and_light_challenge: metadata,
                },
            }))
        }
        ProtocolEvent::VideoChunk(chunk) => to_json(&ClientEvent::VideoEvent(VideoChunkEvent {
            video_chunk: STANDARD.encode(&chunk.data),
            timestamp_millis: chunk.timestamp_ms,
            content_type: VIDEO_CONTENT_TYPE,
        })),
    }
}

pub fn end_of_stream() -> Result<String> {
    to_json(&ClientEvent::EndOfStream {})
}

/// Name of the exception a server message reports, if it is one.
pub fn exception_name(message: &Value) -> Option<String> {
    let object = message.as_object()?;
    if let Some(kind) = object.get("__type").and_then(Value::as_str) {
        return Some(kind.to_string());
    }
    object
        .keys()
        .find(|key| key.ends_with("Exception"))
        .cloned()
}

/// Builds the stream URL carrying the session parameters as query pairs.
pub fn stream_url(endpoint: &str, params: &StreamParams) -> Result<Url> {
    let mut url = Url::parse(endpoint).map_err(|e| {
        LivenessError::configuration(format!("invalid stream endpoint `{endpoint}`: {e}"))
    })?;

    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(LivenessError::configuration(format!(
            "unsupported stream endpoint scheme `{}`",
            url.scheme()
        )));
    }

    url.query_pairs_mut()
        .append_pair("session-id", &params.session_id)
        .append_pair("video-width", &params.video_width.to_string())
        .append_pair("video-height", &params.video_height.to_string())
        .append_pair("challenge-versions", &params.challenge_version);

    Ok(url)
}
