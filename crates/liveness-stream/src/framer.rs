//! Protocol event framing.
//!
//! A stream is exactly one session-information header followed by the video chunk
//! events in timestamp order. [`EventFramer`] yields them lazily; chunks are moved
//! out as they are produced and never retained.

use std::iter::FusedIterator;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::StreamConfig;
use crate::decoder::DecodedVideo;
use crate::error::{LivenessError, Result};
use crate::pacer::{self, TimestampPacer, TransportChunk};
use crate::splitter::{self, ChunkSplitter};

/// The challenge the user performed while recording.
///
/// Face positions and the displayed color are opaque descriptors forwarded to the
/// remote service as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub challenge_id: String,
    pub initial_face: Value,
    pub target_face: Value,
    pub color_displayed: Value,
}

/// Header payload describing the challenge and the video window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChallengeMetadata {
    pub challenge_id: String,
    pub initial_face: Value,
    pub target_face: Value,
    pub color_displayed: Value,
    pub video_width: u32,
    pub video_height: u32,
    pub video_start_timestamp: u64,
    pub video_end_timestamp: u64,
}

impl ChallengeMetadata {
    /// Builds the header for `chunk_count` chunks starting at `start_ts`.
    pub fn new(
        challenge: Challenge,
        video_width: u32,
        video_height: u32,
        start_ts: u64,
        chunk_count: usize,
        step_ms: u64,
    ) -> Self {
        Self {
            challenge_id: challenge.challenge_id,
            initial_face: challenge.initial_face,
            target_face: challenge.target_face,
            color_displayed: challenge.color_displayed,
            video_width,
            video_height,
            video_start_timestamp: start_ts,
            video_end_timestamp: pacer::window_end(start_ts, chunk_count, step_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    SessionInfo(Arc<ChallengeMetadata>),
    VideoChunk(TransportChunk),
}

impl ProtocolEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionInfo(_) => "session_info",
            Self::VideoChunk(_) => "video_chunk",
        }
    }

    pub fn is_video_chunk(&self) -> bool {
        matches!(self, Self::VideoChunk(_))
    }

    /// Video bytes carried by this event.
    pub fn payload_len(&self) -> usize {
        match self {
            Self::SessionInfo(_) => 0,
            Self::VideoChunk(chunk) => chunk.len(),
        }
    }
}

#[derive(Debug)]
pub struct EventFramer<I> {
    header: Option<Arc<ChallengeMetadata>>,
    chunks: I,
}

impl<I> Iterator for EventFramer<I>
where
    I: Iterator<Item = TransportChunk>,
{
    type Item = ProtocolEvent;

    fn next(&mut self) -> Option<ProtocolEvent> {
        if let Some(header) = self.header.take() {
            return Some(ProtocolEvent::SessionInfo(header));
        }
        self.chunks.next().map(ProtocolEvent::VideoChunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let extra = usize::from(self.header.is_some());
        let (lower, upper) = self.chunks.size_hint();
        (
            lower.saturating_add(extra),
            upper.and_then(|u| u.checked_add(extra)),
        )
    }
}

impl<I> FusedIterator for EventFramer<I> where I: FusedIterator<Item = TransportChunk> {}

/// Emits `SessionInfo(metadata)` unconditionally, then one event per timed chunk.
pub fn frame<I>(metadata: ChallengeMetadata, timed_chunks: I) -> EventFramer<I::IntoIter>
where
    I: IntoIterator<Item = TransportChunk>,
{
    EventFramer {
        header: Some(Arc::new(metadata)),
        chunks: timed_chunks.into_iter(),
    }
}

/// The full event sequence for one decoded video.
pub type VideoEvents = EventFramer<TimestampPacer<ChunkSplitter>>;

/// Wires splitter, pacer and framer together for a decoded video.
///
/// The end of the video window is computed from the chunk count up front, so the
/// chunks themselves are only walked once, by the consumer. Empty video is
/// rejected here: a header with nothing after it is not a valid submission.
pub fn video_events(
    challenge: Challenge,
    video_width: u32,
    video_height: u32,
    video: DecodedVideo,
    config: &StreamConfig,
    start_ts: u64,
) -> Result<VideoEvents> {
    if video.is_empty() {
        return Err(LivenessError::malformed("no video to stream"));
    }

    let chunk_count = video.chunk_count(config.chunk_size);
    let metadata = ChallengeMetadata::new(
        challenge,
        video_width,
        video_height,
        start_ts,
        chunk_count,
        config.step_ms,
    );

    let chunks = splitter::split(video.into_buffers(), config.chunk_size);
    let timed = pacer::assign(chunks, start_ts, config.step_ms);
    Ok(frame(metadata, timed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::SegmentDecoder;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde_json::json;

    fn challenge() -> Challenge {
        Challenge {
            challenge_id: "challenge-1".to_string(),
            initial_face: json!({"BoundingBox": {"Width": 0.5, "Height": 0.6, "Left": 0.2, "Top": 0.1}}),
            target_face: json!({"BoundingBox": {"Width": 0.7, "Height": 0.8, "Left": 0.1, "Top": 0.05}}),
            color_displayed: json!({"CurrentColor": {"RGB": [255, 0, 0]}, "SequenceNumber": 0}),
        }
    }

    #[test]
    fn test_header_is_first_even_without_chunks() {
        let metadata = ChallengeMetadata::new(challenge(), 640, 480, 1_000, 0, 50);
        let events: Vec<ProtocolEvent> = frame(metadata, Vec::<TransportChunk>::new()).collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ProtocolEvent::SessionInfo(_)));
    }

    #[test]
    fn test_single_header_then_chunks_in_order() {
        let metadata = ChallengeMetadata::new(challenge(), 640, 480, 1_000, 2, 50);
        let chunks = pacer::assign(
            vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")],
            1_000,
            50,
        );
        let events: Vec<ProtocolEvent> = frame(metadata, chunks).collect();

        assert_eq!(events.len(), 3);
        assert_eq!(events.iter().filter(|e| !e.is_video_chunk()).count(), 1);
        assert!(!events[0].is_video_chunk());
        match (&events[1], &events[2]) {
            (ProtocolEvent::VideoChunk(first), ProtocolEvent::VideoChunk(second)) => {
                assert_eq!(first.timestamp_ms, 1_000);
                assert_eq!(second.timestamp_ms, 1_050);
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn test_three_segments_produce_four_events() {
        let segments = vec![
            STANDARD.encode(vec![1u8; 65_536]),
            STANDARD.encode(vec![2u8; 65_536]),
            STANDARD.encode(vec![3u8; 18_928]),
        ];
        let video = SegmentDecoder::new(10 * 1024 * 1024)
            .decode(&segments)
            .unwrap();
        assert_eq!(video.total_bytes(), 150_000);

        let config = StreamConfig::default();
        let events = video_events(challenge(), 640, 480, video, &config, 5_000).unwrap();
        assert_eq!(events.size_hint(), (4, Some(4)));

        let events: Vec<ProtocolEvent> = events.collect();
        assert_eq!(events.len(), 4);

        let ProtocolEvent::SessionInfo(metadata) = &events[0] else {
            panic!("first event must be the header");
        };
        assert_eq!(metadata.video_start_timestamp, 5_000);
        assert_eq!(metadata.video_end_timestamp, 5_150);
        assert_eq!(metadata.video_width, 640);

        let sizes: Vec<usize> = events[1..].iter().map(ProtocolEvent::payload_len).collect();
        assert_eq!(sizes, vec![65_536, 65_536, 18_928]);
    }

    #[test]
    fn test_empty_video_is_rejected() {
        let video = SegmentDecoder::new(1024).decode(&[""]).unwrap();
        let err = video_events(challenge(), 640, 480, video, &StreamConfig::default(), 0)
            .unwrap_err();
        assert!(matches!(err, LivenessError::MalformedInput { .. }));
    }

    #[test]
    fn test_metadata_serializes_pascal_case() {
        let metadata = ChallengeMetadata::new(challenge(), 640, 480, 1_000, 3, 50);
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["ChallengeId"], "challenge-1");
        assert_eq!(value["VideoEndTimestamp"], 1_150);
        assert!(value["InitialFace"]["BoundingBox"].is_object());
    }
}
