//! Chunked video streaming for liveness verification sessions.
//!
//! A recorded challenge video arrives as base64 segments. It is decoded, split into
//! fixed-size chunks, stamped with synthetic timestamps and framed behind a single
//! session-information header. [`StreamSession`] drives that event sequence into a
//! [`StreamTransport`] one event at a time, and [`verdict::decide`] turns the
//! analysis result into a pass/fail verdict.

pub mod config;
pub mod decoder;
pub mod error;
pub mod framer;
pub mod pacer;
pub mod session;
pub mod splitter;
pub mod transport;
pub mod verdict;

pub use config::StreamConfig;
pub use decoder::{DecodedVideo, SegmentDecoder};
pub use error::{LivenessError, Result};
pub use framer::{Challenge, ChallengeMetadata, ProtocolEvent, VideoEvents, video_events};
pub use pacer::TransportChunk;
pub use session::{EventSink, StreamOutcome, StreamParams, StreamResult, StreamSession, StreamTransport};
pub use transport::{WebSocketTransport, WebSocketTransportConfig};
pub use verdict::{ConfidenceScale, Verdict, decide};
