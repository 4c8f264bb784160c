use std::time::Duration;

use crate::error::{LivenessError, Result};

/// Size of one transport chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Simulated frame interval assigned to each chunk.
pub const DEFAULT_STEP_MS: u64 = 50;

/// Largest decoded video accepted for a single session.
pub const DEFAULT_MAX_VIDEO_BYTES: usize = 10 * 1024 * 1024;

pub const DEFAULT_CHALLENGE_VERSION: &str = "1.0";

/// Configurable options for a streaming session
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Maximum bytes carried by one video chunk event
    pub chunk_size: usize,

    /// Timestamp step between consecutive chunks, in milliseconds
    pub step_ms: u64,

    /// Maximum total decoded video size
    pub max_video_bytes: usize,

    /// Sleep `step_ms` between chunk events instead of relying only on
    /// transport backpressure. The sleep is always cancellable.
    pub pace_locally: bool,

    /// Time allowed to establish the remote stream
    pub open_timeout: Duration,

    /// Time allowed for the transport to accept a single event
    pub send_timeout: Duration,

    /// Time allowed for the terminal response after the last event
    pub response_timeout: Duration,

    /// Challenge protocol version announced when opening the stream
    pub challenge_version: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            step_ms: DEFAULT_STEP_MS,
            max_video_bytes: DEFAULT_MAX_VIDEO_BYTES,
            pace_locally: false,
            open_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(30),
            challenge_version: DEFAULT_CHALLENGE_VERSION.to_owned(),
        }
    }
}

impl StreamConfig {
    pub fn with_max_video_bytes(mut self, max_video_bytes: usize) -> Self {
        self.max_video_bytes = max_video_bytes;
        self
    }

    pub fn with_local_pacing(mut self, enabled: bool) -> Self {
        self.pace_locally = enabled;
        self
    }

    pub fn step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(LivenessError::configuration("chunk_size must be positive"));
        }
        if self.step_ms == 0 {
            return Err(LivenessError::configuration("step_ms must be positive"));
        }
        if self.max_video_bytes == 0 {
            return Err(LivenessError::configuration(
                "max_video_bytes must be positive",
            ));
        }
        if self.challenge_version.trim().is_empty() {
            return Err(LivenessError::configuration(
                "challenge_version must not be empty",
            ));
        }
        Ok(())
    }
}
