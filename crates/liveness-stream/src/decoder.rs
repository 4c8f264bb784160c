//! Base64 segment decoding with an upfront size limit.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use bytes::Bytes;
use tracing::debug;

use crate::error::{LivenessError, Result};
use crate::splitter::chunk_count;

/// Standard alphabet, padding optional. Browsers' `btoa` pads, some recorders do not.
const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decoded length of well-formed base64 text, padded or not.
fn decoded_len(text: &str) -> usize {
    let symbols = text.trim_end_matches('=').len();
    symbols / 4 * 3 + symbols % 4 * 3 / 4
}

/// Decoded video, one buffer per input segment, in input order.
#[derive(Debug, Clone, Default)]
pub struct DecodedVideo {
    buffers: Vec<Bytes>,
    total_bytes: usize,
}

impl DecodedVideo {
    pub fn buffers(&self) -> &[Bytes] {
        &self.buffers
    }

    pub fn into_buffers(self) -> Vec<Bytes> {
        self.buffers
    }

    pub fn segment_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.total_bytes == 0
    }

    /// Number of chunks the splitter will yield for this video.
    ///
    /// Each segment is chunked on its own, so this is the per-segment ceiling sum
    /// rather than `ceil(total / chunk_size)`.
    pub fn chunk_count(&self, chunk_size: usize) -> usize {
        self.buffers
            .iter()
            .map(|buffer| chunk_count(buffer.len(), chunk_size))
            .sum()
    }
}

/// Decodes base64 video segments, rejecting oversized payloads before any network work.
#[derive(Debug, Clone, Copy)]
pub struct SegmentDecoder {
    max_total_bytes: usize,
}

impl SegmentDecoder {
    pub fn new(max_total_bytes: usize) -> Self {
        Self { max_total_bytes }
    }

    /// Decodes every segment in order.
    ///
    /// The size limit is checked against the whole video before anything is decoded, so
    /// an oversized submission never allocates its decoded form. `PayloadTooLarge.size`
    /// is the total across all segments.
    pub fn decode<S: AsRef<str>>(&self, segments: &[S]) -> Result<DecodedVideo> {
        if segments.is_empty() {
            return Err(LivenessError::malformed("videoChunks must not be empty"));
        }

        let expected = segments
            .iter()
            .map(|segment| decoded_len(segment.as_ref().trim()))
            .fold(0usize, usize::saturating_add);
        if expected > self.max_total_bytes {
            return Err(LivenessError::PayloadTooLarge {
                size: expected,
                limit: self.max_total_bytes,
            });
        }

        let mut buffers = Vec::with_capacity(segments.len());
        let mut total_bytes = 0usize;

        for (index, segment) in segments.iter().enumerate() {
            let text = segment.as_ref().trim();
            let decoded = SEGMENT_ENGINE.decode(text).map_err(|e| {
                LivenessError::malformed(format!("segment {index} is not valid base64: {e}"))
            })?;

            total_bytes = total_bytes.saturating_add(decoded.len());
            if total_bytes > self.max_total_bytes {
                return Err(LivenessError::PayloadTooLarge {
                    size: total_bytes,
                    limit: self.max_total_bytes,
                });
            }

            buffers.push(Bytes::from(decoded));
        }

        debug!(
            segments = buffers.len(),
            total_bytes, "Decoded video segments"
        );

        Ok(DecodedVideo {
            buffers,
            total_bytes,
        })
    }
}
