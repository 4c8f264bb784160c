//! Timestamp assignment for video chunks.
//!
//! Every chunk advances the clock by a constant step regardless of its byte size,
//! which models a constant-rate capture feed. Given the same start timestamp the
//! output is fully deterministic; wall-clock time is only read once, by the caller,
//! to pick that start.

use std::iter::FusedIterator;

use bytes::Bytes;
use chrono::Utc;

/// A chunk of video bytes with its presentation timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportChunk {
    pub data: Bytes,
    pub timestamp_ms: u64,
}

impl TransportChunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug)]
pub struct TimestampPacer<I> {
    chunks: I,
    next_timestamp_ms: u64,
    step_ms: u64,
}

impl<I> Iterator for TimestampPacer<I>
where
    I: Iterator<Item = Bytes>,
{
    type Item = TransportChunk;

    fn next(&mut self) -> Option<TransportChunk> {
        let data = self.chunks.next()?;
        let timestamp_ms = self.next_timestamp_ms;
        self.next_timestamp_ms = self.next_timestamp_ms.saturating_add(self.step_ms);
        Some(TransportChunk { data, timestamp_ms })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl<I> ExactSizeIterator for TimestampPacer<I> where I: ExactSizeIterator<Item = Bytes> {}

impl<I> FusedIterator for TimestampPacer<I> where I: FusedIterator<Item = Bytes> {}

/// Assigns `start_ts + k * step_ms` to the k-th chunk.
pub fn assign<I>(chunks: I, start_ts: u64, step_ms: u64) -> TimestampPacer<I::IntoIter>
where
    I: IntoIterator<Item = Bytes>,
{
    TimestampPacer {
        chunks: chunks.into_iter(),
        next_timestamp_ms: start_ts,
        step_ms,
    }
}

/// End of the video window for `chunk_count` chunks starting at `start_ts`.
pub fn window_end(start_ts: u64, chunk_count: usize, step_ms: u64) -> u64 {
    start_ts.saturating_add((chunk_count as u64).saturating_mul(step_ms))
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_assign_constant_step() {
        let chunks = vec![
            Bytes::from_static(b"a"),
            Bytes::from_static(b"bbbbbbbb"),
            Bytes::from_static(b"c"),
        ];
        let timed: Vec<TransportChunk> = assign(chunks, 1_000, 50).collect();
        let timestamps: Vec<u64> = timed.iter().map(|c| c.timestamp_ms).collect();
        assert_eq!(timestamps, vec![1_000, 1_050, 1_100]);
        assert_eq!(timed[1].data, Bytes::from_static(b"bbbbbbbb"));
    }

    #[test]
    fn test_window_end() {
        assert_eq!(window_end(1_000, 3, 50), 1_150);
        assert_eq!(window_end(1_000, 0, 50), 1_000);
    }

    #[test]
    fn test_assign_is_deterministic() {
        let make = || vec![Bytes::from_static(b"x"); 4];
        let first: Vec<_> = assign(make(), 42, 50).collect();
        let second: Vec<_> = assign(make(), 42, 50).collect();
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn prop_timestamps_strictly_increase(n in 1usize..500, start in 0u64..2_000_000_000_000) {
            let chunks = vec![Bytes::from_static(b"v"); n];
            let timestamps: Vec<u64> = assign(chunks, start, 50).map(|c| c.timestamp_ms).collect();

            prop_assert_eq!(timestamps.len(), n);
            prop_assert_eq!(timestamps[0], start);
            prop_assert!(timestamps.windows(2).all(|w| w[1] - w[0] == 50));
            prop_assert_eq!(*timestamps.last().unwrap(), start + (n as u64 - 1) * 50);
        }
    }
}
