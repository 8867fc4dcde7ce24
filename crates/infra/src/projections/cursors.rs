use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use thiserror::Error;

use turnstile_core::StreamId;

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("non-monotonic sequence number for {stream_id} (last={last}, found={found})")]
    NonMonotonicSequence {
        stream_id: StreamId,
        last: u64,
        found: u64,
    },
}

/// Outcome of offering a sequence number to a cursor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CursorAdvance {
    /// New position; the caller should apply the event.
    Fresh,
    /// Replayed or duplicated delivery; the caller should skip the event.
    Duplicate,
}

/// Per-stream delivery cursors backing idempotent projections.
///
/// At-least-once delivery means a projection can see the same envelope
/// twice; the cursor remembers the last applied sequence number per stream
/// and flags replays as duplicates. Gaps are reported as errors because a
/// skipped event would silently corrupt the read model.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<StreamId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a sequence number against the stream's cursor without advancing.
    pub fn offer(&self, stream_id: &StreamId, seq: u64) -> Result<CursorAdvance, CursorError> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let last = *map.get(stream_id).unwrap_or(&0);

        if seq == 0 || (last > 0 && seq > last + 1) {
            return Err(CursorError::NonMonotonicSequence {
                stream_id: stream_id.clone(),
                last,
                found: seq,
            });
        }
        if seq <= last {
            return Ok(CursorAdvance::Duplicate);
        }
        Ok(CursorAdvance::Fresh)
    }

    /// Advance the stream's cursor after a successful apply.
    pub fn advance(&self, stream_id: &StreamId, seq: u64) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(stream_id.clone(), seq);
    }

    /// Forget all positions (rebuild support).
    pub fn reset(&self) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.clear();
    }
}
