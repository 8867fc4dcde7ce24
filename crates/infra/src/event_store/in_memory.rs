use std::collections::HashMap;
use std::sync::RwLock;

use turnstile_core::{ExpectedVersion, StreamId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// In-memory append-only event store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamId, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// All stored events across every stream, ordered per stream.
    ///
    /// Used by projection rebuilds in tests/dev.
    pub fn all_events(&self) -> Vec<StoredEvent> {
        match self.streams.read() {
            Ok(streams) => {
                let mut all: Vec<StoredEvent> = streams.values().flatten().cloned().collect();
                all.sort_by(|a, b| {
                    a.stream_id
                        .cmp(&b.stream_id)
                        .then(a.sequence_number.cmp(&b.sequence_number))
                });
                all
            }
            Err(_) => vec![],
        }
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }

        // All events in a batch must target the same stream.
        let stream_id = events[0].stream_id.clone();
        let aggregate_type = events[0].aggregate_type.clone();

        for (idx, e) in events.iter().enumerate() {
            if e.stream_id != stream_id {
                return Err(EventStoreError::StreamMismatch(format!(
                    "batch contains multiple stream_ids (index {idx})"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(EventStoreError::StreamMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let stream = streams.entry(stream_id).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        // Enforce aggregate type stability across the stream.
        if let Some(existing) = stream.first()
            && existing.aggregate_type != aggregate_type
        {
            return Err(EventStoreError::StreamMismatch(format!(
                "stream aggregate_type is '{}', attempted append with '{}'",
                existing.aggregate_type, aggregate_type
            )));
        }

        // Assign sequence numbers and append (append-only).
        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                stream_id: e.stream_id,
                aggregate_type: e.aggregate_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            stream.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    fn load_stream(&self, stream_id: &StreamId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams.get(stream_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn uncommitted(stream_id: StreamId, event_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            stream_id,
            aggregate_type: "attendee".to_string(),
            event_type: event_type.to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn append_assigns_monotonic_sequence_numbers() {
        let store = InMemoryEventStore::new();
        let stream = StreamId::new("attendee", "1");

        let first = store
            .append(vec![uncommitted(stream.clone(), "a")], ExpectedVersion::Exact(0))
            .unwrap();
        assert_eq!(first[0].sequence_number, 1);

        let second = store
            .append(
                vec![
                    uncommitted(stream.clone(), "b"),
                    uncommitted(stream.clone(), "c"),
                ],
                ExpectedVersion::Exact(1),
            )
            .unwrap();
        assert_eq!(second[0].sequence_number, 2);
        assert_eq!(second[1].sequence_number, 3);
    }

    #[test]
    fn stale_expected_version_is_a_concurrency_error() {
        let store = InMemoryEventStore::new();
        let stream = StreamId::new("attendee", "1");

        store
            .append(vec![uncommitted(stream.clone(), "a")], ExpectedVersion::Exact(0))
            .unwrap();

        let err = store
            .append(vec![uncommitted(stream.clone(), "b")], ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));

        // The failed append left nothing behind.
        assert_eq!(store.load_stream(&stream).unwrap().len(), 1);
    }

    #[test]
    fn unknown_stream_loads_empty() {
        let store = InMemoryEventStore::new();
        let stream = StreamId::new("product", Uuid::now_v7());
        assert!(store.load_stream(&stream).unwrap().is_empty());
    }

    #[test]
    fn batches_cannot_mix_streams() {
        let store = InMemoryEventStore::new();
        let err = store
            .append(
                vec![
                    uncommitted(StreamId::new("attendee", "1"), "a"),
                    uncommitted(StreamId::new("attendee", "2"), "b"),
                ],
                ExpectedVersion::Any,
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::StreamMismatch(_)));
    }
}
