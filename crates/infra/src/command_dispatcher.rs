//! Command execution pipeline (application-level orchestration).
//!
//! Orchestrates the full event-sourcing lifecycle for one aggregate stream:
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store
//!   ↓
//! 2. Rehydrate aggregate (apply history)
//!   ↓
//! 3. Handle command (pure decision logic, produces events)
//!   ↓
//! 4. Persist events (append-only, optimistic concurrency check)
//!   ↓
//! 5. Publish events to bus (projections, handlers)
//! ```
//!
//! `dispatch` runs the whole pipeline for the common single-stream case.
//! `rehydrate` and `commit` expose the halves separately so a caller that
//! must decide across more than one stream (the sales processor) can
//! rehydrate everything, decide everything, and only then append.
//!
//! Events are persisted before publication; if the append fails nothing is
//! published. If publication fails after a successful append the events are
//! already durable, so delivery is at-least-once and consumers must be
//! idempotent.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use turnstile_core::{Aggregate, DomainError, ExpectedVersion, StreamId};
use turnstile_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Deterministic domain outcome (validation, invariant, typed rejection).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Optimistic concurrency failure (stale stream version).
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// Failed to deserialize historical payloads into the aggregate event type.
    #[error("event deserialization failed: {0}")]
    Deserialize(String),

    /// Persisting to the event store failed.
    #[error("event store failure: {0}")]
    Store(EventStoreError),

    /// Publication failed after a successful append (events are durable).
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Sits between the services and the infrastructure traits; works with any
/// `EventStore` and `EventBus` implementation (in-memory in tests, durable
/// backends behind the same traits in production).
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Load a stream and rebuild the aggregate's current state.
    ///
    /// Returns the rehydrated aggregate together with the stream version to
    /// expect on the next append (defense in depth against racing writers,
    /// on top of the per-stream locks services hold).
    pub fn rehydrate<A>(
        &self,
        stream_id: &StreamId,
        make_aggregate: impl FnOnce() -> A,
    ) -> Result<(A, ExpectedVersion), DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(stream_id)?;
        validate_loaded_stream(stream_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = make_aggregate();
        apply_history::<A>(&mut aggregate, history)?;

        Ok((aggregate, expected))
    }

    /// Append decided events to one stream, then publish them.
    pub fn commit<E>(
        &self,
        stream_id: &StreamId,
        aggregate_type: &str,
        events: &[E],
        expected: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        E: turnstile_events::Event + Serialize,
    {
        if events.is_empty() {
            return Ok(vec![]);
        }

        let uncommitted = events
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    stream_id.clone(),
                    aggregate_type,
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }

    /// Dispatch a command through the full pipeline for a single stream.
    pub fn dispatch<A>(
        &self,
        stream_id: &StreamId,
        aggregate_type: &str,
        command: &A::Command,
        make_aggregate: impl FnOnce() -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: turnstile_events::Event + Serialize + DeserializeOwned,
    {
        let (aggregate, expected) = self.rehydrate(stream_id, make_aggregate)?;

        let decided = aggregate.handle(command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        self.commit(stream_id, aggregate_type, &decided, expected)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    stream_id: &StreamId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Guard against a buggy backend returning foreign or out-of-order events.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if &e.stream_id != stream_id {
            return Err(DispatchError::Store(EventStoreError::StreamMismatch(
                format!("loaded stream contains wrong stream_id at index {idx}"),
            )));
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                format!(
                    "non-contiguous sequence_number in loaded stream (last={last}, found={})",
                    e.sequence_number
                ),
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: Vec<StoredEvent>) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}
