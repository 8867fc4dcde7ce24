use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use turnstile_attendees::{AttendeeEvent, AttendeeId, CategoryId, CredentialToken};
use turnstile_core::StaffId;
use turnstile_events::EventEnvelope;

use crate::read_model::ReadModelStore;

use super::cursors::{CursorAdvance, StreamCursors};
use super::{ATTENDEE_AGGREGATE, ProjectionError};

/// Admission status of one attendee, as the door dashboards see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub attendee_id: AttendeeId,
    pub name: String,
    pub category_id: CategoryId,
    pub credential: CredentialToken,
    pub admitted_by: Option<StaffId>,
    pub admitted_at: Option<DateTime<Utc>>,
    pub credits: i64,
    pub withdrawn: bool,
}

impl RosterEntry {
    pub fn is_admitted(&self) -> bool {
        self.admitted_at.is_some()
    }
}

/// Headline admission counters.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct RosterCounts {
    pub registered: usize,
    pub admitted: usize,
    pub pending: usize,
}

/// Admission roster projection.
///
/// Withdrawn registrations stay in the store (the ledger keeps them) but are
/// excluded from the counters and the roster listing.
#[derive(Debug)]
pub struct AdmissionRosterProjection<S>
where
    S: ReadModelStore<AttendeeId, RosterEntry>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> AdmissionRosterProjection<S>
where
    S: ReadModelStore<AttendeeId, RosterEntry>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, attendee_id: &AttendeeId) -> Option<RosterEntry> {
        self.store.get(attendee_id)
    }

    /// All live registrations, sorted by name.
    pub fn roster(&self) -> Vec<RosterEntry> {
        let mut rows: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|e| !e.withdrawn)
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    pub fn counts(&self) -> RosterCounts {
        let mut counts = RosterCounts::default();
        for entry in self.store.list() {
            if entry.withdrawn {
                continue;
            }
            counts.registered += 1;
            if entry.is_admitted() {
                counts.admitted += 1;
            } else {
                counts.pending += 1;
            }
        }
        counts
    }

    /// Apply a published envelope into the projection (idempotent).
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != ATTENDEE_AGGREGATE {
            return Ok(());
        }
        let stream_id = envelope.stream_id();
        if self.cursors.offer(stream_id, envelope.sequence_number())? == CursorAdvance::Duplicate {
            return Ok(());
        }

        let event: AttendeeEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            AttendeeEvent::AttendeeRegistered(e) => {
                self.store.upsert(
                    e.attendee_id.clone(),
                    RosterEntry {
                        attendee_id: e.attendee_id,
                        name: e.name,
                        category_id: e.category_id,
                        credential: e.credential,
                        admitted_by: None,
                        admitted_at: None,
                        credits: i64::from(e.granted_credits),
                        withdrawn: false,
                    },
                );
            }
            AttendeeEvent::AttendeeAdmitted(e) => {
                if let Some(mut entry) = self.store.get(&e.attendee_id) {
                    entry.admitted_by = Some(e.staff_id);
                    entry.admitted_at = Some(e.occurred_at);
                    self.store.upsert(e.attendee_id, entry);
                }
            }
            AttendeeEvent::CreditsDebited(e) => {
                if let Some(mut entry) = self.store.get(&e.attendee_id) {
                    entry.credits = e.remaining;
                    self.store.upsert(e.attendee_id, entry);
                }
            }
            AttendeeEvent::AttendeeWithdrawn(e) => {
                if let Some(mut entry) = self.store.get(&e.attendee_id) {
                    entry.withdrawn = true;
                    self.store.upsert(e.attendee_id, entry);
                }
            }
        }

        self.cursors.advance(stream_id, envelope.sequence_number());
        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.store.clear();
        self.cursors.reset();
        for envelope in envelopes {
            self.apply_envelope(&envelope)?;
        }
        Ok(())
    }
}
