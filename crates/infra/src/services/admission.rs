//! Admission ledger service.
//!
//! Registration, scan lookup, the one-way admit transition and withdrawal,
//! all executed under the attendee's stream lock so a credential can win its
//! admission exactly once no matter how many doors scan it concurrently.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use turnstile_attendees::{
    AdmissionRecord, AdmitAttendee, Attendee, AttendeeCommand, AttendeeEvent, AttendeeId,
    CategoryId, CredentialToken, RegisterAttendee, WithdrawAttendee,
};
use turnstile_core::{Aggregate, AggregateRoot, DomainError, StaffId};
use turnstile_events::{EventBus, EventEnvelope};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::locks::{StreamLocks, lock};
use crate::projections::ATTENDEE_AGGREGATE;
use crate::services::categories::CategoryDirectory;
use crate::services::{ServiceError, ServiceResult, run_with_retry};

/// Lookup key accepted by scan and desk flows alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionKey {
    /// Manual entry of the registration id.
    Id(AttendeeId),
    /// Scanned credential.
    Credential(CredentialToken),
}

/// Returned by a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReceipt {
    pub attendee_id: AttendeeId,
    pub credential: CredentialToken,
    pub granted_credits: u32,
}

/// Read-only view of one attendee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendeeSnapshot {
    pub attendee_id: AttendeeId,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub category_id: Option<CategoryId>,
    pub credential: Option<CredentialToken>,
    pub admission: Option<AdmissionRecord>,
    pub credits: i64,
}

/// Returned by a winning admit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmittedReceipt {
    pub attendee_id: AttendeeId,
    pub name: String,
    pub admitted_by: StaffId,
    pub admitted_at: DateTime<Utc>,
    pub credits: i64,
}

pub struct AdmissionService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    locks: Arc<StreamLocks>,
    categories: Arc<CategoryDirectory>,
    // Credential -> attendee index maintained alongside the ledger.
    // Derived state: `rebuild_credentials` reconstructs it from the streams.
    credentials: RwLock<HashMap<CredentialToken, AttendeeId>>,
}

impl<S, B> AdmissionService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        locks: Arc<StreamLocks>,
        categories: Arc<CategoryDirectory>,
    ) -> Self {
        Self {
            dispatcher,
            locks,
            categories,
            credentials: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new attendee and issue their credential.
    ///
    /// The category's credit grant is snapshotted into the registration;
    /// later category edits do not touch existing balances.
    pub fn register_attendee(
        &self,
        attendee_id: &str,
        name: &str,
        phone: &str,
        email: &str,
        category_id: CategoryId,
        registered_by: StaffId,
    ) -> ServiceResult<RegistrationReceipt> {
        let attendee_id = AttendeeId::new(attendee_id)?;

        let category = self
            .categories
            .get(&category_id)
            .ok_or(DomainError::NotFound)?;
        if !category.active {
            return Err(ServiceError::Domain(DomainError::invalid_input(
                "category is inactive",
            )));
        }

        let credential = CredentialToken::issue();
        let command = AttendeeCommand::RegisterAttendee(RegisterAttendee {
            attendee_id: attendee_id.clone(),
            name: name.to_string(),
            phone: phone.to_string(),
            email: email.to_string(),
            category_id,
            credential,
            granted_credits: category.included_credits,
            registered_by,
            occurred_at: Utc::now(),
        });

        let attendee = self.execute(&attendee_id, &command)?;
        self.index_credential(credential, attendee_id.clone());

        tracing::info!(
            attendee_id = %attendee_id,
            category = %category.name,
            credits = category.included_credits,
            "attendee registered"
        );

        Ok(RegistrationReceipt {
            attendee_id,
            credential,
            granted_credits: category.included_credits,
        })
    }

    /// Read-only lookup by id or credential. Never mutates.
    pub fn lookup(&self, key: &AdmissionKey) -> ServiceResult<AttendeeSnapshot> {
        let attendee_id = self.resolve(key)?;
        let attendee = self.load(&attendee_id)?;
        if !attendee.is_registered() {
            return Err(ServiceError::Domain(DomainError::NotFound));
        }
        Ok(snapshot(&attendee))
    }

    /// Atomic pending -> admitted transition.
    ///
    /// Exactly one concurrent caller wins; every other one gets
    /// `AlreadyAdmitted` with the winner's staff id and timestamp.
    pub fn admit(&self, key: &AdmissionKey, staff_id: StaffId) -> ServiceResult<AdmittedReceipt> {
        let attendee_id = self.resolve(key)?;
        let command = AttendeeCommand::AdmitAttendee(AdmitAttendee {
            attendee_id: attendee_id.clone(),
            staff_id,
            occurred_at: Utc::now(),
        });

        let attendee = self.execute(&attendee_id, &command)?;
        // handle() succeeded, so the admission record exists.
        let admission = attendee
            .admission()
            .ok_or_else(|| ServiceError::Infrastructure("admission record missing".to_string()))?;

        tracing::info!(
            attendee_id = %attendee_id,
            staff = %admission.staff_id,
            "attendee admitted"
        );

        Ok(AdmittedReceipt {
            attendee_id,
            name: attendee.name().to_string(),
            admitted_by: admission.staff_id,
            admitted_at: admission.admitted_at,
            credits: attendee.credits(),
        })
    }

    /// Withdraw a registration that has not been admitted.
    ///
    /// Admitted attendees can never be removed; the error carries the
    /// admission record instead of silently ignoring the request.
    pub fn withdraw(&self, key: &AdmissionKey) -> ServiceResult<()> {
        let attendee_id = self.resolve(key)?;
        let command = AttendeeCommand::WithdrawAttendee(WithdrawAttendee {
            attendee_id: attendee_id.clone(),
            occurred_at: Utc::now(),
        });

        let attendee = self.execute(&attendee_id, &command)?;
        if let Some(credential) = attendee.credential() {
            self.drop_credential(&credential);
        }

        tracing::info!(attendee_id = %attendee_id, "attendee withdrawn");
        Ok(())
    }

    /// Rebuild the credential index by replaying attendee envelopes.
    ///
    /// Registrations insert, withdrawals evict; a re-registration after a
    /// withdrawal re-inserts with its fresh credential. Run at startup with
    /// the stored streams before serving scans.
    pub fn rebuild_credentials(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> ServiceResult<()> {
        let mut map = self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        map.clear();

        for envelope in envelopes {
            if envelope.aggregate_type() != ATTENDEE_AGGREGATE {
                continue;
            }
            let event: AttendeeEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| {
                    ServiceError::Infrastructure(format!("event deserialization failed: {e}"))
                })?;
            match event {
                AttendeeEvent::AttendeeRegistered(e) => {
                    map.insert(e.credential, e.attendee_id);
                }
                AttendeeEvent::AttendeeWithdrawn(e) => {
                    map.retain(|_, attendee_id| attendee_id != &e.attendee_id);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn resolve(&self, key: &AdmissionKey) -> ServiceResult<AttendeeId> {
        match key {
            AdmissionKey::Id(id) => Ok(id.clone()),
            AdmissionKey::Credential(token) => {
                let map = self
                    .credentials
                    .read()
                    .unwrap_or_else(PoisonError::into_inner);
                map.get(token).cloned().ok_or_else(|| DomainError::NotFound.into())
            }
        }
    }

    fn index_credential(&self, credential: CredentialToken, attendee_id: AttendeeId) {
        let mut map = self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        map.insert(credential, attendee_id);
    }

    fn drop_credential(&self, credential: &CredentialToken) {
        let mut map = self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        map.remove(credential);
    }

    fn load(&self, attendee_id: &AttendeeId) -> ServiceResult<Attendee> {
        let stream_id = attendee_id.stream_id();
        let (attendee, _) = self
            .dispatcher
            .rehydrate(&stream_id, || Attendee::empty(attendee_id.clone()))
            .map_err(flatten)?;
        Ok(attendee)
    }

    /// Rehydrate, decide, append and publish under the stream lock, then
    /// return the post-command aggregate state.
    fn execute(
        &self,
        attendee_id: &AttendeeId,
        command: &AttendeeCommand,
    ) -> ServiceResult<Attendee> {
        let stream_id = attendee_id.stream_id();
        let handle = self.locks.handle(&stream_id);
        let _guard = lock(&handle);

        run_with_retry(|| {
            let (mut attendee, expected) = self
                .dispatcher
                .rehydrate(&stream_id, || Attendee::empty(attendee_id.clone()))?;

            let events = attendee.handle(command).map_err(DispatchError::from)?;
            self.dispatcher
                .commit(&stream_id, ATTENDEE_AGGREGATE, &events, expected)?;

            for event in &events {
                attendee.apply(event);
            }
            Ok(attendee)
        })
    }
}

fn snapshot(attendee: &Attendee) -> AttendeeSnapshot {
    AttendeeSnapshot {
        attendee_id: attendee.id().clone(),
        name: attendee.name().to_string(),
        phone: attendee.phone().to_string(),
        email: attendee.email().to_string(),
        category_id: attendee.category_id(),
        credential: attendee.credential(),
        admission: attendee.admission(),
        credits: attendee.credits(),
    }
}

fn flatten(err: DispatchError) -> ServiceError {
    match err {
        DispatchError::Domain(domain) => ServiceError::Domain(domain),
        other => ServiceError::Infrastructure(other.to_string()),
    }
}
