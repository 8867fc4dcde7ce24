use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use turnstile_core::{Aggregate, AggregateRoot, DomainError, StaffId, StreamId};
use turnstile_events::Event;

use crate::category::CategoryId;

/// Attendee identifier: the external registration id ("cc").
///
/// Unique, immutable, assigned by the registration collaborator. Doubles as
/// the attendee's stream key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttendeeId(String);

impl AttendeeId {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_input("attendee id cannot be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn stream_id(&self) -> StreamId {
        StreamId::new("attendee", &self.0)
    }
}

impl core::fmt::Display for AttendeeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AttendeeId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Opaque scannable credential bound to one attendee.
///
/// Issued exactly once at registration and never regenerated with a new
/// value afterwards; verified many times at the door.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialToken(Uuid);

impl CredentialToken {
    /// Issue a fresh credential (random v4, globally unique).
    pub fn issue() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl core::fmt::Display for CredentialToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for CredentialToken {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s)
            .map_err(|e| DomainError::invalid_input(format!("credential: {e}")))?;
        Ok(Self(uuid))
    }
}

/// Who admitted the attendee, and when. Present iff the attendee is admitted;
/// never cleared once set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRecord {
    pub staff_id: StaffId,
    pub admitted_at: DateTime<Utc>,
}

/// Aggregate root: Attendee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendee {
    id: AttendeeId,
    name: String,
    phone: String,
    email: String,
    category_id: Option<CategoryId>,
    credential: Option<CredentialToken>,
    admission: Option<AdmissionRecord>,
    credits: i64,
    withdrawn: bool,
    version: u64,
    created: bool,
}

impl Attendee {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: AttendeeId) -> Self {
        Self {
            id,
            name: String::new(),
            phone: String::new(),
            email: String::new(),
            category_id: None,
            credential: None,
            admission: None,
            credits: 0,
            withdrawn: false,
            version: 0,
            created: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    pub fn credential(&self) -> Option<CredentialToken> {
        self.credential
    }

    pub fn admission(&self) -> Option<AdmissionRecord> {
        self.admission
    }

    pub fn is_admitted(&self) -> bool {
        self.admission.is_some()
    }

    /// Remaining consumption credits (never negative).
    pub fn credits(&self) -> i64 {
        self.credits
    }

    pub fn is_withdrawn(&self) -> bool {
        self.withdrawn
    }

    /// Whether a stream exists and still refers to a live registration.
    pub fn is_registered(&self) -> bool {
        self.created && !self.withdrawn
    }
}

impl AggregateRoot for Attendee {
    type Id = AttendeeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterAttendee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAttendee {
    pub attendee_id: AttendeeId,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub category_id: CategoryId,
    /// Credential issued by the caller exactly once, before dispatch.
    pub credential: CredentialToken,
    /// Credit grant snapshotted from the category at registration time.
    pub granted_credits: u32,
    pub registered_by: StaffId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdmitAttendee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmitAttendee {
    pub attendee_id: AttendeeId,
    pub staff_id: StaffId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DebitCredits (issued by the sales processor for credit-paid sales).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitCredits {
    pub attendee_id: AttendeeId,
    pub quantity: u32,
    pub staff_id: StaffId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: WithdrawAttendee (only while not admitted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawAttendee {
    pub attendee_id: AttendeeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendeeCommand {
    RegisterAttendee(RegisterAttendee),
    AdmitAttendee(AdmitAttendee),
    DebitCredits(DebitCredits),
    WithdrawAttendee(WithdrawAttendee),
}

/// Event: AttendeeRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeRegistered {
    pub attendee_id: AttendeeId,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub category_id: CategoryId,
    pub credential: CredentialToken,
    pub granted_credits: u32,
    pub registered_by: StaffId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AttendeeAdmitted. Terminal: no later event reverses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeAdmitted {
    pub attendee_id: AttendeeId,
    pub staff_id: StaffId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CreditsDebited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditsDebited {
    pub attendee_id: AttendeeId,
    pub quantity: u32,
    /// Balance after the debit, captured at decision time.
    pub remaining: i64,
    pub staff_id: StaffId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AttendeeWithdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeWithdrawn {
    pub attendee_id: AttendeeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendeeEvent {
    AttendeeRegistered(AttendeeRegistered),
    AttendeeAdmitted(AttendeeAdmitted),
    CreditsDebited(CreditsDebited),
    AttendeeWithdrawn(AttendeeWithdrawn),
}

impl Event for AttendeeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AttendeeEvent::AttendeeRegistered(_) => "attendee.registered",
            AttendeeEvent::AttendeeAdmitted(_) => "attendee.admitted",
            AttendeeEvent::CreditsDebited(_) => "attendee.credits_debited",
            AttendeeEvent::AttendeeWithdrawn(_) => "attendee.withdrawn",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AttendeeEvent::AttendeeRegistered(e) => e.occurred_at,
            AttendeeEvent::AttendeeAdmitted(e) => e.occurred_at,
            AttendeeEvent::CreditsDebited(e) => e.occurred_at,
            AttendeeEvent::AttendeeWithdrawn(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Attendee {
    type Command = AttendeeCommand;
    type Event = AttendeeEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AttendeeEvent::AttendeeRegistered(e) => {
                self.id = e.attendee_id.clone();
                self.name = e.name.clone();
                self.phone = e.phone.clone();
                self.email = e.email.clone();
                self.category_id = Some(e.category_id);
                self.credential = Some(e.credential);
                self.admission = None;
                self.credits = i64::from(e.granted_credits);
                self.withdrawn = false;
                self.created = true;
            }
            AttendeeEvent::AttendeeAdmitted(e) => {
                self.admission = Some(AdmissionRecord {
                    staff_id: e.staff_id,
                    admitted_at: e.occurred_at,
                });
            }
            AttendeeEvent::CreditsDebited(e) => {
                self.credits = e.remaining;
            }
            AttendeeEvent::AttendeeWithdrawn(_) => {
                self.withdrawn = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AttendeeCommand::RegisterAttendee(cmd) => self.handle_register(cmd),
            AttendeeCommand::AdmitAttendee(cmd) => self.handle_admit(cmd),
            AttendeeCommand::DebitCredits(cmd) => self.handle_debit(cmd),
            AttendeeCommand::WithdrawAttendee(cmd) => self.handle_withdraw(cmd),
        }
    }
}

impl Attendee {
    fn ensure_attendee_id(&self, attendee_id: &AttendeeId) -> Result<(), DomainError> {
        if &self.id != attendee_id {
            return Err(DomainError::invariant("attendee_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterAttendee) -> Result<Vec<AttendeeEvent>, DomainError> {
        // Re-registering after a withdrawal is allowed; the stream keeps the
        // full history and the new registration resets the live state.
        if self.created && !self.withdrawn {
            return Err(DomainError::conflict("attendee already registered"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::invalid_input("name cannot be empty"));
        }

        Ok(vec![AttendeeEvent::AttendeeRegistered(AttendeeRegistered {
            attendee_id: cmd.attendee_id.clone(),
            name: cmd.name.clone(),
            phone: cmd.phone.clone(),
            email: cmd.email.clone(),
            category_id: cmd.category_id,
            credential: cmd.credential,
            granted_credits: cmd.granted_credits,
            registered_by: cmd.registered_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_admit(&self, cmd: &AdmitAttendee) -> Result<Vec<AttendeeEvent>, DomainError> {
        if !self.is_registered() {
            return Err(DomainError::not_found());
        }
        self.ensure_attendee_id(&cmd.attendee_id)?;

        // At most one admission per credential: every later attempt reports
        // the winning staff/timestamp instead of transitioning again.
        if let Some(admission) = self.admission {
            return Err(DomainError::AlreadyAdmitted {
                admitted_by: admission.staff_id,
                admitted_at: admission.admitted_at,
            });
        }

        Ok(vec![AttendeeEvent::AttendeeAdmitted(AttendeeAdmitted {
            attendee_id: cmd.attendee_id.clone(),
            staff_id: cmd.staff_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_debit(&self, cmd: &DebitCredits) -> Result<Vec<AttendeeEvent>, DomainError> {
        if !self.is_registered() {
            return Err(DomainError::not_found());
        }
        self.ensure_attendee_id(&cmd.attendee_id)?;

        if cmd.quantity == 0 {
            return Err(DomainError::invalid_input("quantity must be positive"));
        }
        if self.admission.is_none() {
            return Err(DomainError::NotAdmitted);
        }

        let quantity = i64::from(cmd.quantity);
        if self.credits < quantity {
            return Err(DomainError::InsufficientCredit {
                available: self.credits,
            });
        }

        Ok(vec![AttendeeEvent::CreditsDebited(CreditsDebited {
            attendee_id: cmd.attendee_id.clone(),
            quantity: cmd.quantity,
            remaining: self.credits - quantity,
            staff_id: cmd.staff_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_withdraw(&self, cmd: &WithdrawAttendee) -> Result<Vec<AttendeeEvent>, DomainError> {
        if !self.is_registered() {
            return Err(DomainError::not_found());
        }
        self.ensure_attendee_id(&cmd.attendee_id)?;

        if let Some(admission) = self.admission {
            // Admitted attendees are never removed; report, don't ignore.
            return Err(DomainError::AlreadyAdmitted {
                admitted_by: admission.staff_id,
                admitted_at: admission.admitted_at,
            });
        }

        Ok(vec![AttendeeEvent::AttendeeWithdrawn(AttendeeWithdrawn {
            attendee_id: cmd.attendee_id.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_core::AggregateId;

    fn test_attendee_id() -> AttendeeId {
        AttendeeId::new("10203040").unwrap()
    }

    fn test_category_id() -> CategoryId {
        CategoryId::new(AggregateId::new())
    }

    fn test_staff_id() -> StaffId {
        StaffId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn register_cmd(attendee_id: &AttendeeId, credits: u32) -> RegisterAttendee {
        RegisterAttendee {
            attendee_id: attendee_id.clone(),
            name: "Ana Suarez".to_string(),
            phone: "3001234567".to_string(),
            email: "ana@example.com".to_string(),
            category_id: test_category_id(),
            credential: CredentialToken::issue(),
            granted_credits: credits,
            registered_by: test_staff_id(),
            occurred_at: test_time(),
        }
    }

    fn registered(credits: u32) -> Attendee {
        let id = test_attendee_id();
        let mut attendee = Attendee::empty(id.clone());
        let events = attendee
            .handle(&AttendeeCommand::RegisterAttendee(register_cmd(&id, credits)))
            .unwrap();
        attendee.apply(&events[0]);
        attendee
    }

    #[test]
    fn attendee_id_rejects_empty_input() {
        assert!(matches!(
            AttendeeId::new("   "),
            Err(DomainError::InvalidInput(_))
        ));
    }

    #[test]
    fn register_emits_registered_event_with_credential_and_credits() {
        let id = test_attendee_id();
        let attendee = Attendee::empty(id.clone());
        let cmd = register_cmd(&id, 3);

        let events = attendee
            .handle(&AttendeeCommand::RegisterAttendee(cmd.clone()))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            AttendeeEvent::AttendeeRegistered(e) => {
                assert_eq!(e.attendee_id, id);
                assert_eq!(e.credential, cmd.credential);
                assert_eq!(e.granted_credits, 3);
            }
            _ => panic!("Expected AttendeeRegistered event"),
        }
    }

    #[test]
    fn register_twice_conflicts() {
        let attendee = registered(0);
        let err = attendee
            .handle(&AttendeeCommand::RegisterAttendee(register_cmd(
                &test_attendee_id(),
                0,
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn admit_transitions_pending_to_admitted_once() {
        let mut attendee = registered(2);
        let staff = test_staff_id();

        let events = attendee
            .handle(&AttendeeCommand::AdmitAttendee(AdmitAttendee {
                attendee_id: test_attendee_id(),
                staff_id: staff,
                occurred_at: test_time(),
            }))
            .unwrap();
        attendee.apply(&events[0]);

        assert!(attendee.is_admitted());
        let admission = attendee.admission().unwrap();
        assert_eq!(admission.staff_id, staff);
    }

    #[test]
    fn second_admit_reports_winning_staff_and_timestamp() {
        let mut attendee = registered(0);
        let winner = test_staff_id();

        let events = attendee
            .handle(&AttendeeCommand::AdmitAttendee(AdmitAttendee {
                attendee_id: test_attendee_id(),
                staff_id: winner,
                occurred_at: test_time(),
            }))
            .unwrap();
        attendee.apply(&events[0]);
        let winner_at = attendee.admission().unwrap().admitted_at;

        let err = attendee
            .handle(&AttendeeCommand::AdmitAttendee(AdmitAttendee {
                attendee_id: test_attendee_id(),
                staff_id: test_staff_id(),
                occurred_at: test_time(),
            }))
            .unwrap_err();

        match err {
            DomainError::AlreadyAdmitted {
                admitted_by,
                admitted_at,
            } => {
                assert_eq!(admitted_by, winner);
                assert_eq!(admitted_at, winner_at);
            }
            other => panic!("Expected AlreadyAdmitted, got {other:?}"),
        }
    }

    #[test]
    fn admit_unknown_attendee_is_not_found() {
        let attendee = Attendee::empty(test_attendee_id());
        let err = attendee
            .handle(&AttendeeCommand::AdmitAttendee(AdmitAttendee {
                attendee_id: test_attendee_id(),
                staff_id: test_staff_id(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn debit_requires_admission() {
        let attendee = registered(3);
        let err = attendee
            .handle(&AttendeeCommand::DebitCredits(DebitCredits {
                attendee_id: test_attendee_id(),
                quantity: 1,
                staff_id: test_staff_id(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotAdmitted);
    }

    #[test]
    fn debit_decrements_and_never_goes_negative() {
        let mut attendee = registered(3);
        let events = attendee
            .handle(&AttendeeCommand::AdmitAttendee(AdmitAttendee {
                attendee_id: test_attendee_id(),
                staff_id: test_staff_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        attendee.apply(&events[0]);

        let events = attendee
            .handle(&AttendeeCommand::DebitCredits(DebitCredits {
                attendee_id: test_attendee_id(),
                quantity: 2,
                staff_id: test_staff_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        attendee.apply(&events[0]);
        assert_eq!(attendee.credits(), 1);

        let err = attendee
            .handle(&AttendeeCommand::DebitCredits(DebitCredits {
                attendee_id: test_attendee_id(),
                quantity: 2,
                staff_id: test_staff_id(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::InsufficientCredit { available: 1 });
        assert_eq!(attendee.credits(), 1);
    }

    #[test]
    fn withdraw_is_rejected_once_admitted() {
        let mut attendee = registered(0);
        let events = attendee
            .handle(&AttendeeCommand::AdmitAttendee(AdmitAttendee {
                attendee_id: test_attendee_id(),
                staff_id: test_staff_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        attendee.apply(&events[0]);

        let err = attendee
            .handle(&AttendeeCommand::WithdrawAttendee(WithdrawAttendee {
                attendee_id: test_attendee_id(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyAdmitted { .. }));
    }

    #[test]
    fn withdrawn_attendee_can_register_again() {
        let mut attendee = registered(1);
        let events = attendee
            .handle(&AttendeeCommand::WithdrawAttendee(WithdrawAttendee {
                attendee_id: test_attendee_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        attendee.apply(&events[0]);
        assert!(!attendee.is_registered());

        let events = attendee
            .handle(&AttendeeCommand::RegisterAttendee(register_cmd(
                &test_attendee_id(),
                5,
            )))
            .unwrap();
        attendee.apply(&events[0]);
        assert!(attendee.is_registered());
        assert_eq!(attendee.credits(), 5);
        assert!(!attendee.is_admitted());
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let attendee = registered(2);
        let before = attendee.clone();

        let cmd = AttendeeCommand::AdmitAttendee(AdmitAttendee {
            attendee_id: test_attendee_id(),
            staff_id: test_staff_id(),
            occurred_at: test_time(),
        });
        let events1 = attendee.handle(&cmd).unwrap();
        let events2 = attendee.handle(&cmd).unwrap();

        assert_eq!(attendee, before);
        assert_eq!(events1, events2);
    }

    #[test]
    fn apply_is_deterministic_and_versions_increment() {
        let id = test_attendee_id();
        let cmd = register_cmd(&id, 2);
        let registered_event = AttendeeEvent::AttendeeRegistered(AttendeeRegistered {
            attendee_id: id.clone(),
            name: cmd.name.clone(),
            phone: cmd.phone.clone(),
            email: cmd.email.clone(),
            category_id: cmd.category_id,
            credential: cmd.credential,
            granted_credits: cmd.granted_credits,
            registered_by: cmd.registered_by,
            occurred_at: cmd.occurred_at,
        });
        let admitted_event = AttendeeEvent::AttendeeAdmitted(AttendeeAdmitted {
            attendee_id: id.clone(),
            staff_id: test_staff_id(),
            occurred_at: test_time(),
        });

        let mut a = Attendee::empty(id.clone());
        a.apply(&registered_event);
        a.apply(&admitted_event);

        let mut b = Attendee::empty(id);
        b.apply(&registered_event);
        b.apply(&admitted_event);

        assert_eq!(a, b);
        assert_eq!(a.version(), 2);
    }
}
