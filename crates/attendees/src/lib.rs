//! Attendee domain module (event-sourced).
//!
//! This crate contains the admission ledger's business rules: registration,
//! the one-way pending → admitted transition, consumption credits, and
//! withdrawal. Pure deterministic domain logic (no IO, no HTTP, no storage).

pub mod attendee;
pub mod category;

pub use attendee::{
    AdmissionRecord, AdmitAttendee, Attendee, AttendeeAdmitted, AttendeeCommand, AttendeeEvent,
    AttendeeId, AttendeeRegistered, AttendeeWithdrawn, CredentialToken, CreditsDebited,
    DebitCredits, RegisterAttendee, WithdrawAttendee,
};
pub use category::{Category, CategoryId};
