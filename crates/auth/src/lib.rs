//! `turnstile-auth` — pure authorization boundary for staff actions.
//!
//! This crate is intentionally decoupled from HTTP and storage. Callers
//! resolve a `StaffAccount` however they like and run the pure `authorize`
//! check before invoking a core service.

pub mod authorize;
pub mod permissions;
pub mod roles;
pub mod staff;

pub use authorize::{AuthzError, authorize};
pub use permissions::Permission;
pub use roles::StaffRole;
pub use staff::StaffAccount;
