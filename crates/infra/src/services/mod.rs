//! Application services orchestrating commands over the event-sourced core.
//!
//! Each service composes the shared `CommandDispatcher` and the shared
//! `StreamLocks`. Sharing matters: every service of a deployment must hold
//! the same lock map and the same store, or the per-stream exclusivity the
//! admission and sale guarantees rest on is void.

pub mod admission;
pub mod categories;
pub mod inventory;
pub mod sales;

pub use admission::{AdmissionKey, AdmissionService, AdmittedReceipt, AttendeeSnapshot, RegistrationReceipt};
pub use categories::CategoryDirectory;
pub use inventory::{InventoryService, MovementReceipt, ProductSnapshot};
pub use sales::{SaleReceipt, SaleRequest, SalesService};

use thiserror::Error;

use turnstile_core::DomainError;

use crate::command_dispatcher::DispatchError;

/// Outcome type at the service boundary.
///
/// Domain rejections pass through typed; infrastructure faults (storage,
/// serialization, publication) are flattened into one opaque variant since
/// callers cannot act on their detail anyway.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("infrastructure failure: {0}")]
    Infrastructure(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Bounded internal retry on optimistic-concurrency conflicts.
///
/// Under the stream locks a conflict means an out-of-band writer touched the
/// store; retrying reloads fresh state. Callers never see the conflict
/// unless the bound is exhausted.
const MAX_CONFLICT_RETRIES: usize = 3;

pub(crate) fn run_with_retry<T>(
    mut attempt: impl FnMut() -> Result<T, DispatchError>,
) -> ServiceResult<T> {
    let mut tries = 0;
    loop {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(DispatchError::Concurrency(msg)) => {
                tries += 1;
                if tries >= MAX_CONFLICT_RETRIES {
                    return Err(ServiceError::Infrastructure(format!(
                        "concurrency retries exhausted: {msg}"
                    )));
                }
            }
            Err(DispatchError::Domain(err)) => return Err(ServiceError::Domain(err)),
            Err(other) => return Err(ServiceError::Infrastructure(other.to_string())),
        }
    }
}
