use serde::{Deserialize, Serialize};

use turnstile_core::AggregateId;

/// Category identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub AggregateId);

impl CategoryId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Attendee category: ticket tier with a pre-allocated consumption grant.
///
/// Categories are definition records, not aggregates. The credit grant is
/// snapshotted into `AttendeeRegistered` at registration time; editing a
/// category afterwards does not retroactively change existing balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    /// Unique display name (e.g. "VIP", "General").
    pub name: String,
    /// Consumption credits granted to each attendee registered in this category.
    pub included_credits: u32,
    /// Ticket price in smallest currency unit (e.g., cents).
    pub price_cents: u64,
    pub active: bool,
}

impl Category {
    pub fn new(
        id: CategoryId,
        name: impl Into<String>,
        included_credits: u32,
        price_cents: u64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            included_credits,
            price_cents,
            active: true,
        }
    }
}
