use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use turnstile_attendees::AttendeeId;
use turnstile_core::StaffId;
use turnstile_events::EventEnvelope;
use turnstile_inventory::{ProductEvent, ProductId, SaleId};

use crate::read_model::ReadModelStore;

use super::cursors::{CursorAdvance, StreamCursors};
use super::{PRODUCT_AGGREGATE, ProjectionError};

/// One completed point-of-sale transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleEntry {
    pub sale_id: SaleId,
    pub product_id: ProductId,
    pub attendee_id: Option<AttendeeId>,
    pub quantity: u32,
    pub unit_price_cents: u64,
    pub total_cents: u64,
    pub paid_with_credits: bool,
    pub staff_id: StaffId,
    pub occurred_at: DateTime<Utc>,
}

/// Full sale history.
///
/// Per-product unit counts and revenue are summed from the sale events
/// themselves, so they stay correct regardless of restocks or adjustments
/// in between.
#[derive(Debug)]
pub struct SalesLogProjection<S>
where
    S: ReadModelStore<ProductId, Vec<SaleEntry>>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> SalesLogProjection<S>
where
    S: ReadModelStore<ProductId, Vec<SaleEntry>>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// Chronological sales for one product.
    pub fn sales(&self, product_id: &ProductId) -> Vec<SaleEntry> {
        self.store.get(product_id).unwrap_or_default()
    }

    /// Every recorded sale, across all products.
    pub fn all_sales(&self) -> Vec<SaleEntry> {
        let mut all: Vec<SaleEntry> = self.store.list().into_iter().flatten().collect();
        all.sort_by_key(|s| s.occurred_at);
        all
    }

    /// Units sold for one product, summed from sale events.
    pub fn units_sold(&self, product_id: &ProductId) -> u64 {
        self.sales(product_id)
            .iter()
            .map(|s| u64::from(s.quantity))
            .sum()
    }

    /// Gross revenue for one product, in cents.
    pub fn revenue_cents(&self, product_id: &ProductId) -> u64 {
        self.sales(product_id).iter().map(|s| s.total_cents).sum()
    }

    /// Apply a published envelope into the projection (idempotent).
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != PRODUCT_AGGREGATE {
            return Ok(());
        }
        let stream_id = envelope.stream_id();
        if self.cursors.offer(stream_id, envelope.sequence_number())? == CursorAdvance::Duplicate {
            return Ok(());
        }

        let event: ProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        if let ProductEvent::SaleRecorded(e) = event {
            let mut sales = self.store.get(&e.product_id).unwrap_or_default();
            sales.push(SaleEntry {
                sale_id: e.sale_id,
                product_id: e.product_id,
                attendee_id: e.attendee_id,
                quantity: e.quantity,
                unit_price_cents: e.unit_price_cents,
                total_cents: e.total_cents,
                paid_with_credits: e.paid_with_credits,
                staff_id: e.staff_id,
                occurred_at: e.occurred_at,
            });
            self.store.upsert(e.product_id, sales);
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
