use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use turnstile_core::StaffId;
use turnstile_events::EventEnvelope;
use turnstile_inventory::{MovementKind, ProductEvent, ProductId};

use crate::read_model::ReadModelStore;

use super::cursors::{CursorAdvance, StreamCursors};
use super::{PRODUCT_AGGREGATE, ProjectionError};

/// One row of the per-product movement ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementEntry {
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: u32,
    pub stock_before: i64,
    pub stock_after: i64,
    pub note: String,
    pub staff_id: StaffId,
    pub occurred_at: DateTime<Utc>,
}

/// Full movement history per product.
///
/// Backs the audit views: chronological ledger per product plus replay
/// reconciliation, where the ledger alone is folded back into a stock figure
/// that must equal the live one.
#[derive(Debug)]
pub struct MovementLogProjection<S>
where
    S: ReadModelStore<ProductId, Vec<MovementEntry>>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> MovementLogProjection<S>
where
    S: ReadModelStore<ProductId, Vec<MovementEntry>>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// Chronological movement ledger for one product.
    pub fn history(&self, product_id: &ProductId) -> Vec<MovementEntry> {
        self.store.get(product_id).unwrap_or_default()
    }

    /// Fold the recorded ledger back into a stock figure.
    ///
    /// Adjustments act as reset points; entries add, exits and sales
    /// subtract. For a healthy system this always equals the live stock.
    pub fn replayed_stock(&self, product_id: &ProductId) -> i64 {
        let mut stock = 0i64;
        for entry in self.history(product_id) {
            stock = match entry.kind {
                MovementKind::Entry => stock + i64::from(entry.quantity),
                MovementKind::Exit | MovementKind::Sale => stock - i64::from(entry.quantity),
                MovementKind::Adjustment => i64::from(entry.quantity),
            };
        }
        stock
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

        if let ProductEvent::StockMovementRecorded(e) = event {
            let mut history = self.store.get(&e.product_id).unwrap_or_default();
            history.push(MovementEntry {
                product_id: e.product_id,
                kind: e.kind,
                quantity: e.quantity,
                stock_before: e.stock_before,
                stock_after: e.stock_after,
                note: e.note,
                staff_id: e.staff_id,
                occurred_at: e.occurred_at,
            });
            self.store.upsert(e.product_id, history);
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
