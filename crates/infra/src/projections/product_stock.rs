use serde_json::Value as JsonValue;

use turnstile_events::EventEnvelope;
use turnstile_inventory::{ProductEvent, ProductId, StockStatus};

use crate::read_model::ReadModelStore;

use super::cursors::{CursorAdvance, StreamCursors};
use super::{PRODUCT_AGGREGATE, ProjectionError};

/// Queryable catalog + stock read model, one row per product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductStockReadModel {
    pub product_id: ProductId,
    pub name: String,
    pub price_cents: u64,
    pub stock: i64,
    pub min_stock: u32,
    pub active: bool,
}

impl ProductStockReadModel {
    pub fn needs_restock(&self) -> bool {
        self.stock <= i64::from(self.min_stock)
    }

    pub fn stock_status(&self) -> StockStatus {
        if self.stock == 0 {
            StockStatus::OutOfStock
        } else if self.needs_restock() {
            StockStatus::LowStock
        } else {
            StockStatus::Available
        }
    }
}

/// Current stock / catalog projection.
///
/// Consumes published envelopes (JSON payloads) and maintains a per-product
/// read model. Disposable and rebuildable from the event stream.
#[derive(Debug)]
pub struct ProductStockProjection<S>
where
    S: ReadModelStore<ProductId, ProductStockReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ProductStockProjection<S>
where
    S: ReadModelStore<ProductId, ProductStockReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, product_id: &ProductId) -> Option<ProductStockReadModel> {
        self.store.get(product_id)
    }

    /// All products currently known to the read model.
    pub fn list(&self) -> Vec<ProductStockReadModel> {
        self.store.list()
    }

    /// Products at or below their reorder threshold.
    pub fn restock_report(&self) -> Vec<ProductStockReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|rm| rm.active && rm.needs_restock())
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
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

        match event {
            ProductEvent::ProductCreated(e) => {
                self.store.upsert(
                    e.product_id,
                    ProductStockReadModel {
                        product_id: e.product_id,
                        name: e.name,
                        price_cents: e.price_cents,
                        stock: 0,
                        min_stock: e.min_stock,
                        active: true,
                    },
                );
            }
            ProductEvent::ProductUpdated(e) => {
                if let Some(mut rm) = self.store.get(&e.product_id) {
                    rm.name = e.name;
                    rm.price_cents = e.price_cents;
                    rm.min_stock = e.min_stock;
                    self.store.upsert(e.product_id, rm);
                }
            }
            ProductEvent::ProductDeactivated(e) => {
                if let Some(mut rm) = self.store.get(&e.product_id) {
                    rm.active = false;
                    self.store.upsert(e.product_id, rm);
                }
            }
            ProductEvent::StockMovementRecorded(e) => {
                if let Some(mut rm) = self.store.get(&e.product_id) {
                    rm.stock = e.stock_after;
                    self.store.upsert(e.product_id, rm);
                }
            }
            // Stock impact arrives via the paired movement.
            ProductEvent::SaleRecorded(_) => {}
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
