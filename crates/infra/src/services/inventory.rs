//! Inventory ledger service.
//!
//! Catalog maintenance plus the only write path for stock: recording
//! movements. Each product stream is serialized by its lock, so `before` is
//! read inside the locked section and the movement and the new stock commit
//! in one append.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use turnstile_core::{Aggregate, AggregateId, AggregateRoot, DomainError, StaffId};
use turnstile_events::{EventBus, EventEnvelope};
use turnstile_inventory::{
    CreateProduct, DeactivateProduct, MovementKind, Product, ProductCommand, ProductEvent,
    ProductId, RecordMovement, StockStatus, UpdateProduct,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::locks::{StreamLocks, lock};
use crate::projections::PRODUCT_AGGREGATE;
use crate::services::{ServiceError, ServiceResult, run_with_retry};

/// Read-only view of one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub product_id: ProductId,
    pub name: String,
    pub price_cents: u64,
    pub stock: i64,
    pub min_stock: u32,
    pub active: bool,
    pub status: StockStatus,
}

/// Returned by a successful movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementReceipt {
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: u32,
    pub stock_before: i64,
    pub stock_after: i64,
    pub occurred_at: DateTime<Utc>,
}

pub struct InventoryService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    locks: Arc<StreamLocks>,
}

impl<S, B> InventoryService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>, locks: Arc<StreamLocks>) -> Self {
        Self { dispatcher, locks }
    }

    /// Create a product; non-zero initial stock is ledgered as an entry
    /// movement in the same append.
    pub fn create_product(
        &self,
        name: &str,
        price_cents: u64,
        min_stock: u32,
        initial_stock: u32,
        staff_id: StaffId,
    ) -> ServiceResult<ProductSnapshot> {
        let product_id = ProductId::new(AggregateId::new());
        let command = ProductCommand::CreateProduct(CreateProduct {
            product_id,
            name: name.to_string(),
            price_cents,
            min_stock,
            initial_stock,
            staff_id,
            occurred_at: Utc::now(),
        });

        let product = self.execute(product_id, &command)?;
        tracing::info!(product_id = %product_id, name, initial_stock, "product created");
        Ok(snapshot(&product))
    }

    /// Update catalog fields. Stock is out of reach of this path.
    pub fn update_product(
        &self,
        product_id: ProductId,
        name: &str,
        price_cents: u64,
        min_stock: u32,
    ) -> ServiceResult<ProductSnapshot> {
        let command = ProductCommand::UpdateProduct(UpdateProduct {
            product_id,
            name: name.to_string(),
            price_cents,
            min_stock,
            occurred_at: Utc::now(),
        });
        let product = self.execute(product_id, &command)?;
        Ok(snapshot(&product))
    }

    /// Retire a product from the catalog and the POS.
    pub fn deactivate_product(&self, product_id: ProductId) -> ServiceResult<()> {
        let command = ProductCommand::DeactivateProduct(DeactivateProduct {
            product_id,
            occurred_at: Utc::now(),
        });

        let stream_id = product_id.stream_id();
        let handle = self.locks.handle(&stream_id);
        let _guard = lock(&handle);

        run_with_retry(|| {
            self.dispatcher.dispatch(&stream_id, PRODUCT_AGGREGATE, &command, || {
                Product::empty(product_id)
            })
        })?;
        tracing::info!(product_id = %product_id, "product deactivated");
        Ok(())
    }

    /// Record an entry, exit or adjustment. The only way stock changes
    /// outside the sales processor.
    pub fn record_movement(
        &self,
        product_id: ProductId,
        kind: MovementKind,
        quantity: u32,
        note: &str,
        staff_id: StaffId,
    ) -> ServiceResult<MovementReceipt> {
        let command = ProductCommand::RecordMovement(RecordMovement {
            product_id,
            kind,
            quantity,
            note: note.to_string(),
            staff_id,
            occurred_at: Utc::now(),
        });

        let stream_id = product_id.stream_id();
        let handle = self.locks.handle(&stream_id);
        let _guard = lock(&handle);

        let receipt = run_with_retry(|| {
            let (product, expected) = self
                .dispatcher
                .rehydrate(&stream_id, || Product::empty(product_id))?;

            let events = product.handle(&command).map_err(DispatchError::from)?;
            self.dispatcher
                .commit(&stream_id, PRODUCT_AGGREGATE, &events, expected)?;

            match events.first() {
                Some(ProductEvent::StockMovementRecorded(m)) => Ok(MovementReceipt {
                    product_id: m.product_id,
                    kind: m.kind,
                    quantity: m.quantity,
                    stock_before: m.stock_before,
                    stock_after: m.stock_after,
                    occurred_at: m.occurred_at,
                }),
                _ => Err(DispatchError::Store(
                    crate::event_store::EventStoreError::InvalidAppend(
                        "movement command decided no movement".to_string(),
                    ),
                )),
            }
        })?;

        tracing::info!(
            product_id = %product_id,
            kind = kind.as_str(),
            quantity,
            stock_after = receipt.stock_after,
            "stock movement recorded"
        );
        Ok(receipt)
    }

    /// Read-only view of a product's current state.
    pub fn product(&self, product_id: ProductId) -> ServiceResult<ProductSnapshot> {
        let stream_id = product_id.stream_id();
        let (product, _) = self
            .dispatcher
            .rehydrate(&stream_id, || Product::empty(product_id))
            .map_err(|err| match err {
                DispatchError::Domain(domain) => ServiceError::Domain(domain),
                other => ServiceError::Infrastructure(other.to_string()),
            })?;
        if !product.is_created() {
            return Err(ServiceError::Domain(DomainError::NotFound));
        }
        Ok(snapshot(&product))
    }

    fn execute(
        &self,
        product_id: ProductId,
        command: &ProductCommand,
    ) -> ServiceResult<Product> {
        let stream_id = product_id.stream_id();
        let handle = self.locks.handle(&stream_id);
        let _guard = lock(&handle);

        run_with_retry(|| {
            let (mut product, expected) = self
                .dispatcher
                .rehydrate(&stream_id, || Product::empty(product_id))?;

            let events = product.handle(command).map_err(DispatchError::from)?;
            self.dispatcher
                .commit(&stream_id, PRODUCT_AGGREGATE, &events, expected)?;

            for event in &events {
                product.apply(event);
            }
            Ok(product)
        })
    }
}

fn snapshot(product: &Product) -> ProductSnapshot {
    ProductSnapshot {
        product_id: *product.id(),
        name: product.name().to_string(),
        price_cents: product.price_cents(),
        stock: product.stock(),
        min_stock: product.min_stock(),
        active: product.is_active(),
        status: product.stock_status(),
    }
}
