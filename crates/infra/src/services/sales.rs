//! Sales processor.
//!
//! One POS transaction touches up to two streams: the product (sale + stock
//! movement, one append) and optionally the attendee (credit debit). Both
//! stream locks are taken in canonical order, both aggregates decide their
//! events first, and only then is anything appended. A rejection from either
//! side therefore aborts before any ledger state exists.
//!
//! Precondition order, first failure wins:
//! positive quantity, product exists and is active, attendee exists and is
//! admitted, enough credits (credit payment only), enough stock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use turnstile_attendees::{
    Attendee, AttendeeCommand, AttendeeEvent, AttendeeId, DebitCredits,
};
use turnstile_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, StaffId, StreamId};
use turnstile_events::{EventBus, EventEnvelope};
use turnstile_inventory::{
    Product, ProductCommand, ProductEvent, ProductId, SaleId, SellProduct,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::locks::{StreamLocks, lock};
use crate::projections::{ATTENDEE_AGGREGATE, PRODUCT_AGGREGATE};
use crate::services::{ServiceError, ServiceResult, run_with_retry};

/// One POS sale request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleRequest {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Buyer, when the sale is tied to a badge. Required for credit payment.
    pub attendee_id: Option<AttendeeId>,
    pub pay_with_credits: bool,
    pub seller: StaffId,
}

/// Returned by a completed sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleReceipt {
    pub sale_id: SaleId,
    pub product_id: ProductId,
    pub attendee_id: Option<AttendeeId>,
    pub quantity: u32,
    pub unit_price_cents: u64,
    pub total_cents: u64,
    pub paid_with_credits: bool,
    pub remaining_stock: i64,
    /// Post-sale credit balance, present when credits were used.
    pub remaining_credits: Option<i64>,
    pub occurred_at: DateTime<Utc>,
}

pub struct SalesService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    locks: Arc<StreamLocks>,
}

impl<S, B> SalesService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>, locks: Arc<StreamLocks>) -> Self {
        Self { dispatcher, locks }
    }

    /// Process one sale atomically across the product and attendee ledgers.
    pub fn sell(&self, request: &SaleRequest) -> ServiceResult<SaleReceipt> {
        if request.quantity == 0 {
            return Err(ServiceError::Domain(DomainError::invalid_input(
                "quantity must be positive",
            )));
        }
        if request.pay_with_credits && request.attendee_id.is_none() {
            return Err(ServiceError::Domain(DomainError::invalid_input(
                "credit payment requires an attendee",
            )));
        }

        let sale_id = SaleId::new(AggregateId::new());
        let product_stream = request.product_id.stream_id();

        let receipt = match &request.attendee_id {
            None => {
                let handle = self.locks.handle(&product_stream);
                let _guard = lock(&handle);
                run_with_retry(|| self.attempt(request, sale_id, &product_stream, None))?
            }
            Some(attendee_id) => {
                let attendee_stream = attendee_id.stream_id();
                // Canonical acquisition order; admit and sell can race on the
                // same attendee without deadlocking.
                let (first, second) = self
                    .locks
                    .handles_ordered(&product_stream, &attendee_stream);
                let _g1 = lock(&first);
                let _g2 = lock(&second);
                run_with_retry(|| {
                    self.attempt(
                        request,
                        sale_id,
                        &product_stream,
                        Some((attendee_id, &attendee_stream)),
                    )
                })?
            }
        };

        tracing::info!(
            sale_id = %receipt.sale_id,
            product_id = %receipt.product_id,
            quantity = receipt.quantity,
            total_cents = receipt.total_cents,
            paid_with_credits = receipt.paid_with_credits,
            "sale recorded"
        );
        Ok(receipt)
    }

    /// One locked attempt: rehydrate everything, decide everything, then
    /// append (product first, attendee debit second).
    fn attempt(
        &self,
        request: &SaleRequest,
        sale_id: SaleId,
        product_stream: &StreamId,
        attendee: Option<(&AttendeeId, &StreamId)>,
    ) -> Result<SaleReceipt, DispatchError> {
        let occurred_at = Utc::now();

        let (product, product_expected) = self
            .dispatcher
            .rehydrate(product_stream, || Product::empty(request.product_id))?;
        if !product.is_created() || !product.is_active() {
            return Err(DomainError::NotFound.into());
        }

        // Attendee-side decision, before the stock check so a short balance
        // is reported ahead of a short shelf.
        let attendee_decision = match attendee {
            None => None,
            Some((attendee_id, attendee_stream)) => {
                let (attendee, expected) = self
                    .dispatcher
                    .rehydrate(attendee_stream, || Attendee::empty(attendee_id.clone()))?;
                if !attendee.is_registered() {
                    return Err(DomainError::NotFound.into());
                }
                if !attendee.is_admitted() {
                    return Err(DomainError::NotAdmitted.into());
                }

                let events = if request.pay_with_credits {
                    attendee
                        .handle(&AttendeeCommand::DebitCredits(DebitCredits {
                            attendee_id: attendee_id.clone(),
                            quantity: request.quantity,
                            staff_id: request.seller,
                            occurred_at,
                        }))
                        .map_err(DispatchError::from)?
                } else {
                    vec![]
                };
                Some((attendee_stream, events, expected))
            }
        };

        let product_events = product
            .handle(&ProductCommand::SellProduct(SellProduct {
                product_id: request.product_id,
                sale_id,
                quantity: request.quantity,
                attendee_id: request.attendee_id.clone(),
                paid_with_credits: request.pay_with_credits,
                staff_id: request.seller,
                occurred_at,
            }))
            .map_err(DispatchError::from)?;

        // All decisions passed; nothing below returns a domain rejection.
        self.dispatcher.commit(
            product_stream,
            PRODUCT_AGGREGATE,
            &product_events,
            product_expected,
        )?;

        let remaining_credits = match attendee_decision {
            Some((attendee_stream, events, expected)) if !events.is_empty() => {
                self.commit_debit(attendee_stream, &events, expected)?;
                match events.first() {
                    Some(AttendeeEvent::CreditsDebited(e)) => Some(e.remaining),
                    _ => None,
                }
            }
            _ => None,
        };

        build_receipt(sale_id, request, &product_events, remaining_credits, occurred_at)
    }

    fn commit_debit(
        &self,
        attendee_stream: &StreamId,
        events: &[AttendeeEvent],
        expected: ExpectedVersion,
    ) -> Result<(), DispatchError> {
        // Both locks are held and the version was read under them; a failure
        // here is an infrastructure fault, not a lost race.
        self.dispatcher
            .commit(attendee_stream, ATTENDEE_AGGREGATE, events, expected)?;
        Ok(())
    }
}

fn build_receipt(
    sale_id: SaleId,
    request: &SaleRequest,
    product_events: &[ProductEvent],
    remaining_credits: Option<i64>,
    occurred_at: DateTime<Utc>,
) -> Result<SaleReceipt, DispatchError> {
    let mut remaining_stock = None;
    let mut sale = None;
    for event in product_events {
        match event {
            ProductEvent::StockMovementRecorded(m) => remaining_stock = Some(m.stock_after),
            ProductEvent::SaleRecorded(s) => sale = Some(s),
            _ => {}
        }
    }

    match (remaining_stock, sale) {
        (Some(remaining_stock), Some(sale)) => Ok(SaleReceipt {
            sale_id,
            product_id: request.product_id,
            attendee_id: request.attendee_id.clone(),
            quantity: request.quantity,
            unit_price_cents: sale.unit_price_cents,
            total_cents: sale.total_cents,
            paid_with_credits: request.pay_with_credits,
            remaining_stock,
            remaining_credits,
            occurred_at,
        }),
        _ => Err(DispatchError::Store(
            crate::event_store::EventStoreError::InvalidAppend(
                "sell decision missing its movement/sale pair".to_string(),
            ),
        )),
    }
}
