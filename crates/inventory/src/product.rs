use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use turnstile_attendees::AttendeeId;
use turnstile_core::{Aggregate, AggregateId, AggregateRoot, DomainError, StaffId, StreamId};
use turnstile_events::Event;

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn stream_id(&self) -> StreamId {
        StreamId::new("product", self.0)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Sale identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleId(pub AggregateId);

impl SaleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SaleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Stock movement kind.
///
/// `Sale` movements are only ever emitted alongside a `SaleRecorded` event;
/// `RecordMovement` rejects them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Restock: adds `quantity` to stock.
    Entry,
    /// Manual removal (breakage, spoilage): subtracts `quantity`.
    Exit,
    /// Inventory count correction: sets stock to `quantity` absolutely.
    Adjustment,
    /// Point-of-sale exit: subtracts `quantity`, paired with a sale record.
    Sale,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Entry => "entry",
            MovementKind::Exit => "exit",
            MovementKind::Adjustment => "adjustment",
            MovementKind::Sale => "sale",
        }
    }
}

/// Derived availability bucket, for restock dashboards.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Available,
    LowStock,
    OutOfStock,
}

/// Aggregate root: Product.
///
/// Catalog fields plus a stock level that is purely a fold over the movement
/// events in the stream. Nothing else writes to `stock`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    name: String,
    price_cents: u64,
    stock: i64,
    min_stock: u32,
    active: bool,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            name: String::new(),
            price_cents: 0,
            stock: 0,
            min_stock: 0,
            active: false,
            version: 0,
            created: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price_cents(&self) -> u64 {
        self.price_cents
    }

    /// Current stock, derived from the movement ledger.
    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn min_stock(&self) -> u32 {
        self.min_stock
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

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

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct. A non-zero `initial_stock` emits an entry movement
/// in the same append, so even the opening stock is ledgered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub name: String,
    pub price_cents: u64,
    pub min_stock: u32,
    pub initial_stock: u32,
    pub staff_id: StaffId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateProduct. Catalog fields only; stock is out of reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub product_id: ProductId,
    pub name: String,
    pub price_cents: u64,
    pub min_stock: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeactivateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordMovement (entry / exit / adjustment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub product_id: ProductId,
    pub kind: MovementKind,
    /// Delta for entry/exit; the absolute new level for adjustment.
    pub quantity: u32,
    pub note: String,
    pub staff_id: StaffId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SellProduct (issued by the sales processor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellProduct {
    pub product_id: ProductId,
    pub sale_id: SaleId,
    pub quantity: u32,
    pub attendee_id: Option<AttendeeId>,
    pub paid_with_credits: bool,
    pub staff_id: StaffId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateProduct(UpdateProduct),
    DeactivateProduct(DeactivateProduct),
    RecordMovement(RecordMovement),
    SellProduct(SellProduct),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub name: String,
    pub price_cents: u64,
    pub min_stock: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdated {
    pub product_id: ProductId,
    pub name: String,
    pub price_cents: u64,
    pub min_stock: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeactivated {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockMovementRecorded. The ledger entry.
///
/// `stock_before`/`stock_after` are captured at decision time; for the same
/// product, movement N+1's `stock_before` equals movement N's `stock_after`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovementRecorded {
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: u32,
    pub stock_before: i64,
    pub stock_after: i64,
    pub note: String,
    pub staff_id: StaffId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleRecorded. Always appended together with its `Sale` movement,
/// one-to-one, so the pairing is atomic by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecorded {
    pub sale_id: SaleId,
    pub product_id: ProductId,
    pub attendee_id: Option<AttendeeId>,
    pub quantity: u32,
    /// Unit price snapshotted from the product at decision time.
    pub unit_price_cents: u64,
    pub total_cents: u64,
    pub paid_with_credits: bool,
    pub staff_id: StaffId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductUpdated(ProductUpdated),
    ProductDeactivated(ProductDeactivated),
    StockMovementRecorded(StockMovementRecorded),
    SaleRecorded(SaleRecorded),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "product.created",
            ProductEvent::ProductUpdated(_) => "product.updated",
            ProductEvent::ProductDeactivated(_) => "product.deactivated",
            ProductEvent::StockMovementRecorded(_) => "product.stock_movement_recorded",
            ProductEvent::SaleRecorded(_) => "product.sale_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductUpdated(e) => e.occurred_at,
            ProductEvent::ProductDeactivated(e) => e.occurred_at,
            ProductEvent::StockMovementRecorded(e) => e.occurred_at,
            ProductEvent::SaleRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.name = e.name.clone();
                self.price_cents = e.price_cents;
                self.min_stock = e.min_stock;
                self.stock = 0;
                self.active = true;
                self.created = true;
            }
            ProductEvent::ProductUpdated(e) => {
                self.name = e.name.clone();
                self.price_cents = e.price_cents;
                self.min_stock = e.min_stock;
            }
            ProductEvent::ProductDeactivated(_) => {
                self.active = false;
            }
            ProductEvent::StockMovementRecorded(e) => {
                self.stock = e.stock_after;
            }
            // Stock impact of a sale lives in its paired movement.
            ProductEvent::SaleRecorded(_) => {}
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateProduct(cmd) => self.handle_update(cmd),
            ProductCommand::DeactivateProduct(cmd) => self.handle_deactivate(cmd),
            ProductCommand::RecordMovement(cmd) => self.handle_movement(cmd),
            ProductCommand::SellProduct(cmd) => self.handle_sell(cmd),
        }
    }
}

impl Product {
    fn ensure_live(&self) -> Result<(), DomainError> {
        // Deactivated products are invisible to the ledger and the POS.
        if !self.created || !self.active {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    /// Compute the ledger transition for a movement, without mutating.
    fn movement_transition(&self, kind: MovementKind, quantity: u32) -> Result<i64, DomainError> {
        let qty = i64::from(quantity);
        match kind {
            MovementKind::Entry => {
                if quantity == 0 {
                    return Err(DomainError::invalid_input("quantity must be positive"));
                }
                Ok(self.stock + qty)
            }
            MovementKind::Exit | MovementKind::Sale => {
                if quantity == 0 {
                    return Err(DomainError::invalid_input("quantity must be positive"));
                }
                if self.stock < qty {
                    return Err(DomainError::InsufficientStock {
                        available: self.stock,
                    });
                }
                Ok(self.stock - qty)
            }
            // Absolute correction; zero is a valid count.
            MovementKind::Adjustment => Ok(qty),
        }
    }

    fn movement_event(
        &self,
        kind: MovementKind,
        quantity: u32,
        note: String,
        staff_id: StaffId,
        occurred_at: DateTime<Utc>,
    ) -> Result<StockMovementRecorded, DomainError> {
        let stock_after = self.movement_transition(kind, quantity)?;
        Ok(StockMovementRecorded {
            product_id: self.id,
            kind,
            quantity,
            stock_before: self.stock,
            stock_after,
            note,
            staff_id,
            occurred_at,
        })
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::invalid_input("name cannot be empty"));
        }

        let mut events = vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            name: cmd.name.clone(),
            price_cents: cmd.price_cents,
            min_stock: cmd.min_stock,
            occurred_at: cmd.occurred_at,
        })];

        if cmd.initial_stock > 0 {
            // The opening stock is ledgered like any other entry. Decided
            // against the not-yet-applied ProductCreated, where stock is 0.
            events.push(ProductEvent::StockMovementRecorded(StockMovementRecorded {
                product_id: cmd.product_id,
                kind: MovementKind::Entry,
                quantity: cmd.initial_stock,
                stock_before: 0,
                stock_after: i64::from(cmd.initial_stock),
                note: "initial stock".to_string(),
                staff_id: cmd.staff_id,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_update(&self, cmd: &UpdateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live()?;
        if cmd.name.trim().is_empty() {
            return Err(DomainError::invalid_input("name cannot be empty"));
        }

        Ok(vec![ProductEvent::ProductUpdated(ProductUpdated {
            product_id: cmd.product_id,
            name: cmd.name.clone(),
            price_cents: cmd.price_cents,
            min_stock: cmd.min_stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &DeactivateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live()?;

        Ok(vec![ProductEvent::ProductDeactivated(ProductDeactivated {
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_movement(&self, cmd: &RecordMovement) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live()?;
        if cmd.kind == MovementKind::Sale {
            return Err(DomainError::invalid_input(
                "sale movements are recorded through the sales processor",
            ));
        }

        let event = self.movement_event(
            cmd.kind,
            cmd.quantity,
            cmd.note.clone(),
            cmd.staff_id,
            cmd.occurred_at,
        )?;
        Ok(vec![ProductEvent::StockMovementRecorded(event)])
    }

    fn handle_sell(&self, cmd: &SellProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_live()?;

        let movement = self.movement_event(
            MovementKind::Sale,
            cmd.quantity,
            format!("sale {}", cmd.sale_id),
            cmd.staff_id,
            cmd.occurred_at,
        )?;

        let total_cents = self.price_cents * u64::from(cmd.quantity);
        let sale = SaleRecorded {
            sale_id: cmd.sale_id,
            product_id: cmd.product_id,
            attendee_id: cmd.attendee_id.clone(),
            quantity: cmd.quantity,
            unit_price_cents: self.price_cents,
            total_cents,
            paid_with_credits: cmd.paid_with_credits,
            staff_id: cmd.staff_id,
            occurred_at: cmd.occurred_at,
        };

        // One append, two events: the pairing can never be observed apart.
        Ok(vec![
            ProductEvent::StockMovementRecorded(movement),
            ProductEvent::SaleRecorded(sale),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_staff_id() -> StaffId {
        StaffId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn create_cmd(product_id: ProductId, initial_stock: u32) -> CreateProduct {
        CreateProduct {
            product_id,
            name: "Cerveza artesanal".to_string(),
            price_cents: 8_000_00,
            min_stock: 10,
            initial_stock,
            staff_id: test_staff_id(),
            occurred_at: test_time(),
        }
    }

    fn created(initial_stock: u32) -> Product {
        let id = test_product_id();
        let mut product = Product::empty(id);
        let events = product
            .handle(&ProductCommand::CreateProduct(create_cmd(id, initial_stock)))
            .unwrap();
        for event in &events {
            product.apply(event);
        }
        product
    }

    fn movement_cmd(product: &Product, kind: MovementKind, quantity: u32) -> RecordMovement {
        RecordMovement {
            product_id: *product.id(),
            kind,
            quantity,
            note: String::new(),
            staff_id: test_staff_id(),
            occurred_at: test_time(),
        }
    }

    #[test]
    fn create_with_initial_stock_ledgers_an_entry() {
        let id = test_product_id();
        let product = Product::empty(id);
        let events = product
            .handle(&ProductCommand::CreateProduct(create_cmd(id, 50)))
            .unwrap();

        assert_eq!(events.len(), 2);
        match &events[1] {
            ProductEvent::StockMovementRecorded(m) => {
                assert_eq!(m.kind, MovementKind::Entry);
                assert_eq!(m.quantity, 50);
                assert_eq!(m.stock_before, 0);
                assert_eq!(m.stock_after, 50);
            }
            other => panic!("Expected entry movement, got {other:?}"),
        }
    }

    #[test]
    fn create_without_initial_stock_emits_only_created() {
        let id = test_product_id();
        let product = Product::empty(id);
        let events = product
            .handle(&ProductCommand::CreateProduct(create_cmd(id, 0)))
            .unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ProductEvent::ProductCreated(_)));
    }

    #[test]
    fn entry_and_exit_update_stock_through_the_ledger() {
        let mut product = created(50);

        let events = product
            .handle(&ProductCommand::RecordMovement(movement_cmd(
                &product,
                MovementKind::Exit,
                20,
            )))
            .unwrap();
        product.apply(&events[0]);
        assert_eq!(product.stock(), 30);

        let events = product
            .handle(&ProductCommand::RecordMovement(movement_cmd(
                &product,
                MovementKind::Entry,
                5,
            )))
            .unwrap();
        product.apply(&events[0]);
        assert_eq!(product.stock(), 35);
    }

    #[test]
    fn exit_below_stock_fails_and_appends_nothing() {
        let product = created(3);
        let err = product
            .handle(&ProductCommand::RecordMovement(movement_cmd(
                &product,
                MovementKind::Exit,
                4,
            )))
            .unwrap_err();
        assert_eq!(err, DomainError::InsufficientStock { available: 3 });
        assert_eq!(product.stock(), 3);
    }

    #[test]
    fn adjustment_sets_stock_absolutely_including_zero() {
        let mut product = created(50);

        let events = product
            .handle(&ProductCommand::RecordMovement(movement_cmd(
                &product,
                MovementKind::Adjustment,
                12,
            )))
            .unwrap();
        product.apply(&events[0]);
        assert_eq!(product.stock(), 12);

        let events = product
            .handle(&ProductCommand::RecordMovement(movement_cmd(
                &product,
                MovementKind::Adjustment,
                0,
            )))
            .unwrap();
        product.apply(&events[0]);
        assert_eq!(product.stock(), 0);
        assert_eq!(product.stock_status(), StockStatus::OutOfStock);
    }

    #[test]
    fn zero_quantity_entry_or_exit_is_invalid() {
        let product = created(5);
        for kind in [MovementKind::Entry, MovementKind::Exit] {
            let err = product
                .handle(&ProductCommand::RecordMovement(movement_cmd(
                    &product, kind, 0,
                )))
                .unwrap_err();
            assert!(matches!(err, DomainError::InvalidInput(_)));
        }
    }

    #[test]
    fn sale_movements_cannot_be_recorded_directly() {
        let product = created(5);
        let err = product
            .handle(&ProductCommand::RecordMovement(movement_cmd(
                &product,
                MovementKind::Sale,
                1,
            )))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }

    #[test]
    fn sell_pairs_sale_with_movement_in_one_decision() {
        let mut product = created(10);
        let sale_id = SaleId::new(AggregateId::new());

        let events = product
            .handle(&ProductCommand::SellProduct(SellProduct {
                product_id: *product.id(),
                sale_id,
                quantity: 3,
                attendee_id: None,
                paid_with_credits: false,
                staff_id: test_staff_id(),
                occurred_at: test_time(),
            }))
            .unwrap();

        assert_eq!(events.len(), 2);
        match (&events[0], &events[1]) {
            (ProductEvent::StockMovementRecorded(m), ProductEvent::SaleRecorded(s)) => {
                assert_eq!(m.kind, MovementKind::Sale);
                assert_eq!(m.quantity, 3);
                assert_eq!(m.stock_after, 7);
                assert_eq!(s.sale_id, sale_id);
                assert_eq!(s.unit_price_cents, product.price_cents());
                assert_eq!(s.total_cents, product.price_cents() * 3);
            }
            other => panic!("Expected movement + sale pair, got {other:?}"),
        }

        for event in &events {
            product.apply(event);
        }
        assert_eq!(product.stock(), 7);
    }

    #[test]
    fn oversell_is_rejected_with_available_stock() {
        let product = created(2);
        let err = product
            .handle(&ProductCommand::SellProduct(SellProduct {
                product_id: *product.id(),
                sale_id: SaleId::new(AggregateId::new()),
                quantity: 3,
                attendee_id: None,
                paid_with_credits: false,
                staff_id: test_staff_id(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::InsufficientStock { available: 2 });
    }

    #[test]
    fn deactivated_product_is_not_found() {
        let mut product = created(5);
        let events = product
            .handle(&ProductCommand::DeactivateProduct(DeactivateProduct {
                product_id: *product.id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        product.apply(&events[0]);

        let err = product
            .handle(&ProductCommand::RecordMovement(movement_cmd(
                &product,
                MovementKind::Entry,
                1,
            )))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn update_changes_catalog_fields_but_not_stock() {
        let mut product = created(50);
        let events = product
            .handle(&ProductCommand::UpdateProduct(UpdateProduct {
                product_id: *product.id(),
                name: "Cerveza rubia".to_string(),
                price_cents: 9_000_00,
                min_stock: 20,
                occurred_at: test_time(),
            }))
            .unwrap();
        product.apply(&events[0]);

        assert_eq!(product.name(), "Cerveza rubia");
        assert_eq!(product.price_cents(), 9_000_00);
        assert_eq!(product.min_stock(), 20);
        assert_eq!(product.stock(), 50);
    }

    #[test]
    fn stock_status_buckets() {
        let mut product = created(50);
        assert_eq!(product.stock_status(), StockStatus::Available);
        assert!(!product.needs_restock());

        let events = product
            .handle(&ProductCommand::RecordMovement(movement_cmd(
                &product,
                MovementKind::Adjustment,
                10,
            )))
            .unwrap();
        product.apply(&events[0]);
        assert_eq!(product.stock_status(), StockStatus::LowStock);
        assert!(product.needs_restock());
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let product = created(10);
        let before = product.clone();

        let cmd = ProductCommand::RecordMovement(movement_cmd(&product, MovementKind::Exit, 5));
        let events1 = product.handle(&cmd).unwrap();
        let events2 = product.handle(&cmd).unwrap();

        assert_eq!(product, before);
        assert_eq!(events1, events2);
    }

    #[derive(Debug, Clone)]
    enum Step {
        Entry(u32),
        Exit(u32),
        Adjust(u32),
    }

    fn step_strategy() -> impl Strategy<Value = Step> {
        prop_oneof![
            (1u32..100).prop_map(Step::Entry),
            (1u32..100).prop_map(Step::Exit),
            (0u32..200).prop_map(Step::Adjust),
        ]
    }

    proptest! {
        /// Replaying the emitted movements alone reconstructs the final stock,
        /// and consecutive movements chain exactly (N+1's before == N's after).
        #[test]
        fn replayed_ledger_reconciles_with_final_stock(
            initial in 0u32..100,
            steps in proptest::collection::vec(step_strategy(), 0..40),
        ) {
            let id = test_product_id();
            let mut product = Product::empty(id);
            let mut ledger: Vec<StockMovementRecorded> = Vec::new();

            let events = product
                .handle(&ProductCommand::CreateProduct(create_cmd(id, initial)))
                .unwrap();
            for event in &events {
                if let ProductEvent::StockMovementRecorded(m) = event {
                    ledger.push(m.clone());
                }
                product.apply(event);
            }

            for step in steps {
                let (kind, qty) = match step {
                    Step::Entry(q) => (MovementKind::Entry, q),
                    Step::Exit(q) => (MovementKind::Exit, q),
                    Step::Adjust(q) => (MovementKind::Adjustment, q),
                };
                match product.handle(&ProductCommand::RecordMovement(movement_cmd(
                    &product, kind, qty,
                ))) {
                    Ok(events) => {
                        for event in &events {
                            if let ProductEvent::StockMovementRecorded(m) = event {
                                ledger.push(m.clone());
                            }
                            product.apply(event);
                        }
                    }
                    // Rejected exits must leave no trace.
                    Err(DomainError::InsufficientStock { .. }) => {}
                    Err(other) => panic!("unexpected error: {other:?}"),
                }
            }

            // Chain rule across the whole ledger.
            for pair in ledger.windows(2) {
                prop_assert_eq!(pair[1].stock_before, pair[0].stock_after);
            }

            // Replay: fold the ledger from zero.
            let mut replayed = 0i64;
            for m in &ledger {
                replayed = match m.kind {
                    MovementKind::Entry => replayed + i64::from(m.quantity),
                    MovementKind::Exit | MovementKind::Sale => replayed - i64::from(m.quantity),
                    MovementKind::Adjustment => i64::from(m.quantity),
                };
            }
            prop_assert_eq!(replayed, product.stock());
            prop_assert!(product.stock() >= 0);
        }
    }
}
