//! Inventory domain module (event-sourced).
//!
//! The stock ledger lives here: products whose stock only ever changes by
//! appending a movement event, and point-of-sale sales that pair a sale
//! record with its stock movement in a single append.

pub mod product;

pub use product::{
    CreateProduct, DeactivateProduct, MovementKind, Product, ProductCommand, ProductCreated,
    ProductDeactivated, ProductEvent, ProductId, ProductUpdated, RecordMovement, SaleId,
    SaleRecorded, SellProduct, StockMovementRecorded, StockStatus, UpdateProduct,
};
