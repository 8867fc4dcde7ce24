//! Projection implementations (read model builders).
//!
//! Projections consume published envelopes and build query-optimized read
//! models. All projections are:
//! - **Rebuildable**: can be reconstructed from the event stream
//! - **Idempotent**: safe for at-least-once delivery (per-stream cursors)
//! - **Disposable**: the event store remains the source of truth

pub mod admissions;
pub mod cursors;
pub mod movements;
pub mod product_stock;
pub mod sales_log;

pub use admissions::{AdmissionRosterProjection, RosterCounts, RosterEntry};
pub use cursors::{CursorError, StreamCursors};
pub use movements::{MovementEntry, MovementLogProjection};
pub use product_stock::{ProductStockProjection, ProductStockReadModel};
pub use sales_log::{SaleEntry, SalesLogProjection};

use thiserror::Error;

/// Error applying a published envelope to a projection.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Cursor(#[from] CursorError),
}

/// Aggregate type tag used for attendee streams.
pub const ATTENDEE_AGGREGATE: &str = "attendee";
/// Aggregate type tag used for product streams.
pub const PRODUCT_AGGREGATE: &str = "product";
