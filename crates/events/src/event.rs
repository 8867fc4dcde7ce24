use chrono::{DateTime, Utc};

/// A recorded fact: an admission, a stock movement, a sale.
///
/// Events are immutable once appended and carry a schema version so old
/// payloads stay readable after the type evolves. `occurred_at` is business
/// time (when the badge was scanned, when the sale happened), not storage
/// time.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted type name, e.g. "attendee.admitted" or
    /// "product.stock_movement_recorded". Keyed on by consumers; never reuse
    /// a name for a different shape.
    fn event_type(&self) -> &'static str;

    /// Schema version of this event type.
    fn version(&self) -> u32;

    /// Business time of the fact.
    fn occurred_at(&self) -> DateTime<Utc>;
}
