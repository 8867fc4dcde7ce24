//! In-memory fan-out bus.
//!
//! Carries committed envelopes from the dispatcher to the projections
//! (stock, movement ledger, sales log, roster) within one process. Events
//! are already durable in the store before they reach the bus, so losing a
//! subscriber loses nothing: the read models rebuild from the streams.

use std::sync::{Mutex, mpsc};

use thiserror::Error;

use crate::bus::{EventBus, Subscription};

#[derive(Debug, Error)]
pub enum InMemoryBusError {
    /// The subscriber registry lock was poisoned by a panicking publisher.
    #[error("bus subscriber registry poisoned")]
    Poisoned,
}

/// Process-local pub/sub over std mpsc channels.
///
/// Every subscriber gets its own channel and a copy of every envelope
/// published after it subscribed. Subscribers that hang up are dropped on
/// the next publish.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| InMemoryBusError::Poisoned)?;

        // Disconnected receivers are pruned while publishing.
        subs.retain(|tx| tx.send(message.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // A poisoned registry still hands out a (silent) subscription; the
        // caller recovers by rebuilding its read models from the store.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}
