use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;

use super::response;
use super::PurchaseUpdate;

struct Waiting {
    id: u64,
    product_id: String,
    sender: oneshot::Sender<PurchaseUpdate>,
}

/// A registered purchase flow. `id` releases exactly this registration.
pub(crate) struct Ticket {
    pub id: u64,
    pub receiver: oneshot::Receiver<PurchaseUpdate>,
}

/// What happened to an update handed to [`PurchaseListeners::dispatch`].
#[derive(Debug)]
pub(crate) enum Dispatch {
    /// The waiting purchase for `product_id` received it.
    Delivered { product_id: String },
    /// Nobody was waiting for it.
    Unclaimed(PurchaseUpdate),
}

/// One-shot completion handler for the purchase flow currently in flight.
#[derive(Default)]
pub(crate) struct PurchaseListeners {
    waiting: Mutex<Option<Waiting>>,
    next_id: AtomicU64,
}

impl PurchaseListeners {
    /// Register a handler for the next update about `product_id`. Fails while
    /// another purchase is still waiting for its outcome.
    pub fn register(&self, product_id: &str) -> crate::Result<Ticket> {
        let mut waiting = self.waiting.lock().unwrap_or_else(PoisonError::into_inner);
        // Callers that gave up on their purchase leave a closed sender behind.
        if waiting.as_ref().is_some_and(|w| !w.sender.is_closed()) {
            return Err(crate::Error::PurchaseInProgress);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = oneshot::channel();
        *waiting = Some(Waiting {
            id,
            product_id: product_id.to_string(),
            sender,
        });
        Ok(Ticket { id, receiver })
    }

    /// Resolve the waiting handler with `update` if it answers that purchase.
    /// Updates about other products leave the handler registered.
    pub fn dispatch(&self, update: PurchaseUpdate) -> Dispatch {
        let mut waiting = self.waiting.lock().unwrap_or_else(PoisonError::into_inner);
        let claims = waiting.as_ref().is_some_and(|w| {
            !w.sender.is_closed() && response::concerns(&update, &w.product_id)
        });
        if !claims {
            return Dispatch::Unclaimed(update);
        }

        let Some(Waiting {
            product_id, sender, ..
        }) = waiting.take()
        else {
            return Dispatch::Unclaimed(update);
        };
        match sender.send(update) {
            Ok(()) => Dispatch::Delivered { product_id },
            Err(update) => Dispatch::Unclaimed(update),
        }
    }

    /// Drop the handler registered under `id`, if it is still the current one.
    pub fn release(&self, id: u64) {
        let mut waiting = self.waiting.lock().unwrap_or_else(PoisonError::into_inner);
        if waiting.as_ref().is_some_and(|w| w.id == id) {
            *waiting = None;
        }
    }

    /// Drop any handler; its receiver observes a closed channel.
    pub fn clear(&self) {
        *self.waiting.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|w| !w.sender.is_closed())
    }
}
