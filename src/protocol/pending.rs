//! Single-flight request slots.
//!
//! Each request kind (lock acquisition, initial-content query) has at
//! most one in-flight instance per client. Concurrent callers share the
//! same cloneable reply future instead of issuing a second wire request,
//! and replies that arrive with nothing pending are ignored; that is how
//! late or duplicate relay replies stay harmless.

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Failure channel of a reply future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// The client was dropped while the request was still in flight.
    #[error("request abandoned before a reply arrived")]
    Abandoned,
}

/// Cloneable future for a single-flight reply. Every caller that asked
/// while the request was pending awaits the same settlement.
pub type Reply<T> = Shared<BoxFuture<'static, Result<T, RequestError>>>;

struct Pending<T: Clone> {
    tx: oneshot::Sender<Result<T, RequestError>>,
    reply: Reply<T>,
}

/// Zero-or-one pending request of one kind.
pub struct SingleFlight<T: Clone> {
    slot: Mutex<Option<Pending<T>>>,
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T: Clone + Send + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join or open the pending request. The boolean is true when this
    /// call opened a new one; only then must the caller put the request
    /// on the wire.
    pub fn request(&self) -> (Reply<T>, bool) {
        let mut slot = self.slot.lock();
        if let Some(pending) = slot.as_ref() {
            return (pending.reply.clone(), false);
        }
        let (tx, rx) = oneshot::channel();
        let reply: Reply<T> = rx
            .map(|recv| recv.unwrap_or(Err(RequestError::Abandoned)))
            .boxed()
            .shared();
        *slot = Some(Pending {
            tx,
            reply: reply.clone(),
        });
        (reply, true)
    }

    /// Settle the pending request with `value`. The slot is cleared
    /// *before* the future resolves, so a resolve handler that issues a
    /// fresh request of the same kind opens a new one instead of being
    /// mistaken for the just-completed request.
    ///
    /// Returns false when nothing was pending (stale reply, ignore it).
    pub fn settle(&self, value: T) -> bool {
        let pending = self.slot.lock().take();
        match pending {
            Some(p) => {
                // Receiver may already be gone; the slot is cleared either way.
                let _ = p.tx.send(Ok(value));
                true
            }
            None => false,
        }
    }

    /// Whether a request of this kind is currently awaiting its reply.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}

// ── Tests ───────────────────────────────────────────────────────
