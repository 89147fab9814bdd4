use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use uuid::Uuid;

use super::QueueError;

pub(crate) type Completion<R, E> = oneshot::Sender<Result<R, QueueError<E>>>;

/// One caller's intent to mint, held by the queue until it is serviced.
pub(crate) struct MintRequest<R, E> {
    pub id: Uuid,
    pub address: String,
    pub quantity: u32,
    pub enqueued_at: DateTime<Utc>,
    pub completion: Completion<R, E>,
}

impl<R, E> MintRequest<R, E> {
    pub fn new(
        address: String,
        quantity: u32,
    ) -> (Self, oneshot::Receiver<Result<R, QueueError<E>>>) {
        let (completion, receiver) = oneshot::channel();
        let request = Self {
            id: Uuid::new_v4(),
            address,
            quantity,
            enqueued_at: Utc::now(),
            completion,
        };
        (request, receiver)
    }

    /// Delivers the outcome to the waiting caller. Returns `false` when the
    /// caller already dropped its ticket.
    pub fn complete(self, outcome: Result<R, QueueError<E>>) -> bool {
        self.completion.send(outcome).is_ok()
    }
}

/// Handle to an accepted mint request.
///
/// Resolves once the queue has serviced the request. Dropping the ticket does
/// not withdraw the request; the queue still runs it and discards the result.
#[must_use = "a ticket does nothing unless awaited; the mint still runs"]
pub struct MintTicket<R, E> {
    id: Uuid,
    position: usize,
    enqueued_at: DateTime<Utc>,
    receiver: oneshot::Receiver<Result<R, QueueError<E>>>,
}

impl<R, E> MintTicket<R, E> {
    pub(crate) fn new(
        id: Uuid,
        position: usize,
        enqueued_at: DateTime<Utc>,
        receiver: oneshot::Receiver<Result<R, QueueError<E>>>,
    ) -> Self {
        Self {
            id,
            position,
            enqueued_at,
            receiver,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Pending requests ahead of this one plus one, at enqueue time.
    /// Zero means the request was dispatched immediately.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }
}

impl<R, E> Future for MintTicket<R, E> {
    type Output = Result<R, QueueError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let id = self.id;
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(QueueError::Abandoned { id })),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<R, E> std::fmt::Debug for MintTicket<R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MintTicket")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("enqueued_at", &self.enqueued_at)
            .finish()
    }
}
