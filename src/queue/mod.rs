//! Serialized mint request queue.
//!
//! Every mint attempt passes through a [`MintQueue`]. Requests are serviced
//! strictly first-in first-out, one at a time, with a fixed pause between
//! consecutive executions. Each caller receives a [`MintTicket`] that resolves
//! with its own outcome; one request failing never affects another.
//!
//! The drain loop is a tokio task that exists only while there is work. It
//! suspends while the executor runs and while it waits out the inter-request
//! delay. Queue state sits behind a mutex that is never held across an await.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::task::JoinError;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::QueueConfig;

mod ticket;

use ticket::MintRequest;
pub use ticket::MintTicket;

/// The capability the queue serializes access to.
///
/// Implementations perform the actual chain transaction. The queue forwards
/// the receipt and error verbatim and never inspects them. An implementation
/// that never settles stalls the whole queue.
pub trait MintExecutor: Send + Sync + 'static {
    type Receipt: Send + 'static;
    type Error: fmt::Display + Send + 'static;

    fn mint(
        &self,
        address: &str,
        quantity: u32,
    ) -> impl Future<Output = Result<Self::Receipt, Self::Error>> + Send;
}

/// Adapts an async closure into a [`MintExecutor`].
#[cfg(test)]
pub fn mint_fn<F>(f: F) -> MintFn<F> {
    MintFn { f }
}

#[cfg(test)]
#[derive(Clone)]
pub struct MintFn<F> {
    f: F,
}

#[cfg(test)]
impl<F, Fut, R, E> MintExecutor for MintFn<F>
where
    F: Fn(String, u32) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    type Receipt = R;
    type Error = E;

    fn mint(&self, address: &str, quantity: u32) -> impl Future<Output = Result<R, E>> + Send {
        (self.f)(address.to_string(), quantity)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError<E> {
    #[error("mint queue is full ({capacity} pending requests); please try again later")]
    QueueFull { capacity: usize },
    #[error("mint failed: {0}")]
    Mint(E),
    #[error("mint executor panicked while processing request {id}")]
    ExecutorPanicked { id: Uuid },
    #[error("mint request {id} was abandoned before it could be processed")]
    Abandoned { id: Uuid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    /// Requests accepted but not yet dispatched.
    pub queue_length: usize,
    /// Whether the drain loop is active.
    pub processing: bool,
    /// 1-based place a new request would take in line.
    pub next_position: usize,
}

pub struct MintQueue<M: MintExecutor> {
    shared: Arc<Shared<M>>,
}

impl<M: MintExecutor> Clone for MintQueue<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<M: MintExecutor> {
    executor: Arc<M>,
    config: QueueConfig,
    state: Mutex<QueueState<M::Receipt, M::Error>>,
}

struct QueueState<R, E> {
    pending: VecDeque<MintRequest<R, E>>,
    processing: bool,
}

type Outcome<M> = Result<<M as MintExecutor>::Receipt, QueueError<<M as MintExecutor>::Error>>;

impl<M: MintExecutor> MintQueue<M> {
    pub fn new(executor: M, config: QueueConfig) -> Self {
        assert!(config.max_queue_size > 0, "Queue capacity must be positive");
        Self {
            shared: Arc::new(Shared {
                executor: Arc::new(executor),
                config,
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    processing: false,
                }),
            }),
        }
    }

    /// Accepts a mint request or rejects it immediately when the queue is full.
    ///
    /// Starts the drain loop when it is idle, in which case the request is
    /// dispatched before this call returns and never counts as pending.
    /// Must be called from within a tokio runtime.
    pub fn enqueue(
        &self,
        address: impl Into<String>,
        quantity: u32,
    ) -> Result<MintTicket<M::Receipt, M::Error>, QueueError<M::Error>> {
        let capacity = self.shared.config.max_queue_size;
        let (request, receiver) = MintRequest::new(address.into(), quantity);
        let id = request.id;
        let enqueued_at = request.enqueued_at;

        let (position, first) = {
            let mut state = self.shared.lock_state();
            if state.pending.len() >= capacity {
                warn!(
                    "Rejected mint request for {} ({} NFTs): queue full at {capacity}",
                    request.address, request.quantity
                );
                return Err(QueueError::QueueFull { capacity });
            }
            if state.processing {
                info!(
                    "Added mint request {id} for {} to queue. Position: {}",
                    request.address,
                    state.pending.len() + 1
                );
                state.pending.push_back(request);
                (state.pending.len(), None)
            } else {
                state.processing = true;
                (0, Some(request))
            }
        };

        if let Some(request) = first {
            info!("Starting mint queue processing");
            tokio::spawn(Arc::clone(&self.shared).drain(request));
        }

        Ok(MintTicket::new(id, position, enqueued_at, receiver))
    }

    /// Enqueues and waits for the outcome.
    #[cfg(test)]
    pub async fn mint(
        &self,
        address: impl Into<String>,
        quantity: u32,
    ) -> Result<M::Receipt, QueueError<M::Error>> {
        self.enqueue(address, quantity)?.await
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.shared.lock_state();
        let queue_length = state.pending.len();
        QueueStatus {
            queue_length,
            processing: state.processing,
            next_position: queue_length + 1,
        }
    }
}

impl<M: MintExecutor> Shared<M> {
    fn lock_state(&self) -> MutexGuard<'_, QueueState<M::Receipt, M::Error>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn drain(self: Arc<Self>, first: MintRequest<M::Receipt, M::Error>) {
        let delay = self.config.delay_between_mints();
        let mut current = first;

        loop {
            let outcome = self.execute(&current).await;

            // Settle queue bookkeeping before the caller can observe its result.
            let more_pending = {
                let mut state = self.lock_state();
                if state.pending.is_empty() {
                    state.processing = false;
                    false
                } else {
                    true
                }
            };

            let id = current.id;
            if !current.complete(outcome) {
                debug!("Caller for mint request {id} stopped waiting; result discarded");
            }

            if !more_pending {
                info!("Mint queue processing completed");
                return;
            }

            debug!("Waiting {}ms before next mint", delay.as_millis());
            sleep(delay).await;

            let next = {
                let mut state = self.lock_state();
                let next = state.pending.pop_front();
                if next.is_none() {
                    state.processing = false;
                }
                next
            };
            match next {
                Some(request) => current = request,
                None => {
                    error!("Mint queue emptied while the drain loop owned it");
                    return;
                }
            }
        }
    }

    async fn execute(&self, request: &MintRequest<M::Receipt, M::Error>) -> Outcome<M> {
        let id = request.id;
        let address = request.address.clone();
        let quantity = request.quantity;
        let waited = chrono::Utc::now() - request.enqueued_at;
        info!(
            "Processing mint {id} for {address} ({quantity} NFTs) after {}ms in queue",
            waited.num_milliseconds()
        );

        let executor = Arc::clone(&self.executor);
        let task_address = address.clone();
        let joined =
            tokio::spawn(async move { executor.mint(&task_address, quantity).await }).await;
        settle(id, &address, joined)
    }
}

fn settle<R, E: fmt::Display>(
    id: Uuid,
    address: &str,
    joined: Result<Result<R, E>, JoinError>,
) -> Result<R, QueueError<E>> {
    match joined {
        Ok(Ok(receipt)) => {
            info!("Mint completed for {address}");
            Ok(receipt)
        }
        Ok(Err(err)) => {
            warn!("Mint failed for {address}: {err}");
            Err(QueueError::Mint(err))
        }
        Err(join_err) if join_err.is_panic() => {
            error!("Mint executor for {address} panicked: {join_err}");
            Err(QueueError::ExecutorPanicked { id })
        }
        Err(join_err) => {
            warn!("Mint task for {address} was cancelled: {join_err}");
            Err(QueueError::Abandoned { id })
        }
    }
}
