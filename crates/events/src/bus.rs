//! Publish/subscribe contract.
//!
//! The bus only distributes; the event store stays the source of truth.
//! Delivery is at-least-once, so subscribers must tolerate duplicates.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use backoffice_core::TenantId;

use crate::EventEnvelope;

/// Receiving end of a bus subscription. Meant for a single consumer thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

impl<E> Subscription<EventEnvelope<E>> {
    /// Everything currently queued for `tenant_id`, without blocking.
    ///
    /// Envelopes of other tenants are consumed and discarded.
    pub fn drain_for_tenant(&self, tenant_id: TenantId) -> Vec<EventEnvelope<E>> {
        let mut out = Vec::new();
        while let Ok(envelope) = self.receiver.try_recv() {
            if envelope.tenant_id() == tenant_id {
                out.push(envelope);
            }
        }
        out
    }
}

pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
