//! Pending requests and their result handles

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use uuid::Uuid;
use walletkit_domain::RequestDescriptor;

use super::classifier::DispatchError;

type Outcome = Result<String, DispatchError>;

/// A submitted request and the sender half of its result handle
///
/// Settling consumes the request, so a request resolves at most once.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    id: Uuid,
    descriptor: RequestDescriptor,
    responder: oneshot::Sender<Outcome>,
}

impl PendingRequest {
    pub(crate) fn new(descriptor: RequestDescriptor) -> (Self, ResponseHandle) {
        let (responder, receiver) = oneshot::channel();
        let request = Self { id: Uuid::now_v7(), descriptor, responder };
        (request, ResponseHandle { receiver })
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    pub(crate) fn fulfill(self, body: String) {
        self.settle(Ok(body));
    }

    pub(crate) fn reject(self, error: DispatchError) {
        self.settle(Err(error));
    }

    fn settle(self, outcome: Outcome) {
        // The caller may have dropped its handle; nobody is left to notify.
        if self.responder.send(outcome).is_err() {
            tracing::trace!(request_id = %self.id, "result handle dropped before settlement");
        }
    }
}

/// Future resolving to the raw response body of a submitted request
///
/// Resolves with [`DispatchError::cancelled`] if the dispatcher is torn down
/// before the request settles.
#[derive(Debug)]
#[must_use = "the request result is only observable by awaiting the handle"]
pub struct ResponseHandle {
    receiver: oneshot::Receiver<Outcome>,
}

impl Future for ResponseHandle {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(DispatchError::cancelled())))
    }
}
