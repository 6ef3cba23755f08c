//! Mutable dispatcher state, guarded by the engine's mutex

use std::collections::VecDeque;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use walletkit_domain::Credentials;

use super::classifier::DispatchError;
use super::pending::PendingRequest;

pub(crate) type RefreshWaiter = oneshot::Sender<Result<Credentials, DispatchError>>;

#[derive(Debug, Default)]
pub(crate) struct DispatchState {
    pub(crate) clock_sync_in_progress: bool,
    pub(crate) token_refresh_in_progress: bool,
    /// Requests waiting for a recovery flow, in submission order
    pub(crate) pending: VecDeque<PendingRequest>,
    /// Shared by every transport call started since the last cancel-all
    pub(crate) cancellation: CancellationToken,
    /// Explicit `refresh_token` callers joined to the running refresh
    pub(crate) refresh_waiters: Vec<RefreshWaiter>,
}

impl DispatchState {
    /// New submissions queue while either recovery flow runs
    pub(crate) fn is_recovering(&self) -> bool {
        self.clock_sync_in_progress || self.token_refresh_in_progress
    }

    pub(crate) fn take_pending(&mut self) -> VecDeque<PendingRequest> {
        std::mem::take(&mut self.pending)
    }
}
