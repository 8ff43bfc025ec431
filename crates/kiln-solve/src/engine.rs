//! Contracts for the external build engine.

use std::future::Future;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::progress::StatusResponse;
use crate::request::SolveRequest;

/// The control channel a solve runs under.
pub trait Session: Send + 'static {
    fn id(&self) -> &str;

    /// Keep the channel open until `shutdown` fires, then close it.
    ///
    /// Returning early, with or without an error, means the channel was lost.
    fn run(self, shutdown: CancellationToken) -> impl Future<Output = Result<()>> + Send;
}

/// A build engine able to open sessions and execute solves.
pub trait SolveEngine: Send + Sync + 'static {
    type Session: Session;

    fn session(&self) -> impl Future<Output = Result<Self::Session>> + Send;

    /// Execute `request`, pushing status batches into `events` in the order
    /// they are produced. Resolves once the engine reports completion.
    fn solve(
        &self,
        request: SolveRequest,
        events: mpsc::Sender<StatusResponse>,
    ) -> impl Future<Output = Result<()>> + Send;
}
