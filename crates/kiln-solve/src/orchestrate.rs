use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::{Session, SolveEngine};
use crate::error::{Error, Result};
use crate::group::TaskGroup;
use crate::preflight::RuntimeReady;
use crate::progress::{SolveStatus, relay};
use crate::request::BuildRequest;

const DEFAULT_EVENT_BUFFER: usize = 64;

/// Lifecycle of one orchestrated solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveState {
    Idle,
    SessionStarting,
    Solving,
    Succeeded,
    Failed,
    Cancelled,
}

impl SolveState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for SolveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::SessionStarting => "session-starting",
            Self::Solving => "solving",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Runs session, solve and progress relay as one fail-fast group.
pub struct Orchestrator<E> {
    engine: Arc<E>,
    state: watch::Sender<SolveState>,
    event_buffer: usize,
}

impl<E: SolveEngine> Orchestrator<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
            state: watch::Sender::new(SolveState::Idle),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Capacity of the channel between the solve and relay tasks.
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<SolveState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SolveState {
        *self.state.borrow()
    }

    /// Solve `request`, streaming translated status batches to `renderer`.
    ///
    /// `renderer` is closed when the status stream ends. Cancelling `cancel`
    /// tears every task down and yields [`Error::Cancelled`].
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        request: &BuildRequest,
        renderer: mpsc::Sender<SolveStatus>,
        _ready: &RuntimeReady,
    ) -> Result<()> {
        let result = self.orchestrate(cancel, request, renderer).await;
        let state = match &result {
            Ok(()) => SolveState::Succeeded,
            Err(Error::Cancelled) => SolveState::Cancelled,
            Err(err) => {
                warn!(error = %err, "solve failed");
                SolveState::Failed
            }
        };
        self.transition(state);
        result
    }

    async fn orchestrate(
        &self,
        cancel: &CancellationToken,
        request: &BuildRequest,
        renderer: mpsc::Sender<SolveStatus>,
    ) -> Result<()> {
        self.transition(SolveState::SessionStarting);
        let session = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            session = self.engine.session() => session?,
        };

        let solve_request = request.solve_request(session.id());
        info!(
            solve = %solve_request.id,
            session = session.id(),
            tag = %request.primary_tag(),
            "starting solve"
        );

        let (events_tx, events_rx) = mpsc::channel(self.event_buffer);
        let mut group = TaskGroup::new(cancel);
        let close_session = group.token().child_token();

        let shutdown = close_session.clone();
        group.spawn("session", async move {
            session.run(shutdown.clone()).await?;
            if shutdown.is_cancelled() {
                Ok(())
            } else {
                Err(Error::Session("session closed before the solve finished".into()))
            }
        });

        let engine = Arc::clone(&self.engine);
        group.spawn("solve", async move {
            let result = engine.solve(solve_request, events_tx).await;
            close_session.cancel();
            result
        });

        group.spawn("relay", relay(events_rx, renderer));
        self.transition(SolveState::Solving);

        group.wait().await
    }

    fn transition(&self, state: SolveState) {
        self.state.send_replace(state);
        info!(%state, "solve state changed");
    }
}
