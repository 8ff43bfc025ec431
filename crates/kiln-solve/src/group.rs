use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Outcome {
    first: Mutex<Option<Error>>,
    cancelled: AtomicBool,
}

impl Outcome {
    /// Keep the first genuine failure and cancel the scope on it. Anything
    /// reported after the scope is cancelled is a consequence, not a cause.
    fn record(&self, task: &'static str, err: Error, token: &CancellationToken) {
        if err.is_cancelled() || token.is_cancelled() {
            debug!(task, error = %err, "task stopped after cancellation");
            self.cancelled.store(true, Ordering::SeqCst);
            return;
        }
        let mut first = self.first.lock().unwrap_or_else(PoisonError::into_inner);
        if first.is_some() {
            debug!(task, error = %err, "suppressing concurrent failure");
            return;
        }
        *first = Some(err);
        drop(first);
        debug!(task, "task failed, cancelling siblings");
        token.cancel();
    }
}

/// A fixed set of tasks sharing one cancellation scope.
///
/// The first task to fail cancels the scope; the others unwind and
/// [`TaskGroup::wait`] returns that first error.
#[derive(Debug)]
pub struct TaskGroup {
    token: CancellationToken,
    tasks: JoinSet<()>,
    names: HashMap<task::Id, &'static str>,
    outcome: Arc<Outcome>,
}

impl TaskGroup {
    /// A group whose scope is a child of `parent`.
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            tasks: JoinSet::new(),
            names: HashMap::new(),
            outcome: Arc::default(),
        }
    }

    /// The shared scope, for deriving narrower tokens.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Start `task`. It is dropped as soon as the scope is cancelled.
    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let token = self.token.clone();
        let outcome = Arc::clone(&self.outcome);
        let handle = self.tasks.spawn(async move {
            let result = tokio::select! {
                biased;
                result = task => result,
                _ = token.cancelled() => Err(Error::Cancelled),
            };
            match result {
                Ok(()) => debug!(task = name, "task finished"),
                Err(err) => outcome.record(name, err, &token),
            }
        });
        self.names.insert(handle.id(), name);
    }

    /// Wait for every task, returning the first failure.
    ///
    /// Tasks that only stopped because of cancellation yield
    /// [`Error::Cancelled`] when no task failed on its own.
    pub async fn wait(mut self) -> Result<()> {
        while let Some(joined) = self.tasks.join_next().await {
            let Err(err) = joined else { continue };
            let name = self.names.get(&err.id()).copied().unwrap_or("unnamed");
            if err.is_panic() {
                self.outcome
                    .record(name, Error::TaskPanicked { task: name }, &self.token);
            } else {
                self.outcome.cancelled.store(true, Ordering::SeqCst);
            }
        }

        let first = self
            .outcome
            .first
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match first {
            Some(err) => Err(err),
            None if self.outcome.cancelled.load(Ordering::SeqCst) => Err(Error::Cancelled),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn explode() -> Result<()> {
        panic!("bad state")
    }

    #[tokio::test]
    async fn all_tasks_succeed() {
        let mut group = TaskGroup::new(&CancellationToken::new());
        group.spawn("a", async { Ok(()) });
        group.spawn("b", async { Ok(()) });
        group.wait().await.unwrap();
    }

    #[tokio::test]
    async fn first_failure_cancels_siblings() {
        let mut group = TaskGroup::new(&CancellationToken::new());
        group.spawn("stuck", std::future::pending());
        group.spawn("failing", async { Err(Error::Solve("boom".into())) });

        let result = tokio::time::timeout(Duration::from_secs(5), group.wait())
            .await
            .expect("group must not hang");
        assert!(matches!(result, Err(Error::Solve(msg)) if msg == "boom"));
    }

    #[tokio::test]
    async fn consequent_errors_do_not_mask_the_cause() {
        let mut group = TaskGroup::new(&CancellationToken::new());
        let scope = group.token().clone();
        group.spawn("cause", async { Err(Error::Session("lost".into())) });
        group.spawn("consequence", async move {
            scope.cancelled().await;
            Err(Error::Relay("channel closed".into()))
        });

        let result = group.wait().await;
        assert!(matches!(result, Err(Error::Session(_))));
    }

    #[tokio::test]
    async fn parent_cancellation_is_reported_as_cancelled() {
        let parent = CancellationToken::new();
        let mut group = TaskGroup::new(&parent);
        group.spawn("stuck", std::future::pending());
        parent.cancel();
        assert!(matches!(group.wait().await, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn panics_are_reported_by_task_name() {
        let mut group = TaskGroup::new(&CancellationToken::new());
        group.spawn("stuck", std::future::pending());
        group.spawn("explodes", explode());
        assert!(matches!(
            group.wait().await,
            Err(Error::TaskPanicked { task: "explodes" })
        ));
    }
}
