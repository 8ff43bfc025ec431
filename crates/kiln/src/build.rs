use std::io::{self, Read};

use anyhow::{Context, Result, bail};
use kiln_context::{BuildSources, ContextSource, RecipeSource, StagedSources, StdinOutcome};
use kiln_solve::progress::LogRenderer;
use kiln_solve::{BuildOptions, EngineConfig, Orchestrator, ProcessEngine, preflight};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cli::BuildArgs;

pub async fn run(args: BuildArgs, config: EngineConfig) -> Result<()> {
    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("interrupt received, cancelling build");
                cancel.cancel();
            }
        }
    });

    let result = build(args, &config, &cancel).await;
    interrupt.abort();
    result
}

async fn build(args: BuildArgs, config: &EngineConfig, cancel: &CancellationToken) -> Result<()> {
    if args.tags.is_empty() {
        bail!(kiln_solve::Error::MissingTags);
    }

    let recipe = RecipeSource::parse(&args.file);
    let context = ContextSource::parse(&args.path)?;
    let staged = StagedSources::new(recipe, context).context("resolving build input failed")?;
    let sources = read_input(staged, cancel, || io::stdin().lock()).await?;

    let result = solve(args, config, &sources, cancel).await;
    if let Err(err) = sources.close() {
        warn!(error = %err, "removing temporary build input failed");
    }
    result
}

/// Fill the staged storage from stdin on a blocking thread.
///
/// Cancellation abandons the thread, which may stay blocked on the read, and
/// drops the staged storage right away.
async fn read_input<F, R>(staged: StagedSources, cancel: &CancellationToken, open: F) -> Result<BuildSources>
where
    F: FnOnce() -> R + Send + 'static,
    R: Read,
{
    let Some(read) = staged.stdin_read() else {
        return Ok(staged.finish(StdinOutcome::default()));
    };
    debug!(into = %read.destination().display(), "reading build input from stdin");

    let reading = tokio::task::spawn_blocking(move || read.run(open()));
    let outcome = tokio::select! {
        joined = reading => joined?.context("reading build input from stdin failed")?,
        () = cancel.cancelled() => bail!(kiln_solve::Error::Cancelled),
    };
    Ok(staged.finish(outcome))
}

async fn solve(
    args: BuildArgs,
    config: &EngineConfig,
    sources: &BuildSources,
    cancel: &CancellationToken,
) -> Result<()> {
    let request = BuildOptions::new(sources.context_dir())
        .recipe_opt(sources.recipe_path())
        .tags(args.tags)
        .target(args.target)
        .platforms(args.platforms)
        .build_args(args.build_args)
        .labels(args.labels)
        .no_cache(args.no_cache)
        .build()
        .context("building solve request failed")?;

    let ready = preflight::check(config).context("runtime preflight failed")?;

    let tag = request.primary_tag().familiar();
    println!("Building {tag}");

    let (tx, rx) = mpsc::channel(config.event_buffer.max(1));
    let renderer = tokio::spawn(LogRenderer::new(io::stderr()).run(rx));

    let orchestrator = Orchestrator::new(ProcessEngine::new(config)).with_event_buffer(config.event_buffer);
    let result = orchestrator.run(cancel, &request, tx, &ready).await;

    match renderer.await {
        Ok(Ok(_)) => {}
        Ok(Err(err)) => warn!(error = %err, "writing progress failed"),
        Err(err) => warn!(error = %err, "progress renderer stopped"),
    }

    result.context("solve failed")?;
    println!("Successfully built {tag}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc as std_mpsc;

    use super::*;

    /// Blocks every read until its sender is dropped, like a silent terminal.
    struct Held(std_mpsc::Receiver<()>);

    impl Read for Held {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Err(io::Error::other("terminal closed"))
        }
    }

    #[tokio::test]
    async fn cancelled_stdin_read_removes_staged_context() {
        let staged = StagedSources::new(RecipeSource::Default, ContextSource::Stdin).unwrap();
        let root = staged.stdin_read().unwrap().destination().to_path_buf();
        assert!(root.is_dir());

        let (release, held) = std_mpsc::channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = read_input(staged, &cancel, move || Held(held)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<kiln_solve::Error>(),
            Some(kiln_solve::Error::Cancelled)
        ));
        assert!(!root.exists());

        drop(release);
    }

    #[tokio::test]
    async fn completed_stdin_read_keeps_staged_context() {
        let staged = StagedSources::new(RecipeSource::Default, ContextSource::Stdin).unwrap();
        let cancel = CancellationToken::new();

        let sources = read_input(staged, &cancel, || &b"FROM alpine\n"[..]).await.unwrap();
        let recipe = sources.recipe_path().unwrap().to_path_buf();
        assert_eq!(std::fs::read(&recipe).unwrap(), b"FROM alpine\n");

        sources.close().unwrap();
    }

    #[tokio::test]
    async fn local_sources_skip_stdin() {
        let staged = StagedSources::new(
            RecipeSource::Default,
            ContextSource::Directory("/srv/app".into()),
        )
        .unwrap();
        let cancel = CancellationToken::new();

        let sources = read_input(staged, &cancel, || -> &'static [u8] { panic!("stdin must not be opened") })
            .await
            .unwrap();
        assert!(!sources.is_materialized());
    }
}
