//! Host checks that must pass before a solve is orchestrated.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// Proof that [`check`] succeeded. Required by
/// [`Orchestrator::run`](crate::Orchestrator::run).
#[derive(Debug, Clone)]
pub struct RuntimeReady {
    runtime: PathBuf,
    state_dir: PathBuf,
}

impl RuntimeReady {
    /// Resolved path of the runtime helper.
    pub fn runtime(&self) -> &Path {
        &self.runtime
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }
}

/// Confirm the runtime helper is installed and the state directory is usable.
pub fn check(config: &EngineConfig) -> Result<RuntimeReady> {
    let runtime = which::which(&config.runtime).map_err(|source| Error::RuntimeNotFound {
        name: config.runtime.clone(),
        source,
    })?;

    std::fs::create_dir_all(&config.state_dir).map_err(|source| Error::StateDir {
        path: config.state_dir.clone(),
        source,
    })?;

    info!(
        runtime = %runtime.display(),
        state_dir = %config.state_dir.display(),
        "runtime preflight passed"
    );
    Ok(RuntimeReady {
        runtime,
        state_dir: config.state_dir.clone(),
    })
}
