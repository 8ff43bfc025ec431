//! Engine backed by an external solver program.
//!
//! The program is driven over stdio with newline-delimited JSON:
//!
//! ```text
//! <program> --state-dir <dir> --backend <name> session <session-id>
//! <program> --state-dir <dir> --backend <name> solve
//!     stdin:  one SolveRequest
//!     stdout: {"status": {...}} ... then {"done": {}} or {"error": "..."}
//! ```

use std::path::PathBuf;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::{Session, SolveEngine};
use crate::error::{Error, Result};
use crate::progress::StatusResponse;
use crate::request::SolveRequest;

/// One line of solver output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMessage {
    Status(StatusResponse),
    Done {},
    Error(String),
}

#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: PathBuf,
    state_dir: PathBuf,
    backend: String,
}

impl ProcessEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            program: PathBuf::from(&config.engine_program),
            state_dir: config.state_dir.clone(),
            backend: config.backend.clone(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--state-dir")
            .arg(&self.state_dir)
            .arg("--backend")
            .arg(&self.backend)
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        command
    }

    fn spawn_failed(&self, err: std::io::Error) -> String {
        format!("starting '{}' failed: {err}", self.program.display())
    }
}

impl SolveEngine for ProcessEngine {
    type Session = ProcessSession;

    async fn session(&self) -> Result<ProcessSession> {
        let id = Uuid::new_v4().simple().to_string();
        let child = self
            .command()
            .arg("session")
            .arg(&id)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|err| Error::Session(self.spawn_failed(err)))?;
        debug!(session = %id, pid = child.id(), "session process started");
        Ok(ProcessSession { id, child })
    }

    async fn solve(&self, request: SolveRequest, events: mpsc::Sender<StatusResponse>) -> Result<()> {
        let mut child = self
            .command()
            .arg("solve")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|err| Error::Solve(self.spawn_failed(err)))?;

        let mut line = serde_json::to_vec(&request)?;
        line.push(b'\n');
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&line).await?;
            stdin.shutdown().await?;
        }

        let Some(stdout) = child.stdout.take() else {
            return Err(Error::Solve("solver stdout is not captured".into()));
        };
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line)? {
                EngineMessage::Status(status) => {
                    if events.send(status).await.is_err() {
                        return Err(Error::Relay("status channel closed".into()));
                    }
                }
                EngineMessage::Done {} => {
                    let status = child.wait().await?;
                    info!(solve = %request.id, %status, "solve completed");
                    return Ok(());
                }
                EngineMessage::Error(message) => return Err(Error::Solve(message)),
            }
        }

        let status = child.wait().await?;
        Err(Error::Solve(format!(
            "solver exited with {status} before reporting completion"
        )))
    }
}

/// A running session process, killed when closed or dropped.
#[derive(Debug)]
pub struct ProcessSession {
    id: String,
    child: Child,
}

impl Session for ProcessSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        let exited = tokio::select! {
            status = self.child.wait() => Some(status?),
            _ = shutdown.cancelled() => None,
        };
        if let Some(status) = exited {
            return Err(Error::Session(format!("session process exited with {status}")));
        }
        self.child.kill().await?;
        debug!(session = %self.id, "session closed");
        Ok(())
    }
}
