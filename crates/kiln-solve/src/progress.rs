//! Engine status events and their renderer-facing form.
//!
//! The engine reports [`StatusResponse`] batches. [`translate`] maps each batch
//! onto a [`SolveStatus`] without dropping any field, and [`relay`] applies it
//! to a whole channel. Renderers only ever see [`SolveStatus`].

use std::collections::HashMap;
use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::Result;

/// One status batch as sent by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub vertexes: Vec<VertexUpdate>,
    #[serde(default)]
    pub statuses: Vec<ProgressUpdate>,
    #[serde(default)]
    pub logs: Vec<LogUpdate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexUpdate {
    pub digest: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    pub name: String,
    #[serde(default)]
    pub cached: bool,
    pub started: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub id: String,
    pub vertex: String,
    pub name: String,
    pub current: i64,
    pub total: i64,
    pub timestamp: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    /// File descriptor number renderers key log output on.
    pub fn fd(self) -> u8 {
        match self {
            Self::Stdout => 1,
            Self::Stderr => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogUpdate {
    pub vertex: String,
    pub stream: LogStream,
    pub data: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

/// Renderer-facing counterpart of [`StatusResponse`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolveStatus {
    pub vertexes: Vec<Vertex>,
    pub statuses: Vec<VertexStatus>,
    pub logs: Vec<VertexLog>,
}

impl SolveStatus {
    pub fn is_empty(&self) -> bool {
        self.vertexes.is_empty() && self.statuses.is_empty() && self.logs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vertex {
    pub digest: String,
    pub inputs: Vec<String>,
    pub name: String,
    pub started: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
    pub cached: bool,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexStatus {
    pub id: String,
    pub vertex: String,
    pub name: String,
    pub current: i64,
    pub total: i64,
    pub timestamp: DateTime<Utc>,
    pub started: Option<DateTime<Utc>>,
    pub completed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLog {
    pub vertex: String,
    pub stream: u8,
    pub data: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

/// Map one engine batch onto its renderer form, preserving order.
pub fn translate(response: StatusResponse) -> SolveStatus {
    SolveStatus {
        vertexes: response
            .vertexes
            .into_iter()
            .map(|v| Vertex {
                digest: v.digest,
                inputs: v.inputs,
                name: v.name,
                started: v.started,
                completed: v.completed,
                cached: v.cached,
                error: v.error,
            })
            .collect(),
        statuses: response
            .statuses
            .into_iter()
            .map(|s| VertexStatus {
                id: s.id,
                vertex: s.vertex,
                name: s.name,
                current: s.current,
                total: s.total,
                timestamp: s.timestamp,
                started: s.started,
                completed: s.completed,
            })
            .collect(),
        logs: response
            .logs
            .into_iter()
            .map(|l| VertexLog {
                vertex: l.vertex,
                stream: l.stream.fd(),
                data: l.data,
                timestamp: l.timestamp,
            })
            .collect(),
    }
}

/// Forward translated batches from `upstream` to `renderer` until `upstream`
/// closes, then close `renderer` by dropping it.
///
/// A renderer that hangs up early does not stop the relay: upstream keeps
/// being drained so the engine never blocks on a full channel.
pub async fn relay(
    mut upstream: mpsc::Receiver<StatusResponse>,
    renderer: mpsc::Sender<SolveStatus>,
) -> Result<()> {
    let mut forwarded = 0usize;
    let mut renderer = Some(renderer);

    while let Some(response) = upstream.recv().await {
        let Some(tx) = &renderer else { continue };
        if tx.send(translate(response)).await.is_err() {
            warn!("progress renderer went away, discarding further status updates");
            renderer = None;
            continue;
        }
        forwarded += 1;
    }

    debug!(batches = forwarded, "status stream closed");
    Ok(())
}

#[derive(Debug, Default)]
struct VertexLine {
    number: usize,
    started: bool,
    finished: bool,
}

/// Plain-text renderer writing one line per state change.
pub struct LogRenderer<W> {
    out: W,
    vertexes: HashMap<String, VertexLine>,
}

impl<W: Write> LogRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            vertexes: HashMap::new(),
        }
    }

    /// Render every batch until the channel closes, returning the writer.
    pub async fn run(mut self, mut rx: mpsc::Receiver<SolveStatus>) -> io::Result<W> {
        while let Some(status) = rx.recv().await {
            self.write_status(&status)?;
        }
        self.out.flush()?;
        Ok(self.out)
    }

    pub fn write_status(&mut self, status: &SolveStatus) -> io::Result<()> {
        for vertex in &status.vertexes {
            self.write_vertex(vertex)?;
        }
        for progress in &status.statuses {
            let number = self.number(&progress.vertex);
            let done = if progress.completed.is_some() { " done" } else { "" };
            if progress.total > 0 {
                writeln!(
                    self.out,
                    "#{number} {} {}/{}{done}",
                    progress.name, progress.current, progress.total
                )?;
            } else {
                writeln!(self.out, "#{number} {} {}{done}", progress.name, progress.current)?;
            }
        }
        for log in &status.logs {
            let number = self.number(&log.vertex);
            for line in String::from_utf8_lossy(&log.data).lines() {
                writeln!(self.out, "#{number} {line}")?;
            }
        }
        Ok(())
    }

    fn write_vertex(&mut self, vertex: &Vertex) -> io::Result<()> {
        let number = self.number(&vertex.digest);
        let Some(line) = self.vertexes.get_mut(&vertex.digest) else {
            return Ok(());
        };

        if !line.started && (vertex.started.is_some() || vertex.cached) {
            line.started = true;
            writeln!(self.out, "#{number} {}", vertex.name)?;
        }
        if line.finished {
            return Ok(());
        }
        if !vertex.error.is_empty() {
            line.finished = true;
            writeln!(self.out, "#{number} ERROR: {}", vertex.error)?;
        } else if vertex.cached {
            line.finished = true;
            writeln!(self.out, "#{number} CACHED")?;
        } else if let Some(completed) = vertex.completed {
            line.finished = true;
            match vertex.started {
                Some(started) => {
                    let elapsed = (completed - started).num_milliseconds().max(0) as f64 / 1000.0;
                    writeln!(self.out, "#{number} DONE {elapsed:.1}s")?;
                }
                None => writeln!(self.out, "#{number} DONE")?,
            }
        }
        Ok(())
    }

    fn number(&mut self, digest: &str) -> usize {
        let next = self.vertexes.len() + 1;
        self.vertexes
            .entry(digest.to_string())
            .or_insert_with(|| VertexLine {
                number: next,
                ..Default::default()
            })
            .number
    }
}
