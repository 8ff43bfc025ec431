use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("please specify a tag (e.g. -t myapp)")]
    MissingTags,

    #[error("invalid reference format '{value}': {reason}")]
    InvalidReference { value: String, reason: &'static str },

    #[error("invalid {what} '{entry}': expected key=value")]
    InvalidKeyValue { what: &'static str, entry: String },

    #[error("resolving recipe path failed: {0}")]
    Archive(#[from] kiln_archive::Error),

    #[error("configuration file '{0}' does not exist")]
    ConfigNotFound(PathBuf),

    #[error("loading configuration failed: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("runtime helper '{name}' not found in PATH: {source}")]
    RuntimeNotFound {
        name: String,
        #[source]
        source: which::Error,
    },

    #[error("state directory '{path}' is unavailable: {source}")]
    StateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("session failed: {0}")]
    Session(String),

    #[error("solve failed: {0}")]
    Solve(String),

    #[error("relaying progress failed: {0}")]
    Relay(String),

    #[error("engine sent a malformed message: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("solve cancelled")]
    Cancelled,

    #[error("task '{task}' panicked")]
    TaskPanicked { task: &'static str },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// True for the error a task reports when it only stopped because its
    /// scope was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
