use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("please specify build context (e.g. \".\" for the current directory)")]
    MissingContext,

    #[error("recipe and build context cannot both be read from stdin")]
    StdinConflict,

    #[error("build context is not an archive")]
    ContextNotArchive,

    #[error("unable to create temporary {what}: {source}")]
    TempStorage {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("failed to peek context header from stdin: {0}")]
    Peek(#[source] io::Error),

    #[error("reading from stdin failed: {0}")]
    Read(#[source] io::Error),

    #[error("writing to '{path}' failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("extracting build context failed: {0}")]
    Archive(#[from] kiln_archive::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
