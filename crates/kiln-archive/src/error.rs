use std::io;
use std::path::PathBuf;

use crate::detect::Compression;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported compression: {0}")]
    UnsupportedCompression(Compression),

    #[error("path escapes root: '{entry}' is not within '{root}'")]
    PathEscape { entry: PathBuf, root: PathBuf },

    #[error("symlink escapes root: '{link}' -> '{target}'")]
    SymlinkEscape { link: PathBuf, target: PathBuf },

    #[error("symlink target is absolute path: '{target}' in '{link}'")]
    AbsoluteSymlinkTarget { target: PathBuf, link: PathBuf },

    #[error("too many levels of symbolic links resolving '{0}'")]
    SymlinkLoop(PathBuf),

    #[error("entry path contains null byte")]
    InvalidPath,

    #[error("archive is corrupted: {0}")]
    Corrupted(#[source] io::Error),

    #[error("failed to extract '{path}': {source}")]
    ExtractionFailed { path: PathBuf, source: io::Error },

    #[error("failed to create directory: {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// True for errors raised because an entry tried to leave the destination root.
    pub fn is_security(&self) -> bool {
        matches!(
            self,
            Self::PathEscape { .. }
                | Self::SymlinkEscape { .. }
                | Self::AbsoluteSymlinkTarget { .. }
                | Self::SymlinkLoop(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
