use std::io::Read;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Kind of an archive entry, as far as extraction cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    RegularFile,
    /// Symlinks, hardlinks, devices, fifos and the like. Never materialized.
    Other,
}

impl From<tar::EntryType> for EntryKind {
    fn from(entry_type: tar::EntryType) -> Self {
        match entry_type {
            tar::EntryType::Directory => Self::Directory,
            tar::EntryType::Regular => Self::RegularFile,
            _ => Self::Other,
        }
    }
}

/// An entry read from a tar stream but not yet written to disk.
pub struct ArchiveEntry<R> {
    pub name: PathBuf,
    pub kind: EntryKind,
    pub mode: u32,
    pub content: R,
}

impl<'a, R: Read + 'a> ArchiveEntry<tar::Entry<'a, R>> {
    pub fn from_tar(entry: tar::Entry<'a, R>) -> Result<Self> {
        let name = entry.path().map_err(|_| Error::InvalidPath)?.into_owned();
        let header = entry.header();
        let kind = EntryKind::from(header.entry_type());
        let mode = header.mode().unwrap_or(0o644);

        Ok(Self {
            name,
            kind,
            mode,
            content: entry,
        })
    }
}

/// Summary of one extraction run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub directories: usize,
    pub files: usize,
    pub skipped: usize,
    pub bytes_written: u64,
}

impl ExtractReport {
    pub fn entry_count(&self) -> usize {
        self.directories + self.files + self.skipped
    }
}
