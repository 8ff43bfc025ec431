//! Streaming tar extraction.
//!
//! Every entry name is resolved with [`secure_join`] before anything touches
//! the filesystem, and the first entry that would land outside the
//! destination aborts the whole run.

use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read};
use std::path::Path;

use tracing::debug;

use crate::detect::{Compression, HEADER_WINDOW, detect_compression};
use crate::entry::{ArchiveEntry, EntryKind, ExtractReport};
use crate::error::{Error, Result};
use crate::sanitize::secure_join;

/// Extract a tar stream, compressed or not, into `destination`.
///
/// Directories are created (with parents) only when missing, so pre-existing
/// directories keep their mode. Regular files are created or truncated with
/// the entry's permission bits. All other entry types are skipped.
pub fn extract(destination: impl AsRef<Path>, mut reader: impl Read) -> Result<ExtractReport> {
    let destination = destination.as_ref();

    let mut magic = Vec::with_capacity(HEADER_WINDOW);
    reader
        .by_ref()
        .take(HEADER_WINDOW as u64)
        .read_to_end(&mut magic)?;
    let compression = detect_compression(&magic);
    debug!(%compression, destination = %destination.display(), "extracting archive");

    let stream = decoder(Cursor::new(magic).chain(reader), compression)?;
    let mut archive = tar::Archive::new(stream);
    let mut report = ExtractReport::default();

    for entry in archive.entries().map_err(Error::Corrupted)? {
        let entry = entry.map_err(Error::Corrupted)?;
        write_entry(destination, ArchiveEntry::from_tar(entry)?, &mut report)?;
    }

    debug!(
        files = report.files,
        directories = report.directories,
        skipped = report.skipped,
        bytes = report.bytes_written,
        "archive extracted"
    );
    Ok(report)
}

fn decoder<'a, R: Read + 'a>(reader: R, compression: Compression) -> Result<Box<dyn Read + 'a>> {
    match compression {
        Compression::None => Ok(Box::new(reader)),
        #[cfg(feature = "gzip")]
        Compression::Gzip => Ok(Box::new(flate2::read::MultiGzDecoder::new(reader))),
        #[cfg(feature = "xz")]
        Compression::Xz => Ok(Box::new(xz2::read::XzDecoder::new_multi_decoder(reader))),
        #[cfg(feature = "zstd")]
        Compression::Zstd => {
            let decoder = zstd::stream::read::Decoder::new(reader).map_err(Error::Corrupted)?;
            Ok(Box::new(decoder))
        }
        other => Err(Error::UnsupportedCompression(other)),
    }
}

fn write_entry<R: Read>(
    root: &Path,
    mut entry: ArchiveEntry<R>,
    report: &mut ExtractReport,
) -> Result<()> {
    let target = secure_join(root, &entry.name)?;

    match entry.kind {
        EntryKind::Directory => {
            ensure_directory(&target)?;
            report.directories += 1;
        }
        EntryKind::RegularFile => {
            report.bytes_written += write_file(&target, entry.mode, &mut entry.content)?;
            report.files += 1;
        }
        EntryKind::Other => {
            debug!(entry = %entry.name.display(), "skipping unsupported entry type");
            report.skipped += 1;
        }
    }
    Ok(())
}

fn ensure_directory(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(path).map_err(|e| Error::DirectoryCreationFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_file(path: &Path, mode: u32, content: &mut impl Read) -> Result<u64> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let failed = |source: io::Error| Error::ExtractionFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut file = open_with_mode(path, mode).map_err(failed)?;
    let copied = io::copy(content, &mut file);
    let permissions = apply_mode(&file, mode);
    // Close before inspecting the outcome so a failed copy never leaks the descriptor.
    drop(file);

    let written = copied.map_err(failed)?;
    permissions.map_err(failed)?;
    Ok(written)
}

#[cfg(unix)]
fn open_with_mode(path: &Path, mode: u32) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(mode & 0o7777)
        .open(path)
}

#[cfg(not(unix))]
fn open_with_mode(path: &Path, _mode: u32) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}

#[cfg(unix)]
fn apply_mode(file: &File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn apply_mode(_file: &File, _mode: u32) -> io::Result<()> {
    Ok(())
}
