use std::fmt;

/// Number of bytes inspected to classify a stream: one tar header block.
pub const HEADER_WINDOW: usize = 512;

/// Compression envelope wrapped around a tar stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        };
        f.write_str(name)
    }
}

/// Detect a compression envelope from the leading bytes of a stream.
pub fn detect_compression(header: &[u8]) -> Compression {
    match header {
        [0x42, 0x5A, 0x68, ..] => Compression::Bzip2,
        [0x1F, 0x8B, 0x08, ..] => Compression::Gzip,
        [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00, ..] => Compression::Xz,
        [0x28, 0xB5, 0x2F, 0xFD, ..] => Compression::Zstd,
        _ => Compression::None,
    }
}

/// Decide whether a stream is a (possibly compressed) tar archive.
///
/// `header` is at most [`HEADER_WINDOW`] bytes taken from the front of the
/// stream. A recognised compression envelope is enough. Otherwise the bytes
/// must parse as one complete tar header; a short or malformed window is
/// "not an archive", never an error.
pub fn is_archive(header: &[u8]) -> bool {
    if detect_compression(header) != Compression::None {
        return true;
    }

    let mut archive = tar::Archive::new(header);
    let Ok(mut entries) = archive.entries() else {
        return false;
    };
    matches!(entries.next(), Some(Ok(_)))
}
