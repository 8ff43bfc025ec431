use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Upper bound on symlinks followed while resolving one path.
const MAX_SYMLINK_HOPS: usize = 255;

enum Part {
    /// `..`, tagged with the index of the followed symlink whose target it came from.
    Parent(Option<usize>),
    Normal(OsString),
}

/// Join `unsafe_path` onto `root`, guaranteeing the result stays under `root`.
///
/// The path is resolved one component at a time. Symlinks that already exist
/// under `root` are followed, scoped to `root`. Absolute paths, `..` segments
/// that climb above `root`, and symlinks pointing outside it are rejected
/// rather than clamped.
pub fn secure_join(root: impl AsRef<Path>, unsafe_path: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root.as_ref();
    let entry = unsafe_path.as_ref();

    if entry.as_os_str().as_encoded_bytes().contains(&0) {
        return Err(Error::InvalidPath);
    }

    let escape = || Error::PathEscape {
        entry: entry.to_path_buf(),
        root: root.to_path_buf(),
    };

    let mut pending = VecDeque::new();
    for component in entry.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => return Err(escape()),
            Component::CurDir => {}
            Component::ParentDir => pending.push_back(Part::Parent(None)),
            Component::Normal(name) => pending.push_back(Part::Normal(name.to_os_string())),
        }
    }

    let mut resolved = PathBuf::new();
    let mut depth = 0usize;
    let mut hops = 0usize;
    let mut links: Vec<(PathBuf, PathBuf)> = Vec::new();

    while let Some(part) = pending.pop_front() {
        match part {
            Part::Parent(origin) => {
                if depth == 0 {
                    return Err(match origin.and_then(|index| links.get(index)) {
                        Some((link, target)) => Error::SymlinkEscape {
                            link: link.clone(),
                            target: target.clone(),
                        },
                        None => escape(),
                    });
                }
                resolved.pop();
                depth -= 1;
            }
            Part::Normal(name) => {
                let candidate = root.join(&resolved).join(&name);
                let is_link = std::fs::symlink_metadata(&candidate)
                    .map(|meta| meta.file_type().is_symlink())
                    .unwrap_or(false);

                if !is_link {
                    resolved.push(name);
                    depth += 1;
                    continue;
                }

                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return Err(Error::SymlinkLoop(entry.to_path_buf()));
                }

                let target = std::fs::read_link(&candidate)?;
                if target.has_root() {
                    return Err(Error::AbsoluteSymlinkTarget {
                        target,
                        link: candidate,
                    });
                }

                let origin = links.len();
                for component in target.components().rev() {
                    match component {
                        Component::ParentDir => pending.push_front(Part::Parent(Some(origin))),
                        Component::Normal(name) => {
                            pending.push_front(Part::Normal(name.to_os_string()))
                        }
                        _ => {}
                    }
                }
                links.push((candidate, target));
            }
        }
    }

    Ok(root.join(resolved))
}
