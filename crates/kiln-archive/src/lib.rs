//! Build-context archive handling.
//!
//! # Architecture
//!
//! - `detect.rs` - Archive classification over the 512-byte header window
//! - `sanitize.rs` - Traversal-safe joining of entry names onto a root
//! - `extract.rs` - Streaming tar extraction (optionally compressed)
//! - `entry.rs` - Entry kinds and extraction report

pub use detect::{Compression, HEADER_WINDOW, detect_compression, is_archive};
pub use entry::{EntryKind, ExtractReport};
pub use error::{Error, Result};
pub use extract::extract;
pub use sanitize::secure_join;

/// Recipe file looked up in a build context when none is named.
pub const DEFAULT_RECIPE_NAME: &str = "Dockerfile";

mod detect;
pub mod entry;
mod error;
mod extract;
mod sanitize;
