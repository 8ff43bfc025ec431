use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};

use kiln_archive::{DEFAULT_RECIPE_NAME, HEADER_WINDOW, is_archive, secure_join};
use tempfile::{NamedTempFile, TempDir, TempPath};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::source::RecipeSource;

const CONTEXT_PREFIX: &str = "kiln-build-context-";
const RECIPE_PREFIX: &str = "kiln-build-recipe-";

/// A build context unpacked into a temporary directory.
///
/// The directory is removed when this value is dropped.
#[derive(Debug)]
pub struct MaterializedContext {
    dir: TempDir,
    recipe: Option<PathBuf>,
}

impl MaterializedContext {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the stream was written when it was a bare recipe rather than an archive.
    pub fn recipe(&self) -> Option<&Path> {
        self.recipe.as_deref()
    }

    /// Remove the directory now, reporting failures instead of ignoring them.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}

/// A recipe copied into a temporary file, removed on drop.
#[derive(Debug)]
pub struct MaterializedRecipe {
    path: TempPath,
}

impl MaterializedRecipe {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn close(self) -> io::Result<()> {
        self.path.close()
    }
}

/// Turn a stream into a build context directory.
///
/// Up to [`HEADER_WINDOW`] bytes are peeked to classify the stream. An archive
/// is extracted whole (peeked bytes included). Anything else is taken to be
/// the recipe itself and written into the fresh directory under the declared
/// recipe's file name, which is invalid when the recipe is itself declared to
/// come from this same stream.
pub fn context_from_reader(recipe: &RecipeSource, reader: impl Read) -> Result<MaterializedContext> {
    let dir = context_dir()?;
    let recipe = fill_context(dir.path(), recipe, reader)?;
    Ok(MaterializedContext { dir, recipe })
}

/// Copy a whole stream into a new temporary recipe file.
pub fn recipe_from_reader(reader: impl Read) -> Result<MaterializedRecipe> {
    let path = recipe_file()?;
    fill_recipe(&path, reader)?;
    Ok(MaterializedRecipe { path })
}

pub(crate) fn context_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(CONTEXT_PREFIX)
        .tempdir()
        .map_err(|source| Error::TempStorage {
            what: "context directory",
            source,
        })
}

pub(crate) fn recipe_file() -> Result<TempPath> {
    tempfile::Builder::new()
        .prefix(RECIPE_PREFIX)
        .tempfile()
        .map(NamedTempFile::into_temp_path)
        .map_err(|source| Error::TempStorage {
            what: "file for recipe",
            source,
        })
}

/// Unpack or write `reader` into the existing directory `root`, returning
/// where the recipe landed when the stream was not an archive.
pub(crate) fn fill_context(
    root: &Path,
    recipe: &RecipeSource,
    mut reader: impl Read,
) -> Result<Option<PathBuf>> {
    let mut header = Vec::with_capacity(HEADER_WINDOW);
    reader
        .by_ref()
        .take(HEADER_WINDOW as u64)
        .read_to_end(&mut header)
        .map_err(Error::Peek)?;
    let archive = is_archive(&header);
    let stream = Cursor::new(header).chain(reader);

    if archive {
        let report = kiln_archive::extract(root, stream)?;
        info!(
            context = %root.display(),
            entries = report.entry_count(),
            "build context extracted from stream"
        );
        return Ok(None);
    }

    let name = match recipe {
        RecipeSource::Stdin => return Err(Error::ContextNotArchive),
        RecipeSource::Default => PathBuf::from(DEFAULT_RECIPE_NAME),
        RecipeSource::Path(path) => scoped_recipe_name(path),
    };
    let recipe_path = secure_join(root, name)?;
    let written = write_stream(&recipe_path, stream)?;
    info!(
        recipe = %recipe_path.display(),
        bytes = written,
        "stream is not an archive, using it as the recipe"
    );
    Ok(Some(recipe_path))
}

/// Read all of `reader` and store it at `path`, replacing what was there.
pub(crate) fn fill_recipe(path: &Path, mut reader: impl Read) -> Result<()> {
    let mut content = Vec::new();
    reader.read_to_end(&mut content).map_err(Error::Read)?;
    std::fs::write(path, &content).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(recipe = %path.display(), bytes = content.len(), "recipe read from stream");
    Ok(())
}

/// Treat a declared recipe path as if the context root were `/`: leading
/// roots are dropped and `..` never climbs above the root.
fn scoped_recipe_name(declared: &Path) -> PathBuf {
    let mut scoped = PathBuf::new();
    for component in declared.components() {
        match component {
            Component::Normal(name) => scoped.push(name),
            Component::ParentDir => {
                scoped.pop();
            }
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
        }
    }
    if scoped.as_os_str().is_empty() {
        scoped.push(DEFAULT_RECIPE_NAME);
    }
    scoped
}

fn write_stream(path: &Path, mut stream: impl Read) -> Result<u64> {
    let failed = |source| Error::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(failed)?;
    }
    let mut file = File::create(path).map_err(failed)?;
    io::copy(&mut stream, &mut file).map_err(failed)
}
