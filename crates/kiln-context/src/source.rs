use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tempfile::{TempDir, TempPath};
use tracing::debug;

use crate::error::{Error, Result};
use crate::materialize::{context_dir, fill_context, fill_recipe, recipe_file};

const STDIN_MARKER: &str = "-";

/// Where the recipe comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecipeSource {
    /// `<context>/Dockerfile`.
    Default,
    Path(PathBuf),
    Stdin,
}

impl RecipeSource {
    /// Interpret a `--file` value: empty means default, `-` means stdin.
    pub fn parse(value: &str) -> Self {
        match value {
            "" => Self::Default,
            STDIN_MARKER => Self::Stdin,
            path => Self::Path(PathBuf::from(path)),
        }
    }
}

/// Where the build context comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContextSource {
    Directory(PathBuf),
    Stdin,
}

impl ContextSource {
    /// Interpret the positional context argument; `-` means stdin.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "" => Err(Error::MissingContext),
            STDIN_MARKER => Ok(Self::Stdin),
            path => Ok(Self::Directory(PathBuf::from(path))),
        }
    }
}

/// Sources checked and backed by temporary storage, before stdin is read.
///
/// Storage for stdin input exists from construction on and is removed when
/// this value is dropped, so a read that never completes leaves nothing behind.
#[derive(Debug)]
pub struct StagedSources {
    recipe: RecipeSource,
    context_dir: PathBuf,
    staged_context: Option<TempDir>,
    staged_recipe: Option<TempPath>,
}

impl StagedSources {
    /// Reject stdin for both sources, then create storage for whichever one
    /// reads stdin. Nothing is read yet.
    pub fn new(recipe: RecipeSource, context: ContextSource) -> Result<Self> {
        if recipe == RecipeSource::Stdin && context == ContextSource::Stdin {
            return Err(Error::StdinConflict);
        }

        let (context_dir, staged_context) = match context {
            ContextSource::Directory(path) => {
                debug!(context = %path.display(), "using local build context");
                (path, None)
            }
            ContextSource::Stdin => {
                let dir = context_dir()?;
                (dir.path().to_path_buf(), Some(dir))
            }
        };
        let staged_recipe = match recipe {
            RecipeSource::Stdin => Some(recipe_file()?),
            _ => None,
        };

        Ok(Self {
            recipe,
            context_dir,
            staged_context,
            staged_recipe,
        })
    }

    /// The stdin read still owed, or `None` when both sources are local.
    pub fn stdin_read(&self) -> Option<StdinRead> {
        if let Some(dir) = &self.staged_context {
            return Some(StdinRead::Context {
                root: dir.path().to_path_buf(),
                recipe: self.recipe.clone(),
            });
        }
        self.staged_recipe
            .as_ref()
            .map(|path| StdinRead::Recipe { path: path.to_path_buf() })
    }

    /// Combine with the outcome of [`StdinRead::run`], or the default
    /// outcome when there was nothing to read.
    pub fn finish(self, outcome: StdinOutcome) -> BuildSources {
        let recipe = match (outcome.raw_recipe, &self.staged_recipe, self.recipe) {
            (Some(written), _, _) => Some(written),
            (None, Some(file), _) => Some(file.to_path_buf()),
            (None, None, RecipeSource::Path(path)) => Some(path),
            (None, None, _) => None,
        };
        BuildSources {
            context_dir: self.context_dir,
            recipe,
            staged_context: self.staged_context,
            staged_recipe: self.staged_recipe,
        }
    }
}

/// A pending stdin read into storage owned by a [`StagedSources`].
///
/// Holds only paths, so it can run on a thread that may be abandoned.
#[derive(Clone, Debug)]
pub enum StdinRead {
    Context { root: PathBuf, recipe: RecipeSource },
    Recipe { path: PathBuf },
}

impl StdinRead {
    pub fn destination(&self) -> &Path {
        match self {
            Self::Context { root, .. } => root,
            Self::Recipe { path } => path,
        }
    }

    pub fn run(self, stdin: impl Read) -> Result<StdinOutcome> {
        let raw_recipe = match self {
            Self::Context { root, recipe } => fill_context(&root, &recipe, stdin)?,
            Self::Recipe { path } => {
                fill_recipe(&path, stdin)?;
                None
            }
        };
        Ok(StdinOutcome { raw_recipe })
    }
}

/// What a completed [`StdinRead`] produced.
#[derive(Debug, Default)]
pub struct StdinOutcome {
    raw_recipe: Option<PathBuf>,
}

/// Recipe and context resolved to local storage.
///
/// Holds the temporary storage created for stdin input; it is removed when
/// this value is dropped, whichever way the build ends.
#[derive(Debug)]
pub struct BuildSources {
    context_dir: PathBuf,
    recipe: Option<PathBuf>,
    staged_context: Option<TempDir>,
    staged_recipe: Option<TempPath>,
}

impl BuildSources {
    /// Resolve both sources, consuming `stdin` for at most one of them.
    pub fn prepare(recipe: RecipeSource, context: ContextSource, stdin: impl Read) -> Result<Self> {
        let staged = StagedSources::new(recipe, context)?;
        let outcome = match staged.stdin_read() {
            Some(read) => read.run(stdin)?,
            None => StdinOutcome::default(),
        };
        Ok(staged.finish(outcome))
    }

    pub fn context_dir(&self) -> &Path {
        &self.context_dir
    }

    /// Explicit recipe location, if any. `None` means "derive from the context".
    pub fn recipe_path(&self) -> Option<&Path> {
        self.recipe.as_deref()
    }

    /// True when any temporary storage backs these sources.
    pub fn is_materialized(&self) -> bool {
        self.staged_context.is_some() || self.staged_recipe.is_some()
    }

    /// Remove temporary storage now, surfacing the first failure.
    pub fn close(self) -> io::Result<()> {
        let context = self.staged_context.map(TempDir::close);
        let recipe = self.staged_recipe.map(TempPath::close);
        context.transpose()?;
        recipe.transpose()?;
        Ok(())
    }
}
