use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

pub use kiln_archive::DEFAULT_RECIPE_NAME;

use crate::error::{Error, Result};
use crate::reference::Reference;

pub const FRONTEND: &str = "dockerfile.v0";
pub const IMAGE_EXPORTER: &str = "image";

/// Local directory the engine reads the build context from.
pub const CONTEXT_DIR: &str = "context";
/// Local directory the engine reads the recipe from.
pub const RECIPE_DIR: &str = "dockerfile-dir";

const ATTR_FILENAME: &str = "filename";
const ATTR_TARGET: &str = "target";
const ATTR_PLATFORM: &str = "platform";
const ATTR_NO_CACHE: &str = "no-cache";
const BUILD_ARG_PREFIX: &str = "build-arg:";
const LABEL_PREFIX: &str = "label:";
const EXPORT_NAME: &str = "name";

/// Frontend attribute map handed to the engine.
pub type FrontendAttributes = BTreeMap<String, String>;

/// Options as given by the user, before validation.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    context_dir: PathBuf,
    recipe: Option<PathBuf>,
    tags: Vec<String>,
    target: Option<String>,
    platforms: Vec<String>,
    build_args: Vec<String>,
    labels: Vec<String>,
    no_cache: bool,
}

impl BuildOptions {
    pub fn new(context_dir: impl Into<PathBuf>) -> Self {
        Self {
            context_dir: context_dir.into(),
            ..Default::default()
        }
    }

    /// Explicit recipe path. Without one, `<context>/Dockerfile` is used.
    pub fn recipe(mut self, path: impl Into<PathBuf>) -> Self {
        self.recipe = Some(path.into());
        self
    }

    pub fn recipe_opt(mut self, path: Option<impl Into<PathBuf>>) -> Self {
        self.recipe = path.map(Into::into);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn target(mut self, target: Option<String>) -> Self {
        self.target = target.filter(|t| !t.is_empty());
        self
    }

    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platforms.push(platform.into());
        self
    }

    pub fn platforms<I, S>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.platforms.extend(platforms.into_iter().map(Into::into));
        self
    }

    pub fn build_arg(mut self, arg: impl Into<String>) -> Self {
        self.build_args.push(arg.into());
        self
    }

    pub fn build_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.build_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(Into::into));
        self
    }

    pub fn no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    /// Validate and normalize into a [`BuildRequest`].
    pub fn build(self) -> Result<BuildRequest> {
        if self.tags.is_empty() {
            return Err(Error::MissingTags);
        }
        let tags = self
            .tags
            .iter()
            .map(|tag| Reference::parse_tagged(tag))
            .collect::<Result<Vec<_>>>()?;

        let recipe_path = match self.recipe {
            Some(path) if !path.as_os_str().is_empty() => path,
            _ => kiln_archive::secure_join(&self.context_dir, DEFAULT_RECIPE_NAME)?,
        };

        let mut platforms = Vec::with_capacity(self.platforms.len().max(1));
        for platform in self.platforms {
            if !platforms.contains(&platform) {
                platforms.push(platform);
            }
        }
        if platforms.is_empty() {
            platforms.push(kiln_platform::default_string());
        }

        let request = BuildRequest {
            recipe_path,
            context_dir: self.context_dir,
            tags,
            target: self.target,
            platforms,
            build_args: parse_key_values("build-arg", &self.build_args)?,
            labels: parse_key_values("label", &self.labels)?,
            cache_disabled: self.no_cache,
        };
        debug!(
            recipe = %request.recipe_path.display(),
            context = %request.context_dir.display(),
            tags = request.tags.len(),
            "build request validated"
        );
        Ok(request)
    }
}

fn parse_key_values(what: &'static str, entries: &[String]) -> Result<BTreeMap<String, String>> {
    entries
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(Error::InvalidKeyValue {
                what,
                entry: entry.clone(),
            }),
        })
        .collect()
}

/// A validated build, immutable once a solve starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub recipe_path: PathBuf,
    pub context_dir: PathBuf,
    /// Normalized references; the first one is the primary tag.
    pub tags: Vec<Reference>,
    pub target: Option<String>,
    pub platforms: Vec<String>,
    pub build_args: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub cache_disabled: bool,
}

impl BuildRequest {
    pub fn primary_tag(&self) -> &Reference {
        // `build` rejects an empty tag list.
        &self.tags[0]
    }

    /// Directory containing the recipe, served to the engine as [`RECIPE_DIR`].
    pub fn recipe_dir(&self) -> &Path {
        self.recipe_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
    }

    pub fn frontend_attributes(&self) -> FrontendAttributes {
        let mut attrs = FrontendAttributes::new();
        let filename = self
            .recipe_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_RECIPE_NAME.to_string());
        attrs.insert(ATTR_FILENAME.to_string(), filename);
        if let Some(target) = &self.target {
            attrs.insert(ATTR_TARGET.to_string(), target.clone());
        }
        attrs.insert(ATTR_PLATFORM.to_string(), self.platforms.join(","));
        for (key, value) in &self.build_args {
            attrs.insert(format!("{BUILD_ARG_PREFIX}{key}"), value.clone());
        }
        for (key, value) in &self.labels {
            attrs.insert(format!("{LABEL_PREFIX}{key}"), value.clone());
        }
        if self.cache_disabled {
            attrs.insert(ATTR_NO_CACHE.to_string(), String::new());
        }
        attrs
    }

    pub fn export(&self) -> ExportDescriptor {
        let names = self
            .tags
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        ExportDescriptor {
            exporter: IMAGE_EXPORTER.to_string(),
            attrs: BTreeMap::from([(EXPORT_NAME.to_string(), names)]),
        }
    }

    /// Assemble the engine request for one solve under `session_id`.
    pub fn solve_request(&self, session_id: &str) -> SolveRequest {
        SolveRequest {
            id: Uuid::new_v4().simple().to_string(),
            session_id: session_id.to_string(),
            frontend: FRONTEND.to_string(),
            frontend_attrs: self.frontend_attributes(),
            export: self.export(),
            local_dirs: BTreeMap::from([
                (CONTEXT_DIR.to_string(), self.context_dir.clone()),
                (RECIPE_DIR.to_string(), self.recipe_dir().to_path_buf()),
            ]),
        }
    }
}

/// How and under which names the produced image is exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDescriptor {
    pub exporter: String,
    pub attrs: BTreeMap<String, String>,
}

/// Everything the engine needs for one solve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveRequest {
    pub id: String,
    pub session_id: String,
    pub frontend: String,
    pub frontend_attrs: FrontendAttributes,
    pub export: ExportDescriptor,
    pub local_dirs: BTreeMap<String, PathBuf>,
}
