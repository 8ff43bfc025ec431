use std::env;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

const APP_DIR: &str = "kiln";
const CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "KILN_";

/// How to reach and run the build engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine state: caches, content store, session sockets.
    pub state_dir: PathBuf,
    /// Snapshot backend passed through to the engine.
    pub backend: String,
    /// Solver program spawned by the process engine.
    pub engine_program: String,
    /// Container runtime helper that must be on `PATH`.
    pub runtime: String,
    /// Capacity of the internal status channel.
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            state_dir: xdg_dir("XDG_DATA_HOME", &[".local", "share"]).join(APP_DIR),
            backend: "auto".to_string(),
            engine_program: "kiln-solver".to_string(),
            runtime: "runc".to_string(),
            event_buffer: 64,
        }
    }
}

impl EngineConfig {
    /// Defaults, then the config file, then `KILN_*` environment variables.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::figment(path)?.extract().map_err(Error::from)
    }

    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let file = match path {
            Some(path) if !path.is_file() => return Err(Error::ConfigNotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Some(default_config_path()).filter(|path| path.is_file()),
        };

        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            debug!(config = %file.display(), "loading engine configuration");
            figment = figment.merge(Toml::file_exact(file));
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX)))
    }
}

/// `$XDG_CONFIG_HOME/kiln/config.toml`, falling back to `~/.config`.
pub fn default_config_path() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", &[".config"])
        .join(APP_DIR)
        .join(CONFIG_FILE)
}

fn xdg_dir(var: &str, fallback: &[&str]) -> PathBuf {
    if let Some(dir) = env::var_os(var).map(PathBuf::from).filter(|dir| dir.is_absolute()) {
        return dir;
    }
    let mut dir = home::home_dir().unwrap_or_default();
    dir.extend(fallback);
    dir
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn defaults_apply_without_file() {
        Jail::expect_with(|jail| {
            let dir = jail.directory().display().to_string();
            jail.set_env("XDG_CONFIG_HOME", dir);
            let config = EngineConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.backend, "auto");
            assert_eq!(config.engine_program, "kiln-solver");
            assert_eq!(config.runtime, "runc");
            assert!(config.state_dir.ends_with("kiln"));
            Ok(())
        });
    }

    #[test]
    fn default_location_is_read_when_present() {
        Jail::expect_with(|jail| {
            let dir = jail.directory().display().to_string();
            jail.set_env("XDG_CONFIG_HOME", dir);
            std::fs::create_dir_all(jail.directory().join(APP_DIR)).map_err(|e| e.to_string())?;
            jail.create_file("kiln/config.toml", r#"engine_program = "/opt/kiln/solver""#)?;

            let config = EngineConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.engine_program, "/opt/kiln/solver");
            assert_eq!(config.runtime, "runc");
            Ok(())
        });
    }

    #[test]
    fn file_then_environment() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "engine.toml",
                r#"
                    backend = "overlayfs"
                    runtime = "crun"
                    state_dir = "/var/lib/kiln"
                "#,
            )?;
            jail.set_env("KILN_RUNTIME", "youki");

            let path = jail.directory().join("engine.toml");
            let config = EngineConfig::load(Some(&path)).map_err(|e| e.to_string())?;
            assert_eq!(config.backend, "overlayfs");
            assert_eq!(config.runtime, "youki");
            assert_eq!(config.state_dir, Path::new("/var/lib/kiln"));
            Ok(())
        });
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let result = EngineConfig::load(Some(Path::new("/nonexistent/kiln.toml")));
        assert!(matches!(result, Err(Error::ConfigNotFound(_))));
    }
}
