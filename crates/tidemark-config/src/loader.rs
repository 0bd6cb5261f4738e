use std::path::{Path, PathBuf};

use tidemark_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

/// File names looked up by [`ConfigLoader::discover`], in priority order.
const CONFIG_FILE_NAMES: [&str; 3] = ["tidemark.yml", "tidemark.yaml", "tidemark.toml"];

/// Reads [`AppConfig`] from YAML or TOML files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load, resolve relative paths against the file's directory, and validate.
    pub fn load(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config = Self::parse(&contents, ext)?;

        let base = path.parent().unwrap_or(Path::new("."));
        let config = config.resolve_relative_to(base);
        config.validate()?;

        info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse `contents` according to a file extension.
    pub fn parse(contents: &str, ext: &str) -> Result<AppConfig> {
        match ext {
            "yml" | "yaml" => serde_yaml::from_str(contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
            "toml" => toml::from_str(contents)
                .map_err(|e| Error::Config(format!("TOML parse error: {e}"))),
            other => Err(Error::Config(format!(
                "unsupported config extension: {other}"
            ))),
        }
    }

    /// First config file found in the working directory, then in the user
    /// config directory (`~/.config/tidemark` on Linux).
    pub fn discover() -> Option<PathBuf> {
        let mut search = vec![PathBuf::from(".")];
        if let Some(config_dir) = dirs::config_dir() {
            search.push(config_dir.join("tidemark"));
        }
        Self::discover_in(&search)
    }

    pub fn discover_in(dirs: &[PathBuf]) -> Option<PathBuf> {
        dirs.iter()
            .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
            .find(|candidate| candidate.is_file())
    }

    /// Load `explicit` if given, else a discovered file, else defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<AppConfig> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::discover() {
            Some(path) => Self::load(&path),
            None => {
                debug!("no config file found, using defaults");
                Ok(AppConfig::default())
            }
        }
    }
}
