//! gcloud configuration file loading.
//!
//! The project and region are read once at startup and passed by reference to
//! everything that needs them.

use std::path::{Path, PathBuf};

use ini::Ini;

use crate::error::AppError;

/// Run-scoped settings resolved from the local gcloud configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub project: String,
    pub region: String,
    pub path: PathBuf,
}

impl Config {
    /// Read `[core] project` and `[run] region` from the INI file at `path`.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Err(AppError::ConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, AppError> {
        let ini = Ini::load_from_str(content).map_err(|e| AppError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let region = lookup(&ini, "run", "region").ok_or_else(|| AppError::MissingConfigKey {
            key: "region",
            section: "run",
            example: "us-central1",
            path: path.to_path_buf(),
        })?;
        let project =
            lookup(&ini, "core", "project").ok_or_else(|| AppError::MissingConfigKey {
                key: "project",
                section: "core",
                example: "my-project",
                path: path.to_path_buf(),
            })?;

        Ok(Config {
            project,
            region,
            path: path.to_path_buf(),
        })
    }

    /// `projects/{project}/locations/{region}`, the parent of every service.
    pub fn location_parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project, self.region)
    }
}

fn lookup(ini: &Ini, section: &str, key: &str) -> Option<String> {
    ini.section(Some(section))
        .and_then(|s| s.get(key))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `$HOME/.config/gcloud/configurations/config_default`
pub fn default_config_path() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_else(|| ".".into());
    PathBuf::from(home)
        .join(".config")
        .join("gcloud")
        .join("configurations")
        .join("config_default")
}
