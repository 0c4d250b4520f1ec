//! Settings from the optional TOML file, overridden by command-line flags.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use mediadupe_core::dedup::DEFAULT_PAGE_SIZE;
use mediadupe_core::quarantine::DEFAULT_QUARANTINE_DIR_NAME;
use serde::Deserialize;

const APP_DIR: &str = "mediadupe";

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub database: Option<PathBuf>,
    pub quarantine_dir: Option<PathBuf>,
    pub page_size: Option<usize>,
}

impl FileConfig {
    /// Reads `explicit` if given (it must exist), otherwise the per-user
    /// config file if there is one.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database: Option<PathBuf>,
    pub quarantine_dir: Option<PathBuf>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database: PathBuf,
    pub quarantine_dir: PathBuf,
    pub page_size: usize,
}

impl Settings {
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self> {
        let page_size = overrides
            .page_size
            .or(file.page_size)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            bail!("page size must be at least 1");
        }

        Ok(Self {
            database: overrides
                .database
                .or(file.database)
                .unwrap_or_else(default_database),
            quarantine_dir: overrides
                .quarantine_dir
                .or(file.quarantine_dir)
                .unwrap_or_else(default_quarantine_dir),
            page_size,
        })
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

fn default_database() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("media_files.db")
}

fn default_quarantine_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_QUARANTINE_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_all_keys() {
        let config = FileConfig::from_toml(
            r#"
            database = "/data/media.db"
            quarantine_dir = "/data/dupes"
            page_size = 25
            "#,
        )
        .unwrap();
        assert_eq!(config.database, Some(PathBuf::from("/data/media.db")));
        assert_eq!(config.quarantine_dir, Some(PathBuf::from("/data/dupes")));
        assert_eq!(config.page_size, Some(25));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(FileConfig::from_toml("pagesize = 3").is_err());
    }

    #[test]
    fn flags_override_file_which_overrides_defaults() {
        let file = FileConfig {
            database: Some(PathBuf::from("/file/db")),
            quarantine_dir: Some(PathBuf::from("/file/q")),
            page_size: Some(5),
        };
        let overrides = Overrides {
            page_size: Some(20),
            ..Overrides::default()
        };
        let settings = Settings::resolve(file, overrides).unwrap();
        assert_eq!(settings.database, PathBuf::from("/file/db"));
        assert_eq!(settings.quarantine_dir, PathBuf::from("/file/q"));
        assert_eq!(settings.page_size, 20);

        let defaults = Settings::resolve(FileConfig::default(), Overrides::default()).unwrap();
        assert_eq!(defaults.page_size, DEFAULT_PAGE_SIZE);
        assert!(defaults.quarantine_dir.ends_with(DEFAULT_QUARANTINE_DIR_NAME));
        assert!(defaults.database.ends_with("media_files.db"));
    }

    #[test]
    fn zero_page_size_is_an_error() {
        let overrides = Overrides {
            page_size: Some(0),
            ..Overrides::default()
        };
        assert!(Settings::resolve(FileConfig::default(), overrides).is_err());
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = TempDir::new().unwrap();
        assert!(FileConfig::load(Some(&dir.path().join("missing.toml"))).is_err());

        let path = dir.path().join("config.toml");
        fs::write(&path, "page_size = 3\n").unwrap();
        assert_eq!(FileConfig::load(Some(&path)).unwrap().page_size, Some(3));
    }
}
