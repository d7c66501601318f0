use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "todoui";
const CONFIG_FILE: &str = "config.yml";
const DATABASE_FILE: &str = "todos.sqlite";
const LOG_FILE: &str = "todoui.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StartView {
    #[default]
    Week,
    Day,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub log_level: String,
    pub start_view: StartView,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: None,
            log_path: None,
            log_level: "info".into(),
            start_view: StartView::Week,
        }
    }
}

/// Process environment that influences where data lives.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub database: Option<PathBuf>,
    pub dev: bool,
}

impl Environment {
    pub fn from_env() -> Self {
        Environment {
            database: env::var_os("TODOUI_DB").map(PathBuf::from),
            dev: env::var_os("TODOUI_DEV").is_some(),
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join(CONFIG_FILE))
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let data = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    if data.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config =
        serde_yaml::from_str(&data).with_context(|| format!("parsing config file {:?}", path))?;
    Ok(config)
}

pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(config).context("serializing config")?;
    fs::write(path, serialized).with_context(|| format!("writing {:?}", path))?;
    Ok(())
}

/// `--db` beats `TODOUI_DB`, which beats the config file, then dev mode, then the data dir.
pub fn resolve_database_path(
    flag: Option<PathBuf>,
    environment: &Environment,
    config: &Config,
) -> Result<PathBuf> {
    if let Some(path) = flag
        .or_else(|| environment.database.clone())
        .or_else(|| config.database_path.clone())
    {
        return Ok(path);
    }
    if environment.dev {
        return Ok(PathBuf::from(DATABASE_FILE));
    }
    Ok(project_dirs()?.data_dir().join(DATABASE_FILE))
}

pub fn resolve_log_path(config: &Config, environment: &Environment) -> Result<PathBuf> {
    if let Some(path) = &config.log_path {
        return Ok(path.clone());
    }
    if environment.dev {
        return Ok(PathBuf::from(LOG_FILE));
    }
    Ok(project_dirs()?.data_dir().join(LOG_FILE))
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME).context("locating data directory")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("nope.yml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "start_view: day\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.start_view, StartView::Day);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.database_path, None);
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = Config {
            database_path: Some(PathBuf::from("/tmp/todos.sqlite")),
            log_level: "debug".into(),
            ..Default::default()
        };
        save_config(&path, &config).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "start_view: [sideways\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn database_path_precedence() {
        let config = Config {
            database_path: Some(PathBuf::from("from-config.sqlite")),
            ..Default::default()
        };
        let environment = Environment {
            database: Some(PathBuf::from("from-env.sqlite")),
            dev: true,
        };
        let flag = Some(PathBuf::from("from-flag.sqlite"));
        assert_eq!(
            resolve_database_path(flag, &environment, &config).unwrap(),
            PathBuf::from("from-flag.sqlite")
        );
        assert_eq!(
            resolve_database_path(None, &environment, &config).unwrap(),
            PathBuf::from("from-env.sqlite")
        );
        let dev_only = Environment {
            database: None,
            dev: true,
        };
        assert_eq!(
            resolve_database_path(None, &dev_only, &config).unwrap(),
            PathBuf::from("from-config.sqlite")
        );
        assert_eq!(
            resolve_database_path(None, &dev_only, &Config::default()).unwrap(),
            PathBuf::from(DATABASE_FILE)
        );
    }
}
