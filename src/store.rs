use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::config::Config;

pub fn config_file_path() -> PathBuf {
    data_dir().join("config.yaml")
}

pub fn data_dir() -> PathBuf {
    match directories::ProjectDirs::from("com", "gatehouse", "gatehouse") {
        Some(project_dirs) => project_dirs.data_dir().to_owned(),
        None => {
            warn!("Cannot retrieve project dirs, using the working directory");
            PathBuf::from(".gatehouse")
        }
    }
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_file_path())
}

/// Reads the config at `path`, writing the defaults there first if it does not exist yet.
pub fn load_config_from(path: &Path) -> Result<Config> {
    info!("Config file: {}", path.to_string_lossy());
    if !path.exists() {
        info!("Config file does not exist, creating.");
        store_config(path, &Config::default())?;
    }
    let config_file =
        File::open(path).with_context(|| format!("Cannot open {}", path.to_string_lossy()))?;
    serde_yaml::from_reader(config_file)
        .with_context(|| format!("Invalid config {}", path.to_string_lossy()))
}

pub fn store_config(path: &Path, config: &Config) -> Result<()> {
    ensure_dir_created(path)?;
    let config_file = File::create(path)?;
    Ok(serde_yaml::to_writer(config_file, config)?)
}

fn ensure_dir_created(path: &Path) -> Result<()> {
    let Some(dir) = path.parent() else {
        return Ok(());
    };
    if !dir.as_os_str().is_empty() && !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create {}", &dir.to_string_lossy()))?;
    }
    Ok(())
}
