//! Config drop-in discovery and merge
//!
//! Every `*.toml` file in each config directory is read in file-name order,
//! directories from lowest to highest precedence. A key set in a later file
//! replaces the earlier value. Missing directories are fine; a file that
//! can't be read or doesn't match the schema is not.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::policy::{Policy, PolicyFile};
use crate::constants::config;

/// Config directories, lowest precedence first
pub fn config_dirs() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = config::SYSTEM_DIRS.iter().map(PathBuf::from).collect();
    if let Some(user_dir) = dirs::config_dir() {
        dirs.push(user_dir.join(config::APP_DIR));
    }
    dirs
}

/// Load the policy from the standard config directories
pub fn load_policy() -> Result<Policy> {
    load_from_dirs(&config_dirs())
}

pub fn load_from_dirs(dirs: &[PathBuf]) -> Result<Policy> {
    let mut policy = Policy::default();

    for dir in dirs {
        for path in drop_in_files(dir)? {
            let contents = fs::read_to_string(&path)
                .context(format!("Failed to read config file {}", path.display()))?;
            let file: PolicyFile = toml::from_str(&contents)
                .context(format!("Invalid config file {}", path.display()))?;
            policy.apply(file);
            info!(path = %path.display(), "Loaded config file");
        }
    }

    policy.validate().context("Invalid configuration")?;
    Ok(policy)
}

fn drop_in_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %dir.display(), "Config directory not present");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(e).context(format!("Failed to read config directory {}", dir.display()));
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.context(format!("Failed to read config directory {}", dir.display()))?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == config::EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
