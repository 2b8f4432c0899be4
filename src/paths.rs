//! Config path resolution
//!
//! Priority for [`config_dir`]:
//! 1. `WASPROV_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/wasprov` (if set)
//! 3. `~/.config/wasprov`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "WASPROV_CONFIG_DIR";

const APP_NAME: &str = "wasprov";

/// Get the wasprov config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand_path(&dir);
        log::debug!("Using config dir from {ENV_CONFIG_DIR}: {}", path.display());
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        let path = PathBuf::from(xdg_config).join(APP_NAME);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join(APP_NAME))
}

/// Default config file path
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Expand `~` and environment variables in a path
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}

/// [`expand_path`] for an existing `Path`
pub fn expand(path: &Path) -> PathBuf {
    path.to_str().map_or_else(|| path.to_path_buf(), expand_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_path("~/wasprov"), home.join("wasprov"));
    }

    #[test]
    fn test_expand_plain_path_unchanged() {
        assert_eq!(
            expand_path("/opt/IBM/WebSphere/Liberty"),
            PathBuf::from("/opt/IBM/WebSphere/Liberty")
        );
    }

    #[test]
    fn test_expand_unknown_variable_keeps_text() {
        let path = expand_path("/opt/$WASPROV_SURELY_UNSET_VAR/x");
        assert_eq!(path, PathBuf::from("/opt/$WASPROV_SURELY_UNSET_VAR/x"));
    }

    #[test]
    fn test_config_file_name() {
        assert!(config_file().unwrap().ends_with("wasprov/config.toml") || std::env::var(ENV_CONFIG_DIR).is_ok());
    }
}
