//! Instrument address lookup.
//!
//! An address given on the command line always wins. Otherwise `config.yml`
//! is looked up in the current directory and then in the per-user config
//! directory; the first file found decides the outcome.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ConfigError;

pub const APP_NAME: &str = "kikusui";

pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Kept optional so a missing key is reported separately from bad YAML.
    pub ip: Option<String>,
}

/// Directories searched for [`CONFIG_FILE`], in priority order.
pub fn search_dirs() -> Vec<PathBuf> {
    let mut searched = Vec::with_capacity(2);
    if let Ok(cwd) = std::env::current_dir() {
        searched.push(cwd);
    }
    if let Some(config) = dirs::config_dir() {
        searched.push(config.join(APP_NAME));
    }
    searched
}

pub fn resolve_ip(explicit: Option<&str>) -> Result<String, ConfigError> {
    resolve_ip_in(explicit, &search_dirs())
}

pub fn resolve_ip_in(explicit: Option<&str>, dirs: &[PathBuf]) -> Result<String, ConfigError> {
    if let Some(ip) = explicit {
        debug!("using address from command line: {ip}");
        return Ok(ip.to_string());
    }
    let (path, config) = find_config(dirs)?;
    let ip = config.ip.ok_or(ConfigError::MissingIp { path: path.clone() })?;
    info!("using address {ip} from {}", path.display());
    Ok(ip)
}

/// Load the first `config.yml` present in `dirs`.
pub fn find_config(dirs: &[PathBuf]) -> Result<(PathBuf, Config), ConfigError> {
    for dir in dirs {
        let path = dir.join(CONFIG_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => {
                let config = parse(&path, &content)?;
                return Ok((path, config));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no {CONFIG_FILE} in {}", dir.display());
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        }
    }
    Err(ConfigError::NotFound {
        searched: dirs.to_vec(),
    })
}

fn parse(path: &Path, content: &str) -> Result<Config, ConfigError> {
    serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) {
        fs::write(dir.path().join(CONFIG_FILE), content).unwrap();
    }

    #[test]
    fn explicit_address_skips_files() {
        let ip = resolve_ip_in(Some("10.0.0.7"), &[]).unwrap();
        assert_eq!(ip, "10.0.0.7");
    }

    #[test]
    fn first_directory_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_config(&first, "ip: 192.168.0.10\n");
        write_config(&second, "ip: 192.168.0.20\n");

        let dirs = [first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(resolve_ip_in(None, &dirs).unwrap(), "192.168.0.10");
    }

    #[test]
    fn falls_back_to_later_directory() {
        let empty = TempDir::new().unwrap();
        let app = TempDir::new().unwrap();
        write_config(&app, "ip: psu.lab.local\n");

        let dirs = [empty.path().to_path_buf(), app.path().to_path_buf()];
        assert_eq!(resolve_ip_in(None, &dirs).unwrap(), "psu.lab.local");
    }

    #[test]
    fn not_found_lists_searched_directories() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let dirs = [a.path().to_path_buf(), b.path().to_path_buf()];

        let err = resolve_ip_in(None, &dirs).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { ref searched } if searched.len() == 2));
        assert!(err.to_string().contains(" or "));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "ip: [unclosed\n");

        let err = resolve_ip_in(None, &[dir.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn missing_key_is_reported() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "port: 5025\n");

        let err = resolve_ip_in(None, &[dir.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingIp { .. }), "got {err:?}");
    }

    #[test]
    fn parse_error_does_not_fall_through() {
        let broken = TempDir::new().unwrap();
        let good = TempDir::new().unwrap();
        write_config(&broken, "ip: [\n");
        write_config(&good, "ip: 192.168.0.20\n");

        let dirs = [broken.path().to_path_buf(), good.path().to_path_buf()];
        assert!(resolve_ip_in(None, &dirs).is_err());
    }
}
