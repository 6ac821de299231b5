//! Configuration file parsing for tern.toml.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tern_vm_core::VmConfig;

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Loader trust settings and interpreter limits
    #[serde(default)]
    pub vm: VmConfig,
}

/// Load configuration from a file or search for default config files.
///
/// Environment overrides are applied on top of the file.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config_path = path.map(PathBuf::from).or_else(find_config_file);

    let mut config = match config_path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
            tracing::debug!(path = %path.display(), "loaded config");
            config
        }
        Some(path) => anyhow::bail!("config file {} not found", path.display()),
        None => Config::default(),
    };
    config.vm.apply_env();
    Ok(config)
}

/// Search for configuration file in the current directory and parent directories.
fn find_config_file() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;

    const CONFIG_NAMES: &[&str] = &["tern.toml", ".ternrc.toml"];

    let mut dir = Some(cwd.as_path());
    while let Some(current) = dir {
        for name in CONFIG_NAMES {
            let path = current.join(name);
            if path.exists() {
                return Some(path);
            }
        }
        dir = current.parent();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.vm.trust.untrusted);
        assert_eq!(config.vm.max_steps, 10_000_000);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[vm]
untrusted = true
strict_entry = false
max_steps = 5000
max_call_depth = 32
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.vm.trust.untrusted);
        assert_eq!(config.vm.trust.strict_entry, Some(false));
        assert_eq!(config.vm.max_steps, 5000);
        assert_eq!(config.vm.max_call_depth, 32);
        assert!(!config.vm.loader_options().strict_entry);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.vm, VmConfig::default());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let missing = std::env::temp_dir().join("tern-no-such-config.toml");
        assert!(load_config(Some(&missing)).is_err());
    }
}
