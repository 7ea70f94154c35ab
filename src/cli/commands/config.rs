//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Run the config command.
pub fn run_config(
    action: &ConfigAction,
    config_path: Option<&PathBuf>,
    settings: Settings,
) -> Result<()> {
    let path = config_path
        .cloned()
        .unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&settings)
                .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
            println!("{}", toml_str);
        }

        ConfigAction::Path => {
            println!("{}", path.display());
        }

        ConfigAction::Init { force } => {
            if init_config(&path, *force)? {
                Output::success(&format!("Wrote default config to {}", path.display()));
            } else {
                Output::warning(&format!(
                    "{} already exists. Use --force to overwrite.",
                    path.display()
                ));
            }
        }
    }

    Ok(())
}

/// Write the default settings unless a file exists and `force` is off.
fn init_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    Settings::default().save_to(path)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_does_not_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vidquiz").join("config.toml");

        assert!(init_config(&path, false).unwrap());
        std::fs::write(&path, "[app]\nmax_file_size_mb = 1\n").unwrap();

        assert!(!init_config(&path, false).unwrap());
        assert!(std::fs::read_to_string(&path).unwrap().contains("max_file_size_mb = 1"));

        assert!(init_config(&path, true).unwrap());
        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.app.max_file_size_mb, 500);
    }
}
