//! # Config Commands

use std::path::PathBuf;

use medinv_sync::MedinvConfig;

use crate::error::{CommandError, CommandResult};

/// Writes a default config file (with a fresh device id) and returns its path.
pub fn init_config(path: Option<PathBuf>, force: bool) -> CommandResult<PathBuf> {
    let path = path
        .or_else(MedinvConfig::default_config_path)
        .ok_or_else(|| CommandError::config("No config path available"))?;

    if path.exists() && !force {
        return Err(CommandError::validation(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    MedinvConfig::new().save(Some(path.clone()))?;
    Ok(path)
}

/// The effective configuration after file, environment and defaults.
pub fn show_config(path: Option<PathBuf>) -> CommandResult<MedinvConfig> {
    Ok(MedinvConfig::load(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_init_then_refuse_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("medinv.toml");

        let written = init_config(Some(path.clone()), false).unwrap();
        assert_eq!(written, path);

        let loaded = show_config(Some(path.clone())).unwrap();
        assert!(!loaded.device.id.is_empty());
        assert_eq!(loaded.sync.interval_secs, 60);

        let err = init_config(Some(path.clone()), false).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert!(init_config(Some(path), true).is_ok());
    }
}
