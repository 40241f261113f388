// src/config/validate.rs

use crate::config::model::{RawShellSettings, ShellSettings};
use crate::errors::{Result, ShellError};

impl TryFrom<RawShellSettings> for ShellSettings {
    type Error = ShellError;

    fn try_from(raw: RawShellSettings) -> std::result::Result<Self, Self::Error> {
        validate_raw_settings(&raw)?;
        Ok(ShellSettings::new_unchecked(raw))
    }
}

fn validate_raw_settings(raw: &RawShellSettings) -> Result<()> {
    ensure_positive("stdin_read_ahead", raw.stdin_read_ahead)?;
    ensure_positive("output_buffer_limit", raw.output_buffer_limit)?;
    ensure_exit_values(raw)?;
    ensure_working_directory(raw)?;
    Ok(())
}

fn ensure_positive(key: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(ShellError::ConfigError(format!(
            "`{key}` must be >= 1 (got 0)"
        )));
    }
    Ok(())
}

fn ensure_exit_values(raw: &RawShellSettings) -> Result<()> {
    if raw.exit_values.is_empty() {
        return Err(ShellError::ConfigError(
            "`exit_values` must list at least one exit code".to_string(),
        ));
    }
    Ok(())
}

fn ensure_working_directory(raw: &RawShellSettings) -> Result<()> {
    if let Some(dir) = &raw.working_directory {
        if !dir.is_dir() {
            return Err(ShellError::ConfigError(format!(
                "`working_directory` {} is not a directory",
                dir.display()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = ShellSettings::try_from(RawShellSettings::default()).unwrap();
        assert_eq!(settings, ShellSettings::default());
        assert_eq!(settings.exit_values, vec![0]);
        assert!(settings.force_kill_on_shutdown);
    }

    #[test]
    fn zero_limits_are_rejected() {
        let raw = RawShellSettings {
            output_buffer_limit: 0,
            ..RawShellSettings::default()
        };
        let err = ShellSettings::try_from(raw).unwrap_err();
        assert!(matches!(err, ShellError::ConfigError(msg) if msg.contains("output_buffer_limit")));
    }

    #[test]
    fn empty_exit_values_are_rejected() {
        let raw = RawShellSettings {
            exit_values: vec![],
            ..RawShellSettings::default()
        };
        assert!(matches!(
            ShellSettings::try_from(raw),
            Err(ShellError::ConfigError(_))
        ));
    }

    #[test]
    fn missing_working_directory_is_rejected() {
        let raw = RawShellSettings {
            working_directory: Some("/definitely/not/a/dir".into()),
            ..RawShellSettings::default()
        };
        assert!(ShellSettings::try_from(raw).is_err());
    }
}
