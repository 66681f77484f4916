//! Configuration loading and environment variable handling

use crate::domains::VmScaleConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "VMSCALE".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<VmScaleConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: VmScaleConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<VmScaleConfig> {
        let mut config = VmScaleConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<VmScaleConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut VmScaleConfig) -> ConfigResult<()> {
        self.apply_concurrency_overrides(&mut config.concurrency)?;
        self.apply_wait_overrides(&mut config.wait)?;
        self.apply_diagnostics_overrides(&mut config.diagnostics)?;
        self.apply_report_overrides(&mut config.report)?;
        self.apply_scenario_overrides(&mut config.scenario)?;
        self.apply_logging_overrides(&mut config.logging)?;

        Ok(())
    }

    /// Apply concurrency config overrides
    fn apply_concurrency_overrides(
        &self,
        config: &mut crate::domains::concurrency::ConcurrencyConfig,
    ) -> ConfigResult<()> {
        if let Ok(max_workers) = self.get_env_var("MAX_WORKERS") {
            config.max_workers = max_workers
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid MAX_WORKERS: {}", e)))?;
        }

        if let Ok(cancel) = self.get_env_var("CANCEL_ON_FAILURE") {
            config.cancel_on_failure = cancel
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid CANCEL_ON_FAILURE: {}", e)))?;
        }

        Ok(())
    }

    /// Apply wait config overrides
    fn apply_wait_overrides(
        &self,
        config: &mut crate::domains::wait::WaitConfig,
    ) -> ConfigResult<()> {
        if let Ok(interval) = self.get_env_var("POLL_INTERVAL_SECONDS") {
            let seconds: u64 = interval.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid POLL_INTERVAL_SECONDS: {}", e))
            })?;
            config.poll_interval = std::time::Duration::from_secs(seconds);
        }

        if let Ok(timeout) = self.get_env_var("STATUS_TIMEOUT_SECONDS") {
            let seconds: u64 = timeout.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid STATUS_TIMEOUT_SECONDS: {}", e))
            })?;
            config.status_timeout = std::time::Duration::from_secs(seconds);
        }

        if let Ok(timeout) = self.get_env_var("DELETE_TIMEOUT_SECONDS") {
            let seconds: u64 = timeout.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid DELETE_TIMEOUT_SECONDS: {}", e))
            })?;
            config.delete_timeout = std::time::Duration::from_secs(seconds);
        }

        Ok(())
    }

    /// Apply diagnostics config overrides
    fn apply_diagnostics_overrides(
        &self,
        config: &mut crate::domains::diagnostics::DiagnosticsConfig,
    ) -> ConfigResult<()> {
        if let Ok(enabled) = self.get_env_var("DIAGNOSTICS_ENABLED") {
            config.enabled = enabled.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid DIAGNOSTICS_ENABLED: {}", e))
            })?;
        }

        if let Ok(dir) = self.get_env_var("DIAGNOSTICS_DIR") {
            config.target_dir = dir;
        }

        Ok(())
    }

    /// Apply report config overrides
    fn apply_report_overrides(
        &self,
        config: &mut crate::domains::report::ReportConfig,
    ) -> ConfigResult<()> {
        if let Ok(file) = self.get_env_var("REPORT_FILE") {
            config.output_file = Some(file);
        }

        if let Ok(suffix) = self.get_env_var("BASELINE_SUFFIX") {
            config.baseline_suffix = suffix;
        }

        if let Ok(overhead) = self.get_env_var("ALLOWED_OVERHEAD") {
            config.allowed_overhead = overhead
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid ALLOWED_OVERHEAD: {}", e)))?;
        }

        Ok(())
    }

    /// Apply scenario config overrides
    fn apply_scenario_overrides(
        &self,
        config: &mut crate::domains::scenario::ScenarioConfig,
    ) -> ConfigResult<()> {
        if let Ok(count) = self.get_env_var("PROJECT_COUNT") {
            config.project_count = count
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid PROJECT_COUNT: {}", e)))?;
        }

        if let Ok(count) = self.get_env_var("VMS_PER_PROJECT") {
            config.vms_per_project = count
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid VMS_PER_PROJECT: {}", e)))?;
        }

        if let Ok(run_key) = self.get_env_var("RUN_KEY") {
            config.run_key = run_key;
        }

        if let Ok(diskless) = self.get_env_var("DISKLESS") {
            config.diskless = diskless
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid DISKLESS: {}", e)))?;
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            use std::str::FromStr;
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            use std::str::FromStr;
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_only_load_uses_defaults() {
        let config = ConfigLoader::with_prefix("VMSCALE_TEST_NONE")
            .from_env()
            .unwrap();
        assert_eq!(config.concurrency.max_workers, 64);
    }

    #[test]
    fn test_env_overrides_apply() {
        temp_env::with_vars(
            [
                ("VMSCALE_T1_MAX_WORKERS", Some("17")),
                ("VMSCALE_T1_STATUS_TIMEOUT_SECONDS", Some("90")),
                ("VMSCALE_T1_RUN_KEY", Some("upgrade-run")),
                ("VMSCALE_T1_LOG_LEVEL", Some("debug")),
            ],
            || {
                let config = ConfigLoader::with_prefix("VMSCALE_T1").from_env().unwrap();
                assert_eq!(config.concurrency.max_workers, 17);
                assert_eq!(config.wait.status_timeout.as_secs(), 90);
                assert_eq!(config.scenario.run_key, "upgrade-run");
                assert_eq!(
                    config.logging.level,
                    crate::domains::logging::LogLevel::Debug
                );
            },
        );
    }

    #[test]
    fn test_invalid_env_value_is_rejected() {
        temp_env::with_vars([("VMSCALE_T2_MAX_WORKERS", Some("lots"))], || {
            let result = ConfigLoader::with_prefix("VMSCALE_T2").from_env();
            assert!(matches!(result, Err(ConfigError::EnvError(_))));
        });
    }

    #[test]
    fn test_file_load_with_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "concurrency:\n  max_workers: 4\nscenario:\n  vms_per_project: 25"
        )
        .unwrap();

        temp_env::with_vars([("VMSCALE_T3_MAX_WORKERS", Some("9"))], || {
            let config = ConfigLoader::with_prefix("VMSCALE_T3")
                .from_file(file.path())
                .unwrap();
            // Env wins over file
            assert_eq!(config.concurrency.max_workers, 9);
            assert_eq!(config.scenario.vms_per_project, 25);
        });
    }

    #[test]
    fn test_validation_runs_on_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "concurrency:\n  max_workers: 0").unwrap();

        let result = ConfigLoader::with_prefix("VMSCALE_T4").from_file(file.path());
        assert!(matches!(result, Err(ConfigError::DomainError { .. })));
    }
}
