use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use super::types::LanguageConfig;
use crate::error_handling::types::ConfigError;

/// Application configuration.
///
/// Every field has a default, so a configuration file only needs to name the
/// values it overrides (plus at least one `[languages.*]` entry — an engine
/// with no languages cannot run anything).
///
/// # Fields Overview
///
/// - `max_sessions`: number of concurrently running sandboxes; admissions
///   beyond this queue for a slot.
/// - `admission_timeout_secs`: how long a queued session may wait for a slot
///   before it is terminated.
/// - `idle_timeout_secs`: inactivity window (no input, no output) after which
///   a running session is reclaimed.
/// - `detach_grace_secs`: how long a session survives with zero attached
///   observers before it is reclaimed.
/// - `max_output_bytes`: combined stdout+stderr cap per session; overflow
///   terminates the session.
/// - `memory_limit_mb`, `cpu_limit`, `pids_limit`, `scratch_tmpfs_mb`: the
///   resource ceiling applied to every sandbox.
/// - `docker_binary`: container runtime CLI to drive.
/// - `languages`: the language lookup table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_sessions: usize,
    pub admission_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub detach_grace_secs: u64,
    pub max_output_bytes: usize,
    pub memory_limit_mb: u64,
    pub cpu_limit: f64,
    pub pids_limit: u32,
    pub scratch_tmpfs_mb: u64,
    pub docker_binary: String,
    pub languages: HashMap<String, LanguageConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_sessions: 10,
            admission_timeout_secs: 120,
            idle_timeout_secs: 30,
            detach_grace_secs: 60,
            max_output_bytes: 1 << 20,
            memory_limit_mb: 200,
            cpu_limit: 0.5,
            pids_limit: 32,
            scratch_tmpfs_mb: 32,
            docker_binary: "docker".to_string(),
            languages: HashMap::new(),
        }
    }
}

impl Config {
    /// Loads and validates a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&raw).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        info!(
            "configuration loaded from {} ({} languages, {} slots)",
            path.display(),
            config.languages.len(),
            config.max_sessions
        );
        Ok(config)
    }

    /// Checks the configuration for values the engine cannot operate with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sessions == 0 {
            return Err(ConfigError::NotInRange(
                "max_sessions must be at least 1".to_string(),
            ));
        }
        if self.admission_timeout_secs == 0 {
            return Err(ConfigError::NotInRange(
                "admission_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.idle_timeout_secs == 0 {
            return Err(ConfigError::NotInRange(
                "idle_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.detach_grace_secs == 0 {
            return Err(ConfigError::NotInRange(
                "detach_grace_secs must be at least 1".to_string(),
            ));
        }
        if self.max_output_bytes < 1024 {
            return Err(ConfigError::NotInRange(
                "max_output_bytes must be at least 1024".to_string(),
            ));
        }
        if self.memory_limit_mb < 4 {
            return Err(ConfigError::NotInRange(
                "memory_limit_mb must be at least 4".to_string(),
            ));
        }
        if !(self.cpu_limit > 0.0) {
            return Err(ConfigError::NotInRange(
                "cpu_limit must be greater than 0".to_string(),
            ));
        }
        if self.pids_limit == 0 {
            return Err(ConfigError::NotInRange(
                "pids_limit must be at least 1".to_string(),
            ));
        }
        if self.languages.is_empty() {
            return Err(ConfigError::LanguagesEmpty(
                "at least one language must be configured".to_string(),
            ));
        }
        for (name, lang) in &self.languages {
            if lang.image.is_empty() || lang.entry_filename.is_empty() || lang.run_command.is_empty()
            {
                return Err(ConfigError::LanguagesEmpty(format!(
                    "language '{}' is missing an image, entry filename or run command",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn admission_timeout(&self) -> Duration {
        Duration::from_secs(self.admission_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn detach_grace(&self) -> Duration {
        Duration::from_secs(self.detach_grace_secs)
    }
}
