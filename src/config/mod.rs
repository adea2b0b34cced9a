//! Layered configuration: built-in defaults overlaid by an optional TOML
//! file at `~/.config/grid-tunnel/config.toml`.

mod defaults;

pub use defaults::BuiltinDefaults;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::job::JobClass;
use crate::timeout::{IntervalError, PollIntervals};

/// Effective configuration for one invocation.
#[derive(Debug, Clone)]
pub struct TunnelConfig {
    pub base_name: String,
    /// Scheduler user; falls back to `$USER` when unset.
    pub user: Option<String>,
    pub cpu_params: String,
    pub gpu_params: String,
    pub bootstrap_script: String,
    pub qstat_cmd: String,
    pub qsub_cmd: String,
    pub qdel_cmd: String,
    pub start_timeout_seconds: u64,
    pub job_poll_seconds: u64,
    pub probe_poll_seconds: u64,
    pub cancel_poll_seconds: u64,
}

/// Optional per-field overrides read from the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileOverrides {
    base_name: Option<String>,
    user: Option<String>,
    cpu_params: Option<String>,
    gpu_params: Option<String>,
    bootstrap_script: Option<String>,
    qstat_cmd: Option<String>,
    qsub_cmd: Option<String>,
    qdel_cmd: Option<String>,
    start_timeout_seconds: Option<u64>,
    job_poll_seconds: Option<u64>,
    probe_poll_seconds: Option<u64>,
    cancel_poll_seconds: Option<u64>,
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration in {path}: {source}")]
    Invalid {
        path: String,
        #[source]
        source: IntervalError,
    },
}

impl Default for TunnelConfig {
    fn default() -> Self {
        let defaults = BuiltinDefaults::default();
        Self {
            base_name: defaults.base_name,
            user: None,
            cpu_params: defaults.cpu_params,
            gpu_params: defaults.gpu_params,
            bootstrap_script: defaults.bootstrap_script,
            qstat_cmd: defaults.qstat_cmd,
            qsub_cmd: defaults.qsub_cmd,
            qdel_cmd: defaults.qdel_cmd,
            start_timeout_seconds: defaults.start_timeout_seconds,
            job_poll_seconds: defaults.job_poll_seconds,
            probe_poll_seconds: defaults.probe_poll_seconds,
            cancel_poll_seconds: defaults.cancel_poll_seconds,
        }
    }
}

impl TunnelConfig {
    /// Load the default-path overlay when the file exists; built-in
    /// defaults otherwise.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let overrides: FileOverrides =
            toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        let mut config = Self::default();
        config.apply(overrides);
        config
            .poll_intervals()
            .validate()
            .map_err(|source| ConfigError::Invalid {
                path: path.display().to_string(),
                source,
            })?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/grid-tunnel/config.toml"))
    }

    fn apply(&mut self, overrides: FileOverrides) {
        let FileOverrides {
            base_name,
            user,
            cpu_params,
            gpu_params,
            bootstrap_script,
            qstat_cmd,
            qsub_cmd,
            qdel_cmd,
            start_timeout_seconds,
            job_poll_seconds,
            probe_poll_seconds,
            cancel_poll_seconds,
        } = overrides;

        if let Some(value) = base_name {
            self.base_name = value;
        }
        if user.is_some() {
            self.user = user;
        }
        if let Some(value) = cpu_params {
            self.cpu_params = value;
        }
        if let Some(value) = gpu_params {
            self.gpu_params = value;
        }
        if let Some(value) = bootstrap_script {
            self.bootstrap_script = value;
        }
        if let Some(value) = qstat_cmd {
            self.qstat_cmd = value;
        }
        if let Some(value) = qsub_cmd {
            self.qsub_cmd = value;
        }
        if let Some(value) = qdel_cmd {
            self.qdel_cmd = value;
        }
        if let Some(value) = start_timeout_seconds {
            self.start_timeout_seconds = value;
        }
        if let Some(value) = job_poll_seconds {
            self.job_poll_seconds = value;
        }
        if let Some(value) = probe_poll_seconds {
            self.probe_poll_seconds = value;
        }
        if let Some(value) = cancel_poll_seconds {
            self.cancel_poll_seconds = value;
        }
    }

    /// Configured user, `$USER` when unset.
    pub fn effective_user(&self) -> String {
        self.user
            .clone()
            .or_else(|| env::var("USER").ok())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn params_for(&self, class: JobClass) -> &str {
        match class {
            JobClass::Cpu => &self.cpu_params,
            JobClass::Gpu => &self.gpu_params,
        }
    }

    pub fn script_path(&self) -> PathBuf {
        expand_home(&self.bootstrap_script)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_seconds)
    }

    pub fn poll_intervals(&self) -> PollIntervals {
        PollIntervals {
            job_state: Duration::from_secs(self.job_poll_seconds),
            reachability: Duration::from_secs(self.probe_poll_seconds),
            cancel: Duration::from_secs(self.cancel_poll_seconds),
        }
    }
}

/// Expand a leading `~/` against `$HOME`.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_builtin() {
        let config = TunnelConfig::default();
        let defaults = BuiltinDefaults::default();
        assert_eq!(config.base_name, defaults.base_name);
        assert_eq!(config.start_timeout_seconds, defaults.start_timeout_seconds);
        assert!(config.user.is_none());
    }

    #[test]
    fn test_params_for_class() {
        let config = TunnelConfig::default();
        assert_eq!(config.params_for(JobClass::Cpu), config.cpu_params);
        assert_eq!(config.params_for(JobClass::Gpu), config.gpu_params);
        assert_ne!(config.cpu_params, config.gpu_params);
    }

    #[test]
    fn test_poll_intervals_from_seconds() {
        let config = TunnelConfig::default();
        let intervals = config.poll_intervals();
        assert_eq!(intervals.job_state, Duration::from_secs(5));
        assert_eq!(intervals.reachability, Duration::from_secs(1));
        assert_eq!(intervals.cancel, Duration::from_secs(2));
        assert!(intervals.validate().is_ok());
    }

    #[test]
    fn test_expand_home_passthrough() {
        assert_eq!(
            expand_home("/opt/session/bootstrap.sh"),
            PathBuf::from("/opt/session/bootstrap.sh")
        );
    }
}
