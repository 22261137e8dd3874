//! Application configuration.
//!
//! Loaded with the `config` crate from a file (`ARGUS_CONFIG`, default
//! `config/argus.yaml`) and overridden by `ARGUS__SECTION__KEY` environment
//! variables. Every section has documented defaults; only `sources` is
//! required.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use argus_media::DetectorConfig;
use argus_ml_client::MlClientConfig;
use argus_models::{validate_sources, SourceConfig};
use argus_notify::NotifyConfig;
use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::error::{WorkerError, WorkerResult};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "ARGUS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/argus.yaml";
const ENV_PREFIX: &str = "ARGUS";
const ENV_SEPARATOR: &str = "__";

/// Engine tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frames kept per source buffer
    pub buffer_capacity: usize,
    /// Concurrent detector requests
    pub max_in_flight: usize,
    /// Main loop period
    pub tick_ms: u64,
    /// Save cadence once an important object was detected
    pub detected_save_every_sec: u64,
    /// Notification silence window per source
    pub silence_secs: u64,
    /// Multi-hit confirmation window
    pub confirmation_window_ms: u64,
    /// Detections required inside the window; 1 disables confirmation
    pub confirmation_threshold: usize,
    /// Reads slower than this are logged
    pub read_budget_ms: u64,
    /// Pause before a failed capture worker exits
    pub reconnect_delay_ms: u64,
    pub restart_backoff_base_ms: u64,
    pub restart_backoff_max_ms: u64,
    /// Detector health check period; 0 disables the watchdog
    pub watchdog_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 3,
            max_in_flight: 2,
            tick_ms: 10,
            detected_save_every_sec: 1,
            silence_secs: 30 * 60,
            confirmation_window_ms: 3_000,
            confirmation_threshold: 5,
            read_budget_ms: 5_000,
            reconnect_delay_ms: 1_000,
            restart_backoff_base_ms: 1_000,
            restart_backoff_max_ms: 30_000,
            watchdog_interval_secs: 60,
        }
    }
}

impl EngineConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn read_budget(&self) -> Duration {
        Duration::from_millis(self.read_budget_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs)
    }
}

/// Which inference backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Remote detection service over HTTP
    #[default]
    Remote,
    /// In-process YOLOv8 (requires the `onnx` feature)
    Onnx,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    pub kind: DetectorKind,
    pub remote: MlClientConfig,
    pub onnx: DetectorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub enabled: bool,
    pub listen: SocketAddr,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: SocketAddr::from(([127, 0, 0, 1], 8888)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// The system is armed while this file exists
    pub state_file: PathBuf,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("/tmp/argus-armed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus exporter address; disabled when unset
    pub listen: Option<SocketAddr>,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub detector: DetectorSettings,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub alarm: AlarmConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}

impl AppConfig {
    /// Load from `ARGUS_CONFIG` (or the default path) plus the environment.
    pub fn load() -> WorkerResult<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load from a file plus the environment.
    pub fn load_from(path: &Path) -> WorkerResult<Self> {
        if !path.exists() {
            return Err(WorkerError::config_error(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Self::build(File::from(path), env_source())
    }

    /// Parse YAML text with explicit environment overrides.
    pub fn from_yaml(yaml: &str, env: Environment) -> WorkerResult<Self> {
        Self::build(File::from_str(yaml, FileFormat::Yaml), env)
    }

    fn build<F>(file: F, env: Environment) -> WorkerResult<Self>
    where
        F: ::config::Source + Send + Sync + 'static,
    {
        let config: AppConfig = Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> WorkerResult<()> {
        if self.sources.is_empty() {
            return Err(WorkerError::config_error("at least one source is required"));
        }
        validate_sources(&self.sources)?;

        let engine = &self.engine;
        if engine.buffer_capacity == 0 {
            return Err(WorkerError::config_error("engine.buffer_capacity must be > 0"));
        }
        if engine.max_in_flight == 0 {
            return Err(WorkerError::config_error("engine.max_in_flight must be > 0"));
        }
        if engine.tick_ms == 0 {
            return Err(WorkerError::config_error("engine.tick_ms must be > 0"));
        }
        if engine.detected_save_every_sec == 0 {
            return Err(WorkerError::config_error(
                "engine.detected_save_every_sec must be > 0",
            ));
        }
        if engine.restart_backoff_base_ms > engine.restart_backoff_max_ms {
            return Err(WorkerError::config_error(
                "engine.restart_backoff_base_ms must not exceed restart_backoff_max_ms",
            ));
        }
        Ok(())
    }
}

/// Build an environment source from explicit pairs (for tests and tooling).
pub fn env_from_pairs<I, K, V>(pairs: I) -> Environment
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let map = pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect::<::config::Map<String, String>>();
    env_source().source(Some(map))
}
