use std::collections::HashMap;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

pub const DEFAULT_BIND: &str = "0.0.0.0:8088";

/// Top-level config (relay.toml + RELAY_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cronjob: CronJobConfig,
    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,
    #[serde(default)]
    pub channels: HashMap<String, ChannelEntryConfig>,
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntryConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            logging: LoggingConfig::default(),
            cronjob: CronJobConfig::default(),
            agents: HashMap::new(),
            channels: HashMap::new(),
            providers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default)]
    pub auto_update: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_concurrent_sessions: default_max_concurrent_sessions(),
            request_timeout: default_request_timeout(),
            auto_update: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_output")]
    pub output: String,
    pub file: Option<String>,
    #[serde(default = "default_rotation_size_mb")]
    pub rotation_size_mb: u64,
    #[serde(default = "default_rotation_backups")]
    pub rotation_backups: u32,
    #[serde(default = "default_rotation_age_days")]
    pub rotation_age_days: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            output: default_log_output(),
            file: None,
            rotation_size_mb: default_rotation_size_mb(),
            rotation_backups: default_rotation_backups(),
            rotation_age_days: default_rotation_age_days(),
        }
    }
}

/// Durable cron job store + scheduler tuning (§4.I/§4.J).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronJobConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_cronjob_store")]
    pub store: String,
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,
    #[serde(default = "default_job_timeout_sec")]
    pub job_timeout_sec: u64,
    #[serde(default = "default_session_retention")]
    pub session_retention: String,
}

impl Default for CronJobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            store: default_cronjob_store(),
            max_concurrent_runs: default_max_concurrent_runs(),
            job_timeout_sec: default_job_timeout_sec(),
            session_retention: default_session_retention(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub workspace: String,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub models: AgentModelsConfig,
    #[serde(default)]
    pub config: AgentTuningConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentModelsConfig {
    pub primary: String,
    #[serde(default)]
    pub fallback: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTuningConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for AgentTuningConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEntryConfig {
    #[serde(rename = "type")]
    pub channel_type: String,
    #[serde(default = "bool_true")]
    pub enabled: bool,
    pub security: Option<String>,
    #[serde(default)]
    pub acl: Vec<String>,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntryConfig {
    #[serde(rename = "type")]
    pub provider_type: String,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

fn bool_true() -> bool {
    true
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_max_concurrent_sessions() -> usize {
    16
}
fn default_request_timeout() -> u64 {
    120
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_log_output() -> String {
    "stderr".to_string()
}
fn default_rotation_size_mb() -> u64 {
    100
}
fn default_rotation_backups() -> u32 {
    5
}
fn default_rotation_age_days() -> u32 {
    28
}
fn default_cronjob_store() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.relay/cronjob/jobs.json")
}
fn default_max_concurrent_runs() -> usize {
    1
}
fn default_job_timeout_sec() -> u64 {
    300
}
fn default_session_retention() -> String {
    "720h".to_string()
}
fn default_max_iterations() -> usize {
    25
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_temperature() -> f32 {
    0.7
}

impl RelayConfig {
    /// Load config from a TOML file with RELAY_* env var overrides.
    ///
    /// Unlike a best-effort reader, a missing/malformed file is a
    /// validation error that aborts startup (§7) — callers must not
    /// paper over it with `RelayConfig::default()`.
    pub fn load(config_path: &str) -> Result<Self> {
        let config: RelayConfig = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("RELAY_").split("_"))
            .extract()
            .map_err(|e| RelayError::Config(e.to_string()))?;

        Ok(config)
    }
}
