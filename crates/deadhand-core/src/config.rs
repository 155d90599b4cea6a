use crate::error::{DeadhandError, Result};
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};
use crate::paths;
use crate::types::TimeUnit;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// SchedulerConfig
// ---------------------------------------------------------------------------

/// How often each periodic job runs, as ticks per time unit.
///
/// With the default `days` unit the inactivity and grace jobs run daily and
/// the time-lock job hourly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_one")]
    pub inactivity_ticks_per_unit: u32,
    #[serde(default = "default_one")]
    pub grace_ticks_per_unit: u32,
    #[serde(default = "default_time_lock_ticks")]
    pub time_lock_ticks_per_unit: u32,
}

fn default_one() -> u32 {
    1
}

fn default_time_lock_ticks() -> u32 {
    24
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            inactivity_ticks_per_unit: default_one(),
            grace_ticks_per_unit: default_one(),
            time_lock_ticks_per_unit: default_time_lock_ticks(),
        }
    }
}

// ---------------------------------------------------------------------------
// NotifyConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifyConfig {
    #[default]
    Log,
    Webhook {
        url: String,
        #[serde(default = "default_webhook_timeout")]
        timeout_secs: u64,
    },
}

fn default_webhook_timeout() -> u64 {
    10
}

impl NotifyConfig {
    pub fn build(&self) -> Arc<dyn Notifier> {
        match self {
            NotifyConfig::Log => Arc::new(LogNotifier),
            NotifyConfig::Webhook { url, timeout_secs } => Arc::new(WebhookNotifier::new(
                url.clone(),
                Duration::from_secs(*timeout_secs),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    3150
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub time_unit: TimeUnit,
    /// Remaining time-lock, in time units, at which reminders start.
    #[serde(default = "default_reminder_threshold")]
    pub reminder_threshold: u32,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_version() -> u32 {
    1
}

fn default_reminder_threshold() -> u32 {
    2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            time_unit: TimeUnit::default(),
            reminder_threshold: default_reminder_threshold(),
            scheduler: SchedulerConfig::default(),
            notify: NotifyConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(DeadhandError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let ticks = [
            ("inactivity", self.scheduler.inactivity_ticks_per_unit),
            ("grace", self.scheduler.grace_ticks_per_unit),
            ("time_lock", self.scheduler.time_lock_ticks_per_unit),
        ];
        for (job, rate) in ticks {
            if rate == 0 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("scheduler.{job}_ticks_per_unit is 0; treated as 1"),
                });
            }
        }

        if self.reminder_threshold == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "reminder_threshold is 0; no time-lock reminders will be sent"
                    .to_string(),
            });
        }

        if let NotifyConfig::Webhook { url, .. } = &self.notify {
            if url.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "notify.webhook has an empty url".to_string(),
                });
            } else if !(url.starts_with("http://") || url.starts_with("https://")) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("notify.webhook url '{url}' is not http(s)"),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
